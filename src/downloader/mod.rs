//! Downloader: works through the catalog store one record at a time
//!
//! Per-record state machine: `pending → done | blocked | error | no_epub |
//! missing`. The store is saved after every attempt so a crash loses at
//! most the in-flight item, and a detected site-side block halts the whole
//! run (the anti-blocking safeguard this tool is built around).

use std::fs;
use std::io;
use std::path::Path;

use reqwest::Client;
use url::Url;

use crate::catalog::{BookRecord, BookStatus, CatalogStore};
use crate::config::Settings;
use crate::extract::extract_detail;
use crate::fetch;
use crate::paths::target_path;
use crate::{Result, ShelfError};

/// What the driving loop should do after one record's attempt
///
/// Non-fatal failures continue to the next record; only a detected block
/// halts the run. Using a tagged outcome instead of error propagation keeps
/// the control transfer local and explicit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Continue,
    HaltRun,
}

/// Counters for one downloader run
#[derive(Debug, Default, Clone, Copy)]
pub struct DownloadSummary {
    pub attempted: usize,
    pub done: usize,
    pub no_epub: usize,
    pub missing: usize,
    pub errors: usize,
}

/// Sequential, rate-limited file downloader
pub struct Downloader {
    client: Client,
    settings: Settings,
}

impl Downloader {
    pub fn new(settings: Settings) -> Result<Self> {
        let client = fetch::build_http_client(&settings)?;
        Ok(Self { client, settings })
    }

    /// Works through every re-runnable record (`pending`, `blocked`,
    /// `error`) in store order
    ///
    /// The store is saved after every attempt. On a detected block the
    /// failing record is marked `blocked`, the store is saved, and the run
    /// fails with [`ShelfError::Blocked`]; all later records stay untouched
    /// and are reselected by the next invocation.
    pub async fn run(&self, store: &mut CatalogStore) -> Result<DownloadSummary> {
        let selected = store.retryable_books();
        tracing::info!("{} records selected for download", selected.len());

        let mut summary = DownloadSummary::default();
        for book_url in &selected {
            let record = match store.get(book_url) {
                Some(r) => r.clone(),
                None => continue,
            };

            summary.attempted += 1;
            let (updated, outcome) = self.attempt(record).await;
            match updated.status {
                BookStatus::Done => summary.done += 1,
                BookStatus::NoEpub => summary.no_epub += 1,
                BookStatus::Missing => summary.missing += 1,
                BookStatus::Error => summary.errors += 1,
                _ => {}
            }
            if updated.status == BookStatus::Done {
                tracing::info!("downloaded {} -> {}", updated.title, updated.filepath);
            } else {
                tracing::debug!("{}: {} {}", updated.title, updated.status, updated.error);
            }

            let halted = outcome == StepOutcome::HaltRun;
            let blocked_url = updated.book_url.clone();
            let blocked_detail = updated.error.clone();

            store.upsert(updated);
            store.save(&self.settings.output)?;

            if halted {
                tracing::error!(
                    "blocked by server, halting run ({} done, {} errors so far)",
                    summary.done,
                    summary.errors
                );
                return Err(ShelfError::Blocked {
                    url: blocked_url,
                    detail: blocked_detail,
                });
            }

            tokio::time::sleep(self.settings.sleep).await;
        }

        tracing::info!(
            "download stage finished: {} done, {} no_epub, {} missing, {} errors of {} attempted",
            summary.done,
            summary.no_epub,
            summary.missing,
            summary.errors,
            summary.attempted
        );
        Ok(summary)
    }

    /// Runs the state machine for one record and returns the updated record
    /// plus the loop directive
    async fn attempt(&self, mut record: BookRecord) -> (BookRecord, StepOutcome) {
        // A record can reach the downloader without a resolved link when the
        // crawl was interrupted; give its detail page one chance here.
        if record.download_url.is_empty() {
            match self.resolve_download(&mut record).await {
                StepOutcome::HaltRun => return (record, StepOutcome::HaltRun),
                StepOutcome::Continue => {}
            }
            if record.status.is_terminal() {
                return (record, StepOutcome::Continue);
            }
            if record.download_url.is_empty() {
                record.status = BookStatus::NoEpub;
                record.error.clear();
                return (record, StepOutcome::Continue);
            }
        }

        let dest = target_path(
            &self.settings.download_dir,
            &record.category,
            &record.author,
            &record.title,
        );

        match fetch::fetch_bytes(&self.client, &record.download_url).await {
            Ok(bytes) if bytes.is_empty() => {
                record.status = BookStatus::Error;
                record.error = "empty response body".to_string();
                (record, StepOutcome::Continue)
            }
            Ok(bytes) => match write_atomic(&dest, &bytes) {
                Ok(()) => {
                    record.status = BookStatus::Done;
                    record.filepath = dest.display().to_string();
                    record.error.clear();
                    (record, StepOutcome::Continue)
                }
                Err(e) => {
                    record.status = BookStatus::Error;
                    record.error = format!("write failed: {e}");
                    (record, StepOutcome::Continue)
                }
            },
            Err(e) if e.is_blocking() => {
                record.status = BookStatus::Blocked;
                record.error = e.to_string();
                (record, StepOutcome::HaltRun)
            }
            Err(e) => {
                record.status = BookStatus::Error;
                record.error = e.to_string();
                (record, StepOutcome::Continue)
            }
        }
    }

    /// Fetches the record's detail page to fill in the missing download
    /// link (and author/title while we are there)
    ///
    /// An unreachable detail page after a successful listing marks the
    /// record `missing`, a terminal state.
    async fn resolve_download(&self, record: &mut BookRecord) -> StepOutcome {
        match fetch::fetch_text(&self.client, &record.book_url).await {
            Ok(html) => {
                if let Ok(base) = Url::parse(&record.book_url) {
                    let detail = extract_detail(&html, &base);
                    if !detail.author.is_empty() && record.author.is_empty() {
                        record.author = detail.author;
                    }
                    if !detail.title.is_empty()
                        && (record.title.is_empty() || record.title.contains('【'))
                    {
                        record.title = detail.title;
                    }
                    record.download_url = detail.download_url;
                    record.download_name = detail.download_name;
                }
                StepOutcome::Continue
            }
            Err(e) if e.is_blocking() => {
                record.status = BookStatus::Blocked;
                record.error = e.to_string();
                StepOutcome::HaltRun
            }
            Err(e) => {
                record.status = BookStatus::Missing;
                record.error = e.to_string();
                StepOutcome::Continue
            }
        }
    }
}

/// Writes the file through a `.part` sibling then renames, so an
/// interrupted download never leaves a half-written epub at the final path
fn write_atomic(dest: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut part = dest.as_os_str().to_owned();
    part.push(".part");
    let part = std::path::PathBuf::from(part);
    fs::write(&part, bytes)?;
    fs::rename(&part, dest)
}

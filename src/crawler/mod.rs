//! Crawler: walks the category → listing → detail hierarchy
//!
//! Populates the catalog store with one `pending` record per discovered
//! book, then enriches records from their detail pages. Per-page fetch
//! errors are recorded on the affected record and the walk continues;
//! a site-side block aborts the whole run.

use reqwest::Client;
use url::Url;

use crate::catalog::{BookRecord, BookStatus, CatalogStore};
use crate::config::Settings;
use crate::extract::{extract_categories, extract_detail, extract_listing};
use crate::fetch::{self, FetchError};
use crate::{Result, ShelfError};

/// Details are persisted every this many fetches, so an interrupted crawl
/// loses at most a handful of enrichments
const DETAIL_SAVE_INTERVAL: usize = 10;

/// Counters for one crawl run
#[derive(Debug, Default, Clone, Copy)]
pub struct CrawlSummary {
    /// Categories walked
    pub categories: usize,
    /// Books newly discovered this run
    pub discovered: usize,
    /// Detail pages fetched for enrichment
    pub enriched: usize,
    /// Pages that failed with a non-fatal error
    pub page_errors: usize,
}

/// Sequential catalog crawler
pub struct Crawler {
    client: Client,
    settings: Settings,
}

impl Crawler {
    pub fn new(settings: Settings) -> Result<Self> {
        let client = fetch::build_http_client(&settings)?;
        Ok(Self { client, settings })
    }

    /// Runs the full crawl against `store`, saving after each category and
    /// periodically during enrichment
    pub async fn run(&self, store: &mut CatalogStore) -> Result<CrawlSummary> {
        let mut summary = CrawlSummary::default();
        let base = Url::parse(&self.settings.start_url)?;

        tracing::info!("fetching category index: {}", base);
        let index_html = match fetch::fetch_text(&self.client, base.as_str()).await {
            Ok(html) => html,
            Err(e) if e.is_blocking() => return Err(blocked(base.as_str(), e)),
            Err(e) => return Err(e.into()),
        };

        let mut categories = extract_categories(&index_html, &base);
        if self.settings.max_categories > 0 {
            categories.truncate(self.settings.max_categories);
        }
        tracing::info!("walking {} categories", categories.len());

        'categories: for category in &categories {
            let listing_html = match fetch::fetch_text(&self.client, &category.url).await {
                Ok(html) => html,
                Err(e) => {
                    if e.is_blocking() {
                        store.save(&self.settings.output)?;
                        return Err(blocked(&category.url, e));
                    }
                    tracing::warn!("skipping category {}: {}", category.name, e);
                    summary.page_errors += 1;
                    continue;
                }
            };
            summary.categories += 1;

            let listing_base = Url::parse(&category.url)?;
            for entry in extract_listing(&listing_html, &listing_base) {
                // The limit counts books collected this run, not rows
                // already in the table.
                if self.settings.max_books > 0
                    && summary.discovered >= self.settings.max_books
                    && store.get(&entry.book_url).is_none()
                {
                    tracing::info!("book limit {} reached", self.settings.max_books);
                    store.save(&self.settings.output)?;
                    break 'categories;
                }

                let mut record = BookRecord::discovered(
                    &category.name,
                    &entry.author,
                    &entry.title,
                    &entry.book_url,
                );
                // A re-crawl must never regress a known record: the detail
                // page is the authoritative author/title source, so listing
                // text only fills fields that are still empty, and status
                // only moves forward.
                if let Some(existing) = store.get(&entry.book_url) {
                    if !existing.author.is_empty() {
                        record.author.clear();
                    }
                    if !existing.title.is_empty() {
                        record.title.clear();
                    }
                    record.status = existing.status;
                    record.filepath = existing.filepath.clone();
                    record.error = existing.error.clone();
                }
                if store.upsert(record) {
                    summary.discovered += 1;
                }
            }

            tracing::debug!("category {} done, {} books total", category.name, store.len());
            store.save(&self.settings.output)?;
        }

        self.enrich_details(store, &mut summary).await?;
        store.save(&self.settings.output)?;

        tracing::info!(
            "crawl finished: {} categories, {} new books, {} details, {} page errors",
            summary.categories,
            summary.discovered,
            summary.enriched,
            summary.page_errors
        );
        Ok(summary)
    }

    /// Visits the detail page of every record still lacking a download link
    /// or an author, and merges the enrichment back in
    async fn enrich_details(
        &self,
        store: &mut CatalogStore,
        summary: &mut CrawlSummary,
    ) -> Result<()> {
        let needs_detail: Vec<String> = store
            .records()
            .iter()
            .filter(|r| !r.status.is_terminal())
            .filter(|r| r.download_url.is_empty() || r.author.is_empty())
            .map(|r| r.book_url.clone())
            .collect();

        tracing::info!("enriching {} records from detail pages", needs_detail.len());
        for (fetched, book_url) in needs_detail.iter().enumerate() {
            match fetch::fetch_text(&self.client, book_url).await {
                Ok(html) => {
                    let detail_base = Url::parse(book_url)?;
                    let detail = extract_detail(&html, &detail_base);
                    if let Some(existing) = store.get(book_url) {
                        let mut incoming = existing.clone();
                        // The detail page is the authoritative author source.
                        if !detail.author.is_empty() {
                            incoming.author = detail.author;
                        }
                        // Keep the listing title unless it was empty or a
                        // bracketed placeholder.
                        if !detail.title.is_empty()
                            && (incoming.title.is_empty() || incoming.title.contains('【'))
                        {
                            incoming.title = detail.title;
                        }
                        if !detail.download_url.is_empty() {
                            incoming.download_url = detail.download_url;
                            incoming.download_name = detail.download_name;
                        }
                        store.upsert(incoming);
                        summary.enriched += 1;
                    }
                }
                Err(e) => {
                    if e.is_blocking() {
                        store.save(&self.settings.output)?;
                        return Err(blocked(book_url, e));
                    }
                    tracing::warn!("detail fetch failed for {}: {}", book_url, e);
                    summary.page_errors += 1;
                    if let Some(existing) = store.get(book_url) {
                        let mut incoming = existing.clone();
                        if !incoming.status.is_terminal() {
                            incoming.status = BookStatus::Error;
                            incoming.error = e.to_string();
                        }
                        store.upsert(incoming);
                    }
                }
            }

            if (fetched + 1) % DETAIL_SAVE_INTERVAL == 0 {
                store.save(&self.settings.output)?;
            }
        }

        Ok(())
    }
}

fn blocked(url: &str, error: FetchError) -> ShelfError {
    ShelfError::Blocked {
        url: url.to_string(),
        detail: error.to_string(),
    }
}

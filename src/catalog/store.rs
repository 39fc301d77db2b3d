//! CSV-backed catalog store
//!
//! The store is the single durable artifact of the whole system: the crawler
//! writes it, the downloader consumes it, and every state-changing step saves
//! it so an interrupted run loses at most the in-flight item.

use std::collections::HashMap;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use crate::catalog::{BookRecord, BookStatus};
use crate::Result;

/// Ordered, merge-upsert table of book records keyed by `book_url`
///
/// Records keep the order in which they were first discovered; re-crawling a
/// known book updates the existing row in place. Rows are never deleted.
#[derive(Debug, Default)]
pub struct CatalogStore {
    records: Vec<BookRecord>,
    index: HashMap<String, usize>,
}

impl CatalogStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a store from a CSV table, or returns an empty store when the
    /// file does not exist
    ///
    /// Rows are read leniently: missing columns load as empty fields and
    /// unknown status cells load as `pending`.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
        let mut store = Self::new();
        for row in reader.deserialize::<BookRecord>() {
            let record = row?;
            if record.book_url.is_empty() {
                continue;
            }
            store.upsert(record);
        }
        Ok(store)
    }

    /// Atomically rewrites the full table at `path`
    ///
    /// Writes to a sibling `.tmp` file and renames it over the target, so a
    /// crash mid-write never leaves a truncated table behind.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let tmp_path = tmp_sibling(path);
        {
            let mut writer = csv::Writer::from_path(&tmp_path)?;
            for record in &self.records {
                writer.serialize(record)?;
            }
            writer.flush()?;
        }
        fs::rename(&tmp_path, path)?;
        Ok(())
    }

    /// Inserts a new record or merges an incoming one over the existing row
    ///
    /// Merge rule: a non-empty incoming field overwrites, an empty incoming
    /// field leaves the existing value untouched, except `status`, `error`
    /// and `filepath`, which always take the incoming value. Returns true
    /// when the record was newly inserted.
    pub fn upsert(&mut self, incoming: BookRecord) -> bool {
        match self.index.get(&incoming.book_url) {
            Some(&pos) => {
                let existing = &mut self.records[pos];
                merge_field(&mut existing.category, incoming.category);
                merge_field(&mut existing.author, incoming.author);
                merge_field(&mut existing.title, incoming.title);
                merge_field(&mut existing.download_url, incoming.download_url);
                merge_field(&mut existing.download_name, incoming.download_name);
                existing.status = incoming.status;
                existing.filepath = incoming.filepath;
                existing.error = incoming.error;
                false
            }
            None => {
                self.index
                    .insert(incoming.book_url.clone(), self.records.len());
                self.records.push(incoming);
                true
            }
        }
    }

    /// Looks a record up by its `book_url`
    pub fn get(&self, book_url: &str) -> Option<&BookRecord> {
        self.index.get(book_url).map(|&pos| &self.records[pos])
    }

    /// All records in discovery order
    pub fn records(&self) -> &[BookRecord] {
        &self.records
    }

    /// `book_url`s of the records a downloader run should pick up, in store
    /// order: everything still `pending` plus `blocked`/`error` retries
    pub fn retryable_books(&self) -> Vec<String> {
        self.records
            .iter()
            .filter(|r| r.status.is_retryable())
            .map(|r| r.book_url.clone())
            .collect()
    }

    /// Number of records with the given status
    pub fn count_status(&self, status: BookStatus) -> usize {
        self.records.iter().filter(|r| r.status == status).count()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Overwrites `existing` only when the incoming value is non-empty
fn merge_field(existing: &mut String, incoming: String) {
    if !incoming.is_empty() {
        *existing = incoming;
    }
}

/// `<path>.tmp` in the same directory, so the final rename stays atomic
fn tmp_sibling(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}

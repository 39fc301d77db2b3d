//! Haodoo-Shelf: a patient catalog crawler and EPUB archiver
//!
//! This crate walks a catalog site's category → book → detail hierarchy,
//! persists the discovered books as a resumable CSV table, and then fetches
//! the linked EPUB files one at a time, rate-limited, into a structured
//! local directory layout.

pub mod catalog;
pub mod config;
pub mod crawler;
pub mod downloader;
pub mod extract;
pub mod fetch;
pub mod paths;

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for Haodoo-Shelf operations
#[derive(Debug, Error)]
pub enum ShelfError {
    #[error("catalog table not found: {}", .0.display())]
    CatalogMissing(PathBuf),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("fetch error: {0}")]
    Fetch(#[from] fetch::FetchError),

    #[error("blocked by server at {url}: {detail}")]
    Blocked { url: String, detail: String },

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Haodoo-Shelf operations
pub type Result<T> = std::result::Result<T, ShelfError>;

// Re-export commonly used types
pub use catalog::{BookRecord, BookStatus, CatalogStore};
pub use config::Settings;
pub use crawler::Crawler;
pub use downloader::Downloader;

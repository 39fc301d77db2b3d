//! Catalog store: the persisted table of book records
//!
//! Acts as both the crawl output and the download work queue. Supports
//! load, merge-upsert and atomic incremental save; single writer, no
//! locking, because the whole system is single-threaded.

mod record;
mod store;

pub use record::{BookRecord, BookStatus};
pub use store::CatalogStore;

//! Book record and status definitions
//!
//! One record per book, keyed by `book_url`. The field order here is the
//! persisted column order of the catalog table and must not change.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Download status of one book record
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum BookStatus {
    /// Discovered by the crawler, not yet attempted
    #[default]
    Pending,

    /// File downloaded and written to `filepath`
    Done,

    /// The site refused us (connection refusal or HTTP 403/429/503);
    /// the run halted here, eligible for retry on a later invocation
    Blocked,

    /// Transient fetch/write failure, eligible for retry on a later invocation
    Error,

    /// The detail page exposes no EPUB link (terminal)
    NoEpub,

    /// The detail page became unreachable after the listing succeeded (terminal)
    Missing,
}

impl BookStatus {
    /// Returns true if no downloader will ever touch this record again
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::NoEpub | Self::Missing)
    }

    /// Returns true if a downloader run should pick this record up
    ///
    /// `blocked` and `error` are terminal for the run that set them but are
    /// reselected by every later invocation; that retry loop is what makes
    /// interrupted runs resumable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Pending | Self::Blocked | Self::Error)
    }

    /// The string stored in the catalog table's `status` column
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Done => "done",
            Self::Blocked => "blocked",
            Self::Error => "error",
            Self::NoEpub => "no_epub",
            Self::Missing => "missing",
        }
    }

    /// Parses a status cell from the catalog table
    ///
    /// Empty and unrecognized cells load as `Pending` so tables written by
    /// older versions of the tool stay usable.
    pub fn parse(s: &str) -> Self {
        match s.trim() {
            "done" => Self::Done,
            "blocked" => Self::Blocked,
            "error" => Self::Error,
            "no_epub" => Self::NoEpub,
            "missing" => Self::Missing,
            _ => Self::Pending,
        }
    }
}

impl fmt::Display for BookStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Serialize for BookStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for BookStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Self::parse(&s))
    }
}

/// One row of the catalog table
///
/// Field order matches the persisted column order:
/// `category,author,title,book_url,download_url,download_name,status,filepath,error`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookRecord {
    #[serde(default)]
    pub category: String,

    /// May be empty until the detail page is visited
    #[serde(default)]
    pub author: String,

    #[serde(default)]
    pub title: String,

    /// Stable unique key of the record
    #[serde(default)]
    pub book_url: String,

    /// Empty until resolved from the detail page
    #[serde(default)]
    pub download_url: String,

    /// Site-provided filename for the download
    #[serde(default)]
    pub download_name: String,

    #[serde(default)]
    pub status: BookStatus,

    /// Local path once downloaded
    #[serde(default)]
    pub filepath: String,

    /// Last error message, cleared on success
    #[serde(default)]
    pub error: String,
}

impl BookRecord {
    /// Creates a freshly discovered record with download fields empty
    pub fn discovered(category: &str, author: &str, title: &str, book_url: &str) -> Self {
        Self {
            category: category.to_string(),
            author: author.to_string(),
            title: title.to_string(),
            book_url: book_url.to_string(),
            download_url: String::new(),
            download_name: String::new(),
            status: BookStatus::Pending,
            filepath: String::new(),
            error: String::new(),
        }
    }
}

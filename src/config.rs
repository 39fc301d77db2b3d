//! Run settings shared by the crawler and the downloader
//!
//! All configuration comes from the command line; there is no config file.
//! Defaults match the documented CLI surface.

use std::path::PathBuf;
use std::time::Duration;

/// Default category index URL
pub const DEFAULT_START_URL: &str = "https://www.haodoo.net/?M=hd";

/// Default catalog table path
pub const DEFAULT_OUTPUT: &str = "haodoo_books.csv";

/// Default download root (tilde expanded at startup)
pub const DEFAULT_DOWNLOAD_DIR: &str = "~/電子書";

/// Default seconds slept between downloads
pub const DEFAULT_SLEEP_SECS: f64 = 2.0;

/// Default per-request timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 20;

/// Default User-Agent, a plain desktop browser string
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
     AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/122.0.0.0 Safari/537.36";

/// Settings for one crawl/download invocation
#[derive(Debug, Clone)]
pub struct Settings {
    /// Category index URL the crawl starts from
    pub start_url: String,

    /// Path of the persisted catalog table
    pub output: PathBuf,

    /// Root directory downloads are placed under
    pub download_dir: PathBuf,

    /// Delay between consecutive download attempts
    pub sleep: Duration,

    /// Per-request timeout
    pub timeout: Duration,

    /// User-Agent header sent with every request
    pub user_agent: String,

    /// Maximum number of categories to walk (0 = unlimited)
    pub max_categories: usize,

    /// Maximum number of new books to collect per run (0 = unlimited)
    pub max_books: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            start_url: DEFAULT_START_URL.to_string(),
            output: PathBuf::from(DEFAULT_OUTPUT),
            download_dir: expand_tilde(DEFAULT_DOWNLOAD_DIR),
            sleep: Duration::from_secs_f64(DEFAULT_SLEEP_SECS),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            max_categories: 0,
            max_books: 0,
        }
    }
}

/// Expands a leading `~` or `~/` to the user's home directory
///
/// Paths without a leading tilde are returned unchanged. If no home
/// directory can be determined the tilde is kept literally.
pub fn expand_tilde(path: &str) -> PathBuf {
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    } else if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

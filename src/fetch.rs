//! HTTP fetching for catalog pages and EPUB files
//!
//! Thin wrapper over reqwest: build one client with the configured
//! User-Agent and timeout, fetch text or bytes, and classify failures so
//! callers can tell a site-side block from a transient error.

use reqwest::Client;
use thiserror::Error;

use crate::config::Settings;

/// HTTP statuses that signal the site is refusing us rather than failing
const BLOCKING_STATUSES: &[u16] = &[403, 429, 503];

/// A failed fetch, classified
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("connection refused for {url}")]
    ConnectionRefused { url: String },

    #[error("request timeout for {url}")]
    Timeout { url: String },

    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("request failed for {url}: {message}")]
    Transport { url: String, message: String },
}

impl FetchError {
    /// True when the failure means the site is blocking us and the whole
    /// run must halt: connection refusal or HTTP 403/429/503
    ///
    /// Timeouts are deliberately not in this set; they are transient and
    /// recorded per-record as `status=error`.
    pub fn is_blocking(&self) -> bool {
        match self {
            Self::ConnectionRefused { .. } => true,
            Self::Status { status, .. } => BLOCKING_STATUSES.contains(status),
            _ => false,
        }
    }
}

/// Builds the single HTTP client shared by a whole run
pub fn build_http_client(settings: &Settings) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(settings.user_agent.clone())
        .timeout(settings.timeout)
        .connect_timeout(settings.timeout)
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches a page body as text
pub async fn fetch_text(client: &Client, url: &str) -> Result<String, FetchError> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| classify(url, e))?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    response.text().await.map_err(|e| classify(url, e))
}

/// Fetches a file body as bytes
pub async fn fetch_bytes(client: &Client, url: &str) -> Result<Vec<u8>, FetchError> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| classify(url, e))?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    let bytes = response.bytes().await.map_err(|e| classify(url, e))?;
    Ok(bytes.to_vec())
}

fn classify(url: &str, error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else if error.is_connect() {
        FetchError::ConnectionRefused {
            url: url.to_string(),
        }
    } else {
        FetchError::Transport {
            url: url.to_string(),
            message: error.to_string(),
        }
    }
}

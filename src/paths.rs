//! Local filesystem layout for downloaded books
//!
//! Books land under `<download-root>/<category>/<author>/<author> - <title>.epub`,
//! with every component sanitized for the filesystem.

use std::path::{Path, PathBuf};

/// Characters that cannot appear in a path component
const INVALID: &[char] = &['\\', '/', ':', '*', '?', '"', '<', '>', '|'];

/// Makes a metadata field safe to use as a single path component
///
/// Invalid characters become underscores; trailing dots and spaces are
/// trimmed; an empty result falls back to the given placeholder.
pub fn safe_filename(name: &str, fallback: &str) -> String {
    let cleaned: String = name
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .map(|c| if INVALID.contains(&c) { '_' } else { c })
        .collect();
    let cleaned = cleaned.trim_matches(|c| c == '.' || c == ' ');
    if cleaned.is_empty() {
        fallback.to_string()
    } else {
        cleaned.to_string()
    }
}

/// Target path for one book: `<root>/<category>/<author>/<author> - <title>.epub`
pub fn target_path(root: &Path, category: &str, author: &str, title: &str) -> PathBuf {
    let category = safe_filename(category, "UnknownCategory");
    let author = safe_filename(author, "UnknownAuthor");
    let title = safe_filename(title, "UnknownTitle");
    root.join(category)
        .join(&author)
        .join(format!("{author} - {title}.epub"))
}

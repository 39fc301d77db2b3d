//! Metadata extraction from fetched catalog pages
//!
//! Three page shapes are understood: the category index, per-category book
//! listings, and per-book detail pages. Extraction never fails: malformed
//! documents simply yield fewer or emptier results, and absence of data is
//! the signal the callers act on.

mod text;

pub use text::{normalize_space, split_author_title};

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};
use url::Url;

/// Author and title next to the big in-page header, e.g.
/// `<font ...>金庸</font>《笑傲江湖》`
static FONT_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r">\s*([^<]+?)\s*</font>\s*《\s*([^》]+?)\s*》").expect("static regex"));

/// `SetTitle("…")` script argument, the page's own window title
static SET_TITLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"SetTitle\("([^"]+)"\)"#).expect("static regex"));

/// `author【title】` variant used inside `SetTitle`
static BRACKET_TITLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([^【]+)【([^】]+)】").expect("static regex"));

/// `author《title》` variant used inside `SetTitle`
static ANGLE_TITLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([^《]+)《([^》]+)》").expect("static regex"));

/// Vertical-layout EPUB download script (preferred)
static VEPUB_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"DownloadVEpub\('([^']+)'\)").expect("static regex"));

/// Plain EPUB download script (fallback)
static EPUB_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"DownloadEpub\('([^']+)'\)").expect("static regex"));

/// Anchor texts that are site navigation, not books
const NAV_TOKENS: &[&str] = &["下载", "下載", "回", "返回", "首页", "首頁", "分類", "榜"];

/// One category discovered on the start page (transient, not persisted)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    pub name: String,
    pub url: String,
}

/// One book discovered on a listing page (transient, not persisted)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEntry {
    pub book_url: String,
    /// May be empty; the detail page is the authoritative source
    pub author: String,
    pub title: String,
}

/// Enrichment extracted from a book's detail page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookDetail {
    pub author: String,
    pub title: String,
    /// Empty when the page exposes no EPUB at all
    pub download_url: String,
    pub download_name: String,
}

/// Extracts `(category_name, category_url)` pairs from the category index
///
/// Category links are same-host anchors whose query carries `M=hd` and a
/// `P` parameter; everything else on the page is navigation or books.
pub fn extract_categories(html: &str, base: &Url) -> Vec<Category> {
    let document = Html::parse_document(html);
    let mut categories = Vec::new();
    let mut seen = HashSet::new();

    if let Ok(selector) = Selector::parse("a[href]") {
        for element in document.select(&selector) {
            let name = normalize_space(&element.text().collect::<String>());
            if name.is_empty() {
                continue;
            }
            let href = match element.value().attr("href") {
                Some(h) => h,
                None => continue,
            };
            let resolved = match base.join(href) {
                Ok(u) => u,
                Err(_) => continue,
            };
            if !same_host(base, &resolved) {
                continue;
            }
            if query_param(&resolved, "M").as_deref() != Some("hd") {
                continue;
            }
            if query_param(&resolved, "P").is_none() {
                continue;
            }
            let url = resolved.to_string();
            if seen.insert((name.clone(), url.clone())) {
                categories.push(Category { name, url });
            }
        }
    }

    categories
}

/// Extracts book entries from a category listing page
///
/// Book links carry `M=book` or `M=Share` (case-insensitive). Navigation
/// anchors and entries whose text yields no title are skipped; the author
/// is left empty when the listing text does not name one.
pub fn extract_listing(html: &str, base: &Url) -> Vec<ListingEntry> {
    let document = Html::parse_document(html);
    let mut entries = Vec::new();
    let mut seen = HashSet::new();

    if let Ok(selector) = Selector::parse("a[href]") {
        for element in document.select(&selector) {
            let label = normalize_space(&element.text().collect::<String>());
            if label.is_empty() || NAV_TOKENS.iter().any(|t| label.contains(t)) {
                continue;
            }
            let href = match element.value().attr("href") {
                Some(h) => h,
                None => continue,
            };
            let resolved = match base.join(href) {
                Ok(u) => u,
                Err(_) => continue,
            };
            if resolved == *base || !same_host(base, &resolved) {
                continue;
            }
            let mode = query_param(&resolved, "M")
                .map(|m| m.to_lowercase())
                .unwrap_or_default();
            if mode != "book" && mode != "share" {
                continue;
            }

            let (author, title) = split_author_title(&label);
            if title.is_empty() {
                continue;
            }
            let book_url = resolved.to_string();
            if seen.insert((title.clone(), book_url.clone())) {
                entries.push(ListingEntry {
                    book_url,
                    author,
                    title,
                });
            }
        }
    }

    entries
}

/// Extracts author, title and the download link from a book's detail page
///
/// Author and title come from the in-page `…</font>《title》` marker, with
/// the `SetTitle("…")` script as fallback; these override listing values.
/// The download link prefers the vertical-layout EPUB (`DownloadVEpub`
/// script or a `直式 epub` anchor) and falls back to the plain EPUB; when
/// neither exists the `download_url` stays empty and the record eventually
/// lands in `no_epub`.
pub fn extract_detail(html: &str, base: &Url) -> BookDetail {
    let (author, title) = extract_author_title(html);
    let mut detail = BookDetail {
        author,
        title,
        ..BookDetail::default()
    };

    // The download scripts encode a PDB book code; the file lives under a
    // fixed /PDB/<initial>/<rest>.epub layout on the site itself.
    let code = VEPUB_CODE
        .captures(html)
        .or_else(|| EPUB_CODE.captures(html))
        .map(|caps| caps[1].to_string());
    if let Some(code) = code {
        let mut chars = code.chars();
        if let Some(initial) = chars.next() {
            let rest: String = chars.collect();
            if !rest.is_empty() {
                detail.download_url =
                    format!("https://www.haodoo.net/PDB/{initial}/{rest}.epub");
                detail.download_name = format!("{code}.epub");
                return detail;
            }
        }
    }

    if let Some(link) = find_epub_anchor(html, base) {
        detail.download_name = basename(&link);
        detail.download_url = link.to_string();
    }

    detail
}

fn extract_author_title(html: &str) -> (String, String) {
    if let Some(caps) = FONT_MARKER.captures(html) {
        return (normalize_space(&caps[1]), normalize_space(&caps[2]));
    }
    if let Some(caps) = SET_TITLE.captures(html) {
        let raw = normalize_space(&caps[1]);
        if let Some(caps) = BRACKET_TITLE.captures(&raw) {
            return (normalize_space(&caps[1]), normalize_space(&caps[2]));
        }
        if let Some(caps) = ANGLE_TITLE.captures(&raw) {
            return (normalize_space(&caps[1]), normalize_space(&caps[2]));
        }
    }
    (String::new(), String::new())
}

/// Scans anchors mentioning "epub"; a vertical-layout label wins outright,
/// otherwise the last plain epub anchor is used
fn find_epub_anchor(html: &str, base: &Url) -> Option<Url> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("a[href]").ok()?;

    let mut fallback = None;
    for element in document.select(&selector) {
        let href = match element.value().attr("href") {
            Some(h) => h.trim(),
            None => continue,
        };
        // Script-driven downloads are handled by the code regexes above.
        if href.starts_with("javascript:") {
            continue;
        }
        let label = normalize_space(&element.text().collect::<String>()).to_lowercase();
        if !label.contains("epub") && !href.to_lowercase().contains("epub") {
            continue;
        }
        if label.contains("直式") || label.contains("竖") || label.contains("vertical") {
            return base.join(href).ok();
        }
        fallback = Some(href.to_string());
    }

    fallback.and_then(|href| base.join(&href).ok())
}

/// Last path segment of a resolved link, used as the site-provided filename
fn basename(url: &Url) -> String {
    url.path_segments()
        .and_then(|segments| segments.last())
        .unwrap_or("")
        .to_string()
}

fn same_host(base: &Url, candidate: &Url) -> bool {
    match (base.host_str(), candidate.host_str()) {
        (Some(a), Some(b)) => strip_www(a) == strip_www(b),
        _ => false,
    }
}

fn strip_www(host: &str) -> &str {
    host.strip_prefix("www.").unwrap_or(host)
}

fn query_param(url: &Url, key: &str) -> Option<String> {
    url.query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

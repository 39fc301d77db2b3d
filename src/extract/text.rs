//! Text helpers for bibliographic fields

use std::sync::LazyLock;

use regex::Regex;

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("static regex"));

/// `author《title》` at the start of a string
static AUTHOR_TITLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([^《]+)《([^》]+)》").expect("static regex"));

/// Separators tried, in order, when the canonical `author《title》` marker
/// is absent from a listing entry
const SEPARATORS: &[&str] = &[" / ", "/", "｜", "|", " - ", "—", "－", "·", "\u{3000}"];

/// Collapses runs of whitespace to single spaces and trims
pub fn normalize_space(text: &str) -> String {
    WHITESPACE.replace_all(text, " ").trim().to_string()
}

/// Splits a listing entry's text into `(author, title)`
///
/// The canonical in-page marker `author《title》` wins; after that a list of
/// common separators is tried, then plain whitespace. When nothing splits,
/// the whole text is treated as the title and the author is left empty for
/// the detail page to fill in later.
pub fn split_author_title(text: &str) -> (String, String) {
    let text = normalize_space(text);
    if text.is_empty() {
        return (String::new(), String::new());
    }

    if let Some(caps) = AUTHOR_TITLE.captures(&text) {
        return (caps[1].trim().to_string(), caps[2].trim().to_string());
    }

    for sep in SEPARATORS {
        if text.contains(sep) {
            let parts: Vec<&str> = text
                .split(sep)
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .collect();
            if parts.len() >= 2 {
                return (parts[0].to_string(), parts[1..].join(" "));
            }
        }
    }

    let parts: Vec<&str> = text.split_whitespace().collect();
    if parts.len() >= 2 {
        return (parts[0].to_string(), parts[1..].join(" "));
    }

    (String::new(), text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_space() {
        assert_eq!(normalize_space("  金庸 \n 笑傲江湖  "), "金庸 笑傲江湖");
        assert_eq!(normalize_space(""), "");
    }

    #[test]
    fn test_split_canonical_marker() {
        assert_eq!(
            split_author_title("金庸《笑傲江湖》"),
            ("金庸".to_string(), "笑傲江湖".to_string())
        );
        assert_eq!(
            split_author_title(" 金庸 《 笑傲江湖 》(全)"),
            ("金庸".to_string(), "笑傲江湖".to_string())
        );
    }

    #[test]
    fn test_split_separator_fallbacks() {
        assert_eq!(
            split_author_title("金庸 / 笑傲江湖"),
            ("金庸".to_string(), "笑傲江湖".to_string())
        );
        assert_eq!(
            split_author_title("金庸｜笑傲江湖"),
            ("金庸".to_string(), "笑傲江湖".to_string())
        );
        assert_eq!(
            split_author_title("金庸 - 笑傲江湖"),
            ("金庸".to_string(), "笑傲江湖".to_string())
        );
    }

    #[test]
    fn test_split_whitespace_fallback() {
        assert_eq!(
            split_author_title("金庸 笑傲江湖"),
            ("金庸".to_string(), "笑傲江湖".to_string())
        );
    }

    #[test]
    fn test_split_title_only() {
        assert_eq!(
            split_author_title("笑傲江湖"),
            (String::new(), "笑傲江湖".to_string())
        );
        assert_eq!(split_author_title("   "), (String::new(), String::new()));
    }
}

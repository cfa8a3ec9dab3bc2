//! URL discovery in pasted chat text.
//!
//! Matching is deliberately loose: a scheme followed by any run of
//! non-whitespace. Trailing punctuation stays attached to the URL.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

static URL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"https?://\S+").expect("static URL regex"));

/// Rejections raised before any network work starts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("input is empty")]
    Empty,
    #[error("input contains no http(s) links")]
    NoLinks,
}

impl InputError {
    /// Warning shown to the user.
    pub fn user_message(&self) -> &'static str {
        "请粘贴包含链接的内容！"
    }
}

/// Every URL in `text`, in first-seen order, duplicates included.
pub fn extract_urls(text: &str) -> Vec<String> {
    URL_PATTERN
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Check that `text` is worth processing and return its URLs.
pub fn validate_input(text: &str) -> Result<Vec<String>, InputError> {
    if text.trim().is_empty() {
        return Err(InputError::Empty);
    }
    let urls = extract_urls(text);
    if urls.is_empty() {
        return Err(InputError::NoLinks);
    }
    Ok(urls)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_in_order() {
        let urls = extract_urls("See https://a.example/x and https://b.example/y");
        assert_eq!(urls, vec!["https://a.example/x", "https://b.example/y"]);
    }

    #[test]
    fn test_empty_input_yields_nothing() {
        assert!(extract_urls("").is_empty());
        assert!(extract_urls("no links here, only http talk").is_empty());
    }

    #[test]
    fn test_duplicates_are_kept() {
        let text = "https://a.example\nagain https://a.example";
        assert_eq!(extract_urls(text), vec!["https://a.example", "https://a.example"]);
    }

    #[test]
    fn test_trailing_punctuation_is_not_stripped() {
        let text = "【能源】https://a.example/nota, y también (http://b.example/p).";
        assert_eq!(
            extract_urls(text),
            vec!["https://a.example/nota,", "http://b.example/p)."]
        );
    }

    #[test]
    fn test_url_stops_at_any_whitespace() {
        let text = "https://a.example/1\thttps://b.example/2\u{3000}tail";
        // U+3000 (ideographic space) is whitespace for \S
        assert_eq!(extract_urls(text), vec!["https://a.example/1", "https://b.example/2"]);
    }

    #[test]
    fn test_other_schemes_ignored() {
        assert!(extract_urls("ftp://a.example mailto:x@y.z").is_empty());
        assert_eq!(extract_urls("xhttps://a.example"), vec!["https://a.example"]);
    }

    #[test]
    fn test_validate_input() {
        assert_eq!(validate_input("   \n"), Err(InputError::Empty));
        assert_eq!(validate_input("hola http"), Err(InputError::NoLinks));
        assert_eq!(
            validate_input("news: http://a.example"),
            Ok(vec!["http://a.example".to_string()])
        );
    }
}

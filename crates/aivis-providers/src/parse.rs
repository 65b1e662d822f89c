//! Prioritized field extraction for vendor response records.
//!
//! Each vendor returns the same logical data (answer text, citations, links)
//! under different and drifting field names. A [`FieldPolicy`] lists, per
//! logical field, the extraction functions to try in order; the first one
//! that yields a non-empty value wins. When no citation field is present,
//! citations are regex-extracted from the answer text, and `urls` default to
//! every URL found in the text.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::error::ProviderError;
use crate::request::ParsedAnswer;

static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<[^>]+>").expect("valid tags regex"));
static URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"https?://[^\s<>"'\)\]\}]+"#).expect("valid url regex")
});

pub type TextExtractor = fn(&Value) -> Option<String>;
pub type UrlExtractor = fn(&Value) -> Option<Vec<String>>;

/// Ordered extractors for one vendor's record shape.
#[derive(Debug, Clone, Copy)]
pub struct FieldPolicy {
    pub text: &'static [TextExtractor],
    pub citations: &'static [UrlExtractor],
    pub urls: &'static [UrlExtractor],
}

impl FieldPolicy {
    /// Applies the policy to one record.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Parse`] if no text extractor yields a
    /// non-empty answer.
    pub fn apply(&self, provider: &str, record: &Value) -> Result<ParsedAnswer, ProviderError> {
        let text = self
            .text
            .iter()
            .find_map(|extract| extract(record).filter(|t| !t.trim().is_empty()))
            .ok_or_else(|| ProviderError::parse(provider, "no answer text in response"))?;

        let citations = first_non_empty(self.citations, record)
            .unwrap_or_else(|| extract_urls(&text));
        let urls = first_non_empty(self.urls, record).unwrap_or_else(|| extract_urls(&text));

        Ok(ParsedAnswer {
            text,
            citations: dedupe(citations),
            urls: dedupe(urls),
        })
    }
}

fn first_non_empty(extractors: &[UrlExtractor], record: &Value) -> Option<Vec<String>> {
    extractors
        .iter()
        .find_map(|extract| extract(record).filter(|urls| !urls.is_empty()))
}

// ---------------------------------------------------------------------------
// Building blocks for vendor extractors
// ---------------------------------------------------------------------------

/// Non-empty string at a JSON pointer.
#[must_use]
pub fn string_at(record: &Value, pointer: &str) -> Option<String> {
    record
        .pointer(pointer)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
}

/// URLs from an array at a JSON pointer.
///
/// Items may be bare strings or objects carrying the URL at the JSON pointer
/// `field`.
#[must_use]
pub fn urls_in_array(record: &Value, pointer: &str, field: &str) -> Option<Vec<String>> {
    let items = record.pointer(pointer)?.as_array()?;
    let urls: Vec<String> = items
        .iter()
        .filter_map(|item| match item {
            Value::String(s) => Some(s.as_str()),
            Value::Object(_) => item.pointer(field).and_then(Value::as_str),
            _ => None,
        })
        .map(str::trim)
        .filter(|s| s.starts_with("http://") || s.starts_with("https://"))
        .map(str::to_owned)
        .collect();
    Some(urls)
}

/// Strip HTML tags and normalize whitespace.
#[must_use]
pub fn strip_tags(html: &str) -> String {
    TAG_RE
        .replace_all(html, " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Every `http(s)` URL in `text`, in order of first appearance, with trailing
/// sentence punctuation trimmed.
#[must_use]
pub fn extract_urls(text: &str) -> Vec<String> {
    dedupe(
        URL_RE
            .find_iter(text)
            .map(|m| m.as_str().trim_end_matches(['.', ',', ';', ':', '!', '?']).to_owned())
            .collect(),
    )
}

fn dedupe(urls: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    urls.into_iter().filter(|u| seen.insert(u.clone())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn text_field(r: &Value) -> Option<String> {
        string_at(r, "/text")
    }
    fn html_field(r: &Value) -> Option<String> {
        string_at(r, "/html").map(|h| strip_tags(&h))
    }
    fn cites(r: &Value) -> Option<Vec<String>> {
        urls_in_array(r, "/cites", "/url")
    }

    const POLICY: FieldPolicy = FieldPolicy {
        text: &[text_field, html_field],
        citations: &[cites],
        urls: &[],
    };

    #[test]
    fn first_non_empty_text_extractor_wins() {
        let record = json!({"text": "  ", "html": "<p>Hello <b>world</b></p>"});
        let parsed = POLICY.apply("p", &record).unwrap();
        assert_eq!(parsed.text, "Hello world");
    }

    #[test]
    fn missing_text_is_a_parse_error() {
        let err = POLICY.apply("p", &json!({"cites": []})).unwrap_err();
        assert!(matches!(err, ProviderError::Parse { .. }));
    }

    #[test]
    fn citations_fall_back_to_urls_in_text() {
        let record = json!({"text": "See https://a.example.com/x. Also (https://b.example.com)."});
        let parsed = POLICY.apply("p", &record).unwrap();
        assert_eq!(
            parsed.citations,
            vec!["https://a.example.com/x", "https://b.example.com"]
        );
        assert_eq!(parsed.urls, parsed.citations);
    }

    #[test]
    fn structured_citations_are_preferred_and_deduplicated() {
        let record = json!({
            "text": "Mentions https://ignored.example.com",
            "cites": [{"url": "https://x.com"}, "https://y.com", {"url": "https://x.com"}, {"title": "no url"}]
        });
        let parsed = POLICY.apply("p", &record).unwrap();
        assert_eq!(parsed.citations, vec!["https://x.com", "https://y.com"]);
        assert_eq!(parsed.urls, vec!["https://ignored.example.com"]);
    }

    #[test]
    fn strip_tags_collapses_whitespace() {
        assert_eq!(strip_tags("<div>\n  a <i>b</i>\n</div>c"), "a b c");
    }
}

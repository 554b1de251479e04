//! Text helpers shared by config, the HTTP client and task signatures.

use std::sync::OnceLock;

use regex::Regex;

/// Longest response body quoted in an error message
const EXCERPT_CHARS: usize = 180;

/// Trimmed value, or `None` when absent or blank.
pub fn non_empty_trimmed(value: Option<String>) -> Option<String> {
    let value = value?;
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Trim and collapse every run of internal whitespace into a single space.
pub fn collapse_whitespace(value: &str) -> String {
    static WHITESPACE: OnceLock<Regex> = OnceLock::new();
    let re = WHITESPACE.get_or_init(|| Regex::new(r"\s+").expect("Invalid regex"));
    re.replace_all(value.trim(), " ").into_owned()
}

pub fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

/// Leading part of a response body, for error messages.
pub fn error_excerpt(body: &str) -> String {
    body.trim().chars().take(EXCERPT_CHARS).collect()
}

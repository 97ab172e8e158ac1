//! Locate a JSON payload inside free-form agent text.

use serde_json::Value;
use std::sync::LazyLock;

use regex::Regex;

static FENCED_JSON: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```json\s*\n(.*?)```").expect("invalid fenced json regex")
});

/// Find the JSON object an agent returned in its text.
///
/// Fenced ```` ```json ```` blocks win over bare objects. Otherwise the first
/// balanced `{...}` that parses is used.
pub fn extract_json_payload(text: &str) -> Option<Value> {
    for cap in FENCED_JSON.captures_iter(text) {
        let body = cap[1].trim();
        if let Ok(value) = serde_json::from_str::<Value>(body)
            && value.is_object()
        {
            return Some(value);
        }
    }

    let mut search_from = 0;
    while let Some(offset) = text[search_from..].find('{') {
        let start = search_from + offset;
        if let Some(candidate) = balanced_object(&text[start..])
            && let Ok(value) = serde_json::from_str::<Value>(candidate)
        {
            return Some(value);
        }
        search_from = start + 1;
    }
    None
}

/// Brace-count to the end of the object starting at `text[0]`, skipping
/// braces that appear inside string literals.
fn balanced_object(text: &str) -> Option<&str> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, ch) in text.char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(&text[..i + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

//! Signal parsing from agent output.
//!
//! - `<progress>X%</progress>` or `<progress>X</progress>`
//! - `<blocker>description</blocker>` (may span lines)
//! - a non-empty string `blocker` field in the agent's JSON payload

use super::types::{AgentSignals, BlockerSignal, ProgressSignal};
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;
use tracing::debug;

static PROGRESS_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<progress>\s*(\d{1,3})%?\s*</progress>").unwrap());

static BLOCKER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<blocker>(.*?)</blocker>").unwrap());

/// Extract all tag signals from the given text.
pub fn extract_signals(text: &str) -> AgentSignals {
    let mut signals = AgentSignals::new();

    for cap in PROGRESS_REGEX.captures_iter(text) {
        if let Ok(percentage) = cap[1].parse::<u8>() {
            let clamped = percentage.min(100);
            debug!(percentage = clamped, "Progress signal");
            signals.progress.push(ProgressSignal::new(clamped));
        }
    }

    for cap in BLOCKER_REGEX.captures_iter(text) {
        let description = cap[1].trim();
        if !description.is_empty() {
            debug!(blocker = description, "Blocker signal");
            signals.blockers.push(BlockerSignal::new(description));
        }
    }

    signals
}

/// A blocker reported as a `blocker` field of the structured payload.
pub fn blocker_from_payload(payload: &Value) -> Option<String> {
    payload
        .get("blocker")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

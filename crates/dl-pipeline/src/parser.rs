//! Defensive parsing of model replies into a [`StrategyResult`].
//!
//! Replies often wrap the JSON object in prose or markdown fences. The parser
//! locates the object, reads `strategy` and `reason`, and falls back to the
//! sentinel result on anything it cannot use. It never returns an error.

use serde::Deserialize;
use serde_json::{Map, Value};

use dl_protocol::{SENTINEL_REASON, SENTINEL_STRATEGY, StrategyResult};

/// How the JSON object is located inside a reply.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanMode {
    /// First balanced top-level `{...}`, ignoring braces inside string literals.
    #[default]
    Balanced,
    /// Legacy scan: first `{` through last `}`. Over-captures when a reply
    /// contains more than one object.
    FirstLast,
}

/// Parse a raw reply into a strategy, substituting the sentinel on failure.
pub fn parse_strategy(raw: &str, mode: ScanMode) -> StrategyResult {
    let Some(slice) = extract_object(raw, mode) else {
        tracing::warn!(mode = ?mode, "no JSON object found in model reply");
        return StrategyResult::sentinel();
    };

    let map: Map<String, Value> = match serde_json::from_str(slice) {
        Ok(map) => map,
        Err(e) => {
            tracing::warn!(error = %e, mode = ?mode, "model reply is not a valid JSON object");
            return StrategyResult::sentinel();
        }
    };

    StrategyResult {
        strategy: field_text(&map, "strategy", SENTINEL_STRATEGY),
        reason: field_text(&map, "reason", SENTINEL_REASON),
    }
}

/// Locate the candidate JSON object slice within `text`.
pub fn extract_object(text: &str, mode: ScanMode) -> Option<&str> {
    match mode {
        ScanMode::Balanced => first_balanced_object(text),
        ScanMode::FirstLast => first_to_last_brace(text),
    }
}

fn first_to_last_brace(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}

fn first_balanced_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=start + offset]);
                }
            }
            _ => {}
        }
    }

    None
}

/// Read a field as display text; absent, null, or blank values fall back.
fn field_text(map: &Map<String, Value>, key: &str, fallback: &str) -> String {
    match map.get(key) {
        Some(Value::String(s)) if !s.trim().is_empty() => s.clone(),
        Some(Value::String(_)) | Some(Value::Null) | None => fallback.to_string(),
        Some(other) => other.to_string(),
    }
}

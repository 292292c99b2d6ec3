//! Tolerant JSON extraction from model output.
//!
//! Models wrap JSON in prose and code fences, add trailing braces, and emit
//! slightly malformed numbers. [`parse_tolerant`] extracts the JSON payload
//! and, if it does not decode, retries after a fixed sequence of textual
//! repairs. The repairs are best-effort text substitutions, not a grammar:
//! they can in principle touch string contents too.

use std::sync::OnceLock;

use regex::Regex;
use serde::de::DeserializeOwned;

use crate::error::ParseError;

/// Decode `T` from a model response, repairing common defects.
///
/// The object span is tried first; the array span only when the object span
/// does not decode.
pub fn parse_tolerant<T: DeserializeOwned>(response: &str) -> Result<T, ParseError> {
    let trimmed = response.trim();
    if trimmed.is_empty() {
        return Err(ParseError::Empty);
    }

    let candidates = json_candidates(trimmed);
    let mut first_error = None;
    for candidate in candidates {
        match decode_candidate::<T>(candidate) {
            Ok(value) => return Ok(value),
            Err(e) => {
                first_error.get_or_insert(e);
            }
        }
    }

    Err(first_error.map_or(ParseError::NoJson, |e| ParseError::Json(e.to_string())))
}

/// One candidate through the balance and repair passes.
fn decode_candidate<T: DeserializeOwned>(candidate: &str) -> Result<T, serde_json::Error> {
    let first_error = match serde_json::from_str::<T>(candidate) {
        Ok(value) => return Ok(value),
        Err(e) => e,
    };

    let balanced = extract_balanced(candidate);
    if balanced.len() != candidate.len() {
        if let Ok(value) = serde_json::from_str::<T>(balanced) {
            return Ok(value);
        }
    }

    let repaired = repair(candidate);
    if let Ok(value) = serde_json::from_str::<T>(&repaired) {
        return Ok(value);
    }

    serde_json::from_str::<T>(&repair(balanced)).map_err(|_| first_error)
}

/// Locate the JSON payload: the body of a fenced block if present, then the
/// span from the first `{` to the last `}`, else the span from the first `[`
/// to the last `]`.
pub fn extract_json(response: &str) -> Option<&str> {
    json_candidates(response).into_iter().next()
}

/// Object span, then array span when it differs.
fn json_candidates(response: &str) -> Vec<&str> {
    let text = fenced_body(response).unwrap_or(response);
    let mut candidates = Vec::with_capacity(2);
    for (open, close) in [('{', '}'), ('[', ']')] {
        if let Some(span) = span_between(text, open, close) {
            if !candidates.contains(&span) {
                candidates.push(span);
            }
        }
    }
    candidates
}

fn span_between(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    (end > start).then(|| &text[start..=end])
}

/// Body of the first ``` fenced block, skipping an optional language tag.
fn fenced_body(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let after = &text[start + 3..];
    let body_start = after.find('\n').map(|i| i + 1).unwrap_or(0);
    let end = after[body_start..].find("```")?;
    Some(after[body_start..body_start + end].trim())
}

/// Cut a JSON value at the point its opening bracket is balanced.
///
/// Handles trailing garbage such as extra closing braces:
/// `{"a": 1}}}` -> `{"a": 1}`.
fn extract_balanced(s: &str) -> &str {
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, ch) in s.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }

        match ch {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' | '[' if !in_string => depth += 1,
            '}' | ']' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return &s[..=i];
                }
            }
            _ => {}
        }
    }

    s
}

struct Repairs {
    double_dot: Regex,
    second_decimal: Regex,
    bare_fraction: Regex,
    trailing_comma: Regex,
}

fn repairs() -> &'static Repairs {
    static REPAIRS: OnceLock<Repairs> = OnceLock::new();
    REPAIRS.get_or_init(|| Repairs {
        double_dot: Regex::new(r"(\d)\.\.+(\d)").expect("valid regex"),
        second_decimal: Regex::new(r"(\d+\.\d+)(?:\.\d+)+").expect("valid regex"),
        bare_fraction: Regex::new(r"([:\[,]\s*)\.(\d)").expect("valid regex"),
        trailing_comma: Regex::new(r",(\s*[}\]])").expect("valid regex"),
    })
}

/// Apply the fixed repair sequence.
///
/// 1. `0..8` -> `0.8`
/// 2. `0.8.5` -> `0.8`
/// 3. `.8` -> `0.8` (after `:`, `[` or `,`)
/// 4. trailing commas before `}` / `]` removed
/// 5. smart quotes normalized to ASCII quotes
pub fn repair(json: &str) -> String {
    let r = repairs();
    let text = r.double_dot.replace_all(json, "$1.$2");
    let text = r.second_decimal.replace_all(&text, "$1");
    let text = r.bare_fraction.replace_all(&text, "${1}0.$2");
    let text = r.trailing_comma.replace_all(&text, "$1");
    text.replace(['\u{201C}', '\u{201D}', '\u{201E}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'")
}

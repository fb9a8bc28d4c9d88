//! Structured Response Extractor: recovers one typed record from a free-form model reply.
//!
//! Two strategies:
//! - [`ExtractionStrategy::Outermost`] (default): slice from the first `{` to the last `}`
//!   and parse that span. A reply containing two separate objects yields a span that
//!   swallows the prose between them; it almost never parses and is reported as
//!   `Invalid`. This behaviour is pinned by tests.
//! - [`ExtractionStrategy::Balanced`]: strip markdown fences, try the whole reply as JSON,
//!   otherwise scan for balanced top-level objects and accept exactly one. Several
//!   top-level objects are rejected, never merged.
//!
//! Extraction is a pure function of the reply text.

use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

/// A typed record the model is asked to produce.
///
/// Deserialization enforces presence and type of fields (and enumerated labels);
/// `validate` enforces numeric ranges.
pub trait StructuredRecord: DeserializeOwned {
    fn validate(&self) -> Result<(), String>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExtractionStrategy {
    #[default]
    Outermost,
    Balanced,
}

impl FromStr for ExtractionStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "outermost" => Ok(Self::Outermost),
            "balanced" => Ok(Self::Balanced),
            other => Err(format!(
                "unknown extraction strategy '{other}' (expected 'outermost' or 'balanced')"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    /// No structured span could be located in the reply.
    #[error("no JSON object found in reply: {0}")]
    Malformed(String),

    /// A span was found but it is not a valid record.
    #[error("reply does not match the expected record: {0}")]
    Invalid(String),
}

/// Extracts and validates a `T` from `reply`.
pub fn extract_record<T: StructuredRecord>(
    reply: &str,
    strategy: ExtractionStrategy,
) -> Result<T, ExtractError> {
    let value = locate_object(reply, strategy)?;

    if !value.is_object() {
        return Err(ExtractError::Invalid("expected a JSON object".to_string()));
    }

    let record: T =
        serde_json::from_value(value).map_err(|e| ExtractError::Invalid(e.to_string()))?;
    record.validate().map_err(ExtractError::Invalid)?;
    Ok(record)
}

/// Finds the structured span in `reply` and parses it as JSON.
pub fn locate_object(reply: &str, strategy: ExtractionStrategy) -> Result<Value, ExtractError> {
    match strategy {
        ExtractionStrategy::Outermost => {
            let span = outermost_span(reply).ok_or_else(|| {
                ExtractError::Malformed(format!("no brace-delimited span in: {}", preview(reply)))
            })?;
            serde_json::from_str(span)
                .map_err(|e| ExtractError::Invalid(format!("span is not valid JSON: {e}")))
        }
        ExtractionStrategy::Balanced => locate_balanced(reply),
    }
}

/// First `{` through last `}`, inclusive.
fn outermost_span(reply: &str) -> Option<&str> {
    let start = reply.find('{')?;
    let end = reply.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&reply[start..=end])
}

fn locate_balanced(reply: &str) -> Result<Value, ExtractError> {
    let text = fenced_body(reply);

    if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(text) {
        return Ok(value);
    }

    let spans = balanced_objects(text);
    if spans.is_empty() {
        return Err(ExtractError::Malformed(format!(
            "no complete JSON object in: {}",
            preview(reply)
        )));
    }

    let mut objects = Vec::new();
    let mut first_error = None;
    for span in spans {
        match serde_json::from_str::<Value>(span) {
            Ok(value) => objects.push(value),
            Err(e) => {
                first_error.get_or_insert(e);
            }
        }
    }

    match objects.len() {
        1 => Ok(objects.remove(0)),
        0 => Err(ExtractError::Invalid(format!(
            "object span is not valid JSON: {}",
            first_error.map(|e| e.to_string()).unwrap_or_default()
        ))),
        n => Err(ExtractError::Invalid(format!(
            "reply contains {n} top-level JSON objects; expected exactly one"
        ))),
    }
}

/// Returns every balanced top-level `{...}` span. Braces inside JSON strings are ignored;
/// quotes outside an object are treated as prose.
fn balanced_objects(text: &str) -> Vec<&str> {
    let mut spans = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, b) in text.bytes().enumerate() {
        if depth == 0 {
            if b == b'{' {
                depth = 1;
                start = i;
            }
            continue;
        }

        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }

        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    spans.push(&text[start..=i]);
                }
            }
            _ => {}
        }
    }

    spans
}

/// Body of the first ``` fenced block, with any language tag on the opening line
/// dropped. The fence may sit anywhere in the reply. Replies without a fence come
/// back trimmed.
fn fenced_body(reply: &str) -> &str {
    let Some(open) = reply.find("```") else {
        return reply.trim();
    };
    let after = &reply[open + 3..];
    let body = match after.find('\n') {
        Some(nl) if after[..nl].trim().chars().all(|c| c.is_ascii_alphanumeric()) => {
            &after[nl + 1..]
        }
        _ => after,
    };
    match body.find("```") {
        Some(close) => body[..close].trim(),
        None => body.trim(),
    }
}

/// Checks `value` lies in `[min, max]`.
pub fn check_range(field: &str, value: f64, min: f64, max: f64) -> Result<(), String> {
    if value.is_finite() && (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(format!("{field} = {value} is outside [{min}, {max}]"))
    }
}

fn preview(reply: &str) -> String {
    const MAX_CHARS: usize = 80;
    let trimmed = reply.trim();
    if trimmed.is_empty() {
        return "<empty reply>".to_string();
    }
    let mut out: String = trimmed.chars().take(MAX_CHARS).collect();
    if trimmed.chars().count() > MAX_CHARS {
        out.push('…');
    }
    format!("{out:?}")
}

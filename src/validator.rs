//! Payload validation against the closed vocabulary
//!
//! Never fails. A malformed payload becomes an empty one, an unknown
//! vocabulary value is dropped on its own without touching its neighbours.

use std::collections::BTreeSet;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::vocabulary::{Phase, Tag};

/// Candidate data extracted from one completion
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedPayload {
    pub phase: Option<Phase>,
    pub tags: Option<BTreeSet<Tag>>,
    pub location: Option<String>,
    pub note: Option<String>,
    pub summary: Option<String>,
}

impl ExtractedPayload {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// How the payload text was handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadOutcome {
    /// No payload segment in the completion
    Absent,
    /// Payload was not a JSON object; nothing extracted
    Malformed,
    Parsed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validation {
    pub payload: ExtractedPayload,
    pub outcome: PayloadOutcome,
}

/// Parse and coerce a payload segment
pub fn validate(payload_text: Option<&str>) -> Validation {
    let Some(text) = payload_text else {
        return Validation {
            payload: ExtractedPayload::default(),
            outcome: PayloadOutcome::Absent,
        };
    };

    let object = match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(object)) => object,
        Ok(other) => {
            warn!(kind = json_kind(&other), "Payload is not a JSON object, ignoring");
            return malformed();
        }
        Err(e) => {
            warn!(error = %e, "Payload is not valid JSON, ignoring");
            return malformed();
        }
    };

    Validation {
        payload: ExtractedPayload {
            phase: coerce_phase(&object),
            tags: coerce_tags(&object),
            location: text_field(&object, &["location", "airport"]),
            note: text_field(&object, &["note", "feedback"]),
            summary: text_field(&object, &["summary", "memo_summary"]),
        },
        outcome: PayloadOutcome::Parsed,
    }
}

fn malformed() -> Validation {
    Validation {
        payload: ExtractedPayload::default(),
        outcome: PayloadOutcome::Malformed,
    }
}

fn coerce_phase(object: &Map<String, Value>) -> Option<Phase> {
    let raw = object.get("phase")?.as_str()?;
    match raw.parse() {
        Ok(phase) => Some(phase),
        Err(e) => {
            debug!(error = %e, "Dropping phase");
            None
        }
    }
}

/// An explicit empty list clears the tags; a list of nothing but unknown
/// codes is treated as no assessment at all.
fn coerce_tags(object: &Map<String, Value>) -> Option<BTreeSet<Tag>> {
    let values = match object.get("tags")? {
        Value::Array(values) => values,
        other => {
            debug!(kind = json_kind(other), "Dropping non-list tags");
            return None;
        }
    };

    let mut tags = BTreeSet::new();
    for value in values {
        match value.as_str().map(str::parse::<Tag>) {
            Some(Ok(tag)) => {
                tags.insert(tag);
            }
            Some(Err(e)) => debug!(error = %e, "Dropping tag"),
            None => debug!(kind = json_kind(value), "Dropping non-string tag"),
        }
    }

    if tags.is_empty() && !values.is_empty() {
        return None;
    }
    Some(tags)
}

/// First non-empty string among the given keys
fn text_field(object: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| object.get(*key).and_then(Value::as_str))
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(String::from)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

//! Reply/payload splitting
//!
//! A completion is `reply ||JSON_START|| payload`. Anything that does not
//! follow that shape is treated as a plain conversational reply.

use crate::prompt::PAYLOAD_DELIMITER;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitResponse {
    pub reply: String,
    pub payload: Option<String>,
}

/// Split on the first delimiter; total for any input
pub fn split(raw: &str) -> SplitResponse {
    match raw.split_once(PAYLOAD_DELIMITER) {
        Some((reply, payload)) => {
            let payload = strip_code_fence(payload.trim());
            SplitResponse {
                reply: reply.trim().to_string(),
                payload: (!payload.is_empty()).then(|| payload.to_string()),
            }
        }
        None => SplitResponse {
            reply: raw.trim().to_string(),
            payload: None,
        },
    }
}

/// Remove a surrounding ```json ... ``` fence, if any
fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop the info string ("json", "JSON", ...) on the opening line
    let body = match rest.find('\n') {
        Some(newline) if rest[..newline].trim().chars().all(|c| c.is_ascii_alphanumeric()) => {
            &rest[newline + 1..]
        }
        _ => rest.trim_start_matches(|c: char| c.is_ascii_alphabetic()),
    };
    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim()
}

//! Prompt construction for one debrief turn
//!
//! The prompt carries the closed vocabulary, the running summary and the
//! dual-segment output contract the splitter relies on.

use crate::vocabulary::{enumerate, Phase, Tag};

/// Separates the conversational reply from the JSON payload
pub const PAYLOAD_DELIMITER: &str = "||JSON_START||";

/// Build the complete prompt text for one turn
pub fn build(current_summary: &str, utterance: &str) -> String {
    let summary = if current_summary.trim().is_empty() {
        "(none yet)"
    } else {
        current_summary.trim()
    };

    format!(
        r#"ROLE: You are a veteran flight instructor debriefing a pilot.
TASK: Reply briefly to the pilot, then extract the facts of their report as JSON.

CURRENT SUMMARY:
{summary}

NEW REPORT:
{utterance}

OUTPUT FORMAT:
1. A short conversational reply in plain text.
2. The exact token {delimiter} on its own.
3. A single JSON object and nothing after it.

JSON SCHEMA:
{{
  "phase": one of [{phases}],
  "tags": zero or more of [{tags}],
  "location": airport code or place name,
  "note": one sentence of instructor feedback,
  "summary": bullet list of every fact reported so far
}}

RULES:
- Use ONLY the phase and tag values listed above, spelled exactly as shown.
- "tags" is your complete current assessment for the whole report.
- "summary" MUST keep every fact from CURRENT SUMMARY and add the new ones. Never drop earlier facts.
- Omit any field you have no information for."#,
        summary = summary,
        utterance = utterance.trim(),
        delimiter = PAYLOAD_DELIMITER,
        phases = enumerate(Phase::ALL),
        tags = enumerate(Tag::ALL),
    )
}

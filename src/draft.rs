//! Draft record and merge rules

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::validator::ExtractedPayload;
use crate::vocabulary::{Phase, Tag};

/// The in-progress, not yet committed debrief record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftRecord {
    pub phase: Phase,
    pub tags: BTreeSet<Tag>,
    pub location: String,
    pub note: String,
    pub summary: String,
}

/// How extracted tags combine with the draft's existing tags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagMergePolicy {
    /// Latest full assessment wins, so stale tags can be retracted
    #[default]
    Replace,
    /// Tags only ever accumulate
    Union,
}

impl FromStr for TagMergePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "replace" => Ok(TagMergePolicy::Replace),
            "union" => Ok(TagMergePolicy::Union),
            other => Err(format!(
                "Unknown tag policy '{}'. Valid values: replace, union",
                other
            )),
        }
    }
}

impl fmt::Display for TagMergePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagMergePolicy::Replace => f.write_str("replace"),
            TagMergePolicy::Union => f.write_str("union"),
        }
    }
}

/// Fold a validated payload into the draft
///
/// Absent fields leave the draft alone; present ones overwrite. The summary
/// is overwritten too: the backend saw the previous summary and is expected
/// to return the accumulated text.
pub fn merge(current: &DraftRecord, payload: &ExtractedPayload, policy: TagMergePolicy) -> DraftRecord {
    let mut next = current.clone();

    if let Some(phase) = payload.phase {
        next.phase = phase;
    }

    if let Some(tags) = &payload.tags {
        match policy {
            TagMergePolicy::Replace => next.tags = tags.clone(),
            TagMergePolicy::Union => next.tags.extend(tags.iter().copied()),
        }
    }

    overwrite_if_present(&mut next.location, &payload.location);
    overwrite_if_present(&mut next.note, &payload.note);
    overwrite_if_present(&mut next.summary, &payload.summary);

    next
}

fn overwrite_if_present(field: &mut String, value: &Option<String>) {
    if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
        *field = value.to_string();
    }
}

impl DraftRecord {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Tags as `"FA, SA"` in vocabulary order
    pub fn tags_display(&self) -> String {
        self.tags
            .iter()
            .map(Tag::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

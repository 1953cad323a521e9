//! Logbook persistence, archive search and statistics
//!
//! Entries keep the flight sheet column names
//! (`Date`, `Phase`, `Memo`, `Tags`, `AI_Feedback`, `Airport`), with tags
//! stored as one comma-separated cell.

use std::cmp::Reverse;
use std::collections::BTreeSet;
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::draft::DraftRecord;
use crate::error::{LogbookError, LogbookResult};
use crate::vocabulary::{Phase, Tag};

/// A committed debrief record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogbookEntry {
    #[serde(rename = "Date")]
    pub date: NaiveDate,
    #[serde(rename = "Phase")]
    pub phase: Phase,
    #[serde(rename = "Memo", default)]
    pub summary: String,
    #[serde(rename = "Tags", with = "tag_cell", default)]
    pub tags: BTreeSet<Tag>,
    #[serde(rename = "AI_Feedback", default)]
    pub note: String,
    #[serde(rename = "Airport", default)]
    pub location: String,
}

impl LogbookEntry {
    pub fn from_draft(date: NaiveDate, draft: &DraftRecord) -> Self {
        Self {
            date,
            phase: draft.phase,
            summary: draft.summary.clone(),
            tags: draft.tags.clone(),
            note: draft.note.clone(),
            location: draft.location.clone(),
        }
    }

    /// One-line heading: `2026-03-14 | Landing @ HND`
    pub fn title(&self) -> String {
        format!("{} | {} @ {}", self.date, self.phase, self.location)
    }

    pub fn tags_display(&self) -> String {
        join_tags(&self.tags)
    }
}

fn join_tags(tags: &BTreeSet<Tag>) -> String {
    tags.iter().map(Tag::as_str).collect::<Vec<_>>().join(", ")
}

/// Tags as a single `"SA, CO"` cell; unknown codes are dropped on read
mod tag_cell {
    use std::collections::BTreeSet;

    use serde::{Deserialize, Deserializer, Serializer};

    use crate::vocabulary::Tag;

    pub fn serialize<S: Serializer>(tags: &BTreeSet<Tag>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::join_tags(tags))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BTreeSet<Tag>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(raw
            .split(',')
            .filter_map(|code| code.trim().parse().ok())
            .collect())
    }
}

/// Storage for committed entries
pub trait LogbookStore {
    /// All entries, in the order they were appended
    fn read(&self) -> LogbookResult<Vec<LogbookEntry>>;

    fn append(&self, entries: &[LogbookEntry]) -> LogbookResult<()>;
}

/// Append-only JSON-lines file
#[derive(Debug, Clone)]
pub struct JsonlLogbook {
    path: PathBuf,
}

impl JsonlLogbook {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LogbookStore for JsonlLogbook {
    fn read(&self) -> LogbookResult<Vec<LogbookEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let reader = io::BufReader::new(fs::File::open(&self.path)?);
        let mut entries = Vec::new();
        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let entry = serde_json::from_str(&line).map_err(|e| LogbookError::Corrupt {
                line: index + 1,
                message: e.to_string(),
            })?;
            entries.push(entry);
        }
        debug!(count = entries.len(), path = %self.path.display(), "Logbook loaded");
        Ok(entries)
    }

    fn append(&self, entries: &[LogbookEntry]) -> LogbookResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        for entry in entries {
            let mut line = serde_json::to_string(entry)?;
            line.push('\n');
            file.write_all(line.as_bytes())?;
        }
        info!(count = entries.len(), path = %self.path.display(), "Logbook entries appended");
        Ok(())
    }
}

/// Entries whose memo or tags contain `query` (case-insensitive), newest first
pub fn search<'a>(entries: &'a [LogbookEntry], query: &str) -> Vec<&'a LogbookEntry> {
    let needle = query.trim().to_lowercase();
    let mut hits: Vec<&LogbookEntry> = entries
        .iter()
        .filter(|e| {
            needle.is_empty()
                || e.summary.to_lowercase().contains(&needle)
                || e.tags_display().to_lowercase().contains(&needle)
        })
        .collect();
    hits.sort_by_key(|e| Reverse(e.date));
    hits
}

/// The `n` newest entries
pub fn recent(entries: &[LogbookEntry], n: usize) -> Vec<&LogbookEntry> {
    let mut all = search(entries, "");
    all.truncate(n);
    all
}

/// Dashboard figures over the whole logbook
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogbookStats {
    pub total_entries: usize,
    /// Location of the most recently appended entry
    pub last_location: Option<String>,
    /// Most frequent tag; ties go to the alphabetically smallest code
    pub top_tag: Option<Tag>,
    /// Count per tag, in vocabulary order
    pub tag_counts: Vec<(Tag, usize)>,
}

impl LogbookStats {
    pub fn from_entries(entries: &[LogbookEntry]) -> Self {
        let tag_counts: Vec<(Tag, usize)> = Tag::ALL
            .iter()
            .map(|tag| (*tag, entries.iter().filter(|e| e.tags.contains(tag)).count()))
            .collect();

        let top_tag = tag_counts
            .iter()
            .filter(|(_, count)| *count > 0)
            .max_by(|(a, a_count), (b, b_count)| {
                a_count.cmp(b_count).then_with(|| b.as_str().cmp(a.as_str()))
            })
            .map(|(tag, _)| *tag);

        Self {
            total_entries: entries.len(),
            last_location: entries
                .last()
                .map(|e| e.location.clone())
                .filter(|l| !l.is_empty()),
            top_tag,
            tag_counts,
        }
    }
}

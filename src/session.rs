//! Conversation session: one transcript, one live draft
//!
//! # Turn flow
//!
//! ```text
//! Idle → Sending → Splitting → Validating → Merging → Idle
//!          │
//!          └─ BackendUnavailable → Idle (no reply, draft untouched)
//! ```
//!
//! The draft is only written once a completion has been validated, so a
//! turn that fails or is dropped mid-flight never leaves a partial update.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::client::CompletionClient;
use crate::draft::{self, DraftRecord, TagMergePolicy};
use crate::error::{TurnError, TurnResult};
use crate::logbook::LogbookEntry;
use crate::prompt;
use crate::splitter;
use crate::validator::{self, PayloadOutcome};

pub const GREETING: &str = "SYSTEM READY. Awaiting Pilot Report...";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    pub at: DateTime<Utc>,
}

impl ChatMessage {
    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            at: Utc::now(),
        }
    }
}

/// Where the current turn is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnStage {
    Idle,
    Sending,
    Splitting,
    Validating,
    Merging,
}

/// What a successful turn extracted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnStatus {
    /// Payload parsed and merged (possibly with dropped values)
    Extracted,
    /// Completion had no payload segment
    ReplyOnly,
    /// Payload segment was unparseable and ignored
    MalformedPayload,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnOutcome {
    pub reply: String,
    pub draft: DraftRecord,
    pub status: TurnStatus,
    /// Model that produced the completion
    pub model: String,
}

#[derive(Debug, Clone)]
pub struct ConversationSession {
    id: Uuid,
    messages: Vec<ChatMessage>,
    draft: DraftRecord,
    tag_policy: TagMergePolicy,
    stage: TurnStage,
}

impl Default for ConversationSession {
    fn default() -> Self {
        Self::new(TagMergePolicy::default())
    }
}

impl ConversationSession {
    pub fn new(tag_policy: TagMergePolicy) -> Self {
        Self {
            id: Uuid::new_v4(),
            messages: vec![ChatMessage::new(Role::Assistant, GREETING)],
            draft: DraftRecord::default(),
            tag_policy,
            stage: TurnStage::Idle,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn draft(&self) -> &DraftRecord {
        &self.draft
    }

    /// Stage of the current or last turn
    ///
    /// If a turn future is dropped mid-flight this keeps reporting the stage
    /// it was dropped in (usually `Sending`) until the next `handle_turn` or
    /// `reset`. The draft is never touched by such a turn.
    pub fn stage(&self) -> TurnStage {
        self.stage
    }

    pub fn tag_policy(&self) -> TagMergePolicy {
        self.tag_policy
    }

    /// Run one utterance through the extraction pipeline
    #[instrument(skip(self, client, utterance), fields(session_id = %self.id))]
    pub async fn handle_turn(
        &mut self,
        client: &CompletionClient,
        utterance: &str,
    ) -> TurnResult<TurnOutcome> {
        if self.stage != TurnStage::Idle {
            warn!(stage = ?self.stage, "Previous turn was abandoned mid-flight");
            self.stage = TurnStage::Idle;
        }

        let utterance = utterance.trim();
        if utterance.is_empty() {
            return Err(TurnError::EmptyUtterance);
        }

        self.messages.push(ChatMessage::new(Role::User, utterance));
        let prompt = prompt::build(&self.draft.summary, utterance);

        self.stage = TurnStage::Sending;
        let raw = match client.send(&prompt).await {
            Ok(raw) => raw,
            Err(e) => {
                self.stage = TurnStage::Idle;
                error!(error = %e, "Turn failed");
                return Err(e);
            }
        };

        self.stage = TurnStage::Splitting;
        let split = splitter::split(&raw.text);

        self.stage = TurnStage::Validating;
        let validation = validator::validate(split.payload.as_deref());
        let status = match validation.outcome {
            PayloadOutcome::Parsed => TurnStatus::Extracted,
            PayloadOutcome::Absent => TurnStatus::ReplyOnly,
            PayloadOutcome::Malformed => TurnStatus::MalformedPayload,
        };

        self.stage = TurnStage::Merging;
        self.draft = draft::merge(&self.draft, &validation.payload, self.tag_policy);
        debug!(draft = ?self.draft, "Draft updated");

        self.messages
            .push(ChatMessage::new(Role::Assistant, split.reply.clone()));
        self.stage = TurnStage::Idle;

        info!(status = ?status, model = %raw.model, "Turn complete");

        Ok(TurnOutcome {
            reply: split.reply,
            draft: self.draft.clone(),
            status,
            model: raw.model,
        })
    }

    /// Discard the transcript and the draft
    pub fn reset(&mut self) {
        info!(session_id = %self.id, "Session reset");
        self.messages = vec![ChatMessage::new(Role::Assistant, GREETING)];
        self.draft = DraftRecord::default();
        self.stage = TurnStage::Idle;
    }

    /// Turn the draft into a logbook entry and start over
    pub fn commit(&mut self, date: NaiveDate) -> LogbookEntry {
        let entry = LogbookEntry::from_draft(date, &self.draft);
        self.reset();
        entry
    }
}

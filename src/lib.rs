//! Cockpit Logbook - conversational flight debrief extraction
//!
//! A pilot narrates what happened; each turn is sent to a generative
//! backend that answers conversationally and appends a JSON payload.
//! The payload is validated against a closed vocabulary and merged into a
//! draft record that is eventually committed to the logbook.
//!
//! ## Turn pipeline
//!
//! ```text
//! Utterance → prompt::build → CompletionClient::send → splitter::split
//!           → validator::validate → draft::merge → TurnOutcome
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use cockpit_logbook::{CompletionClient, ConversationSession, GeminiBackend, LogbookConfig};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = LogbookConfig::from_env()?;
//! config.validate()?;
//! let backend = Arc::new(GeminiBackend::from_config(&config)?);
//! let client = CompletionClient::from_config(backend, &config)?;
//!
//! let mut session = ConversationSession::new(config.tag_policy);
//! let outcome = session.handle_turn(&client, "Crosswind landing at HND, floated long").await?;
//! println!("{}", outcome.reply);
//! # Ok(())
//! # }
//! ```

// Core error handling
pub mod error;

// Configuration
pub mod config;

// Closed vocabulary
pub mod vocabulary;

// Extraction pipeline
pub mod backend;
pub mod client;
pub mod draft;
pub mod prompt;
pub mod session;
pub mod splitter;
pub mod validator;

// Committed entries
pub mod logbook;

pub use backend::{CompletionBackend, CompletionRequest, GeminiBackend, ModelEndpoint};
pub use client::{CompletionClient, RawCompletion, RetryPolicy};
pub use config::LogbookConfig;
pub use draft::{merge, DraftRecord, TagMergePolicy};
pub use error::{AttemptError, ConfigError, LogbookError, TurnError};
pub use logbook::{JsonlLogbook, LogbookEntry, LogbookStats, LogbookStore};
pub use session::{ConversationSession, TurnOutcome, TurnStage, TurnStatus};
pub use splitter::{split, SplitResponse};
pub use validator::{validate, ExtractedPayload, PayloadOutcome};
pub use vocabulary::{Phase, Tag};

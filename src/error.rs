//! Error types for the logbook pipeline
//!
//! Every failure here is scoped to a single turn or a single store call.
//! Payload and vocabulary problems never show up as errors: the validator
//! downgrades them to an empty or partial payload.

use std::time::Duration;

use thiserror::Error;

/// Failure of one attempt against one model endpoint
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AttemptError {
    /// Transient overload; worth retrying on the same endpoint
    #[error("Endpoint busy (HTTP {status})")]
    Busy { status: u16 },

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl AttemptError {
    /// Whether the same endpoint should be tried again
    pub fn is_transient(&self) -> bool {
        matches!(self, AttemptError::Busy { .. })
    }
}

/// Failure of a whole conversational turn
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TurnError {
    /// Every endpoint and every retry was used up
    #[error("Backend unavailable after trying {endpoints_tried} endpoint(s): {last_error}")]
    BackendUnavailable {
        endpoints_tried: usize,
        last_error: AttemptError,
    },

    #[error("Utterance is empty")]
    EmptyUtterance,
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("GEMINI_API_KEY is not set")]
    MissingApiKey,

    #[error("At least one model endpoint must be configured")]
    NoEndpoints,

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Logbook persistence errors
#[derive(Error, Debug)]
pub enum LogbookError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Corrupt logbook line {line}: {message}")]
    Corrupt { line: usize, message: String },
}

pub type TurnResult<T> = Result<T, TurnError>;
pub type LogbookResult<T> = Result<T, LogbookError>;

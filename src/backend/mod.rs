//! Completion backend abstraction
//!
//! One `complete` call is exactly one attempt against one endpoint.
//! Retry and fallback live in [`crate::client::CompletionClient`].

pub mod gemini;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::AttemptError;

pub use gemini::GeminiBackend;

/// A model the backend can be addressed by
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelEndpoint {
    pub model: String,
}

impl ModelEndpoint {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
        }
    }
}

/// Everything needed for one network call
#[derive(Debug, Clone)]
pub struct CompletionRequest<'a> {
    pub endpoint: &'a ModelEndpoint,
    pub prompt: &'a str,
    pub timeout: Duration,
}

/// Transport to a generative text service
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Perform a single attempt and return the completion text
    async fn complete(&self, request: &CompletionRequest<'_>) -> Result<String, AttemptError>;

    /// Get the provider name for logging
    fn provider_name(&self) -> &str;
}

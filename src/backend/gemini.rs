//! Google Gemini backend
//!
//! Speaks the `generateContent` endpoint: one text part in, the first
//! candidate's text parts out.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use super::{CompletionBackend, CompletionRequest};
use crate::config::LogbookConfig;
use crate::error::{AttemptError, ConfigError};

/// Gemini API client
#[derive(Debug, Clone)]
pub struct GeminiBackend {
    client: Client,
    api_key: String,
    base_url: String,
    transient_statuses: Vec<u16>,
}

/// Gemini API request format
#[derive(Debug, Serialize)]
struct GeminiRequest<'a> {
    contents: Vec<GeminiContent<'a>>,
}

#[derive(Debug, Serialize)]
struct GeminiContent<'a> {
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Debug, Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

/// Gemini API response format
#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default, rename = "usageMetadata")]
    usage_metadata: Option<GeminiUsageMetadata>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiResponseContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponseContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiUsageMetadata {
    #[serde(default, rename = "totalTokenCount")]
    total_token_count: Option<u32>,
}

impl GeminiBackend {
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        transient_statuses: Vec<u16>,
        timeout: Duration,
    ) -> Result<Self, ConfigError> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(ConfigError::MissingApiKey);
        }

        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            api_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            transient_statuses,
        })
    }

    pub fn from_config(config: &LogbookConfig) -> Result<Self, ConfigError> {
        Self::new(
            config.api_key.clone(),
            config.base_url.clone(),
            config.transient_statuses.clone(),
            config.timeout(),
        )
    }

    fn endpoint_url(&self, model: &str) -> String {
        format!("{}/{}:generateContent", self.base_url, model)
    }
}

fn request_body(prompt: &str) -> GeminiRequest<'_> {
    GeminiRequest {
        contents: vec![GeminiContent {
            parts: vec![GeminiPart { text: prompt }],
        }],
    }
}

/// Pull the completion text out of a successful response body
fn parse_response(body: &str) -> Result<String, AttemptError> {
    let response: GeminiResponse = serde_json::from_str(body)
        .map_err(|e| AttemptError::InvalidResponse(format!("unparseable body: {}", e)))?;

    if let Some(tokens) = response
        .usage_metadata
        .as_ref()
        .and_then(|u| u.total_token_count)
    {
        debug!(total_tokens = tokens, "Gemini usage");
    }

    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| AttemptError::InvalidResponse("No candidates in response".to_string()))?;

    let text: String = candidate
        .content
        .map(|c| c.parts)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|p| p.text)
        .collect();

    if text.trim().is_empty() {
        return Err(AttemptError::InvalidResponse(
            "No text in candidate".to_string(),
        ));
    }

    Ok(text)
}

#[async_trait]
impl CompletionBackend for GeminiBackend {
    async fn complete(&self, request: &CompletionRequest<'_>) -> Result<String, AttemptError> {
        let url = self.endpoint_url(&request.endpoint.model);
        debug!(model = %request.endpoint.model, "Calling Gemini API");

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .timeout(request.timeout)
            .json(&request_body(request.prompt))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AttemptError::Timeout(request.timeout)
                } else {
                    AttemptError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AttemptError::Transport(e.to_string()))?;

        if self.transient_statuses.contains(&status.as_u16()) {
            return Err(AttemptError::Busy {
                status: status.as_u16(),
            });
        }

        if !status.is_success() {
            error!(status = status.as_u16(), model = %request.endpoint.model, "Gemini API error");
            return Err(AttemptError::Http {
                status: status.as_u16(),
                body,
            });
        }

        parse_response(&body)
    }

    fn provider_name(&self) -> &str {
        "Gemini"
    }
}

//! Completion client with retry and ranked-endpoint failover
//!
//! Endpoints are tried in order. A busy endpoint is retried up to the
//! policy's attempt ceiling; any other failure moves straight on to the
//! next endpoint, which starts with a fresh budget.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::backend::{CompletionBackend, CompletionRequest, ModelEndpoint};
use crate::config::LogbookConfig;
use crate::error::{AttemptError, ConfigError, TurnError, TurnResult};

/// Same-endpoint retry policy for transient failures
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Attempts per endpoint, including the first
    pub max_attempts: u32,
    /// Delay before the first retry
    pub delay_ms: u64,
    /// Multiplier applied to the delay after each retry; 1.0 keeps it fixed
    pub backoff_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay_ms: 1000,
            backoff_factor: 1.0,
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after the given failed attempt (1-based)
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let millis = self.delay_ms as f64 * self.backoff_factor.max(1.0).powi(exponent);
        Duration::from_millis(millis.round() as u64)
    }
}

/// Unparsed completion text and where it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawCompletion {
    pub text: String,
    pub model: String,
}

/// Sends prompts to a ranked list of endpoints
#[derive(Clone)]
pub struct CompletionClient {
    backend: Arc<dyn CompletionBackend>,
    endpoints: Vec<ModelEndpoint>,
    retry: RetryPolicy,
    timeout: Duration,
}

impl CompletionClient {
    pub fn new(
        backend: Arc<dyn CompletionBackend>,
        endpoints: Vec<ModelEndpoint>,
        retry: RetryPolicy,
        timeout: Duration,
    ) -> Result<Self, ConfigError> {
        if endpoints.is_empty() {
            return Err(ConfigError::NoEndpoints);
        }
        Ok(Self {
            backend,
            endpoints,
            retry,
            timeout,
        })
    }

    pub fn from_config(
        backend: Arc<dyn CompletionBackend>,
        config: &LogbookConfig,
    ) -> Result<Self, ConfigError> {
        Self::new(
            backend,
            config.endpoints(),
            config.retry.clone(),
            config.timeout(),
        )
    }

    pub fn endpoints(&self) -> &[ModelEndpoint] {
        &self.endpoints
    }

    /// Send a prompt, failing over across endpoints
    pub async fn send(&self, prompt: &str) -> TurnResult<RawCompletion> {
        let mut last_error = None;

        for endpoint in &self.endpoints {
            match self.send_to_endpoint(endpoint, prompt).await {
                Ok(text) => {
                    info!(
                        provider = self.backend.provider_name(),
                        model = %endpoint.model,
                        "Completion received"
                    );
                    return Ok(RawCompletion {
                        text,
                        model: endpoint.model.clone(),
                    });
                }
                Err(e) => {
                    warn!(model = %endpoint.model, error = %e, "Endpoint failed, falling through");
                    last_error = Some(e);
                }
            }
        }

        Err(TurnError::BackendUnavailable {
            endpoints_tried: self.endpoints.len(),
            last_error: last_error
                .unwrap_or_else(|| AttemptError::Transport("no endpoints configured".into())),
        })
    }

    async fn send_to_endpoint(
        &self,
        endpoint: &ModelEndpoint,
        prompt: &str,
    ) -> Result<String, AttemptError> {
        let request = CompletionRequest {
            endpoint,
            prompt,
            timeout: self.timeout,
        };
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            let result = tokio::time::timeout(self.timeout, self.backend.complete(&request))
                .await
                .unwrap_or(Err(AttemptError::Timeout(self.timeout)));

            match result {
                Ok(text) => return Ok(text),
                Err(e) if e.is_transient() && attempt < max_attempts => {
                    let delay = self.retry.delay_after(attempt);
                    debug!(
                        model = %endpoint.model,
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        "Endpoint busy, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;

    /// Replays a fixed script of outcomes per model
    struct ScriptedBackend {
        scripts: Mutex<HashMap<String, VecDeque<Result<String, AttemptError>>>>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedBackend {
        fn new(scripts: Vec<(&str, Vec<Result<String, AttemptError>>)>) -> Self {
            Self {
                scripts: Mutex::new(
                    scripts
                        .into_iter()
                        .map(|(m, s)| (m.to_string(), s.into()))
                        .collect(),
                ),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CompletionBackend for ScriptedBackend {
        async fn complete(&self, request: &CompletionRequest<'_>) -> Result<String, AttemptError> {
            let model = request.endpoint.model.clone();
            self.calls.lock().unwrap().push(model.clone());
            self.scripts
                .lock()
                .unwrap()
                .get_mut(&model)
                .and_then(|s| s.pop_front())
                .unwrap_or_else(|| Err(AttemptError::Transport("script exhausted".into())))
        }

        fn provider_name(&self) -> &str {
            "Scripted"
        }
    }

    fn busy() -> Result<String, AttemptError> {
        Err(AttemptError::Busy { status: 503 })
    }

    fn no_delay() -> RetryPolicy {
        RetryPolicy {
            delay_ms: 0,
            ..RetryPolicy::default()
        }
    }

    fn client(backend: Arc<ScriptedBackend>, models: &[&str]) -> CompletionClient {
        CompletionClient::new(
            backend,
            models.iter().map(|m| ModelEndpoint::new(*m)).collect(),
            no_delay(),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn test_retry_delay() {
        let fixed = RetryPolicy::default();
        assert_eq!(fixed.delay_after(1), Duration::from_millis(1000));
        assert_eq!(fixed.delay_after(2), Duration::from_millis(1000));

        let backoff = RetryPolicy {
            delay_ms: 100,
            backoff_factor: 2.0,
            ..RetryPolicy::default()
        };
        assert_eq!(backoff.delay_after(1), Duration::from_millis(100));
        assert_eq!(backoff.delay_after(3), Duration::from_millis(400));
    }

    #[test]
    fn test_requires_endpoints() {
        let backend = Arc::new(ScriptedBackend::new(vec![]));
        let result = CompletionClient::new(backend, vec![], no_delay(), Duration::from_secs(1));
        assert!(matches!(result, Err(ConfigError::NoEndpoints)));
    }

    #[tokio::test]
    async fn test_primary_success() {
        let backend = Arc::new(ScriptedBackend::new(vec![(
            "primary",
            vec![Ok("Roger.".to_string())],
        )]));
        let client = client(backend.clone(), &["primary", "secondary"]);

        assert_eq!(
            client.endpoints(),
            &[ModelEndpoint::new("primary"), ModelEndpoint::new("secondary")]
        );
        let raw = client.send("prompt").await.unwrap();
        assert_eq!(raw.text, "Roger.");
        assert_eq!(raw.model, "primary");
        assert_eq!(backend.calls(), vec!["primary"]);
    }

    #[tokio::test]
    async fn test_busy_then_success_on_same_endpoint() {
        let backend = Arc::new(ScriptedBackend::new(vec![(
            "primary",
            vec![busy(), busy(), Ok("Third time".to_string())],
        )]));
        let client = client(backend.clone(), &["primary", "secondary"]);

        let raw = client.send("prompt").await.unwrap();
        assert_eq!(raw.model, "primary");
        assert_eq!(backend.calls(), vec!["primary", "primary", "primary"]);
    }

    #[tokio::test]
    async fn test_hard_failure_skips_retries() {
        let backend = Arc::new(ScriptedBackend::new(vec![
            (
                "primary",
                vec![Err(AttemptError::Http {
                    status: 400,
                    body: "bad request".into(),
                })],
            ),
            ("secondary", vec![Ok("Fallback".to_string())]),
        ]));
        let client = client(backend.clone(), &["primary", "secondary"]);

        let raw = client.send("prompt").await.unwrap();
        assert_eq!(raw.model, "secondary");
        assert_eq!(backend.calls(), vec!["primary", "secondary"]);
    }

    #[tokio::test]
    async fn test_secondary_gets_fresh_budget() {
        let backend = Arc::new(ScriptedBackend::new(vec![
            ("primary", vec![busy(), busy(), busy()]),
            ("secondary", vec![busy(), busy(), Ok("Finally".to_string())]),
        ]));
        let client = client(backend.clone(), &["primary", "secondary"]);

        let raw = client.send("prompt").await.unwrap();
        assert_eq!(raw.text, "Finally");
        assert_eq!(backend.calls().len(), 6);
    }

    #[tokio::test]
    async fn test_all_endpoints_exhausted() {
        let backend = Arc::new(ScriptedBackend::new(vec![
            ("primary", vec![busy(), busy(), busy()]),
            (
                "secondary",
                vec![Err(AttemptError::Http {
                    status: 404,
                    body: "model not found".into(),
                })],
            ),
        ]));
        let client = client(backend.clone(), &["primary", "secondary"]);

        let err = client.send("prompt").await.unwrap_err();
        assert_eq!(
            err,
            TurnError::BackendUnavailable {
                endpoints_tried: 2,
                last_error: AttemptError::Http {
                    status: 404,
                    body: "model not found".into(),
                },
            }
        );
    }

    struct StalledBackend;

    #[async_trait]
    impl CompletionBackend for StalledBackend {
        async fn complete(&self, _request: &CompletionRequest<'_>) -> Result<String, AttemptError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok("too late".to_string())
        }

        fn provider_name(&self) -> &str {
            "Stalled"
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempt_is_bounded_by_timeout() {
        let client = CompletionClient::new(
            Arc::new(StalledBackend),
            vec![ModelEndpoint::new("primary")],
            no_delay(),
            Duration::from_secs(30),
        )
        .unwrap();

        let err = client.send("prompt").await.unwrap_err();
        assert!(matches!(
            err,
            TurnError::BackendUnavailable {
                last_error: AttemptError::Timeout(_),
                ..
            }
        ));
    }
}

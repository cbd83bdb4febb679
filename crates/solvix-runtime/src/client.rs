//! Per-provider client: timeout, retry with backoff, error normalization.
//!
//! A [`ProviderClient`] owns one provider and its settings. Every attempt is
//! bounded by the configured timeout and a timed-out attempt spends one unit
//! of the retry budget. Only transient failures are retried.

use std::sync::Arc;
use std::time::Duration;

use backon::{BackoffBuilder, ExponentialBuilder};
use serde::Deserialize;
use tokio::time::Instant;

use crate::config::{deserialize_duration, DEFAULT_MAX_ATTEMPTS, DEFAULT_TIMEOUT};
use crate::error::ErrorKind;
use crate::providers::{ChatMessage, CompletionConfig, LlmProvider, ProviderError, TokenUsage};

/// Longest server-requested wait honoured between attempts.
pub const MAX_RETRY_AFTER: Duration = Duration::from_secs(60);

/// Exponential backoff schedule between attempts.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct BackoffSettings {
    #[serde(deserialize_with = "deserialize_duration")]
    pub min_delay: Duration,

    #[serde(deserialize_with = "deserialize_duration")]
    pub max_delay: Duration,

    pub factor: f32,
}

impl Default for BackoffSettings {
    fn default() -> Self {
        Self {
            min_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
            factor: 2.0,
        }
    }
}

/// Settings for one provider client.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientSettings {
    pub model: String,
    pub timeout: Duration,
    pub max_attempts: u32,
    pub max_tokens: u32,
    pub backoff: BackoffSettings,
}

impl ClientSettings {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            timeout: DEFAULT_TIMEOUT,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            max_tokens: 2048,
            backoff: BackoffSettings::default(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_backoff(mut self, backoff: BackoffSettings) -> Self {
        self.backoff = backoff;
        self
    }

    /// Delays between attempts; one fewer than the attempt budget.
    fn backoff_schedule(&self) -> impl Iterator<Item = Duration> {
        ExponentialBuilder::default()
            .with_min_delay(self.backoff.min_delay)
            .with_max_delay(self.backoff.max_delay)
            .with_factor(self.backoff.factor)
            .with_max_times(self.max_attempts.saturating_sub(1) as usize)
            .build()
    }
}

/// A prompt ready to send.
#[derive(Debug, Clone, PartialEq)]
pub struct LlmRequest {
    pub system: String,
    pub user: String,
    pub temperature: f32,
    pub json_mode: bool,
}

impl LlmRequest {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            temperature: 0.3,
            json_mode: false,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn json(mut self) -> Self {
        self.json_mode = true;
        self
    }

    fn messages(&self) -> Vec<ChatMessage> {
        vec![
            ChatMessage::system(self.system.clone()),
            ChatMessage::user(self.user.clone()),
        ]
    }
}

/// Raw text from a successful call.
#[derive(Debug, Clone)]
pub struct ProviderSuccess {
    pub provider: String,
    pub model: String,
    pub content: String,
    pub usage: TokenUsage,
    pub attempts: u32,
}

/// A client's final failure after its retry budget.
#[derive(Debug, Clone)]
pub struct ProviderFailure {
    pub provider: String,
    pub kind: ErrorKind,
    pub message: String,
    pub attempts: u32,
}

/// Result of one client call, retries included.
#[derive(Debug, Clone)]
pub enum ProviderCallOutcome {
    Success(ProviderSuccess),
    Failure(ProviderFailure),
}

impl ProviderCallOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ProviderCallOutcome::Success(_))
    }
}

/// One provider plus its timeout and retry policy.
#[derive(Clone)]
pub struct ProviderClient {
    provider: Arc<dyn LlmProvider>,
    settings: ClientSettings,
}

impl std::fmt::Debug for ProviderClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderClient")
            .field("provider", &self.provider.name())
            .field("settings", &self.settings)
            .finish()
    }
}

impl ProviderClient {
    pub fn new(provider: Arc<dyn LlmProvider>, settings: ClientSettings) -> Self {
        Self { provider, settings }
    }

    pub fn name(&self) -> &str {
        self.provider.name()
    }

    pub fn model(&self) -> &str {
        &self.settings.model
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    /// Readiness without a network call.
    pub async fn is_ready(&self) -> bool {
        self.provider.health_check().await
    }

    /// Run the request with retries. Never panics, never returns partial text.
    pub async fn complete(&self, request: &LlmRequest) -> ProviderCallOutcome {
        let provider = self.provider.name().to_string();
        let config = CompletionConfig {
            model: self.settings.model.clone(),
            max_tokens: self.settings.max_tokens,
            temperature: request.temperature,
            timeout: self.settings.timeout,
            json_mode: request.json_mode,
        };
        let max_attempts = self.settings.max_attempts.max(1);
        let mut delays = self.settings.backoff_schedule();

        tracing::debug!(
            provider = %provider,
            system = %request.system,
            user = %request.user,
            "LLM prompt"
        );

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let started = Instant::now();

            let result = match tokio::time::timeout(
                self.settings.timeout,
                self.provider.complete(request.messages(), &config),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(ProviderError::Timeout(self.settings.timeout)),
            };
            let latency_ms = started.elapsed().as_millis() as u64;

            let err = match result {
                Ok(response) if response.content.trim().is_empty() => {
                    ProviderError::ParseError("provider returned an empty completion".to_string())
                }
                Ok(response) => {
                    tracing::info!(
                        provider = %provider,
                        model = %config.model,
                        attempt,
                        latency_ms,
                        outcome = "success",
                        tokens = response.usage.total(),
                        "LLM attempt"
                    );
                    tracing::debug!(provider = %provider, completion = %response.content, "LLM completion");

                    return ProviderCallOutcome::Success(ProviderSuccess {
                        provider,
                        model: response.model,
                        content: response.content,
                        usage: response.usage,
                        attempts: attempt,
                    });
                }
                Err(err) => err,
            };

            let kind = err.kind();
            tracing::warn!(
                provider = %provider,
                model = %config.model,
                attempt,
                latency_ms,
                outcome = kind.as_str(),
                error = %err,
                "LLM attempt"
            );

            if !kind.is_transient() || attempt >= max_attempts {
                return ProviderCallOutcome::Failure(ProviderFailure {
                    provider,
                    kind,
                    message: err.to_string(),
                    attempts: attempt,
                });
            }

            let scheduled = delays.next().unwrap_or(self.settings.backoff.max_delay);
            let delay = match err.retry_after() {
                Some(hint) if hint > scheduled => hint.min(MAX_RETRY_AFTER),
                _ => scheduled,
            };
            tokio::time::sleep(delay).await;
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted providers shared by runtime tests.

    use super::*;
    use crate::providers::CompletionResponse;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    pub enum Step {
        Reply(String),
        Fail(ProviderError),
        Hang,
    }

    /// Replays a script of replies; repeats the last step when exhausted.
    pub struct ScriptedProvider {
        name: String,
        script: Mutex<VecDeque<Step>>,
        last: Mutex<Option<Step>>,
        calls: AtomicUsize,
        prompts: Mutex<Vec<Vec<ChatMessage>>>,
    }

    fn clone_step(step: &Step) -> Step {
        match step {
            Step::Reply(text) => Step::Reply(text.clone()),
            Step::Fail(err) => Step::Fail(match err {
                ProviderError::HttpError(m) => ProviderError::HttpError(m.clone()),
                ProviderError::RateLimited { retry_after } => ProviderError::RateLimited {
                    retry_after: *retry_after,
                },
                ProviderError::ApiError { status, message } => ProviderError::ApiError {
                    status: *status,
                    message: message.clone(),
                },
                ProviderError::ParseError(m) => ProviderError::ParseError(m.clone()),
                ProviderError::AuthError => ProviderError::AuthError,
                ProviderError::Timeout(d) => ProviderError::Timeout(*d),
                ProviderError::NotConfigured(m) => ProviderError::NotConfigured(m.clone()),
            }),
            Step::Hang => Step::Hang,
        }
    }

    impl ScriptedProvider {
        pub fn new(name: &str, steps: Vec<Step>) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                script: Mutex::new(steps.into()),
                last: Mutex::new(None),
                calls: AtomicUsize::new(0),
                prompts: Mutex::new(Vec::new()),
            })
        }

        pub fn replying(name: &str, text: &str) -> Arc<Self> {
            Self::new(name, vec![Step::Reply(text.to_string())])
        }

        pub fn failing(name: &str, err: ProviderError) -> Arc<Self> {
            Self::new(name, vec![Step::Fail(err)])
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        pub fn prompts(&self) -> Vec<Vec<ChatMessage>> {
            self.prompts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        async fn complete(
            &self,
            messages: Vec<ChatMessage>,
            config: &CompletionConfig,
        ) -> Result<CompletionResponse, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.prompts.lock().unwrap().push(messages);

            let step = {
                let mut script = self.script.lock().unwrap();
                let mut last = self.last.lock().unwrap();
                match script.pop_front() {
                    Some(step) => {
                        *last = Some(clone_step(&step));
                        step
                    }
                    None => last.as_ref().map(clone_step).unwrap_or(Step::Hang),
                }
            };

            match step {
                Step::Reply(content) => Ok(CompletionResponse {
                    content,
                    usage: TokenUsage {
                        prompt_tokens: 120,
                        completion_tokens: 30,
                    },
                    model: config.model.clone(),
                    stop_reason: Some("stop".to_string()),
                }),
                Step::Fail(err) => Err(err),
                Step::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Err(ProviderError::Timeout(Duration::from_secs(3600)))
                }
            }
        }

        async fn health_check(&self) -> bool {
            true
        }

        fn name(&self) -> &str {
            &self.name
        }
    }

    pub fn client(provider: Arc<ScriptedProvider>, max_attempts: u32) -> ProviderClient {
        ProviderClient::new(
            provider,
            ClientSettings::new("test-model")
                .with_max_attempts(max_attempts)
                .with_timeout(Duration::from_secs(5)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    fn request() -> LlmRequest {
        LlmRequest::new("system", "user").json()
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_first_attempt() {
        let provider = ScriptedProvider::replying("p", "{\"category\": \"COOPERATIVE\"}");
        let outcome = client(provider.clone(), 2).complete(&request()).await;

        match outcome {
            ProviderCallOutcome::Success(success) => {
                assert_eq!(success.attempts, 1);
                assert_eq!(success.usage.total(), 150);
                assert_eq!(success.model, "test-model");
            }
            other => panic!("expected success, got {other:?}"),
        }
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failure_retried_then_succeeds() {
        let provider = ScriptedProvider::new(
            "p",
            vec![
                Step::Fail(ProviderError::ApiError {
                    status: 503,
                    message: "overloaded".into(),
                }),
                Step::Reply("ok".into()),
            ],
        );
        let started = Instant::now();
        let outcome = client(provider.clone(), 3).complete(&request()).await;

        assert!(outcome.is_success());
        assert_eq!(provider.calls(), 2);
        assert!(started.elapsed() >= Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_budget_is_exact() {
        let provider = ScriptedProvider::failing("p", ProviderError::HttpError("reset".into()));
        let outcome = client(provider.clone(), 3).complete(&request()).await;

        match outcome {
            ProviderCallOutcome::Failure(failure) => {
                assert_eq!(failure.kind, ErrorKind::Network);
                assert_eq!(failure.attempts, 3);
            }
            other => panic!("expected failure, got {other:?}"),
        }
        assert_eq!(provider.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_auth_failure_not_retried() {
        let provider = ScriptedProvider::failing("p", ProviderError::AuthError);
        let outcome = client(provider.clone(), 5).complete(&request()).await;

        match outcome {
            ProviderCallOutcome::Failure(failure) => {
                assert_eq!(failure.kind, ErrorKind::Authentication);
                assert_eq!(failure.attempts, 1);
            }
            other => panic!("expected failure, got {other:?}"),
        }
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_request_not_retried() {
        let provider = ScriptedProvider::failing(
            "p",
            ProviderError::ApiError {
                status: 400,
                message: "bad".into(),
            },
        );
        let outcome = client(provider.clone(), 4).complete(&request()).await;
        assert!(!outcome.is_success());
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_blank_completion_is_a_malformed_failure() {
        let provider = ScriptedProvider::new("p", vec![Step::Reply("  \n".into())]);
        let outcome = client(provider.clone(), 3).complete(&request()).await;

        match outcome {
            ProviderCallOutcome::Failure(failure) => {
                assert_eq!(failure.kind, ErrorKind::MalformedResponse);
                assert_eq!(failure.attempts, 1);
                assert!(failure.message.contains("empty completion"));
            }
            other => panic!("expected failure, got {other:?}"),
        }
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_counts_toward_budget() {
        let provider = ScriptedProvider::new("p", vec![Step::Hang]);
        let started = Instant::now();
        let outcome = client(provider.clone(), 2).complete(&request()).await;

        match outcome {
            ProviderCallOutcome::Failure(failure) => {
                assert_eq!(failure.kind, ErrorKind::Timeout);
                assert_eq!(failure.attempts, 2);
            }
            other => panic!("expected failure, got {other:?}"),
        }
        assert_eq!(provider.calls(), 2);
        // two 5s timeouts plus one backoff delay
        assert!(started.elapsed() >= Duration::from_secs(10));
        assert!(started.elapsed() < Duration::from_secs(12));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_after_hint_extends_delay() {
        let provider = ScriptedProvider::new(
            "p",
            vec![
                Step::Fail(ProviderError::RateLimited {
                    retry_after: Some(Duration::from_secs(4)),
                }),
                Step::Reply("ok".into()),
            ],
        );
        let started = Instant::now();
        let outcome = client(provider.clone(), 2).complete(&request()).await;

        assert!(outcome.is_success());
        assert!(started.elapsed() >= Duration::from_secs(4));
    }

    #[test]
    fn test_backoff_schedule_is_exponential_and_capped() {
        let settings = ClientSettings::new("m").with_max_attempts(7);
        let delays: Vec<Duration> = settings.backoff_schedule().collect();
        assert_eq!(delays.len(), 6);
        assert_eq!(delays[0], Duration::from_millis(500));
        assert_eq!(delays[1], Duration::from_secs(1));
        assert_eq!(delays[2], Duration::from_secs(2));
        assert!(delays.iter().all(|d| *d <= Duration::from_secs(8)));
    }
}

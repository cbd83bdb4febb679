//! Ordered provider fallback.
//!
//! The orchestrator holds an ordered list of [`ProviderClient`]s (primary
//! first). Clients are tried one after another, never in parallel; the next
//! client is only tried once the previous one has spent its whole retry
//! budget.

use serde::Serialize;

use crate::client::{LlmRequest, ProviderCallOutcome, ProviderClient};
use crate::config::RuntimeConfig;
use crate::error::{EngineError, ErrorKind};
use crate::providers::{build_provider, TokenUsage};

/// The one successful completion of a run.
#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub content: String,
    pub provider: String,
    pub model: String,
    pub usage: TokenUsage,
}

/// Provider and model of one client, for health output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderDescriptor {
    pub provider: String,
    pub model: String,
}

/// Runs a request against each client in order until one succeeds.
#[derive(Debug, Clone, Default)]
pub struct LlmOrchestrator {
    clients: Vec<ProviderClient>,
}

impl LlmOrchestrator {
    pub fn new(clients: Vec<ProviderClient>) -> Self {
        Self { clients }
    }

    pub fn builder() -> LlmOrchestratorBuilder {
        LlmOrchestratorBuilder::default()
    }

    /// Build clients for every provider in the call order that has a key.
    pub fn from_config(config: &RuntimeConfig) -> Self {
        let clients = config
            .configured_providers()
            .into_iter()
            .filter_map(|kind| {
                let settings = config.providers.get(kind);
                let credential = settings.credential()?.clone();
                let provider = build_provider(kind, credential, settings.base_url.as_deref());
                Some(ProviderClient::new(provider, config.client_settings(kind)))
            })
            .collect();
        Self { clients }
    }

    /// Whether at least one client exists. Does not contact any provider.
    pub fn is_configured(&self) -> bool {
        !self.clients.is_empty()
    }

    pub fn describe(&self) -> Vec<ProviderDescriptor> {
        self.clients
            .iter()
            .map(|client| ProviderDescriptor {
                provider: client.name().to_string(),
                model: client.model().to_string(),
            })
            .collect()
    }

    /// Return the first successful completion.
    ///
    /// # Errors
    ///
    /// * [`EngineError::LlmNotConfigured`] when no client has usable
    ///   credentials. No call is made.
    /// * [`EngineError::LlmUnavailable`] when every client failed; carries
    ///   the last provider and error kind.
    pub async fn run(&self, request: &LlmRequest) -> Result<LlmResponse, EngineError> {
        let mut ready = Vec::with_capacity(self.clients.len());
        for client in &self.clients {
            if client.is_ready().await {
                ready.push(client);
            }
        }
        if ready.is_empty() {
            return Err(EngineError::LlmNotConfigured);
        }

        let mut last_failure: Option<(String, ErrorKind)> = None;
        for (index, client) in ready.iter().enumerate() {
            if let Some((previous, kind)) = &last_failure {
                tracing::warn!(
                    from = %previous,
                    to = client.name(),
                    reason = kind.as_str(),
                    "falling back to next LLM provider"
                );
            }

            match client.complete(request).await {
                ProviderCallOutcome::Success(success) => {
                    if index > 0 {
                        tracing::info!(provider = %success.provider, "fallback provider succeeded");
                    }
                    return Ok(LlmResponse {
                        content: success.content,
                        provider: success.provider,
                        model: success.model,
                        usage: success.usage,
                    });
                }
                ProviderCallOutcome::Failure(failure) => {
                    tracing::warn!(
                        provider = %failure.provider,
                        kind = failure.kind.as_str(),
                        attempts = failure.attempts,
                        "LLM provider exhausted"
                    );
                    last_failure = Some((failure.provider, failure.kind));
                }
            }
        }

        let (provider, kind) =
            last_failure.unwrap_or_else(|| (String::from("none"), ErrorKind::NotConfigured));
        tracing::error!(provider = %provider, kind = kind.as_str(), "all LLM providers failed");
        Err(EngineError::LlmUnavailable { provider, kind })
    }
}

/// Builder for [`LlmOrchestrator`].
#[derive(Debug, Default)]
pub struct LlmOrchestratorBuilder {
    clients: Vec<ProviderClient>,
}

impl LlmOrchestratorBuilder {
    /// Append a client; call order follows insertion order.
    pub fn client(mut self, client: ProviderClient) -> Self {
        self.clients.push(client);
        self
    }

    pub fn build(self) -> LlmOrchestrator {
        LlmOrchestrator::new(self.clients)
    }
}

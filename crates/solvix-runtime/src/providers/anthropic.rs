//! Anthropic Claude provider (`messages`).
//!
//! The Messages API has no JSON response mode; in JSON mode the system
//! prompt gets a one-line reminder to answer with a single JSON object.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{
    secrets::{ApiCredential, CredentialSource},
    split_system, ChatMessage, CompletionConfig, CompletionResponse, LlmProvider, ProviderError,
    ProviderKind,
};
#[cfg(feature = "anthropic")]
use super::{http, TokenUsage};

/// Environment variable name for the Anthropic API key.
pub const ANTHROPIC_API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

#[cfg(feature = "anthropic")]
const API_VERSION: &str = "2023-06-01";

const JSON_ONLY_SUFFIX: &str = "\n\nRespond with a single JSON object and nothing else.";

/// Anthropic Claude provider.
///
/// The API key is held in an [`ApiCredential`] and only exposed while the
/// request header is set.
#[derive(Debug)]
pub struct AnthropicProvider {
    credential: ApiCredential,
    base_url: String,
}

impl AnthropicProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_credential(ApiCredential::new(
            api_key,
            CredentialSource::Programmatic,
            "Anthropic API key",
        ))
    }

    pub fn with_credential(credential: ApiCredential) -> Self {
        Self {
            credential: credential.named("Anthropic API key"),
            base_url: ProviderKind::Anthropic.default_base_url().to_string(),
        }
    }

    /// Set custom base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }
}

/// Anthropic API request format.
#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<AnthropicMessage>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: String,
    content: Vec<ContentBlock>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text { text: String },
}

/// Anthropic API response format.
#[derive(Debug, Deserialize)]
#[cfg_attr(not(feature = "anthropic"), allow(dead_code))]
struct AnthropicResponse {
    content: Vec<ContentBlockResponse>,
    model: String,
    stop_reason: Option<String>,
    usage: AnthropicUsage,
}

#[derive(Debug, Deserialize)]
#[cfg_attr(not(feature = "anthropic"), allow(dead_code))]
struct ContentBlockResponse {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[cfg_attr(not(feature = "anthropic"), allow(dead_code))]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct AnthropicError {
    error: AnthropicErrorDetail,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorDetail {
    message: String,
}

#[cfg_attr(not(feature = "anthropic"), allow(dead_code))]
fn error_message(body: &str) -> Option<String> {
    serde_json::from_str::<AnthropicError>(body)
        .ok()
        .map(|e| e.error.message)
}

#[cfg_attr(not(feature = "anthropic"), allow(dead_code))]
fn build_request(messages: Vec<ChatMessage>, config: &CompletionConfig) -> AnthropicRequest {
    let (system, rest) = split_system(messages);

    let system = match (system, config.json_mode) {
        (Some(text), true) => Some(format!("{text}{JSON_ONLY_SUFFIX}")),
        (None, true) => Some(JSON_ONLY_SUFFIX.trim_start().to_string()),
        (system, false) => system,
    };

    AnthropicRequest {
        model: config.model.clone(),
        max_tokens: config.max_tokens,
        system,
        messages: rest
            .into_iter()
            .map(|msg| AnthropicMessage {
                role: msg.role,
                content: vec![ContentBlock::Text { text: msg.content }],
            })
            .collect(),
        temperature: config.temperature,
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    #[cfg(feature = "anthropic")]
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        config: &CompletionConfig,
    ) -> Result<CompletionResponse, ProviderError> {
        let request = build_request(messages, config);

        let response = http::client()
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", self.credential.expose())
            .header("anthropic-version", API_VERSION)
            .timeout(config.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| http::send_error(e, config.timeout))?;

        if !response.status().is_success() {
            return Err(http::status_error(response, error_message).await);
        }

        let body: AnthropicResponse = http::decode(response).await?;

        let content = body
            .content
            .into_iter()
            .filter_map(|block| block.text)
            .collect::<Vec<_>>()
            .join("");

        Ok(CompletionResponse {
            content,
            usage: TokenUsage {
                prompt_tokens: body.usage.input_tokens,
                completion_tokens: body.usage.output_tokens,
            },
            model: body.model,
            stop_reason: body.stop_reason,
        })
    }

    #[cfg(not(feature = "anthropic"))]
    async fn complete(
        &self,
        _messages: Vec<ChatMessage>,
        _config: &CompletionConfig,
    ) -> Result<CompletionResponse, ProviderError> {
        Err(ProviderError::NotConfigured(
            "Anthropic provider requires 'anthropic' feature".to_string(),
        ))
    }

    async fn health_check(&self) -> bool {
        !self.credential.is_empty()
    }

    fn name(&self) -> &str {
        ProviderKind::Anthropic.as_str()
    }
}

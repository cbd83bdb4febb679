//! OpenAI provider (`chat/completions`).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{
    secrets::{ApiCredential, CredentialSource},
    ChatMessage, CompletionConfig, CompletionResponse, LlmProvider, ProviderError, ProviderKind,
};
#[cfg(feature = "openai")]
use super::{http, TokenUsage};

/// Environment variable name for the OpenAI API key.
pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";

#[derive(Debug)]
pub struct OpenAiProvider {
    credential: ApiCredential,
    base_url: String,
}

impl OpenAiProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_credential(ApiCredential::new(
            api_key,
            CredentialSource::Programmatic,
            "OpenAI API key",
        ))
    }

    pub fn with_credential(credential: ApiCredential) -> Self {
        Self {
            credential: credential.named("OpenAI API key"),
            base_url: ProviderKind::OpenAi.default_base_url().to_string(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }
}

#[derive(Debug, Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_completion_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    type_: &'static str,
}

#[derive(Debug, Deserialize)]
#[cfg_attr(not(feature = "openai"), allow(dead_code))]
struct OpenAiResponse {
    #[serde(default)]
    choices: Vec<OpenAiChoice>,
    #[serde(default)]
    usage: Option<OpenAiUsage>,
    #[serde(default)]
    model: Option<String>,
}

#[derive(Debug, Deserialize)]
#[cfg_attr(not(feature = "openai"), allow(dead_code))]
struct OpenAiChoice {
    message: OpenAiMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[cfg_attr(not(feature = "openai"), allow(dead_code))]
struct OpenAiMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
#[cfg_attr(not(feature = "openai"), allow(dead_code))]
struct OpenAiUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct OpenAiError {
    error: OpenAiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorDetail {
    message: String,
}

#[cfg_attr(not(feature = "openai"), allow(dead_code))]
fn error_message(body: &str) -> Option<String> {
    serde_json::from_str::<OpenAiError>(body)
        .ok()
        .map(|e| e.error.message)
}

#[cfg_attr(not(feature = "openai"), allow(dead_code))]
fn build_request(messages: Vec<ChatMessage>, config: &CompletionConfig) -> OpenAiRequest {
    OpenAiRequest {
        model: config.model.clone(),
        messages,
        temperature: config.temperature,
        max_completion_tokens: config.max_tokens,
        response_format: config
            .json_mode
            .then_some(ResponseFormat { type_: "json_object" }),
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    #[cfg(feature = "openai")]
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        config: &CompletionConfig,
    ) -> Result<CompletionResponse, ProviderError> {
        let request = build_request(messages, config);

        let response = http::client()
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(self.credential.expose())
            .timeout(config.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| http::send_error(e, config.timeout))?;

        if !response.status().is_success() {
            return Err(http::status_error(response, error_message).await);
        }

        let body: OpenAiResponse = http::decode(response).await?;

        let choice = body
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::ParseError("no choices in response".to_string()))?;

        let usage = body
            .usage
            .map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
            })
            .unwrap_or_default();

        Ok(CompletionResponse {
            content: choice.message.content.unwrap_or_default(),
            usage,
            model: body.model.unwrap_or_else(|| config.model.clone()),
            stop_reason: choice.finish_reason,
        })
    }

    #[cfg(not(feature = "openai"))]
    async fn complete(
        &self,
        _messages: Vec<ChatMessage>,
        _config: &CompletionConfig,
    ) -> Result<CompletionResponse, ProviderError> {
        Err(ProviderError::NotConfigured(
            "OpenAI provider requires 'openai' feature".to_string(),
        ))
    }

    async fn health_check(&self) -> bool {
        !self.credential.is_empty()
    }

    fn name(&self) -> &str {
        ProviderKind::OpenAi.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_shape_json_mode() {
        let config = CompletionConfig {
            model: "gpt-5-nano".to_string(),
            json_mode: true,
            ..Default::default()
        };
        let request = build_request(
            vec![ChatMessage::system("rules"), ChatMessage::user("email")],
            &config,
        );
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "gpt-5-nano");
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["response_format"]["type"], "json_object");
    }

    #[test]
    fn test_plain_mode_omits_response_format() {
        let request = build_request(vec![ChatMessage::user("hi")], &CompletionConfig::default());
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("response_format").is_none());
    }

    #[test]
    fn test_error_message_extraction() {
        let body = r#"{"error": {"message": "Incorrect API key provided", "type": "invalid_request_error"}}"#;
        assert_eq!(
            error_message(body).as_deref(),
            Some("Incorrect API key provided")
        );
    }
}

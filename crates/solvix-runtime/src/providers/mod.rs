//! LLM provider abstractions.
//!
//! This module defines the trait every provider implements and the three
//! HTTP transports (Gemini, OpenAI, Anthropic). A transport performs exactly
//! one request per call; retry and timeout live in [`crate::client`].
//!
//! ## Security
//!
//! All providers use the [`secrets`] module for credential handling.
//! See [`ApiCredential`] for the recommended patterns.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::error::ErrorKind;

mod anthropic;
mod factory;
mod gemini;
#[cfg(any(feature = "gemini", feature = "openai", feature = "anthropic"))]
mod http;
mod openai;
pub mod secrets;

pub use anthropic::{AnthropicProvider, ANTHROPIC_API_KEY_ENV};
pub use factory::build_provider;
pub use gemini::{GeminiProvider, GEMINI_API_KEY_ENV};
pub use openai::{OpenAiProvider, OPENAI_API_KEY_ENV};
pub use secrets::{ApiCredential, CredentialSource};

/// Errors from LLM providers.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    HttpError(String),

    #[error("Rate limit exceeded, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    ParseError(String),

    #[error("Authentication failed")]
    AuthError,

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),
}

impl ProviderError {
    /// Map onto the engine-wide error taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProviderError::HttpError(_) => ErrorKind::Network,
            ProviderError::RateLimited { .. } => ErrorKind::RateLimited,
            ProviderError::ApiError { status, .. } => match status {
                401 | 403 => ErrorKind::Authentication,
                429 => ErrorKind::RateLimited,
                500..=599 => ErrorKind::ServerError,
                _ => ErrorKind::InvalidRequest,
            },
            ProviderError::ParseError(_) => ErrorKind::MalformedResponse,
            ProviderError::AuthError => ErrorKind::Authentication,
            ProviderError::Timeout(_) => ErrorKind::Timeout,
            ProviderError::NotConfigured(_) => ErrorKind::NotConfigured,
        }
    }

    /// Server-supplied wait hint, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            ProviderError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

/// The closed set of supported providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Gemini,
    OpenAi,
    Anthropic,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 3] = [
        ProviderKind::Gemini,
        ProviderKind::OpenAi,
        ProviderKind::Anthropic,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Gemini => "gemini",
            ProviderKind::OpenAi => "openai",
            ProviderKind::Anthropic => "anthropic",
        }
    }

    /// Environment variable holding this provider's API key.
    pub fn api_key_env(&self) -> &'static str {
        match self {
            ProviderKind::Gemini => GEMINI_API_KEY_ENV,
            ProviderKind::OpenAi => OPENAI_API_KEY_ENV,
            ProviderKind::Anthropic => ANTHROPIC_API_KEY_ENV,
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderKind::Gemini => "gemini-3-flash-preview",
            ProviderKind::OpenAi => "gpt-5-nano",
            ProviderKind::Anthropic => "claude-sonnet-4-5-20250514",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            ProviderKind::Gemini => "https://generativelanguage.googleapis.com/v1beta",
            ProviderKind::OpenAi => "https://api.openai.com/v1",
            ProviderKind::Anthropic => "https://api.anthropic.com/v1",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" => Ok(ProviderKind::Gemini),
            "openai" => Ok(ProviderKind::OpenAi),
            "anthropic" => Ok(ProviderKind::Anthropic),
            other => Err(ProviderError::NotConfigured(format!(
                "Unknown provider type: '{other}'. Available: gemini, openai, anthropic"
            ))),
        }
    }
}

/// Configuration for a completion request.
#[derive(Debug, Clone)]
pub struct CompletionConfig {
    /// Model to use
    pub model: String,

    /// Maximum tokens to generate
    pub max_tokens: u32,

    pub temperature: f32,

    /// Upper bound for the HTTP request itself
    pub timeout: Duration,

    /// Ask the provider for a JSON object response
    pub json_mode: bool,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            model: ProviderKind::Gemini.default_model().to_string(),
            max_tokens: 2048,
            temperature: 0.3,
            timeout: Duration::from_secs(30),
            json_mode: false,
        }
    }
}

/// A chat message for LLM completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role: "system" or "user"
    pub role: String,

    /// Message content
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn is_system(&self) -> bool {
        self.role == "system"
    }
}

/// Split a message list into the system prompt and the rest.
pub(crate) fn split_system(messages: Vec<ChatMessage>) -> (Option<String>, Vec<ChatMessage>) {
    let mut system = None;
    let mut others = Vec::new();
    for msg in messages {
        if msg.is_system() {
            system = Some(msg.content);
        } else {
            others.push(msg);
        }
    }
    (system, others)
}

/// Response from an LLM completion.
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    /// Generated content
    pub content: String,

    pub usage: TokenUsage,

    /// Model that answered
    pub model: String,

    pub stop_reason: Option<String>,
}

/// Token usage from a completion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl TokenUsage {
    /// Total tokens used.
    pub fn total(&self) -> u32 {
        self.prompt_tokens.saturating_add(self.completion_tokens)
    }
}

/// Provider abstraction allows swapping LLM backends.
///
/// This is the only place where network calls to an LLM are made. Gate
/// evaluation never reaches it.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Execute one chat completion attempt.
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        config: &CompletionConfig,
    ) -> Result<CompletionResponse, ProviderError>;

    /// Cheap readiness check. Must not call the provider.
    async fn health_check(&self) -> bool;

    /// Provider name for logs and health output.
    fn name(&self) -> &str;
}

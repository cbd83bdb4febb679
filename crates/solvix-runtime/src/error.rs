//! Error taxonomy surfaced to callers.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use solvix_core::{GateError, ValidationError};

use crate::coerce::CoerceError;

/// Normalized failure kind for a single provider attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Timeout,
    RateLimited,
    ServerError,
    Network,
    Authentication,
    InvalidRequest,
    MalformedResponse,
    NotConfigured,
}

impl ErrorKind {
    /// Whether another attempt against the same provider may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ErrorKind::Timeout | ErrorKind::RateLimited | ErrorKind::ServerError | ErrorKind::Network
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Timeout => "timeout",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::ServerError => "server_error",
            ErrorKind::Network => "network",
            ErrorKind::Authentication => "authentication",
            ErrorKind::InvalidRequest => "invalid_request",
            ErrorKind::MalformedResponse => "malformed_response",
            ErrorKind::NotConfigured => "not_configured",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors returned by classification, generation and gate evaluation.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("no LLM provider is configured")]
    LlmNotConfigured,

    #[error("all LLM providers failed; last was {provider} ({kind})")]
    LlmUnavailable { provider: String, kind: ErrorKind },

    #[error("provider response did not name a known category")]
    UnrecognizedClassification { raw: String },

    #[error("LLM response invalid: {0}")]
    ResponseInvalid(String),

    #[error("unknown tone '{0}'")]
    InvalidTone(String),

    #[error("unknown category '{0}'")]
    InvalidCategory(String),

    #[error("unknown objective '{0}'")]
    InvalidObjective(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error(transparent)]
    Gate(#[from] GateError),
}

impl EngineError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::LlmNotConfigured => "LLM_NOT_CONFIGURED",
            EngineError::LlmUnavailable { .. } => "LLM_UNAVAILABLE",
            EngineError::UnrecognizedClassification { .. } => "UNRECOGNIZED_CLASSIFICATION",
            EngineError::ResponseInvalid(_) => "LLM_RESPONSE_INVALID",
            EngineError::InvalidTone(_) => "INVALID_TONE",
            EngineError::InvalidCategory(_) => "INVALID_CATEGORY",
            EngineError::InvalidObjective(_) => "INVALID_OBJECTIVE",
            EngineError::Validation(_) | EngineError::Gate(_) => "VALIDATION_ERROR",
        }
    }

    /// Whether the caller may retry the same request later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::LlmUnavailable { .. })
    }
}

impl From<ValidationError> for EngineError {
    fn from(err: ValidationError) -> Self {
        EngineError::Validation(err.to_string())
    }
}

impl From<CoerceError> for EngineError {
    fn from(err: CoerceError) -> Self {
        match err {
            CoerceError::Unrecognized { raw } => EngineError::UnrecognizedClassification { raw },
            CoerceError::EmptyDraft => {
                EngineError::ResponseInvalid("draft body is empty".to_string())
            }
        }
    }
}

//! HTTP error envelope.

use axum::extract::rejection::JsonRejection;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use solvix_core::GateError;
use solvix_runtime::EngineError;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Body returned for every failed request.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub error_code: &'static str,
    pub details: Value,
    pub request_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
    details: Value,
    request_id: Option<String>,
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code: "VALIDATION_ERROR",
            message: message.into(),
            details: Value::Null,
            request_id: None,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "INTERNAL_ERROR",
            message: message.into(),
            details: Value::Null,
            request_id: None,
        }
    }

    /// Attach the request id found in `headers`, if any.
    pub fn for_request(mut self, headers: &HeaderMap) -> Self {
        self.request_id = request_id(headers);
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn code(&self) -> &'static str {
        self.code
    }
}

pub fn request_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

fn status_for(err: &EngineError) -> StatusCode {
    match err {
        EngineError::Validation(_)
        | EngineError::Gate(_)
        | EngineError::InvalidTone(_)
        | EngineError::InvalidCategory(_)
        | EngineError::InvalidObjective(_) => StatusCode::BAD_REQUEST,
        EngineError::LlmNotConfigured | EngineError::LlmUnavailable { .. } => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        EngineError::UnrecognizedClassification { .. } | EngineError::ResponseInvalid(_) => {
            StatusCode::BAD_GATEWAY
        }
    }
}

fn details_for(err: &EngineError) -> Value {
    match err {
        EngineError::LlmUnavailable { provider, kind } => {
            json!({ "provider": provider, "kind": kind.as_str(), "retryable": err.is_retryable() })
        }
        EngineError::UnrecognizedClassification { raw } => json!({ "raw": raw }),
        EngineError::Gate(GateError::BatchItem { index, .. }) => json!({ "index": index }),
        EngineError::Gate(GateError::BatchTooLarge { got, max }) => {
            json!({ "got": got, "max": max })
        }
        _ => Value::Null,
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        Self {
            status: status_for(&err),
            code: err.code(),
            message: err.to_string(),
            details: details_for(&err),
            request_id: None,
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::validation(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(code = self.code, request_id = ?self.request_id, "{}", self.message);
        } else {
            tracing::warn!(code = self.code, request_id = ?self.request_id, "{}", self.message);
        }

        let body = ErrorBody {
            error: self.message,
            error_code: self.code,
            details: self.details,
            request_id: self.request_id,
            timestamp: Utc::now(),
        };
        (self.status, Json(body)).into_response()
    }
}

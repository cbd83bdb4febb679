//! HTTP plumbing shared by the reqwest transports.

use std::sync::OnceLock;
use std::time::Duration;

use reqwest::header::RETRY_AFTER;
use reqwest::{Response, StatusCode};

use super::ProviderError;

/// Shared connection pool. Per-request timeouts are set on each call.
pub(super) fn client() -> &'static reqwest::Client {
    static CLIENT: OnceLock<reqwest::Client> = OnceLock::new();
    CLIENT.get_or_init(reqwest::Client::new)
}

/// Map a transport-level failure.
pub(super) fn send_error(err: reqwest::Error, timeout: Duration) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Timeout(timeout)
    } else {
        ProviderError::HttpError(err.to_string())
    }
}

/// Turn a non-success response into a provider error.
///
/// `extract_message` pulls the human message out of the provider's error
/// body; the raw body is used when it returns `None`.
pub(super) async fn status_error(
    response: Response,
    extract_message: fn(&str) -> Option<String>,
) -> ProviderError {
    let status = response.status();

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs);
        return ProviderError::RateLimited { retry_after };
    }

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return ProviderError::AuthError;
    }

    let body = response.text().await.unwrap_or_default();
    let message = extract_message(&body).unwrap_or_else(|| truncate(&body, 300));

    ProviderError::ApiError {
        status: status.as_u16(),
        message,
    }
}

/// Read and decode a success body.
pub(super) async fn decode<T: serde::de::DeserializeOwned>(
    response: Response,
) -> Result<T, ProviderError> {
    let text = response
        .text()
        .await
        .map_err(|e| ProviderError::HttpError(e.to_string()))?;
    serde_json::from_str(&text).map_err(|e| ProviderError::ParseError(e.to_string()))
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

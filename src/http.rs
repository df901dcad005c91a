//! Shared HTTP plumbing for provider clients.
//!
//! Maps transport failures and non-success responses onto
//! [`ProviderErrorKind`] so callers can tell a rejected credential from a
//! timeout without parsing messages. No request is retried here.

use std::time::Duration;

use civic_rag_core::{ProviderError, ProviderErrorKind};

/// Longest slice of an error response body kept in the error message.
const MAX_ERROR_BODY_CHARS: usize = 500;

const MAX_CONNECT_SECS: u64 = 10;

/// Build a client with the given request timeout.
pub fn client(timeout_secs: u64) -> Result<reqwest::Client, ProviderError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| ProviderError::new(ProviderErrorKind::Network, e.to_string()))
}

/// Build a client for long-lived streaming responses.
///
/// There is no whole-request deadline: `timeout_secs` bounds each read,
/// so a stream stays open while the server keeps sending.
pub fn streaming_client(timeout_secs: u64) -> Result<reqwest::Client, ProviderError> {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(timeout_secs.min(MAX_CONNECT_SECS)))
        .read_timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| ProviderError::new(ProviderErrorKind::Network, e.to_string()))
}

/// Classify a transport-level failure.
pub fn classify(provider: &str, err: reqwest::Error) -> ProviderError {
    let kind = if err.is_timeout() {
        ProviderErrorKind::Timeout
    } else if let Some(status) = err.status() {
        ProviderErrorKind::from_status(status.as_u16())
    } else if err.is_decode() {
        ProviderErrorKind::InvalidResponse
    } else {
        ProviderErrorKind::Network
    };
    ProviderError::new(kind, format!("{} request failed: {}", provider, err))
}

/// Turn a non-success response into an error, keeping the start of its body.
pub async fn error_from_response(provider: &str, response: reqwest::Response) -> ProviderError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let body: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
    ProviderError::new(
        ProviderErrorKind::from_status(status.as_u16()),
        format!("{} API error {}: {}", provider, status, body.trim()),
    )
}

/// Join a base URL and an endpoint path without doubling slashes.
pub fn endpoint(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_joins_cleanly() {
        assert_eq!(
            endpoint("https://api.openai.com/v1/", "/embeddings"),
            "https://api.openai.com/v1/embeddings"
        );
        assert_eq!(
            endpoint("http://localhost:11434", "api/embed"),
            "http://localhost:11434/api/embed"
        );
    }
}

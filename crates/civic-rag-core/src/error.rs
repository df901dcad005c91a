//! Error taxonomy for the question-answering pipeline.
//!
//! Every operation exposed to callers returns [`RagError`]. Failures that
//! originate at a remote provider (embeddings or chat completion) carry a
//! [`ProviderError`] whose [`ProviderErrorKind`] lets the caller tell a
//! configuration mistake (bad credential) from a transient failure
//! (timeout, rate limit) without parsing messages.

use thiserror::Error;

/// Convenience alias used across both crates.
pub type Result<T> = std::result::Result<T, RagError>;

/// Top-level error returned by pipeline operations.
#[derive(Debug, Error)]
pub enum RagError {
    /// Missing or unreadable source file, mismatched arguments, or a
    /// malformed credential. Raised before any index work starts.
    #[error("input error: {0}")]
    Input(String),

    /// The document cannot be indexed (no extractable text, broken PDF).
    #[error("content error: {0}")]
    Content(String),

    /// The persisted index is missing, corrupt, or could not be written.
    #[error("index storage error: {0}")]
    Storage(String),

    /// The embedding provider failed while building the index.
    #[error("embedding failed: {0}")]
    Embedding(#[source] ProviderError),

    /// The embedding provider failed while embedding a query.
    #[error("retrieval failed: {0}")]
    Retrieval(#[source] ProviderError),

    /// The language model failed while composing an answer.
    #[error("generation failed: {0}")]
    Generation(#[source] ProviderError),
}

impl RagError {
    pub fn input(msg: impl Into<String>) -> Self {
        RagError::Input(msg.into())
    }

    pub fn content(msg: impl Into<String>) -> Self {
        RagError::Content(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        RagError::Storage(msg.into())
    }

    /// The provider failure behind this error, if any.
    pub fn provider_error(&self) -> Option<&ProviderError> {
        match self {
            RagError::Embedding(e) | RagError::Retrieval(e) | RagError::Generation(e) => Some(e),
            _ => None,
        }
    }

    /// Whether retrying the same call later may succeed.
    ///
    /// Only provider timeouts, rate limits, network and server failures
    /// qualify. The pipeline itself never retries.
    pub fn is_transient(&self) -> bool {
        self.provider_error()
            .map(|e| e.kind.is_transient())
            .unwrap_or(false)
    }
}

/// Classification of a remote provider failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    /// HTTP 401/403: the credential was rejected.
    Auth,
    /// HTTP 429.
    RateLimited,
    /// The request did not complete within the client timeout.
    Timeout,
    /// Connection refused, DNS failure, reset.
    Network,
    /// HTTP 5xx.
    Server,
    /// Any other HTTP 4xx.
    Request,
    /// The provider answered, but not with what was asked for.
    InvalidResponse,
    /// The provider is switched off in configuration.
    Disabled,
}

impl ProviderErrorKind {
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            ProviderErrorKind::RateLimited
                | ProviderErrorKind::Timeout
                | ProviderErrorKind::Network
                | ProviderErrorKind::Server
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ProviderErrorKind::Auth => "authentication rejected",
            ProviderErrorKind::RateLimited => "rate limited",
            ProviderErrorKind::Timeout => "timed out",
            ProviderErrorKind::Network => "network failure",
            ProviderErrorKind::Server => "provider server error",
            ProviderErrorKind::Request => "request rejected",
            ProviderErrorKind::InvalidResponse => "invalid response",
            ProviderErrorKind::Disabled => "provider disabled",
        }
    }

    /// Map an HTTP status code to a failure kind.
    pub fn from_status(status: u16) -> Self {
        match status {
            401 | 403 => ProviderErrorKind::Auth,
            429 => ProviderErrorKind::RateLimited,
            500..=599 => ProviderErrorKind::Server,
            _ => ProviderErrorKind::Request,
        }
    }
}

impl std::fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure reported by (or while talking to) a remote provider.
#[derive(Debug, Clone, Error)]
#[error("{kind}: {message}")]
pub struct ProviderError {
    pub kind: ProviderErrorKind,
    pub message: String,
}

impl ProviderError {
    pub fn new(kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::InvalidResponse, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(ProviderErrorKind::from_status(401), ProviderErrorKind::Auth);
        assert_eq!(ProviderErrorKind::from_status(403), ProviderErrorKind::Auth);
        assert_eq!(
            ProviderErrorKind::from_status(429),
            ProviderErrorKind::RateLimited
        );
        assert_eq!(ProviderErrorKind::from_status(503), ProviderErrorKind::Server);
        assert_eq!(ProviderErrorKind::from_status(400), ProviderErrorKind::Request);
    }

    #[test]
    fn transient_only_for_provider_failures() {
        let timeout = RagError::Generation(ProviderError::new(ProviderErrorKind::Timeout, "60s"));
        assert!(timeout.is_transient());

        let auth = RagError::Retrieval(ProviderError::new(ProviderErrorKind::Auth, "bad key"));
        assert!(!auth.is_transient());

        assert!(!RagError::input("missing file").is_transient());
    }

    #[test]
    fn display_carries_cause() {
        let err = RagError::Generation(ProviderError::new(
            ProviderErrorKind::RateLimited,
            "HTTP 429: slow down",
        ));
        assert_eq!(
            err.to_string(),
            "generation failed: rate limited: HTTP 429: slow down"
        );
    }
}

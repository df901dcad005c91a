//! Provider API credentials.
//!
//! An [`ApiKey`] is validated once, before any index or network work, so
//! a pasted key with a stray newline fails fast as an input error rather
//! than as an opaque 401 halfway through an index build.

use civic_rag_core::RagError;

/// A syntactically valid provider API key. `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    /// Validate a raw key.
    ///
    /// Surrounding whitespace is trimmed. Empty keys and keys containing
    /// inner whitespace or control characters are rejected with
    /// [`RagError::Input`].
    pub fn parse(raw: &str) -> Result<Self, RagError> {
        let key = raw.trim();
        if key.is_empty() {
            return Err(RagError::input("API key is empty"));
        }
        if key.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(RagError::input(
                "API key contains whitespace or control characters",
            ));
        }
        Ok(Self(key.to_string()))
    }

    /// Read and validate a key from the environment variable `var`.
    pub fn from_env(var: &str) -> Result<Self, RagError> {
        match std::env::var(var) {
            Ok(raw) => Self::parse(&raw),
            Err(_) => Err(RagError::input(format!(
                "{} environment variable not set",
                var
            ))),
        }
    }

    /// Resolve the key from an explicit value, falling back to `var`.
    pub fn resolve(explicit: Option<&str>, var: &str) -> Result<Self, RagError> {
        match explicit {
            Some(raw) => Self::parse(raw),
            None => Self::from_env(var),
        }
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_and_accepts() {
        let key = ApiKey::parse("  sk-test-123\n").unwrap();
        assert_eq!(key.expose(), "sk-test-123");
    }

    #[test]
    fn rejects_empty() {
        assert!(matches!(ApiKey::parse("   "), Err(RagError::Input(_))));
    }

    #[test]
    fn rejects_inner_whitespace() {
        assert!(matches!(ApiKey::parse("sk-abc def"), Err(RagError::Input(_))));
        assert!(matches!(ApiKey::parse("sk-abc\u{7}"), Err(RagError::Input(_))));
    }

    #[test]
    fn debug_is_redacted() {
        let key = ApiKey::parse("sk-secret").unwrap();
        assert_eq!(format!("{:?}", key), "ApiKey(***)");
    }

    #[test]
    fn explicit_value_wins_over_env() {
        let key = ApiKey::resolve(Some("sk-explicit"), "CIVIC_RAG_TEST_UNSET_VAR").unwrap();
        assert_eq!(key.expose(), "sk-explicit");
    }

    #[test]
    fn missing_env_is_input_error() {
        let err = ApiKey::from_env("CIVIC_RAG_TEST_DEFINITELY_UNSET").unwrap_err();
        assert!(matches!(err, RagError::Input(_)));
    }
}

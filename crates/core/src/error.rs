//! Error types for the lingxi domain.
//!
//! Uses `thiserror` for ergonomic error definitions. Note how little lives
//! here: the resolver, invoker, and orchestrator all have non-throwing
//! contracts and report failures through envelopes and display payloads,
//! so only the oracle transport has real error types. Configuration errors
//! live next to the config loader.

use thiserror::Error;

/// Errors from the external text-completion service.
///
/// Every variant triggers the same caller behavior — fall through to the
/// deterministic rule engine — but the distinction matters for logs.
#[derive(Debug, Clone, Error)]
pub enum OracleError {
    #[error("Oracle not configured: {0}")]
    NotConfigured(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Malformed response: {0}")]
    Malformed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oracle_error_displays_correctly() {
        let err = OracleError::ApiError {
            status_code: 429,
            message: "Too many requests".into(),
        };
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Too many requests"));
    }

    #[test]
    fn not_configured_names_the_missing_key() {
        let err = OracleError::NotConfigured("LLM_API_KEY is not set".into());
        assert!(err.to_string().contains("LLM_API_KEY"));
    }
}

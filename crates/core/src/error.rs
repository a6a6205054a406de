//! Error types for the Parley domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error type.

use std::path::PathBuf;
use thiserror::Error;

// --- Bounded context errors ---

/// A failed exchange with a provider's text-generation endpoint.
///
/// The `Display` text of every variant is what the error classifier inspects,
/// so variants keep the provider's own wording in their message.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider (HTTP 429): {message}")]
    RateLimited {
        /// Seconds from a `Retry-After` header, when the provider sent one.
        retry_after_secs: Option<u64>,
        message: String,
    },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error at {path}: {reason}")]
    Io { path: PathBuf, reason: String },

    #[error("Failed to (de)serialize conversation state: {0}")]
    Serialization(String),
}

/// Terminal failure of one agent turn.
#[derive(Debug, Error)]
pub enum AgentError {
    /// The provider call failed and the retry policy gave up.
    #[error("{agent}: {source}")]
    Provider {
        agent: String,
        #[source]
        source: ProviderError,
    },

    /// The turn succeeded but its state could not be persisted.
    #[error("{agent}: {source}")]
    Store {
        agent: String,
        #[source]
        source: StoreError,
    },
}

impl AgentError {
    /// Name of the agent whose turn failed.
    pub fn agent(&self) -> &str {
        match self {
            Self::Provider { agent, .. } | Self::Store { agent, .. } => agent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_displays_correctly() {
        let err = ProviderError::ApiError {
            status_code: 400,
            message: "maximum context length is 8192 tokens".into(),
        };
        assert!(err.to_string().contains("400"));
        assert!(err.to_string().contains("maximum context length"));
    }

    #[test]
    fn rate_limited_keeps_provider_text() {
        let err = ProviderError::RateLimited {
            retry_after_secs: None,
            message: "Please retry after 20 seconds".into(),
        };
        let text = err.to_string();
        assert!(text.contains("429"));
        assert!(text.contains("retry after 20 seconds"));
    }

    #[test]
    fn agent_error_names_agent() {
        let err = AgentError::Provider {
            agent: "Claude".into(),
            source: ProviderError::Network("connection reset".into()),
        };
        assert_eq!(err.agent(), "Claude");
        assert!(err.to_string().starts_with("Claude:"));
    }
}

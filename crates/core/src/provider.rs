//! Provider trait: the abstraction over LLM backends.
//!
//! A Provider knows how to translate one windowed conversation into its
//! backend's request shape and turn the reply back into plain text. It is a
//! single request/response exchange; retries and windowing live above it.
//!
//! Implementations: OpenAI-compatible (OpenAI, xAI), Anthropic, Gemini.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::error::ProviderError;
use crate::message::Message;

/// Where a provider expects the persona instructions to live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SystemPromptPlacement {
    /// As a leading `system` message in the agent's own history.
    #[default]
    InHistory,
    /// Held outside the history; the transport injects it itself.
    Detached,
}

/// One outbound exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRequest {
    /// The model to use (e.g., "gpt-4", "claude-sonnet-4-20250514")
    pub model: String,

    /// The agent's persona prompt, for transports that send it out of band
    pub system_prompt: String,

    /// Windowed history; the final entry is the new `user` prompt
    pub messages: Vec<Message>,

    /// Temperature (0.0 = deterministic, 1.0 = creative)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

fn default_temperature() -> f32 {
    0.7
}

/// A complete response from a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResponse {
    /// The generated text
    pub content: String,

    /// Which model actually responded (may differ from requested)
    pub model: String,

    /// Token usage statistics
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

/// Token usage information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// The core Provider trait.
///
/// Every backend implements this trait. Agents call `complete()` without
/// knowing which backend is on the other side.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "openai", "anthropic").
    fn name(&self) -> &str;

    /// Whether a fresh history starts with a system message.
    fn system_prompt_placement(&self) -> SystemPromptPlacement {
        SystemPromptPlacement::InHistory
    }

    /// Send a request and get a complete response.
    async fn complete(&self, request: ProviderRequest) -> std::result::Result<ProviderResponse, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoProvider;

    #[async_trait]
    impl Provider for EchoProvider {
        fn name(&self) -> &str {
            "echo"
        }

        async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
            let last = request.messages.last().map(|m| m.content.clone()).unwrap_or_default();
            Ok(ProviderResponse {
                content: last,
                model: request.model,
                usage: None,
            })
        }
    }

    #[test]
    fn request_temperature_default() {
        let req: ProviderRequest = serde_json::from_str(
            r#"{"model":"gpt-4","system_prompt":"","messages":[]}"#,
        )
        .unwrap();
        assert!((req.temperature - 0.7).abs() < f32::EPSILON);
        assert!(req.max_tokens.is_none());
    }

    #[tokio::test]
    async fn default_placement_is_in_history() {
        let provider = EchoProvider;
        assert_eq!(provider.system_prompt_placement(), SystemPromptPlacement::InHistory);

        let resp = provider
            .complete(ProviderRequest {
                model: "echo-1".into(),
                system_prompt: String::new(),
                messages: vec![Message::user("ping")],
                temperature: 0.0,
                max_tokens: None,
            })
            .await
            .unwrap();
        assert_eq!(resp.content, "ping");
    }
}

//! Provider factory: turns an `[[agents]]` entry into a live transport.

use parley_config::{AgentConfig, ProviderKind};
use parley_core::error::ProviderError;
use parley_core::provider::Provider;
use std::sync::Arc;
use tracing::debug;

use crate::anthropic::AnthropicProvider;
use crate::gemini::GeminiProvider;
use crate::openai_compat::OpenAiCompatProvider;

/// Default endpoint for each provider kind.
pub fn default_base_url(kind: ProviderKind) -> &'static str {
    match kind {
        ProviderKind::OpenAi => "https://api.openai.com/v1",
        ProviderKind::Xai => "https://api.x.ai/v1",
        ProviderKind::Anthropic => "https://api.anthropic.com",
        ProviderKind::Gemini => "https://generativelanguage.googleapis.com",
    }
}

/// Build the transport for one agent.
///
/// Fails with `NotConfigured` when no API key was resolved for the agent.
pub fn build_provider(agent: &AgentConfig) -> Result<Arc<dyn Provider>, ProviderError> {
    let api_key = agent
        .api_key
        .clone()
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| {
            ProviderError::NotConfigured(format!(
                "{}: no API key (set `api_key` or {})",
                agent.name,
                agent.provider.api_key_env()
            ))
        })?;

    let base_url = agent
        .api_url
        .clone()
        .unwrap_or_else(|| default_base_url(agent.provider).to_string());

    debug!(
        agent = %agent.name,
        provider = agent.provider.as_str(),
        base_url = %base_url,
        "Building provider"
    );

    let provider: Arc<dyn Provider> = match agent.provider {
        ProviderKind::OpenAi | ProviderKind::Xai => Arc::new(OpenAiCompatProvider::new(
            agent.provider.as_str(),
            base_url,
            api_key,
        )),
        ProviderKind::Anthropic => {
            Arc::new(AnthropicProvider::new(api_key).with_base_url(base_url))
        }
        ProviderKind::Gemini => Arc::new(GeminiProvider::new(api_key).with_base_url(base_url)),
    };

    Ok(provider)
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::provider::SystemPromptPlacement;

    fn agent(kind: ProviderKind, key: Option<&str>) -> AgentConfig {
        let mut a = AgentConfig::new("Tester", kind, "model-x", "be brief");
        a.api_key = key.map(String::from);
        a
    }

    #[test]
    fn builds_each_kind() {
        let cases = [
            (ProviderKind::OpenAi, "openai", SystemPromptPlacement::InHistory),
            (ProviderKind::Xai, "xai", SystemPromptPlacement::InHistory),
            (ProviderKind::Anthropic, "anthropic", SystemPromptPlacement::InHistory),
            (ProviderKind::Gemini, "gemini", SystemPromptPlacement::Detached),
        ];
        for (kind, name, placement) in cases {
            let p = build_provider(&agent(kind, Some("k"))).unwrap();
            assert_eq!(p.name(), name);
            assert_eq!(p.system_prompt_placement(), placement);
        }
    }

    #[test]
    fn missing_key_is_not_configured() {
        let err = build_provider(&agent(ProviderKind::OpenAi, None)).err().unwrap();
        assert!(matches!(err, ProviderError::NotConfigured(_)));
        assert!(err.to_string().contains("OPENAI_API_KEY"));

        let err = build_provider(&agent(ProviderKind::Gemini, Some("  "))).err().unwrap();
        assert!(matches!(err, ProviderError::NotConfigured(_)));
    }

    #[test]
    fn xai_default_url() {
        assert_eq!(default_base_url(ProviderKind::Xai), "https://api.x.ai/v1");
    }
}

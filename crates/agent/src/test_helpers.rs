//! Shared test helpers for agent and driver tests.

use async_trait::async_trait;
use parley_core::error::ProviderError;
use parley_core::provider::{
    Provider, ProviderRequest, ProviderResponse, SystemPromptPlacement, Usage,
};
use std::collections::VecDeque;
use std::sync::Mutex;

/// A provider that replays scripted outcomes in order and records every
/// request it sees. Once the script runs dry it answers
/// `"<name> reply #<n>"`.
pub struct ScriptedProvider {
    name: String,
    placement: SystemPromptPlacement,
    script: Mutex<VecDeque<Result<ProviderResponse, ProviderError>>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            placement: SystemPromptPlacement::InHistory,
            script: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn detached(mut self) -> Self {
        self.placement = SystemPromptPlacement::Detached;
        self
    }

    pub fn with_responses(self, responses: Vec<Result<ProviderResponse, ProviderError>>) -> Self {
        self.script.lock().unwrap().extend(responses);
        self
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn system_prompt_placement(&self) -> SystemPromptPlacement {
        self.placement
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let n = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request);
            requests.len()
        };
        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| text(&format!("{} reply #{n}", self.name)))
    }
}

/// A successful text response.
pub fn text(content: &str) -> Result<ProviderResponse, ProviderError> {
    Ok(ProviderResponse {
        content: content.to_string(),
        model: "mock-model".into(),
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
    })
}

/// A bare 429 with no wait hint.
pub fn rate_limited() -> ProviderError {
    ProviderError::RateLimited {
        retry_after_secs: None,
        message: "Too many requests".into(),
    }
}

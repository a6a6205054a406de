//! The provider agent: one transport, one message store, one context window.

use async_trait::async_trait;
use parley_config::{AgentConfig, AppConfig};
use parley_core::agent::ChatAgent;
use parley_core::error::AgentError;
use parley_core::message::{ConversationId, Message, Role};
use parley_core::provider::{Provider, ProviderRequest};
use parley_core::state::StateStore;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::context::ContextWindow;
use crate::retry::{RetryController, RetryPolicy};
use crate::store::MessageStore;

/// Run-wide settings every agent is built with.
#[derive(Debug, Clone)]
pub struct AgentOptions {
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub window: ContextWindow,
    pub retry: RetryPolicy,
}

impl AgentOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            temperature: config.temperature,
            max_tokens: Some(config.max_tokens),
            window: ContextWindow::from_config(&config.context),
            retry: RetryPolicy::from_config(&config.retry),
        }
    }
}

impl Default for AgentOptions {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// A participant backed by a `Provider`.
///
/// Request shape and system-prompt placement belong to the provider; this
/// type owns the history, windowing, retries and persistence.
pub struct ConversationAgent {
    name: String,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    provider: Arc<dyn Provider>,
    state_store: Arc<dyn StateStore>,
    messages: MessageStore,
    window: ContextWindow,
    retry: RetryController,
}

impl ConversationAgent {
    /// A fresh agent; nothing is loaded.
    pub fn new(
        name: impl Into<String>,
        model: impl Into<String>,
        system_prompt: impl Into<String>,
        provider: Arc<dyn Provider>,
        state_store: Arc<dyn StateStore>,
        conversation_id: ConversationId,
        options: AgentOptions,
    ) -> Self {
        let placement = provider.system_prompt_placement();
        Self {
            name: name.into(),
            model: model.into(),
            temperature: options.temperature,
            max_tokens: options.max_tokens,
            provider,
            state_store,
            messages: MessageStore::fresh(conversation_id, system_prompt, placement),
            window: options.window,
            retry: RetryController::new(options.retry),
        }
    }

    /// Build an agent from config and pick up its saved state for
    /// `conversation_id`, starting fresh when there is none.
    pub async fn open(
        config: &AgentConfig,
        provider: Arc<dyn Provider>,
        state_store: Arc<dyn StateStore>,
        conversation_id: ConversationId,
        options: AgentOptions,
    ) -> Result<Self, AgentError> {
        let mut agent = Self::new(
            &config.name,
            &config.model,
            &config.system_prompt,
            provider,
            state_store,
            conversation_id,
            options,
        );
        agent.reset_context();
        if agent.load_state().await? {
            info!(
                agent = %agent.name,
                messages = agent.message_count(),
                "Resumed saved conversation"
            );
        } else {
            debug!(agent = %agent.name, "Starting fresh conversation");
        }
        Ok(agent)
    }

    /// Restore the window to its maximum.
    pub fn reset_context(&mut self) {
        self.window.reset();
    }

    pub fn context_limit(&self) -> usize {
        self.window.limit()
    }

    pub fn conversation_id(&self) -> &ConversationId {
        self.messages.conversation_id()
    }

    pub fn system_prompt(&self) -> &str {
        self.messages.system_prompt()
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    fn store_error(&self, source: parley_core::error::StoreError) -> AgentError {
        AgentError::Store {
            agent: self.name.clone(),
            source,
        }
    }
}

#[async_trait]
impl ChatAgent for ConversationAgent {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&mut self, text: &str) -> Result<String, AgentError> {
        // A saved state may end with the very prompt we are about to send.
        let reused = self
            .messages
            .last()
            .is_some_and(|m| m.role == Role::User && m.content == text);
        if reused {
            debug!(agent = %self.name, "Reusing unanswered prompt from saved state");
        } else {
            self.messages.append(Message::user(text));
        }

        let provider = self.provider.as_ref();
        let history = &self.messages;
        let model = &self.model;
        let (temperature, max_tokens) = (self.temperature, self.max_tokens);

        let result = self
            .retry
            .run(&self.name, &mut self.window, move |window: &ContextWindow| {
                let request = ProviderRequest {
                    model: model.clone(),
                    system_prompt: history.system_prompt().to_string(),
                    messages: window.window(history.all()),
                    temperature,
                    max_tokens,
                };
                provider.complete(request)
            })
            .await;

        match result {
            Ok(response) => {
                self.messages.append(Message::assistant(response.content.clone()));
                debug!(
                    agent = %self.name,
                    model = %response.model,
                    chars = response.content.len(),
                    "Received reply"
                );
                self.save_state().await?;
                Ok(response.content)
            }
            Err(source) => {
                if !reused {
                    self.messages.pop();
                }
                warn!(agent = %self.name, error = %source, "Turn failed");
                Err(AgentError::Provider {
                    agent: self.name.clone(),
                    source,
                })
            }
        }
    }

    fn history(&self) -> &[Message] {
        self.messages.all()
    }

    async fn save_state(&self) -> Result<(), AgentError> {
        self.state_store
            .save(&self.name, &self.messages.to_state())
            .await
            .map_err(|e| self.store_error(e))
    }

    async fn load_state(&mut self) -> Result<bool, AgentError> {
        let Some(state) = self
            .state_store
            .load(&self.name)
            .await
            .map_err(|e| self.store_error(e))?
        else {
            return Ok(false);
        };

        if state.conversation_id != *self.messages.conversation_id() {
            debug!(
                agent = %self.name,
                saved = %state.conversation_id,
                current = %self.messages.conversation_id(),
                "Saved state belongs to another conversation"
            );
            return Ok(false);
        }

        Ok(self.messages.load(state))
    }
}

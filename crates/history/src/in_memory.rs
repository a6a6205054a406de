//! In-memory state store, useful for testing and throwaway runs.

use async_trait::async_trait;
use parley_core::error::StoreError;
use parley_core::message::ConversationState;
use parley_core::state::{StateStore, agent_slug};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Keeps states in a map keyed by agent slug. Clones share the same map.
#[derive(Clone, Default)]
pub struct InMemoryStateStore {
    states: Arc<RwLock<HashMap<String, ConversationState>>>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a state, as if a previous run had saved it.
    pub async fn insert(&self, agent: &str, state: ConversationState) {
        self.states.write().await.insert(agent_slug(agent), state);
    }

    /// Number of agents with saved state.
    pub async fn len(&self) -> usize {
        self.states.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.states.read().await.is_empty()
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn load(&self, agent: &str) -> Result<Option<ConversationState>, StoreError> {
        Ok(self.states.read().await.get(&agent_slug(agent)).cloned())
    }

    async fn save(&self, agent: &str, state: &ConversationState) -> Result<(), StoreError> {
        self.states
            .write()
            .await
            .insert(agent_slug(agent), state.clone());
        Ok(())
    }

    async fn list(&self) -> Result<Vec<String>, StoreError> {
        let mut slugs: Vec<String> = self.states.read().await.keys().cloned().collect();
        slugs.sort();
        Ok(slugs)
    }
}

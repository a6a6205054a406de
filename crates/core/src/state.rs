//! StateStore trait: durable per-agent conversation state.
//!
//! Each agent's `ConversationState` is stored under a filesystem-safe slug of
//! the agent's name. A missing record means "start fresh" for that agent.

use async_trait::async_trait;
use crate::error::StoreError;
use crate::message::ConversationState;

/// The core StateStore trait.
///
/// Implementations: JSON files on disk, in-memory (for testing).
#[async_trait]
pub trait StateStore: Send + Sync {
    /// The backend name (e.g., "file", "in_memory").
    fn name(&self) -> &str;

    /// Load the state saved for `agent`, if any.
    async fn load(&self, agent: &str) -> std::result::Result<Option<ConversationState>, StoreError>;

    /// Replace the state saved for `agent`.
    async fn save(&self, agent: &str, state: &ConversationState) -> std::result::Result<(), StoreError>;

    /// Slugs of every agent with saved state.
    async fn list(&self) -> std::result::Result<Vec<String>, StoreError>;
}

/// Filesystem-safe key for an agent name.
///
/// Lowercases, turns whitespace runs into `_` and drops anything outside
/// `[a-z0-9_-]`: "Chat GPT" → "chat_gpt".
pub fn agent_slug(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut in_space = false;
    for ch in name.trim().chars() {
        if ch.is_whitespace() {
            if !in_space {
                slug.push('_');
            }
            in_space = true;
            continue;
        }
        in_space = false;
        for lower in ch.to_lowercase() {
            if lower.is_ascii_alphanumeric() || lower == '_' || lower == '-' {
                slug.push(lower);
            }
        }
    }
    slug
}

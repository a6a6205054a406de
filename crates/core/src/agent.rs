//! The capability set every conversational agent exposes to the driver.

use async_trait::async_trait;
use crate::error::AgentError;
use crate::message::{Message, Role};

/// One participant in a round-robin conversation.
///
/// The driver only ever talks to agents through this trait; request shapes,
/// system-prompt placement and session handling stay inside each agent.
#[async_trait]
pub trait ChatAgent: Send + Sync {
    /// Display name, also the key its state is persisted under.
    fn name(&self) -> &str;

    /// Send `text` as the next `user` turn and return the reply.
    async fn send(&mut self, text: &str) -> std::result::Result<String, AgentError>;

    /// Full ordered history. Callers must treat it as read-only.
    fn history(&self) -> &[Message];

    /// Persist the current state.
    async fn save_state(&self) -> std::result::Result<(), AgentError>;

    /// Replace the store with persisted state for the current conversation.
    ///
    /// Returns `false`, leaving the store untouched, when nothing was saved or
    /// the saved conversation id belongs to another run.
    async fn load_state(&mut self) -> std::result::Result<bool, AgentError>;

    /// Number of messages with the given role.
    fn count_by_role(&self, role: Role) -> usize {
        self.history().iter().filter(|m| m.role == role).count()
    }

    /// Completed turns (assistant replies).
    fn turn_count(&self) -> usize {
        self.count_by_role(Role::Assistant)
    }

    /// Non-system messages in the history.
    fn message_count(&self) -> usize {
        self.history().iter().filter(|m| !m.is_system()).count()
    }
}

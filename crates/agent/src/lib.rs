//! Conversational agents for Parley.
//!
//! Each agent pairs one provider transport with its own message store and
//! context window:
//!
//! 1. **Append** the incoming text as a `user` message
//! 2. **Window** the history (system message + most recent turns)
//! 3. **Call** the provider under the retry controller, shrinking the window
//!    on size errors and waiting out rate limits
//! 4. **Append** the reply as an `assistant` message and persist
//!
//! The [`ConversationDriver`] rotates a prompt through the agents round-robin.

pub mod context;
pub mod conversation;
pub mod driver;
pub mod retry;
pub mod store;

#[cfg(test)]
mod test_helpers;

pub use context::{ContextLimit, ContextWindow, Reduction, windowed_messages};
pub use conversation::{AgentOptions, ConversationAgent};
pub use driver::{ConversationDriver, HookError, RunOutcome, StopReason, TurnHook, TurnRecord};
pub use retry::{FailureKind, RetryController, RetryPolicy, RetryState, classify};
pub use store::MessageStore;

//! # Parley Core
//!
//! Domain types, traits, and error definitions for Parley, a runner for
//! turn-based conversations between several AI providers.
//! This crate performs **no I/O**; it defines the domain model that all
//! other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every seam is a trait here. Implementations live in their respective
//! crates. This enables:
//! - Swapping backends via configuration
//! - Easy testing with scripted providers and in-memory state
//! - Clean dependency graph (all crates depend inward on core)

pub mod agent;
pub mod error;
pub mod message;
pub mod provider;
pub mod state;

// Re-export key types at crate root for ergonomics
pub use agent::ChatAgent;
pub use error::{AgentError, ProviderError, StoreError};
pub use message::{ConversationId, ConversationState, Message, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, SystemPromptPlacement, Usage};
pub use state::{StateStore, agent_slug};

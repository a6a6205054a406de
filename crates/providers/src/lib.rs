//! LLM provider transports for Parley.
//!
//! All providers implement the `parley_core::Provider` trait. The factory
//! picks the transport for each configured agent.

pub mod anthropic;
pub mod factory;
pub mod gemini;
mod http;
pub mod openai_compat;

pub use anthropic::AnthropicProvider;
pub use factory::{build_provider, default_base_url};
pub use gemini::{GeminiProvider, normalize_turns};
pub use openai_compat::OpenAiCompatProvider;

//! Parley: round-robin conversations between AI models.
//!
//! The binary is a thin clap wrapper; everything it does is exposed here so
//! integration tests can drive whole runs against scripted providers.

pub mod commands;
pub mod hooks;
pub mod report;
pub mod session;

pub use report::RunReport;
pub use session::{
    Resolution, RunContext, RunOverrides, SessionError, open_agents, resolve_conversation,
    run_session,
};

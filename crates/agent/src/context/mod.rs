//! Context window policy.
//!
//! Decides which slice of an agent's history goes out on each call and
//! shrinks that slice when a provider reports the request is too large.

pub mod window;

pub use window::{ContextLimit, ContextWindow, Reduction, reduce_limit, windowed_messages};

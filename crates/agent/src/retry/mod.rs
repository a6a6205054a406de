//! Error classification and the retry state machine wrapped around every
//! provider call.

pub mod classify;
pub mod controller;

pub use classify::{FailureKind, classify, classify_text, extract_wait};
pub use controller::{RetryController, RetryPolicy, RetryState, countdown};

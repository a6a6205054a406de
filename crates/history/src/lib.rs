//! Durable conversation-state storage for Parley.
//!
//! All stores implement the `parley_core::StateStore` trait.

pub mod file_store;
pub mod in_memory;

pub use file_store::FileStateStore;
pub use in_memory::InMemoryStateStore;

//! Persistence for feedflow
//!
//! The engine and scheduler depend only on the [`Store`] trait. [`MemoryStore`]
//! is the in-process implementation used by the CLI and by tests.

pub mod memory;
pub mod store;

pub use memory::MemoryStore;
pub use store::{Store, StoreResult};

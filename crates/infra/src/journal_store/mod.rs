//! Append-only journal persistence boundary.
//!
//! This module defines an infrastructure-facing abstraction for storing and
//! loading tenant-scoped journals without making any storage assumptions.

pub mod in_memory;
pub mod r#trait;

pub use in_memory::InMemoryJournalStore;
pub use r#trait::{JournalStore, JournalStoreError, PostedEntry};

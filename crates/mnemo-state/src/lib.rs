//! Mnemo-State: Versioned Record Store for Agent Memories
//!
//! This crate is the persistence boundary of Mnemo. The recall engine never
//! talks to a database directly; it goes through [`MemoryRepository`].
//!
//! ## Layer 0 - Data/Persistence
//!
//! Focus: typed rows, version history, and commits.
//!
//! ## Key Components
//!
//! - `MemoryRepository`: The store boundary (query, insert, update, delete,
//!   history, commit)
//! - `SurrealHandle`: SurrealDB implementation with staged changes and
//!   per-row version history
//! - `fakes::InMemoryRepository`: In-memory implementation for tests
//! - `coerce`: Lenient row-to-entity field coercion

pub mod coerce;
mod error;
pub mod fakes;
mod handle;
mod migrations;
mod schema;
pub mod storage_traits;

pub use error::{StateError, StorageError};
pub use handle::{default_data_dir, local_store_path, CloudConfig, SurrealHandle};
pub use schema::{
    Category, CommitId, CommitRecord, Decision, Memory, MemoryLink, MemoryVersion, ParseEnumError,
    Status,
};
pub use storage_traits::{MemoryFilter, MemoryOrder, MemoryRepository, StorageResult};

/// Result type for mnemo-state operations
pub type Result<T> = std::result::Result<T, StateError>;

//! Error types for mnemo-state

use thiserror::Error;

/// Errors raised while connecting to or preparing the SurrealDB backend
#[derive(Error, Debug)]
pub enum StateError {
    /// Database connection error
    #[error("Database connection failed: {0}")]
    Connection(String),

    /// Database query error
    #[error("Database query failed: {0}")]
    Query(String),

    /// Schema setup error
    #[error("Schema setup failed: {0}")]
    SchemaSetup(String),
}

impl From<surrealdb::Error> for StateError {
    fn from(err: surrealdb::Error) -> Self {
        StateError::Query(err.to_string())
    }
}

/// Errors returned through the [`crate::MemoryRepository`] boundary
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("memory not found: {id}")]
    MemoryNotFound { id: String },

    #[error("decision not found: {id}")]
    DecisionNotFound { id: String },

    #[error("no version of memory {id} at commit {commit}")]
    VersionNotFound { id: String, commit: String },

    #[error("memory already exists: {id}")]
    DuplicateMemory { id: String },

    #[error("commit failed: {0}")]
    Commit(String),

    #[error("serialization failed: {0}")]
    Serialization(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}

impl From<surrealdb::Error> for StorageError {
    fn from(err: surrealdb::Error) -> Self {
        StorageError::Backend(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

impl From<StateError> for StorageError {
    fn from(err: StateError) -> Self {
        StorageError::Backend(err.to_string())
    }
}

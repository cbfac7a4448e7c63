//! Error types for the Mnemo engine.

use mnemo_state::{ParseEnumError, StorageError};
use thiserror::Error;

/// Errors raised by embedding and text-generation providers.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("missing credential: {0} is not set")]
    MissingCredential(&'static str),

    #[error("provider request failed: {0}")]
    Http(String),

    #[error("provider returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("unexpected provider response: {0}")]
    Response(String),

    #[error("provider request failed after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        ProviderError::Http(err.to_string())
    }
}

/// Errors produced by engine operations.
#[derive(Debug, Error)]
pub enum MnemoError {
    /// Rejected before any store access
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("storage error: {0}")]
    Storage(StorageError),

    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),
}

impl From<StorageError> for MnemoError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::MemoryNotFound { id } => MnemoError::NotFound { kind: "memory", id },
            StorageError::DecisionNotFound { id } => MnemoError::NotFound {
                kind: "decision",
                id,
            },
            StorageError::VersionNotFound { id, commit } => MnemoError::NotFound {
                kind: "memory version",
                id: format!("{id}@{commit}"),
            },
            other => MnemoError::Storage(other),
        }
    }
}

impl From<ParseEnumError> for MnemoError {
    fn from(err: ParseEnumError) -> Self {
        MnemoError::Validation(err.to_string())
    }
}

impl MnemoError {
    pub fn memory_not_found(id: impl Into<String>) -> Self {
        MnemoError::NotFound {
            kind: "memory",
            id: id.into(),
        }
    }

    pub fn decision_not_found(id: impl Into<String>) -> Self {
        MnemoError::NotFound {
            kind: "decision",
            id: id.into(),
        }
    }

    /// True for errors raised before touching the store
    pub fn is_validation(&self) -> bool {
        matches!(self, MnemoError::Validation(_))
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, MnemoError>;

/// Reject values outside `[0.0, 1.0]` (NaN included).
pub fn validate_unit_interval(field: &str, value: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(MnemoError::Validation(format!(
            "{field} must be between 0.0 and 1.0, got {value}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_interval_bounds() {
        assert!(validate_unit_interval("priority", 0.0).is_ok());
        assert!(validate_unit_interval("priority", 1.0).is_ok());
        assert!(validate_unit_interval("priority", 1.01).unwrap_err().is_validation());
        assert!(validate_unit_interval("outcome", -0.1).is_err());
        assert!(validate_unit_interval("outcome", f64::NAN).is_err());
    }

    #[test]
    fn test_storage_not_found_maps_to_not_found() {
        let err: MnemoError = StorageError::MemoryNotFound { id: "m1".into() }.into();
        assert_eq!(err.to_string(), "memory not found: m1");

        let err: MnemoError = StorageError::Backend("boom".into()).into();
        assert!(matches!(err, MnemoError::Storage(_)));
    }
}

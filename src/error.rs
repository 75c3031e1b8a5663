//! Error types for DualCopy
//!
//! This module defines all error types used throughout the replication engine.
//! Most of these never escape a run: per-item failures are logged and counted,
//! and the entry points fold fatal ones into a [`crate::core::RunOutcome`].

use thiserror::Error;

/// Main error type for DualCopy operations
#[derive(Error, Debug)]
pub enum DualCopyError {
    /// A remote store call failed
    #[error("Store error during {operation} on '{node_id}': {message}")]
    Store {
        /// Store call that failed, e.g. `list_children`
        operation: &'static str,
        /// Node the call was made on
        node_id: String,
        /// Failure reported by the store
        message: String,
    },

    /// Node does not exist in the store
    #[error("Node not found: {0}")]
    NotFound(String),

    /// Node has the wrong kind for the requested operation
    #[error("Node '{0}' is not a folder")]
    NotAFolder(String),

    /// Persisted checkpoint is missing fields or malformed
    #[error("Invalid checkpoint: {0}")]
    InvalidCheckpoint(String),

    /// Durable state store failure
    #[error("State store error: {0}")]
    State(String),

    /// Snapshot (de)serialization error
    #[error("Snapshot error: {0}")]
    Snapshot(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error with context
    #[error("{context}: {source}")]
    WithContext {
        /// What was being attempted
        context: String,
        /// Underlying error
        #[source]
        source: Box<DualCopyError>,
    },
}

impl DualCopyError {
    /// Create a store call error
    pub fn store(
        operation: &'static str,
        node_id: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Store {
            operation,
            node_id: node_id.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigError(message.into())
    }

    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Self::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Per-item failures that are logged and skipped rather than aborting a run
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Store { .. } | Self::NotFound(_) => true,
            Self::WithContext { source, .. } => source.is_transient(),
            _ => false,
        }
    }
}

/// Result type alias for DualCopy operations
pub type Result<T> = std::result::Result<T, DualCopyError>;

impl From<serde_json::Error> for DualCopyError {
    fn from(err: serde_json::Error) -> Self {
        DualCopyError::Snapshot(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_display() {
        let err = DualCopyError::store("copy_file", "f-12", "quota exceeded");
        assert_eq!(
            err.to_string(),
            "Store error during copy_file on 'f-12': quota exceeded"
        );
    }

    #[test]
    fn test_transient_classification() {
        assert!(DualCopyError::store("list", "x", "boom").is_transient());
        assert!(DualCopyError::NotFound("x".into()).is_transient());
        assert!(!DualCopyError::InvalidCheckpoint("missing key".into()).is_transient());

        let wrapped = DualCopyError::NotFound("x".into()).with_context("enumerating");
        assert!(wrapped.is_transient());
        assert_eq!(wrapped.to_string(), "enumerating: Node not found: x");
    }

    #[test]
    fn test_variant_fields() {
        match DualCopyError::store("create_folder", "p-1", "denied") {
            DualCopyError::Store { operation, node_id, message } => {
                assert_eq!(operation, "create_folder");
                assert_eq!(node_id, "p-1");
                assert_eq!(message, "denied");
            }
            other => panic!("unexpected {:?}", other),
        }

        let wrapped = DualCopyError::State("disk full".into()).with_context("saving checkpoint");
        let source = std::error::Error::source(&wrapped).unwrap();
        assert_eq!(source.to_string(), "State store error: disk full");
    }
}

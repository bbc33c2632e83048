//! Error types for the fidelity harness
//!
//! Two layers, both built with `thiserror`:
//!
//! - [`StoreError`]: what a database handle reports when it rejects or
//!   cannot perform an operation.
//! - [`FidelityError`]: what the harness reports to its caller. Every
//!   variant falls into exactly one [`ErrorKind`], so a caller can tell
//!   "validate was called too early" from "the content diverged" from
//!   "the database refused the operation".

use thiserror::Error;

use crate::mismatch::Mismatch;

/// Result type alias for harness operations
pub type Result<T> = std::result::Result<T, FidelityError>;

/// Result type alias for database handle operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

// =============================================================================
// StoreError
// =============================================================================

/// Failure reported by a database handle
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The collection does not exist
    #[error("ns not found: {namespace}")]
    NamespaceNotFound {
        /// `db.collection`
        namespace: String,
    },

    /// The collection already exists
    #[error("collection already exists: {namespace}")]
    NamespaceExists {
        /// `db.collection`
        namespace: String,
    },

    /// Creation options were rejected
    #[error("invalid collection options: {0}")]
    InvalidOptions(String),

    /// A unique index already holds this key
    #[error("E11000 duplicate key error index: {index} dup key: {key}")]
    DuplicateKey {
        /// Index name
        index: String,
        /// Offending key, rendered as JSON
        key: String,
    },

    /// An index with this name exists with a different definition
    #[error("index with name {name} already exists with different options")]
    IndexConflict {
        /// Index name
        name: String,
    },

    /// No index with this name
    #[error("index not found with name [{name}]")]
    IndexNotFound {
        /// Index name
        name: String,
    },

    /// No document with this ordering key
    #[error("no document with _id {id}")]
    DocumentNotFound {
        /// Ordering key, rendered as JSON
        id: String,
    },

    /// Any other command failure
    #[error("{command} failed: {message}")]
    CommandFailed {
        /// Command name
        command: String,
        /// Server message
        message: String,
    },
}

impl StoreError {
    /// Generic command failure
    pub fn command(command: impl Into<String>, message: impl Into<String>) -> Self {
        StoreError::CommandFailed {
            command: command.into(),
            message: message.into(),
        }
    }
}

// =============================================================================
// FidelityError
// =============================================================================

/// Classification of a [`FidelityError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Caller misuse (validate before record)
    Programming,
    /// Captured state diverged from the reference
    Mismatch,
    /// The database rejected an operation or broke a persistence post-condition
    Collaborator,
    /// Configuration could not be loaded or parsed
    Configuration,
}

/// Error returned by harness operations
#[derive(Debug, Error)]
pub enum FidelityError {
    /// `validate` was called before `record`
    #[error("validateCollectionData called, but data is not initialized")]
    Uninitialized,

    /// Captured state diverged from the reference
    #[error("{0}")]
    Mismatch(Box<Mismatch>),

    /// The database failed an operation issued by the harness
    #[error("{operation} failed: {source}")]
    Collaborator {
        /// Operation being performed (`createCollection`, `insert`, ...)
        operation: String,
        /// Underlying database error
        #[source]
        source: StoreError,
    },

    /// The database accepted every operation but the result disagrees with
    /// what was issued (an index or document silently went missing)
    #[error("{check}: expected {expected}, got {actual}")]
    Persistence {
        /// Which post-condition failed
        check: &'static str,
        /// Count the harness issued
        expected: u64,
        /// Count the database reports
        actual: u64,
    },

    /// Invalid configuration
    #[error("configuration error: {0}")]
    Config(String),
}

impl FidelityError {
    /// Wrap a database failure with the operation that triggered it
    pub fn collaborator(operation: impl Into<String>, source: StoreError) -> Self {
        FidelityError::Collaborator {
            operation: operation.into(),
            source,
        }
    }

    /// Which class of failure this is
    pub fn kind(&self) -> ErrorKind {
        match self {
            FidelityError::Uninitialized => ErrorKind::Programming,
            FidelityError::Mismatch(_) => ErrorKind::Mismatch,
            FidelityError::Collaborator { .. } | FidelityError::Persistence { .. } => {
                ErrorKind::Collaborator
            }
            FidelityError::Config(_) => ErrorKind::Configuration,
        }
    }

    /// The mismatch payload, if this is a mismatch
    pub fn as_mismatch(&self) -> Option<&Mismatch> {
        match self {
            FidelityError::Mismatch(m) => Some(m.as_ref()),
            _ => None,
        }
    }

    /// Whether this is a content mismatch
    pub fn is_mismatch(&self) -> bool {
        self.kind() == ErrorKind::Mismatch
    }
}

impl From<Mismatch> for FidelityError {
    fn from(m: Mismatch) -> Self {
        FidelityError::Mismatch(Box::new(m))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mismatch::MismatchKind;
    use serde_json::json;
    use std::error::Error as _;

    #[test]
    fn test_error_display_uninitialized() {
        let msg = FidelityError::Uninitialized.to_string();
        assert!(msg.contains("not initialized"));
    }

    #[test]
    fn test_error_display_mismatch() {
        let m = Mismatch::whole(
            MismatchKind::Metadata,
            json!({"count": 1}),
            json!({"count": 2}),
            vec![],
        );
        let err: FidelityError = m.into();
        assert!(err.to_string().starts_with("collection metadata not equal"));
        assert_eq!(err.as_mismatch().map(|m| m.kind), Some(MismatchKind::Metadata));
    }

    #[test]
    fn test_error_display_collaborator() {
        let err = FidelityError::collaborator(
            "insert",
            StoreError::DuplicateKey {
                index: "_id_".to_string(),
                key: "{ : 0 }".to_string(),
            },
        );
        let msg = err.to_string();
        assert!(msg.contains("insert failed"));
        assert!(msg.contains("E11000"));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_error_display_persistence() {
        let err = FidelityError::Persistence {
            check: "counts not equal after inserts",
            expected: 10,
            actual: 9,
        };
        assert_eq!(err.to_string(), "counts not equal after inserts: expected 10, got 9");
    }

    #[test]
    fn test_error_kinds_are_distinct() {
        let mismatch: FidelityError =
            Mismatch::whole(MismatchKind::Data, json!(null), json!(null), vec![]).into();
        assert_eq!(FidelityError::Uninitialized.kind(), ErrorKind::Programming);
        assert_eq!(mismatch.kind(), ErrorKind::Mismatch);
        assert_eq!(
            FidelityError::collaborator("stats", StoreError::command("collStats", "boom")).kind(),
            ErrorKind::Collaborator
        );
        assert_eq!(
            FidelityError::Persistence { check: "x", expected: 1, actual: 0 }.kind(),
            ErrorKind::Collaborator
        );
        assert_eq!(FidelityError::Config("bad".into()).kind(), ErrorKind::Configuration);
        assert!(mismatch.is_mismatch());
        assert!(!FidelityError::Uninitialized.is_mismatch());
    }

    #[test]
    fn test_store_error_display() {
        let err = StoreError::NamespaceNotFound {
            namespace: "test.missing".to_string(),
        };
        assert_eq!(err.to_string(), "ns not found: test.missing");
        assert_eq!(
            StoreError::IndexNotFound { name: "a_1".into() }.to_string(),
            "index not found with name [a_1]"
        );
    }
}

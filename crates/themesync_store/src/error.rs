//! Error types for ledger operations.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for ledger operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur while reading or writing the ledger.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The ledger file exists but cannot be parsed.
    #[error("ledger {path} is corrupted: {message}")]
    Corrupted {
        /// Path of the offending file.
        path: PathBuf,
        /// What was wrong with it.
        message: String,
    },

    /// No entries exist for the collection.
    #[error("collection not found: {0}")]
    CollectionNotFound(String),

    /// The collection exists but has no entry for the key.
    #[error("key {key} not found in collection {collection}")]
    KeyNotFound {
        /// The collection searched.
        collection: String,
        /// The missing key.
        key: String,
    },

    /// Collection or key names must be non-empty.
    #[error("invalid key: {0}")]
    InvalidKey(String),
}

impl StoreError {
    /// Returns true for the two "nothing stored here" conditions.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StoreError::CollectionNotFound(_) | StoreError::KeyNotFound { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_classification() {
        assert!(StoreError::CollectionNotFound("a.js".into()).is_not_found());
        assert!(StoreError::KeyNotFound {
            collection: "a.js".into(),
            key: "dev".into()
        }
        .is_not_found());
        assert!(!StoreError::InvalidKey("empty key".into()).is_not_found());
        assert!(!StoreError::Corrupted {
            path: PathBuf::from("x"),
            message: "bad".into()
        }
        .is_not_found());
    }

    #[test]
    fn error_display() {
        let err = StoreError::KeyNotFound {
            collection: "layout/theme.liquid".into(),
            key: "staging".into(),
        };
        assert_eq!(
            err.to_string(),
            "key staging not found in collection layout/theme.liquid"
        );
    }
}

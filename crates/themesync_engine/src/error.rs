//! Error types for the sync engine.

use crate::config::ConfigError;
use std::io;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during sync operations.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Ledger error.
    #[error("ledger error: {0}")]
    Store(#[from] themesync_store::StoreError),

    /// Configuration error.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Local filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The remote store rejected or failed a request.
    #[error("[{environment}] remote error: {message}")]
    Remote {
        /// Environment the request targeted.
        environment: String,
        /// Error message.
        message: String,
    },

    /// The asset does not exist.
    #[error("[{environment}] asset not found: {key}")]
    AssetNotFound {
        /// Environment that was asked.
        environment: String,
        /// Asset key.
        key: String,
    },

    /// The asset exists but the environment's rules exclude it from sync.
    #[error("[{environment}] asset is not synchronised: {key}")]
    Ignored {
        /// Environment whose rules matched.
        environment: String,
        /// Asset key.
        key: String,
    },

    /// The environment does not accept mutations.
    #[error("[{environment}] environment is read-only")]
    ReadOnly {
        /// Environment name.
        environment: String,
    },

    /// The remote store applied an event but recording it in the ledger
    /// failed.
    #[error("[{environment}] {key} changed remotely but the ledger was not updated: {source}")]
    LedgerUpdate {
        /// Environment the event targeted.
        environment: String,
        /// Asset key.
        key: String,
        /// Why the ledger write failed.
        source: Box<SyncError>,
    },

    /// A pipeline worker stopped before draining its queue.
    #[error("[{environment}] sync worker failed: {message}")]
    Worker {
        /// Environment the worker served.
        environment: String,
        /// What happened.
        message: String,
    },

    /// The event queue was closed while events were still being sent.
    #[error("[{environment}] event queue closed")]
    QueueClosed {
        /// Environment the queue served.
        environment: String,
    },
}

impl SyncError {
    /// Creates a remote error for `environment`.
    pub fn remote(environment: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Remote {
            environment: environment.into(),
            message: message.into(),
        }
    }

    /// Returns true if the error means the asset is simply not there.
    pub fn is_not_found(&self) -> bool {
        match self {
            SyncError::AssetNotFound { .. } => true,
            SyncError::Io(e) => e.kind() == io::ErrorKind::NotFound,
            SyncError::Store(e) => e.is_not_found(),
            _ => false,
        }
    }
}

//! Core error types for invsync-core

use thiserror::Error;

use invsync_api::Domain;
use invsync_probe::ProbeError;

/// Snapshot or metadata storage failure
#[derive(Error, Debug, Clone)]
pub enum StoreError {
    /// Database could not be opened or its schema created
    #[error("failed to open store: {0}")]
    Open(String),

    /// Read or write failed; the previous snapshot is left intact
    #[error("store I/O failed: {0}")]
    Io(String),

    /// A stored document could not be decoded
    #[error("corrupt stored row in {table}: {reason}")]
    Corrupt {
        /// Table holding the row
        table: String,
        /// Decoder message
        reason: String,
    },
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Io(e.to_string())
    }
}

/// Event delivery failure
#[derive(Error, Debug, Clone)]
pub enum EmitError {
    /// Event could not be encoded
    #[error("failed to serialize event: {0}")]
    Serialize(String),

    /// Push function returned a failure status
    #[error("push rejected with status {0}")]
    Rejected(i32),
}

/// Errors that can occur in engine operations
#[derive(Error, Debug, Clone)]
pub enum CoreError {
    /// Probe failed for one domain
    #[error("scan of {domain} failed: {source}")]
    Scan {
        /// Domain being scanned
        domain: Domain,
        /// Underlying probe error
        #[source]
        source: ProbeError,
    },

    /// Snapshot or metadata storage failed
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Invalid configuration
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// Normalizer rules could not be loaded
    #[error("normalizer rules error: {0}")]
    Rules(String),

    /// Actor communication error
    #[error("actor communication error: {0}")]
    ActorError(String),

    /// Inventory is switched off in configuration
    #[error("inventory module is disabled")]
    Disabled,
}

impl CoreError {
    /// Check if the failing operation will be retried on the next cycle
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, CoreError::Scan { .. } | CoreError::Store(StoreError::Io(_)))
    }
}

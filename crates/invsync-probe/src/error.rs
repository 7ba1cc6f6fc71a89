//! Error types for invsync-probe

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while probing host state
#[derive(Error, Debug, Clone)]
pub enum ProbeError {
    /// osquery is not installed on this host
    #[error("osquery not found: {0}")]
    OsqueryNotFound(String),

    /// Query execution failed
    #[error("query execution failed: {0}")]
    QueryFailed(String),

    /// Failed to parse query results
    #[error("parse error: {0}")]
    ParseError(String),

    /// Process spawn or I/O failure
    #[error("execution error: {0}")]
    ExecutionError(String),

    /// Table not available on this platform
    #[error("table not available: {0}")]
    TableNotAvailable(String),

    /// Query timeout
    #[error("query timeout after {0:?}")]
    Timeout(Duration),

    /// Probe reported no data where at least one row is required
    #[error("no data: {0}")]
    NoData(String),
}

impl ProbeError {
    /// Check if error is retryable
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProbeError::ExecutionError(_) | ProbeError::Timeout(_) | ProbeError::QueryFailed(_)
        )
    }

    /// Check if osquery needs to be installed
    #[must_use]
    pub fn needs_installation(&self) -> bool {
        matches!(self, ProbeError::OsqueryNotFound(_))
    }
}

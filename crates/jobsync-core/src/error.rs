//! Error types for the JobSync core.
//!
//! None of these errors is fatal to the process. Each one is confined to the
//! definition, firing or poll tick that produced it.

use thiserror::Error;

/// A cron expression could not be parsed. The definition is skipped.
#[derive(Debug, Error)]
#[error("Invalid cron expression '{expression}': {source}")]
pub struct ParseError {
    pub expression: String,
    #[source]
    pub source: cron::error::Error,
}

/// No job implementation is registered under the given id. The definition is
/// skipped.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Job implementation not found: {implementation_id}")]
pub struct LookupError {
    pub implementation_id: String,
}

/// A job body failed. The owning definition gets disabled.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExecutionError {
    /// The job returned an error.
    #[error("Job '{implementation_id}' failed: {message}")]
    Failed {
        implementation_id: String,
        message: String,
    },

    /// The job panicked.
    #[error("Job '{implementation_id}' panicked: {message}")]
    Panicked {
        implementation_id: String,
        message: String,
    },
}

/// Definition store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Could not open or reach the store.
    #[error("Store connection error: {0}")]
    Connection(String),

    /// A query or update failed.
    #[error("Store query error: {0}")]
    Query(String),

    /// No definition with the given id exists.
    #[error("Definition not found: {0}")]
    NotFound(String),

    /// A stored value could not be decoded.
    #[error("Store serialization error: {0}")]
    Serialization(String),
}

impl From<tokio_rusqlite::Error> for StoreError {
    fn from(err: tokio_rusqlite::Error) -> Self {
        match err {
            tokio_rusqlite::Error::ConnectionClosed => StoreError::Connection(err.to_string()),
            other => StoreError::Query(other.to_string()),
        }
    }
}

/// Why a single definition could not be scheduled during reconciliation.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Lookup(#[from] LookupError),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

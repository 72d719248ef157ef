//! Error types reported by drivers and connection providers

use thiserror::Error;

/// Driver-level error for sqlbatch operations
#[derive(Error, Debug)]
pub enum DbError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("Missing value for placeholder: {0}")]
    MissingParameter(String),

    /// A native batched call failed part-way; `index` is the 0-based
    /// position of the offending bind set within the call and `source` is
    /// the error that bind set raised.
    #[error("Batched call failed at bind set {index}")]
    BatchedCall {
        index: usize,
        #[source]
        source: Box<DbError>,
    },

    #[error("Connection is closed")]
    Closed,

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Not supported: {0}")]
    NotSupported(String),

    #[error("{0}")]
    Other(String),
}

impl DbError {
    /// Wrap `self` as the failure of bind set `index` in a batched call
    pub fn at_bind_set(self, index: usize) -> Self {
        DbError::BatchedCall {
            index,
            source: Box::new(self),
        }
    }
}

/// Result type alias for driver operations
pub type Result<T> = std::result::Result<T, DbError>;

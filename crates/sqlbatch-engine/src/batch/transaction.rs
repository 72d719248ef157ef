//! Transaction boundaries around chunks
//!
//! Who owns commit and rollback is decided once per request, before the
//! first chunk runs. When the executor owns the boundary, every chunk gets
//! its own transaction; otherwise statements run inside whatever the caller
//! has open, or under the engine's autocommit.

use serde::Serialize;
use sqlbatch_core::{Connection, Transaction};

use crate::error::{BatchError, BatchResult};

/// Who controls transaction boundaries for a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionMode {
    /// The executor begins and commits (or rolls back) one transaction per chunk
    Owned,
    /// The caller has a transaction open; the executor never touches it
    CallerOwned,
    /// Transactions are disabled for the request; statements autocommit
    Unmanaged,
}

impl TransactionMode {
    /// Decide the mode for a request on `connection`
    pub fn resolve(connection: &dyn Connection, manage_transaction: bool) -> Self {
        if connection.in_transaction() {
            TransactionMode::CallerOwned
        } else if manage_transaction {
            TransactionMode::Owned
        } else {
            TransactionMode::Unmanaged
        }
    }

    /// Whether the executor commits chunks itself
    pub fn is_owned(self) -> bool {
        self == TransactionMode::Owned
    }
}

/// Transaction boundary for one chunk.
///
/// Holds an open transaction only in `Owned` mode. Dropping a scope without
/// calling `commit` or `abort` leaves cleanup to the driver's transaction.
pub struct TransactionScope {
    transaction: Option<Box<dyn Transaction>>,
    chunk_index: usize,
}

impl TransactionScope {
    /// Open the boundary for `chunk_index`
    pub async fn begin(
        connection: &dyn Connection,
        mode: TransactionMode,
        chunk_index: usize,
    ) -> BatchResult<Self> {
        let transaction = match mode {
            TransactionMode::Owned => {
                tracing::trace!(chunk = chunk_index, "beginning chunk transaction");
                Some(
                    connection
                        .begin_transaction()
                        .await
                        .map_err(BatchError::Connection)?,
                )
            }
            TransactionMode::CallerOwned | TransactionMode::Unmanaged => None,
        };
        Ok(Self {
            transaction,
            chunk_index,
        })
    }

    /// Whether this scope will commit
    pub fn is_owned(&self) -> bool {
        self.transaction.is_some()
    }

    /// Commit the chunk, if this scope owns a transaction.
    ///
    /// A failed commit leaves the chunk rolled back; the driver's
    /// `Transaction::commit` guarantees that.
    pub async fn commit(self) -> BatchResult<()> {
        let Some(transaction) = self.transaction else {
            return Ok(());
        };
        transaction.commit().await.map_err(|source| {
            tracing::error!(chunk = self.chunk_index, error = %source, "chunk commit failed");
            BatchError::Commit {
                chunk_index: self.chunk_index,
                source,
            }
        })?;
        tracing::trace!(chunk = self.chunk_index, "chunk committed");
        Ok(())
    }

    /// Roll back after `error`, if this scope owns a transaction, and hand
    /// `error` back. A rollback failure is logged; `error` is still returned.
    pub async fn abort(self, error: BatchError) -> BatchError {
        if let Some(transaction) = self.transaction {
            match transaction.rollback().await {
                Ok(()) => {
                    tracing::warn!(chunk = self.chunk_index, "chunk rolled back");
                }
                Err(rollback_err) => {
                    tracing::warn!(
                        chunk = self.chunk_index,
                        error = %rollback_err,
                        "rollback failed after chunk error"
                    );
                }
            }
        }
        error
    }
}

impl std::fmt::Debug for TransactionScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionScope")
            .field("chunk_index", &self.chunk_index)
            .field("owned", &self.is_owned())
            .finish()
    }
}

//! Connection, transaction and provider traits implemented by drivers

use async_trait::async_trait;
use std::sync::Arc;

use crate::{BindSet, DbError, Result, RowCursor, Statement, WriteOutcome};

/// A live engine session.
///
/// Statements run on the connection itself. While a transaction returned by
/// `begin_transaction` is open, those statements belong to it, and
/// `in_transaction` reports `true`. A connection is not meant to serve two
/// batches at the same time.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Get the driver name (e.g., "sqlite")
    fn driver_name(&self) -> &str;

    /// Execute a statement that returns rows
    async fn query(&self, statement: &Statement, binds: &BindSet) -> Result<RowCursor>;

    /// Execute a statement that modifies data (INSERT/UPDATE/DELETE/DDL)
    async fn execute(&self, statement: &Statement, binds: &BindSet) -> Result<WriteOutcome>;

    /// Execute one write statement for every bind set in a single call.
    ///
    /// Drivers with a native array-binding call should override this. The
    /// default issues one `execute` per bind set and reports the index of
    /// the first failing bind set through `DbError::BatchedCall`.
    async fn execute_many(&self, statement: &Statement, binds: &[BindSet]) -> Result<WriteOutcome> {
        let mut total = WriteOutcome {
            bind_sets: binds.len(),
            batched: true,
            ..WriteOutcome::default()
        };
        for (index, bind) in binds.iter().enumerate() {
            let outcome = self
                .execute(statement, bind)
                .await
                .map_err(|e| e.at_bind_set(index))?;
            total.affected_rows += outcome.affected_rows;
            if outcome.last_insert_id.is_some() {
                total.last_insert_id = outcome.last_insert_id;
            }
        }
        tracing::trace!(
            driver = self.driver_name(),
            bind_sets = binds.len(),
            affected_rows = total.affected_rows,
            "batched call emulated with single executes"
        );
        Ok(total)
    }

    /// Begin a transaction
    async fn begin_transaction(&self) -> Result<Box<dyn Transaction>>;

    /// Whether a transaction is currently open on this connection
    fn in_transaction(&self) -> bool;

    /// Close the connection
    async fn close(&self) -> Result<()>;

    /// Check if the connection is closed
    fn is_closed(&self) -> bool;
}

/// A transaction opened on a connection
#[async_trait]
pub trait Transaction: Send + Sync {
    /// Commit the transaction.
    ///
    /// If the commit fails, the transaction is rolled back before the error
    /// is returned; the connection is never left inside it.
    async fn commit(self: Box<Self>) -> Result<()>;

    /// Rollback the transaction
    async fn rollback(self: Box<Self>) -> Result<()>;
}

/// Hands out live connections to the batch engine.
///
/// How connections are created or pooled is up to the implementation; a
/// connection returned from `acquire` is owned by the caller, which closes
/// it when done.
#[async_trait]
pub trait ConnectionProvider: Send + Sync {
    async fn acquire(&self) -> Result<Arc<dyn Connection>>;
}

#[async_trait]
impl<P: ConnectionProvider + ?Sized> ConnectionProvider for Arc<P> {
    async fn acquire(&self) -> Result<Arc<dyn Connection>> {
        (**self).acquire().await
    }
}

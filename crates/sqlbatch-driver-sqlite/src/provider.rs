//! Connection provider opening SQLite connections on demand

use async_trait::async_trait;
use sqlbatch_core::{Connection, ConnectionProvider, Result};
use std::sync::Arc;

use crate::SqliteConnection;

/// Opens a fresh `SqliteConnection` to the same database for every `acquire`.
///
/// Every `:memory:` connection is a separate database, so batches that must
/// see each other's writes need a file path.
#[derive(Debug, Clone)]
pub struct SqliteProvider {
    path: String,
}

impl SqliteProvider {
    pub fn new(path: impl Into<String>) -> Self {
        let path = path.into();
        tracing::debug!(path = %path, "SQLite provider initialized");
        Self { path }
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

#[async_trait]
impl ConnectionProvider for SqliteProvider {
    #[tracing::instrument(skip(self), fields(path = %self.path))]
    async fn acquire(&self) -> Result<Arc<dyn Connection>> {
        let conn = SqliteConnection::open(&self.path).inspect_err(|e| {
            tracing::error!(error = %e, "failed to open SQLite database");
        })?;
        Ok(Arc::new(conn))
    }
}

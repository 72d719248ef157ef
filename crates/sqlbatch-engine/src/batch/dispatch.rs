//! Execution strategy dispatch
//!
//! A request is classified once, before any connection is touched:
//!
//! | statements | bind sets                | strategy |
//! |------------|--------------------------|----------|
//! | n ≥ 1      | one empty set            | Direct   |
//! | 1          | m ≥ 1, not one empty set | FanOut   |
//! | n ≥ 2      | n                        | Zipped   |
//! | otherwise  |                          | error    |

use serde::Serialize;
use sqlbatch_core::{BindSet, Connection, DbError, Statement};

use super::planner::Chunk;
use super::results::{ExecutionHandle, Outcome};
use crate::config::EngineConfig;
use crate::error::{BatchError, BatchResult, ExecutionFailure};

/// How a request's statements are paired with its bind sets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Every statement once, without parameters
    Direct,
    /// One statement, once per bind set; the only strategy that is chunked
    FanOut,
    /// `statement[i]` with `bind[i]`
    Zipped,
}

impl Strategy {
    /// Classify a request by its statement count and bind sets
    pub fn classify(statement_count: usize, binds: &[BindSet]) -> BatchResult<Self> {
        let lone_empty = matches!(binds, [only] if only.is_empty());
        match (statement_count, binds.len()) {
            (0, _) => Err(BatchError::InputShape("no statements given".to_string())),
            (_, _) if lone_empty => Ok(Strategy::Direct),
            (1, m) if m >= 1 => Ok(Strategy::FanOut),
            (n, m) if n == m => Ok(Strategy::Zipped),
            (statements, binds) => Err(BatchError::CardinalityMismatch { statements, binds }),
        }
    }

    /// Whether the request may be split across several chunks
    pub fn is_chunked(self) -> bool {
        self == Strategy::FanOut
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Strategy::Direct => "direct",
            Strategy::FanOut => "fan_out",
            Strategy::Zipped => "zipped",
        }
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Runs one chunk on a connection, stopping at the first failure
pub(crate) struct Dispatcher<'a> {
    pub connection: &'a dyn Connection,
    pub config: &'a EngineConfig,
    pub statements: &'a [Statement],
}

impl Dispatcher<'_> {
    pub(crate) async fn run_chunk(
        &self,
        strategy: Strategy,
        chunk: Chunk<'_>,
    ) -> BatchResult<Vec<ExecutionHandle>> {
        tracing::debug!(
            strategy = %strategy,
            chunk = chunk.index,
            bind_sets = chunk.len(),
            "dispatching chunk"
        );
        match strategy {
            Strategy::Direct => self.run_direct(chunk).await,
            Strategy::FanOut => self.run_fan_out(chunk).await,
            Strategy::Zipped => self.run_zipped(chunk).await,
        }
    }

    async fn run_direct(&self, chunk: Chunk<'_>) -> BatchResult<Vec<ExecutionHandle>> {
        let empty = BindSet::new();
        let mut handles = Vec::with_capacity(self.statements.len());
        for (index, statement) in self.statements.iter().enumerate() {
            let outcome = self
                .run_single(statement, &empty)
                .await
                .map_err(|e| self.failure(statement, &[], chunk.index, None, e))?;
            handles.push(ExecutionHandle::new(
                statement.clone(),
                index,
                chunk.index,
                0..0,
                outcome,
            ));
        }
        Ok(handles)
    }

    async fn run_fan_out(&self, chunk: Chunk<'_>) -> BatchResult<Vec<ExecutionHandle>> {
        let Some(statement) = self.statements.first() else {
            return Err(BatchError::InputShape("no statements given".to_string()));
        };

        if !statement.returns_rows() {
            return self.run_fan_out_write(statement, chunk).await.map(|h| vec![h]);
        }

        // Reads cannot share a native batched call; one query per bind set.
        let mut handles = Vec::with_capacity(chunk.len());
        for (i, binds) in chunk.binds.iter().enumerate() {
            let ordinal = chunk.offset + i;
            let cursor = self
                .connection
                .query(statement, binds)
                .await
                .map_err(|e| {
                    self.failure(statement, std::slice::from_ref(binds), chunk.index, Some(ordinal), e)
                })?;
            handles.push(ExecutionHandle::new(
                statement.clone(),
                0,
                chunk.index,
                ordinal..ordinal + 1,
                Outcome::Read(cursor),
            ));
        }
        Ok(handles)
    }

    async fn run_fan_out_write(&self, statement: &Statement, chunk: Chunk<'_>) -> BatchResult<ExecutionHandle> {
        let outcome = match self.connection.execute_many(statement, chunk.binds).await {
            Ok(outcome) => outcome,
            Err(DbError::BatchedCall { index, source }) if index < chunk.len() => {
                let failed = &chunk.binds[index..=index];
                return Err(self.failure(
                    statement,
                    failed,
                    chunk.index,
                    Some(chunk.offset + index),
                    *source,
                ));
            }
            Err(e) => {
                let ordinal = (chunk.len() == 1).then_some(chunk.offset);
                return Err(self.failure(statement, chunk.binds, chunk.index, ordinal, e));
            }
        };

        if outcome.bind_sets != chunk.len() {
            return Err(self.failure(
                statement,
                chunk.binds,
                chunk.index,
                None,
                DbError::Other(format!(
                    "driver reported {} of {} bind sets executed",
                    outcome.bind_sets,
                    chunk.len()
                )),
            ));
        }

        Ok(ExecutionHandle::new(
            statement.clone(),
            0,
            chunk.index,
            chunk.bind_range(),
            Outcome::Write(outcome),
        ))
    }

    async fn run_zipped(&self, chunk: Chunk<'_>) -> BatchResult<Vec<ExecutionHandle>> {
        let mut handles = Vec::with_capacity(self.statements.len());
        for (index, (statement, binds)) in self.statements.iter().zip(chunk.binds).enumerate() {
            let ordinal = chunk.offset + index;
            let outcome = self.run_single(statement, binds).await.map_err(|e| {
                self.failure(statement, std::slice::from_ref(binds), chunk.index, Some(ordinal), e)
            })?;
            handles.push(ExecutionHandle::new(
                statement.clone(),
                index,
                chunk.index,
                ordinal..ordinal + 1,
                outcome,
            ));
        }
        Ok(handles)
    }

    async fn run_single(&self, statement: &Statement, binds: &BindSet) -> Result<Outcome, DbError> {
        if statement.returns_rows() {
            self.connection.query(statement, binds).await.map(Outcome::Read)
        } else {
            self.connection.execute(statement, binds).await.map(Outcome::Write)
        }
    }

    fn failure(
        &self,
        statement: &Statement,
        binds: &[BindSet],
        chunk_index: usize,
        bind_ordinal: Option<usize>,
        source: DbError,
    ) -> BatchError {
        // Logs always get redacted values; the returned error follows the config.
        tracing::error!(
            chunk = chunk_index,
            bind_ordinal,
            bind_sets = binds.len(),
            binds = %binds.first().map(|b| b.redacted().to_string()).unwrap_or_default(),
            sql = %statement.preview(),
            error = %source,
            "statement failed"
        );
        ExecutionFailure {
            statement: statement.sql().to_string(),
            binds: binds.iter().map(|b| self.config.report_binds(b)).collect(),
            chunk_index,
            bind_ordinal,
            source,
        }
        .into()
    }
}

//! Result aggregation
//!
//! Every physical execution yields an `ExecutionHandle`. Handles are
//! collected in execution order into a `ResultCollection`, which is what
//! `BatchExecutor::execute` returns.

use std::ops::Range;

use sqlbatch_core::{DbError, Row, RowCursor, Statement, WriteOutcome};
use uuid::Uuid;

use super::transaction::TransactionMode;

/// What a single execution produced
#[derive(Debug)]
pub enum Outcome {
    /// Rows, readable through a cursor
    Read(RowCursor),
    /// Write metadata only
    Write(WriteOutcome),
}

/// Outcome of one physical execution, tagged with where it came from
#[derive(Debug)]
pub struct ExecutionHandle {
    statement: Statement,
    statement_index: usize,
    chunk_index: usize,
    bind_range: Range<usize>,
    outcome: Outcome,
}

impl ExecutionHandle {
    pub fn new(
        statement: Statement,
        statement_index: usize,
        chunk_index: usize,
        bind_range: Range<usize>,
        outcome: Outcome,
    ) -> Self {
        Self {
            statement,
            statement_index,
            chunk_index,
            bind_range,
            outcome,
        }
    }

    pub fn statement(&self) -> &Statement {
        &self.statement
    }

    /// Position of the statement in the request
    pub fn statement_index(&self) -> usize {
        self.statement_index
    }

    pub fn chunk_index(&self) -> usize {
        self.chunk_index
    }

    /// Request bind positions the execution covered
    pub fn bind_range(&self) -> Range<usize> {
        self.bind_range.clone()
    }

    pub fn outcome(&self) -> &Outcome {
        &self.outcome
    }

    pub fn into_outcome(self) -> Outcome {
        self.outcome
    }

    pub fn is_read(&self) -> bool {
        matches!(self.outcome, Outcome::Read(_))
    }

    pub fn cursor(&mut self) -> Option<&mut RowCursor> {
        match &mut self.outcome {
            Outcome::Read(cursor) => Some(cursor),
            Outcome::Write(_) => None,
        }
    }

    pub fn write_outcome(&self) -> Option<&WriteOutcome> {
        match &self.outcome {
            Outcome::Write(outcome) => Some(outcome),
            Outcome::Read(_) => None,
        }
    }

    /// Rows affected by a write; 0 for reads
    pub fn affected_rows(&self) -> u64 {
        self.write_outcome().map_or(0, |o| o.affected_rows)
    }

    /// Every remaining row of a read; empty for writes
    pub fn fetch_all(&mut self) -> Result<Vec<Row>, DbError> {
        match &mut self.outcome {
            Outcome::Read(cursor) => cursor.fetch_all(),
            Outcome::Write(_) => Ok(Vec::new()),
        }
    }

    /// Whether the handle holds no engine resource
    pub fn is_closed(&self) -> bool {
        match &self.outcome {
            Outcome::Read(cursor) => cursor.is_closed(),
            Outcome::Write(_) => true,
        }
    }

    pub fn close(&mut self) {
        if let Outcome::Read(cursor) = &mut self.outcome {
            cursor.close();
        }
    }

    fn materialize(&mut self) -> Result<(), DbError> {
        match &mut self.outcome {
            Outcome::Read(cursor) => cursor.materialize(),
            Outcome::Write(_) => Ok(()),
        }
    }
}

/// A read cursor failed while being drained into memory
#[derive(Debug)]
pub(crate) struct MaterializeError {
    pub statement: Statement,
    pub chunk_index: usize,
    pub source: DbError,
}

/// Accumulates handles across chunks, in order
#[derive(Debug)]
pub(crate) struct ResultCollector {
    eager_close: bool,
    handles: Vec<ExecutionHandle>,
    chunks: usize,
}

impl ResultCollector {
    pub(crate) fn new(eager_close: bool) -> Self {
        Self {
            eager_close,
            handles: Vec::new(),
            chunks: 0,
        }
    }

    /// Take one chunk's handles. With eager close, read cursors are drained
    /// into memory first; if that fails the chunk's handles are discarded.
    pub(crate) fn push_chunk(&mut self, mut handles: Vec<ExecutionHandle>) -> Result<(), MaterializeError> {
        if self.eager_close {
            Self::materialize_all(&mut handles)?;
        }
        self.handles.extend(handles);
        self.chunks += 1;
        Ok(())
    }

    /// Drain every still-live cursor so no engine resource outlives the connection
    pub(crate) fn materialize_remaining(&mut self) -> Result<(), MaterializeError> {
        Self::materialize_all(&mut self.handles)
    }

    fn materialize_all(handles: &mut [ExecutionHandle]) -> Result<(), MaterializeError> {
        for handle in handles.iter_mut() {
            handle
                .materialize()
                .map_err(|source| MaterializeError {
                    statement: handle.statement.clone(),
                    chunk_index: handle.chunk_index,
                    source,
                })?;
        }
        Ok(())
    }

    pub(crate) fn finish(self, batch_id: Uuid, transaction_mode: TransactionMode) -> ResultCollection {
        ResultCollection {
            batch_id,
            transaction_mode,
            chunk_count: self.chunks,
            handles: self.handles,
        }
    }
}

/// Ordered outcomes of every execution in one request
#[derive(Debug)]
pub struct ResultCollection {
    batch_id: Uuid,
    transaction_mode: TransactionMode,
    chunk_count: usize,
    handles: Vec<ExecutionHandle>,
}

impl ResultCollection {
    /// Identifier the request was logged under
    pub fn batch_id(&self) -> Uuid {
        self.batch_id
    }

    /// How transaction boundaries were handled
    pub fn transaction_mode(&self) -> TransactionMode {
        self.transaction_mode
    }

    pub fn chunk_count(&self) -> usize {
        self.chunk_count
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ExecutionHandle> {
        self.handles.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut ExecutionHandle> {
        self.handles.get_mut(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ExecutionHandle> {
        self.handles.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, ExecutionHandle> {
        self.handles.iter_mut()
    }

    /// Total rows affected by every write
    pub fn affected_rows(&self) -> u64 {
        self.handles.iter().map(ExecutionHandle::affected_rows).sum()
    }

    /// Rows of every read, concatenated in execution order
    pub fn fetch_all(&mut self) -> Result<Vec<Row>, DbError> {
        let mut rows = Vec::new();
        for handle in &mut self.handles {
            rows.extend(handle.fetch_all()?);
        }
        Ok(rows)
    }

    /// First row of the first read that has one
    pub fn fetch_one(&mut self) -> Result<Option<Row>, DbError> {
        for handle in &mut self.handles {
            if let Some(cursor) = handle.cursor()
                && let Some(row) = cursor.next_row()?
            {
                return Ok(Some(row));
            }
        }
        Ok(None)
    }

    /// Release every cursor that is still open
    pub fn close_all(&mut self) {
        for handle in &mut self.handles {
            handle.close();
        }
    }

    /// Whether every handle has released its engine resource
    pub fn all_closed(&self) -> bool {
        self.handles.iter().all(ExecutionHandle::is_closed)
    }

    pub fn into_handles(self) -> Vec<ExecutionHandle> {
        self.handles
    }
}

impl IntoIterator for ResultCollection {
    type Item = ExecutionHandle;
    type IntoIter = std::vec::IntoIter<ExecutionHandle>;

    fn into_iter(self) -> Self::IntoIter {
        self.handles.into_iter()
    }
}

impl<'a> IntoIterator for &'a ResultCollection {
    type Item = &'a ExecutionHandle;
    type IntoIter = std::slice::Iter<'a, ExecutionHandle>;

    fn into_iter(self) -> Self::IntoIter {
        self.handles.iter()
    }
}

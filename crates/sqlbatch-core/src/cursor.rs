//! Row cursors and write outcomes returned by a single execution

use std::collections::VecDeque;
use std::sync::Arc;

use crate::{ColumnMeta, Result, Row};

/// Source of rows behind a cursor.
///
/// Drivers that stream from the engine implement this directly; drivers
/// that fetch everything up front hand their rows to `RowCursor::buffered`.
pub trait RowSource: Send {
    /// Fetch the next row, or `None` once the source is exhausted
    fn next_row(&mut self) -> Result<Option<Row>>;

    /// Release engine-side resources. Called at most once.
    fn close(&mut self) {}
}

struct BufferedRows(VecDeque<Row>);

impl RowSource for BufferedRows {
    fn next_row(&mut self) -> Result<Option<Row>> {
        Ok(self.0.pop_front())
    }
}

enum CursorState {
    Live(Box<dyn RowSource>),
    Materialized(VecDeque<Row>),
    Closed,
}

/// Live handle over the rows of one read execution.
///
/// A cursor stays open until it is exhausted or explicitly closed.
/// `materialize` drains the source into memory and releases it, after which
/// rows are still readable but no engine resource is held.
pub struct RowCursor {
    columns: Arc<[ColumnMeta]>,
    state: CursorState,
    rows_read: usize,
}

impl RowCursor {
    pub fn new(columns: Vec<ColumnMeta>, source: Box<dyn RowSource>) -> Self {
        Self {
            columns: columns.into(),
            state: CursorState::Live(source),
            rows_read: 0,
        }
    }

    /// Cursor over rows that were already fetched
    pub fn buffered(columns: Vec<ColumnMeta>, rows: Vec<Row>) -> Self {
        Self::new(columns, Box::new(BufferedRows(rows.into())))
    }

    pub fn columns(&self) -> &[ColumnMeta] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Number of rows handed out so far
    pub fn rows_read(&self) -> usize {
        self.rows_read
    }

    /// Whether the engine-side source has been released
    pub fn is_closed(&self) -> bool {
        !matches!(self.state, CursorState::Live(_))
    }

    /// Whether no further rows can be read
    pub fn is_exhausted(&self) -> bool {
        match &self.state {
            CursorState::Live(_) => false,
            CursorState::Materialized(rows) => rows.is_empty(),
            CursorState::Closed => true,
        }
    }

    pub fn next_row(&mut self) -> Result<Option<Row>> {
        let row = match &mut self.state {
            CursorState::Live(source) => match source.next_row() {
                Ok(Some(row)) => Some(row),
                Ok(None) => {
                    self.close();
                    None
                }
                Err(e) => {
                    self.close();
                    return Err(e);
                }
            },
            CursorState::Materialized(rows) => rows.pop_front(),
            CursorState::Closed => None,
        };
        if row.is_some() {
            self.rows_read += 1;
        }
        Ok(row)
    }

    /// Read up to `n` rows
    pub fn fetch_many(&mut self, n: usize) -> Result<Vec<Row>> {
        let mut rows = Vec::with_capacity(n.min(1024));
        while rows.len() < n {
            match self.next_row()? {
                Some(row) => rows.push(row),
                None => break,
            }
        }
        Ok(rows)
    }

    /// Read every remaining row; the cursor is closed afterwards
    pub fn fetch_all(&mut self) -> Result<Vec<Row>> {
        let mut rows = Vec::new();
        while let Some(row) = self.next_row()? {
            rows.push(row);
        }
        self.close();
        Ok(rows)
    }

    /// Drain the live source into memory and release it
    pub fn materialize(&mut self) -> Result<()> {
        if let CursorState::Live(source) = &mut self.state {
            let mut rows = VecDeque::new();
            loop {
                match source.next_row() {
                    Ok(Some(row)) => rows.push_back(row),
                    Ok(None) => break,
                    Err(e) => {
                        self.close();
                        return Err(e);
                    }
                }
            }
            source.close();
            self.state = CursorState::Materialized(rows);
        }
        Ok(())
    }

    /// Release the source and discard any unread rows
    pub fn close(&mut self) {
        if let CursorState::Live(source) = &mut self.state {
            source.close();
        }
        self.state = CursorState::Closed;
    }
}

impl Drop for RowCursor {
    fn drop(&mut self) {
        if let CursorState::Live(source) = &mut self.state {
            source.close();
        }
    }
}

impl Iterator for RowCursor {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_row().transpose()
    }
}

impl std::fmt::Debug for RowCursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RowCursor")
            .field("columns", &self.column_names())
            .field("rows_read", &self.rows_read)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Metadata of a write execution
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteOutcome {
    /// Rows affected across every bind set the call covered
    pub affected_rows: u64,
    /// Last generated row id, if the engine reports one
    pub last_insert_id: Option<i64>,
    /// Number of bind sets covered by the call (1 for a plain execute)
    pub bind_sets: usize,
    /// Whether a single native batched call covered all bind sets
    pub batched: bool,
}

impl WriteOutcome {
    pub fn single(affected_rows: u64, last_insert_id: Option<i64>) -> Self {
        Self {
            affected_rows,
            last_insert_id,
            bind_sets: 1,
            batched: false,
        }
    }
}

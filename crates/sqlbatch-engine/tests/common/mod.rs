//! Recording connection used by the dispatch tests
//!
//! Every connection handed out by a `RecordingProvider` shares one `Recorder`,
//! which logs each physical call and keeps a simulated table: write bind sets
//! land in a pending list inside a transaction and move to the committed list
//! on commit.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use sqlbatch_core::{
    BindSet, ColumnMeta, Connection, ConnectionProvider, DbError, Result, Row, RowCursor, RowSource,
    Statement, Transaction, Value, WriteOutcome,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Acquire,
    Begin,
    Commit,
    Rollback,
    Query { sql: String, binds: BindSet },
    Execute { sql: String, binds: BindSet },
    ExecuteMany { sql: String, bind_sets: usize },
    Close,
}

impl Call {
    /// Whether the call reached the engine with a statement
    pub fn is_statement(&self) -> bool {
        matches!(self, Call::Query { .. } | Call::Execute { .. } | Call::ExecuteMany { .. })
    }
}

#[derive(Default)]
struct State {
    calls: Vec<Call>,
    in_transaction: bool,
    pending: Vec<BindSet>,
    committed: Vec<BindSet>,
    binds_seen: usize,
    fail_at_bind: Option<usize>,
    fail_begin: bool,
    fail_rollback: bool,
    commits_seen: usize,
    fail_commit_at: Option<usize>,
}

/// Shared call log and simulated table
#[derive(Clone, Default)]
pub struct Recorder {
    state: Arc<Mutex<State>>,
    open_cursors: Arc<AtomicUsize>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the statement that processes the `ordinal`-th bind set (0-based, counted across calls)
    pub fn fail_at_bind(self, ordinal: usize) -> Self {
        self.state.lock().fail_at_bind = Some(ordinal);
        self
    }

    pub fn fail_begin(self) -> Self {
        self.state.lock().fail_begin = true;
        self
    }

    /// Fail the `nth` commit (0-based); the failed transaction is rolled back
    pub fn fail_commit_at(self, nth: usize) -> Self {
        self.state.lock().fail_commit_at = Some(nth);
        self
    }

    pub fn fail_rollback(self) -> Self {
        self.state.lock().fail_rollback = true;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    pub fn statement_calls(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_statement).collect()
    }

    pub fn count(&self, call: &Call) -> usize {
        self.calls().iter().filter(|c| *c == call).count()
    }

    /// `x` values of every committed write, in commit order
    pub fn committed_values(&self) -> Vec<i64> {
        self.state
            .lock()
            .committed
            .iter()
            .filter_map(|b| b.get("x").and_then(Value::as_i64))
            .collect()
    }

    pub fn in_transaction(&self) -> bool {
        self.state.lock().in_transaction
    }

    pub fn open_cursors(&self) -> usize {
        self.open_cursors.load(Ordering::SeqCst)
    }

    pub fn connection(&self) -> Arc<RecordingConnection> {
        Arc::new(RecordingConnection {
            recorder: self.clone(),
            closed: AtomicBool::new(false),
        })
    }

    pub fn provider(&self) -> RecordingProvider {
        RecordingProvider {
            recorder: self.clone(),
            fail: false,
        }
    }

    fn record(&self, call: Call) {
        self.state.lock().calls.push(call);
    }

    /// Count `binds` bind sets; returns the index of the one that must fail
    fn advance(&self, binds: usize) -> Option<usize> {
        let mut state = self.state.lock();
        let start = state.binds_seen;
        state.binds_seen += binds;
        match state.fail_at_bind {
            Some(at) if at >= start && at < start + binds => Some(at - start),
            _ => None,
        }
    }

    fn write(&self, binds: &[BindSet]) {
        let mut state = self.state.lock();
        if state.in_transaction {
            state.pending.extend_from_slice(binds);
        } else {
            state.committed.extend_from_slice(binds);
        }
    }
}

pub struct RecordingConnection {
    recorder: Recorder,
    closed: AtomicBool,
}

impl RecordingConnection {
    fn check_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(DbError::Closed);
        }
        Ok(())
    }
}

#[async_trait]
impl Connection for RecordingConnection {
    fn driver_name(&self) -> &str {
        "recording"
    }

    async fn query(&self, statement: &Statement, binds: &BindSet) -> Result<RowCursor> {
        self.check_open()?;
        self.recorder.record(Call::Query {
            sql: statement.sql().to_string(),
            binds: binds.clone(),
        });
        if self.recorder.advance(1).is_some() {
            return Err(DbError::Query("injected query failure".into()));
        }

        // One row: the bind values, or the statement text when there are none
        let (names, values): (Vec<String>, Vec<Value>) = if binds.is_empty() {
            (vec!["sql".into()], vec![Value::String(statement.sql().to_string())])
        } else {
            binds.iter().map(|(k, v)| (k.to_string(), v.clone())).unzip()
        };
        let columns = names
            .iter()
            .enumerate()
            .map(|(i, n)| ColumnMeta::new(n.clone(), "any", i))
            .collect();
        let row = Row::new(names.into(), values);

        self.recorder.open_cursors.fetch_add(1, Ordering::SeqCst);
        Ok(RowCursor::new(
            columns,
            Box::new(TrackedRows {
                rows: vec![row],
                open_cursors: self.recorder.open_cursors.clone(),
                closed: false,
            }),
        ))
    }

    async fn execute(&self, statement: &Statement, binds: &BindSet) -> Result<WriteOutcome> {
        self.check_open()?;
        self.recorder.record(Call::Execute {
            sql: statement.sql().to_string(),
            binds: binds.clone(),
        });
        if self.recorder.advance(1).is_some() {
            return Err(DbError::Query("injected execute failure".into()));
        }
        if !binds.is_empty() {
            self.recorder.write(std::slice::from_ref(binds));
        }
        Ok(WriteOutcome::single(1, None))
    }

    async fn execute_many(&self, statement: &Statement, binds: &[BindSet]) -> Result<WriteOutcome> {
        self.check_open()?;
        self.recorder.record(Call::ExecuteMany {
            sql: statement.sql().to_string(),
            bind_sets: binds.len(),
        });
        if let Some(index) = self.recorder.advance(binds.len()) {
            self.recorder.write(&binds[..index]);
            return Err(DbError::Query("injected constraint violation".into()).at_bind_set(index));
        }
        self.recorder.write(binds);
        Ok(WriteOutcome {
            affected_rows: binds.len() as u64,
            last_insert_id: None,
            bind_sets: binds.len(),
            batched: true,
        })
    }

    async fn begin_transaction(&self) -> Result<Box<dyn Transaction>> {
        self.check_open()?;
        self.recorder.record(Call::Begin);
        let mut state = self.recorder.state.lock();
        if state.fail_begin {
            return Err(DbError::Transaction("injected begin failure".into()));
        }
        if state.in_transaction {
            return Err(DbError::Transaction("transaction already open".into()));
        }
        state.in_transaction = true;
        Ok(Box::new(RecordingTransaction {
            recorder: self.recorder.clone(),
        }))
    }

    fn in_transaction(&self) -> bool {
        self.recorder.in_transaction()
    }

    async fn close(&self) -> Result<()> {
        self.recorder.record(Call::Close);
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

struct RecordingTransaction {
    recorder: Recorder,
}

#[async_trait]
impl Transaction for RecordingTransaction {
    async fn commit(self: Box<Self>) -> Result<()> {
        self.recorder.record(Call::Commit);
        let mut state = self.recorder.state.lock();
        let nth = state.commits_seen;
        state.commits_seen += 1;
        let pending = std::mem::take(&mut state.pending);
        state.in_transaction = false;
        if state.fail_commit_at == Some(nth) {
            return Err(DbError::Transaction("injected commit failure".into()));
        }
        state.committed.extend(pending);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.recorder.record(Call::Rollback);
        let mut state = self.recorder.state.lock();
        state.pending.clear();
        state.in_transaction = false;
        if state.fail_rollback {
            return Err(DbError::Transaction("injected rollback failure".into()));
        }
        Ok(())
    }
}

struct TrackedRows {
    rows: Vec<Row>,
    open_cursors: Arc<AtomicUsize>,
    closed: bool,
}

impl RowSource for TrackedRows {
    fn next_row(&mut self) -> Result<Option<Row>> {
        if self.rows.is_empty() {
            Ok(None)
        } else {
            Ok(Some(self.rows.remove(0)))
        }
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.open_cursors.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

pub struct RecordingProvider {
    recorder: Recorder,
    fail: bool,
}

impl RecordingProvider {
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }
}

#[async_trait]
impl ConnectionProvider for RecordingProvider {
    async fn acquire(&self) -> Result<Arc<dyn Connection>> {
        self.recorder.record(Call::Acquire);
        if self.fail {
            return Err(DbError::Connection("injected acquire failure".into()));
        }
        Ok(self.recorder.connection())
    }
}

/// Bind sets `{x: 0}`, `{x: 1}`, ...
pub fn numbered_binds(n: usize) -> Vec<BindSet> {
    (0..n).map(|i| BindSet::new().with("x", i as i64)).collect()
}

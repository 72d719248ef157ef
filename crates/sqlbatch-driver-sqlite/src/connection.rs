//! SQLite connection implementation

use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::{Connection as RusqliteConnection, OpenFlags, params_from_iter};
use sqlbatch_core::parameters::{PlaceholderStyle, bind_named};
use sqlbatch_core::{
    BindSet, ColumnMeta, Connection, DbError, Result, Row, RowCursor, Statement, Transaction, Value,
    WriteOutcome,
};
use std::sync::Arc;
use std::time::Duration;

type SharedConnection = Arc<Mutex<Option<RusqliteConnection>>>;

/// SQLite connection wrapper.
///
/// Named placeholders are rewritten to numbered `?N` parameters before they
/// reach SQLite, so `:name`, `@name` and `$name` all bind the same way.
pub struct SqliteConnection {
    conn: SharedConnection,
    path: String,
}

impl SqliteConnection {
    /// Open a SQLite database (`:memory:` for a private in-memory database)
    pub fn open(path: &str) -> Result<Self> {
        tracing::debug!(path = %path, "opening SQLite database");

        let conn = if path == ":memory:" {
            RusqliteConnection::open_in_memory().map_err(|e| {
                DbError::Connection(format!("Failed to open in-memory database: {}", e))
            })?
        } else {
            if !path.starts_with("file:") {
                let file_path = std::path::Path::new(path);
                if let Some(parent) = file_path.parent()
                    && !parent.as_os_str().is_empty()
                    && !parent.exists()
                {
                    return Err(DbError::Connection(format!(
                        "Parent directory does not exist: {}",
                        parent.display()
                    )));
                }
            }

            let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_URI
                | OpenFlags::SQLITE_OPEN_NO_MUTEX;
            RusqliteConnection::open_with_flags(path, flags).map_err(|e| {
                DbError::Connection(format!("Failed to open SQLite database at '{}': {}", path, e))
            })?
        };

        conn.pragma_update(None, "foreign_keys", "ON")
            .map_err(|e| DbError::Connection(format!("Failed to enable foreign keys: {}", e)))?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |_| Ok(()))
            .map_err(|e| DbError::Connection(format!("Failed to set journal mode: {}", e)))?;
        conn.busy_timeout(Duration::from_secs(5))
            .map_err(|e| DbError::Connection(format!("Failed to set busy timeout: {}", e)))?;

        tracing::debug!(path = %path, "SQLite database connection established");
        Ok(Self {
            conn: Arc::new(Mutex::new(Some(conn))),
            path: path.to_string(),
        })
    }

    /// Path the connection was opened with
    pub fn path(&self) -> &str {
        &self.path
    }
}

#[async_trait]
impl Connection for SqliteConnection {
    fn driver_name(&self) -> &str {
        "sqlite"
    }

    #[tracing::instrument(skip_all, fields(sql_preview = %statement.preview()))]
    async fn query(&self, statement: &Statement, binds: &BindSet) -> Result<RowCursor> {
        let guard = self.conn.lock();
        let conn = guard.as_ref().ok_or(DbError::Closed)?;
        let bound = bind_named(statement.sql(), binds, PlaceholderStyle::QuestionNumbered)?;

        let mut stmt = conn
            .prepare(&bound.sql)
            .map_err(|e| DbError::Query(format!("Failed to prepare query: {}", e)))?;

        let columns: Vec<ColumnMeta> = stmt
            .columns()
            .iter()
            .enumerate()
            .map(|(idx, col)| ColumnMeta::new(col.name(), col.decl_type().unwrap_or("DYNAMIC"), idx))
            .collect();
        let names: Arc<[String]> = columns.iter().map(|c| c.name.clone()).collect();

        let mut rows = Vec::new();
        let mut query_rows = stmt
            .query(params_from_iter(values_to_rusqlite(&bound.values)))
            .map_err(|e| DbError::Query(format!("Failed to execute query: {}", e)))?;
        while let Some(row) = query_rows
            .next()
            .map_err(|e| DbError::Query(format!("Failed to fetch row: {}", e)))?
        {
            let mut values = Vec::with_capacity(columns.len());
            for i in 0..columns.len() {
                values.push(rusqlite_to_value(row, i)?);
            }
            rows.push(Row::new(names.clone(), values));
        }

        tracing::debug!(row_count = rows.len(), "query executed");
        Ok(RowCursor::buffered(columns, rows))
    }

    #[tracing::instrument(skip_all, fields(sql_preview = %statement.preview()))]
    async fn execute(&self, statement: &Statement, binds: &BindSet) -> Result<WriteOutcome> {
        let guard = self.conn.lock();
        let conn = guard.as_ref().ok_or(DbError::Closed)?;
        let bound = bind_named(statement.sql(), binds, PlaceholderStyle::QuestionNumbered)?;

        let mut stmt = conn
            .prepare(&bound.sql)
            .map_err(|e| DbError::Query(format!("Failed to prepare statement: {}", e)))?;
        let affected = step_write(&mut stmt, values_to_rusqlite(&bound.values))
            .map_err(|e| DbError::Query(format!("Failed to execute statement: {}", e)))?;

        tracing::debug!(affected_rows = affected, "statement executed");
        Ok(WriteOutcome::single(affected, insert_rowid(conn, statement)))
    }

    /// Prepares the statement once and steps it for every bind set.
    #[tracing::instrument(skip_all, fields(sql_preview = %statement.preview(), bind_sets = binds.len()))]
    async fn execute_many(&self, statement: &Statement, binds: &[BindSet]) -> Result<WriteOutcome> {
        let Some(first) = binds.first() else {
            return Ok(WriteOutcome {
                batched: true,
                ..WriteOutcome::default()
            });
        };

        let guard = self.conn.lock();
        let conn = guard.as_ref().ok_or(DbError::Closed)?;
        let sql = bind_named(statement.sql(), first, PlaceholderStyle::QuestionNumbered)
            .map_err(|e| DbError::from(e).at_bind_set(0))?
            .sql;
        let names = statement.placeholders();

        let mut stmt = conn
            .prepare_cached(&sql)
            .map_err(|e| DbError::Query(format!("Failed to prepare statement: {}", e)))?;

        let mut affected_rows = 0_u64;
        for (index, bind) in binds.iter().enumerate() {
            let mut values = Vec::with_capacity(names.len());
            for name in &names {
                let value = bind
                    .get(name)
                    .ok_or_else(|| DbError::MissingParameter(name.clone()).at_bind_set(index))?;
                values.push(value_to_rusqlite(value));
            }
            affected_rows += step_write(&mut stmt, values).map_err(|e| {
                DbError::Query(format!("Failed to execute statement: {}", e)).at_bind_set(index)
            })?;
        }

        tracing::debug!(affected_rows, "batched statement executed");
        Ok(WriteOutcome {
            affected_rows,
            last_insert_id: insert_rowid(conn, statement),
            bind_sets: binds.len(),
            batched: true,
        })
    }

    async fn begin_transaction(&self) -> Result<Box<dyn Transaction>> {
        {
            let guard = self.conn.lock();
            let conn = guard.as_ref().ok_or(DbError::Closed)?;
            // DEFERRED takes the write lock only when the first write happens
            conn.execute_batch("BEGIN DEFERRED")
                .map_err(|e| DbError::Transaction(format!("Failed to begin transaction: {}", e)))?;
        }
        tracing::debug!("SQLite transaction started");
        Ok(Box::new(SqliteTransaction {
            conn: Arc::clone(&self.conn),
            finished: false,
        }))
    }

    fn in_transaction(&self) -> bool {
        self.conn
            .lock()
            .as_ref()
            .is_some_and(|conn| !conn.is_autocommit())
    }

    async fn close(&self) -> Result<()> {
        let Some(conn) = self.conn.lock().take() else {
            return Ok(());
        };
        tracing::debug!(path = %self.path, "closing SQLite connection");
        conn.close()
            .map_err(|(_, e)| DbError::Connection(format!("Failed to close connection: {}", e)))
    }

    fn is_closed(&self) -> bool {
        self.conn.lock().is_none()
    }
}

/// SQLite transaction wrapper.
///
/// Issues raw `BEGIN DEFERRED` / `COMMIT` / `ROLLBACK` SQL so that it can share
/// the connection mutex without running into rusqlite's borrow-based
/// transaction lifetime.
pub struct SqliteTransaction {
    conn: SharedConnection,
    finished: bool,
}

impl SqliteTransaction {
    fn finish(&mut self, sql: &str) -> Result<()> {
        let guard = self.conn.lock();
        let conn = guard.as_ref().ok_or(DbError::Closed)?;
        match conn.execute_batch(sql) {
            Ok(()) => {
                self.finished = true;
                Ok(())
            }
            Err(e) => {
                let error = DbError::Transaction(format!("{} failed: {}", sql, e));
                // A failed COMMIT (deferred constraint, busy lock) keeps the
                // transaction open on the connection.
                if !conn.is_autocommit() {
                    match conn.execute_batch("ROLLBACK") {
                        Ok(()) => tracing::warn!(error = %error, "rolled back after failed {}", sql),
                        Err(rollback_err) => {
                            tracing::error!(error = %rollback_err, "rollback after failed {} failed", sql)
                        }
                    }
                }
                self.finished = true;
                Err(error)
            }
        }
    }
}

impl Drop for SqliteTransaction {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        tracing::warn!("SQLite transaction dropped without commit or rollback, rolling back");
        let guard = self.conn.lock();
        if let Some(conn) = guard.as_ref()
            && !conn.is_autocommit()
            && let Err(e) = conn.execute_batch("ROLLBACK")
        {
            tracing::error!(error = %e, "automatic rollback on drop failed");
        }
    }
}

#[async_trait]
impl Transaction for SqliteTransaction {
    async fn commit(mut self: Box<Self>) -> Result<()> {
        self.finish("COMMIT")?;
        tracing::debug!("SQLite transaction committed");
        Ok(())
    }

    async fn rollback(mut self: Box<Self>) -> Result<()> {
        self.finish("ROLLBACK")?;
        tracing::debug!("SQLite transaction rolled back");
        Ok(())
    }
}

/// Run a prepared write and return the number of changed rows.
///
/// A write with a `RETURNING` clause produces rows; they are stepped through
/// so the write completes, and each returned row counts as one change.
fn step_write(
    stmt: &mut rusqlite::Statement<'_>,
    values: Vec<rusqlite::types::Value>,
) -> rusqlite::Result<u64> {
    if stmt.column_count() == 0 {
        return stmt.execute(params_from_iter(values)).map(|n| n as u64);
    }
    let mut rows = stmt.query(params_from_iter(values))?;
    let mut returned = 0_u64;
    while rows.next()?.is_some() {
        returned += 1;
    }
    Ok(returned)
}

fn insert_rowid(conn: &RusqliteConnection, statement: &Statement) -> Option<i64> {
    let head = statement.sql().trim_start();
    let is_insert = head
        .get(..6)
        .is_some_and(|kw| kw.eq_ignore_ascii_case("insert"))
        || head
            .get(..7)
            .is_some_and(|kw| kw.eq_ignore_ascii_case("replace"));
    is_insert.then(|| conn.last_insert_rowid())
}

fn values_to_rusqlite(values: &[Value]) -> Vec<rusqlite::types::Value> {
    values.iter().map(value_to_rusqlite).collect()
}

fn value_to_rusqlite(value: &Value) -> rusqlite::types::Value {
    use rusqlite::types::Value as Sql;

    match value {
        Value::Null => Sql::Null,
        Value::Bool(b) => Sql::Integer(i64::from(*b)),
        Value::Int64(i) => Sql::Integer(*i),
        Value::Float64(f) => Sql::Real(*f),
        Value::Decimal(d) => Sql::Text(d.clone()),
        Value::String(s) => Sql::Text(s.clone()),
        Value::Bytes(b) => Sql::Blob(b.clone()),
        Value::Uuid(u) => Sql::Text(u.to_string()),
        Value::Date(d) => Sql::Text(d.to_string()),
        Value::DateTime(dt) => Sql::Text(dt.to_string()),
        Value::DateTimeUtc(dt) => Sql::Text(dt.to_rfc3339()),
        Value::Json(j) => Sql::Text(j.to_string()),
    }
}

fn rusqlite_to_value(row: &rusqlite::Row, idx: usize) -> Result<Value> {
    use rusqlite::types::ValueRef;

    let value_ref = row
        .get_ref(idx)
        .map_err(|e| DbError::Query(e.to_string()))?;

    Ok(match value_ref {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Int64(i),
        ValueRef::Real(f) => Value::Float64(f),
        ValueRef::Text(s) => Value::String(String::from_utf8_lossy(s).into_owned()),
        ValueRef::Blob(b) => Value::Bytes(b.to_vec()),
    })
}

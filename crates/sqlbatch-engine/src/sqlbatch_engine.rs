//! Transaction-aware SQL batch execution.
//!
//! Give `BatchExecutor::execute` one or more statements and zero, one or many
//! bind sets. The executor picks a strategy (direct, fan-out or zipped),
//! splits oversized fan-out batches into chunks of at most
//! `EngineConfig::max_binds_per_query` bind sets, wraps each chunk in its own
//! transaction unless the caller already has one open, and returns every
//! outcome in order.
//!
//! ```no_run
//! use sqlbatch_core::BindSet;
//! use sqlbatch_driver_sqlite::SqliteProvider;
//! use sqlbatch_engine::{BatchExecutor, EngineConfig, ExecuteOptions};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let executor = BatchExecutor::new(EngineConfig::default(), SqliteProvider::new("app.db"));
//! let binds: Vec<BindSet> = (1..=3).map(|x| BindSet::new().with("x", x)).collect();
//! let results = executor
//!     .execute("INSERT INTO t (x) VALUES (:x)", binds, ExecuteOptions::default())
//!     .await?;
//! assert_eq!(results.affected_rows(), 3);
//! # Ok(())
//! # }
//! ```

mod batch;
pub mod config;
mod error;
pub mod logging;

pub use batch::*;
pub use config::{EngineConfig, ExecuteOptions};
pub use error::{BatchError, BatchResult, ExecutionFailure};

//! Batch executor
//!
//! Ties the pipeline together: normalize the input, classify it, plan
//! chunks, then run each chunk under its transaction boundary and collect
//! the handles. Chunks run sequentially, in order, on a single connection.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use sqlbatch_core::{Connection, ConnectionProvider};
use tracing::Instrument;
use uuid::Uuid;

use super::dispatch::{Dispatcher, Strategy};
use super::normalize::{BatchRequest, Binds, Statements, normalize};
use super::planner::{Chunk, ChunkPlan, plan_chunks};
use super::results::{MaterializeError, ResultCollection, ResultCollector};
use super::transaction::{TransactionMode, TransactionScope};
use crate::config::{EngineConfig, ExecuteOptions};
use crate::error::{BatchError, BatchResult, ExecutionFailure};

/// How a request would be executed, without touching the engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanSummary {
    pub strategy: Strategy,
    pub statements: usize,
    pub bind_sets: usize,
    /// Number of bind sets in each chunk, in execution order
    pub chunk_sizes: Vec<usize>,
}

impl PlanSummary {
    pub fn chunk_count(&self) -> usize {
        self.chunk_sizes.len()
    }
}

/// Executes statements and bind sets against connections from a provider
#[derive(Clone)]
pub struct BatchExecutor {
    config: EngineConfig,
    provider: Arc<dyn ConnectionProvider>,
}

impl BatchExecutor {
    pub fn new(config: EngineConfig, provider: impl ConnectionProvider + 'static) -> Self {
        let cap = config.max_binds_per_query;
        Self {
            config: config.with_max_binds_per_query(cap),
            provider: Arc::new(provider),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// A fresh connection from the provider. The caller owns it.
    pub async fn connection(&self) -> BatchResult<Arc<dyn Connection>> {
        self.provider.acquire().await.map_err(BatchError::Connection)
    }

    /// Classify and plan a request without executing it
    pub fn plan(
        &self,
        statements: impl Into<Statements>,
        binds: impl Into<Binds>,
    ) -> BatchResult<PlanSummary> {
        let request = normalize(statements, binds)?;
        let strategy = Strategy::classify(request.statements.len(), &request.binds)?;
        Ok(PlanSummary {
            strategy,
            statements: request.statements.len(),
            bind_sets: request.binds.len(),
            chunk_sizes: self.chunks(strategy, &request).map(|c| c.len()).collect(),
        })
    }

    /// Execute `statements` with `binds`.
    ///
    /// Shape errors are returned before a connection is acquired. Without a
    /// connection in `options`, one is acquired from the provider and closed
    /// before returning, whether or not the request succeeded; any cursor
    /// still live at that point is drained into memory first.
    ///
    /// When the executor owns transactions, each chunk commits on its own.
    /// A failure after at least one chunk committed is reported as
    /// `BatchError::PartialBatchFailure`.
    pub async fn execute(
        &self,
        statements: impl Into<Statements>,
        binds: impl Into<Binds>,
        options: ExecuteOptions,
    ) -> BatchResult<ResultCollection> {
        let request = normalize(statements, binds)?;
        let strategy = Strategy::classify(request.statements.len(), &request.binds)?;
        let batch_id = Uuid::new_v4();

        let span = tracing::info_span!(
            "batch",
            %batch_id,
            %strategy,
            statements = request.statements.len(),
            bind_sets = request.binds.len(),
        );
        self.run(request, strategy, options, batch_id)
            .instrument(span)
            .await
    }

    async fn run(
        &self,
        request: BatchRequest,
        strategy: Strategy,
        options: ExecuteOptions,
        batch_id: Uuid,
    ) -> BatchResult<ResultCollection> {
        let started = Instant::now();

        let (connection, owns_connection) = match &options.connection {
            Some(connection) => (connection.clone(), false),
            None => (self.connection().await?, true),
        };

        let result = self
            .run_chunks(connection.as_ref(), &request, strategy, &options, owns_connection)
            .await;

        if owns_connection && let Err(e) = connection.close().await {
            tracing::warn!(error = %e, "failed to close batch connection");
        }

        let (collector, mode) = result?;
        let collection = collector.finish(batch_id, mode);

        tracing::info!(
            chunks = collection.chunk_count(),
            handles = collection.len(),
            transaction_mode = ?mode,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "batch completed"
        );
        Ok(collection)
    }

    async fn run_chunks(
        &self,
        connection: &dyn Connection,
        request: &BatchRequest,
        strategy: Strategy,
        options: &ExecuteOptions,
        owns_connection: bool,
    ) -> BatchResult<(ResultCollector, TransactionMode)> {
        let mode = TransactionMode::resolve(connection, options.manage_transaction);
        let dispatcher = Dispatcher {
            connection,
            config: &self.config,
            statements: &request.statements,
        };
        let mut collector = ResultCollector::new(options.eager_close);
        let plan = self.chunks(strategy, request);
        tracing::debug!(chunks = plan.chunk_count(), ?mode, "running batch");

        let mut committed_bind_sets = 0;
        for chunk in plan {
            if let Err(error) = self
                .run_chunk(&dispatcher, mode, strategy, chunk, &mut collector)
                .await
            {
                if mode.is_owned() && chunk.index > 0 {
                    tracing::error!(
                        failed_chunk = chunk.index,
                        committed_bind_sets,
                        "batch failed after earlier chunks were committed"
                    );
                    return Err(BatchError::PartialBatchFailure {
                        committed_chunks: 0..chunk.index,
                        committed_bind_sets,
                        failed_chunk: chunk.index,
                        source: Box::new(error),
                    });
                }
                return Err(error);
            }
            committed_bind_sets += chunk.len();
        }

        // Nothing may read from the connection once it is closed.
        if owns_connection {
            collector
                .materialize_remaining()
                .map_err(|e| self.materialize_failure(e))?;
        }

        Ok((collector, mode))
    }

    async fn run_chunk(
        &self,
        dispatcher: &Dispatcher<'_>,
        mode: TransactionMode,
        strategy: Strategy,
        chunk: Chunk<'_>,
        collector: &mut ResultCollector,
    ) -> BatchResult<()> {
        let scope = TransactionScope::begin(dispatcher.connection, mode, chunk.index).await?;

        let handles = match dispatcher.run_chunk(strategy, chunk).await {
            Ok(handles) => handles,
            Err(error) => return Err(scope.abort(error).await),
        };
        if let Err(e) = collector.push_chunk(handles) {
            return Err(scope.abort(self.materialize_failure(e)).await);
        }

        scope.commit().await.inspect_err(|_| {
            if dispatcher.connection.in_transaction() {
                tracing::error!(
                    chunk = chunk.index,
                    "connection still inside a transaction after a failed commit"
                );
            }
        })
    }

    fn chunks<'a>(&self, strategy: Strategy, request: &'a BatchRequest) -> ChunkPlan<'a> {
        if strategy.is_chunked() {
            plan_chunks(&request.binds, self.config.max_binds_per_query)
        } else {
            ChunkPlan::single(&request.binds)
        }
    }

    fn materialize_failure(&self, error: MaterializeError) -> BatchError {
        tracing::error!(
            chunk = error.chunk_index,
            sql = %error.statement.preview(),
            error = %error.source,
            "failed to read result rows"
        );
        ExecutionFailure {
            statement: error.statement.sql().to_string(),
            binds: Vec::new(),
            chunk_index: error.chunk_index,
            bind_ordinal: None,
            source: error.source,
        }
        .into()
    }
}

impl std::fmt::Debug for BatchExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchExecutor")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

//! Batch engine errors

use std::ops::Range;

use sqlbatch_core::{DbError, RedactedBindSet};
use thiserror::Error;

pub type BatchResult<T> = Result<T, BatchError>;

/// Errors surfaced by `BatchExecutor::execute`
#[derive(Debug, Error)]
pub enum BatchError {
    /// The caller's input has no usable shape (e.g. no statements at all).
    #[error("invalid batch input: {0}")]
    InputShape(String),

    /// Statement and bind-set counts fit none of the execution strategies.
    #[error("cannot pair {statements} statement(s) with {binds} bind set(s)")]
    CardinalityMismatch { statements: usize, binds: usize },

    /// The engine rejected a statement.
    #[error(transparent)]
    Execution(Box<ExecutionFailure>),

    /// A split batch failed after earlier chunks were committed.
    #[error(
        "chunk {failed_chunk} failed after chunks {}..{} were committed ({committed_bind_sets} bind sets)",
        .committed_chunks.start,
        .committed_chunks.end
    )]
    PartialBatchFailure {
        /// 0-based indexes of the chunks that are committed
        committed_chunks: Range<usize>,
        /// Number of bind sets covered by the committed chunks
        committed_bind_sets: usize,
        /// 0-based index of the chunk that failed
        failed_chunk: usize,
        #[source]
        source: Box<BatchError>,
    },

    /// Acquiring the connection or opening a transaction failed.
    #[error("connection or transaction setup failed")]
    Connection(#[source] DbError),

    /// A chunk ran to completion but its commit failed; the chunk was rolled back.
    #[error("commit of chunk {chunk_index} failed")]
    Commit {
        chunk_index: usize,
        #[source]
        source: DbError,
    },

    #[error("configuration error: {0}")]
    Config(String),
}

impl BatchError {
    /// The statement-level failure behind this error, if any
    pub fn execution_failure(&self) -> Option<&ExecutionFailure> {
        match self {
            BatchError::Execution(failure) => Some(failure),
            BatchError::PartialBatchFailure { source, .. } => source.execution_failure(),
            _ => None,
        }
    }

    /// Whether the error was raised before anything reached the engine
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            BatchError::InputShape(_) | BatchError::CardinalityMismatch { .. }
        )
    }
}

/// Context attached to a failed statement.
#[derive(Debug, Error)]
#[error(
    "statement failed in chunk {chunk_index}{}; sql: {statement}",
    failure_context(.bind_ordinal, .binds)
)]
pub struct ExecutionFailure {
    /// SQL text of the failing statement
    pub statement: String,
    /// Bind sets of the failing call, with values redacted unless configured otherwise
    pub binds: Vec<RedactedBindSet>,
    /// 0-based chunk the statement ran in
    pub chunk_index: usize,
    /// Position of the failing bind set within the whole request, when known
    pub bind_ordinal: Option<usize>,
    #[source]
    pub source: DbError,
}

fn failure_context(bind_ordinal: &Option<usize>, binds: &[RedactedBindSet]) -> String {
    let mut context = String::new();
    if let Some(ordinal) = bind_ordinal {
        context.push_str(&format!(" at bind set #{}", ordinal));
    }
    match binds {
        [] => {}
        [single] => context.push_str(&format!(" (binds: {})", single)),
        many => context.push_str(&format!(" (binds: {} sets, first {})", many.len(), many[0])),
    }
    context
}

impl From<ExecutionFailure> for BatchError {
    fn from(failure: ExecutionFailure) -> Self {
        BatchError::Execution(Box::new(failure))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlbatch_core::BindSet;

    fn failure() -> ExecutionFailure {
        ExecutionFailure {
            statement: "INSERT INTO t VALUES (:x)".to_string(),
            binds: vec![BindSet::new().with("x", "secret").redacted()],
            chunk_index: 1,
            bind_ordinal: Some(699),
            source: DbError::Query("UNIQUE constraint failed".into()),
        }
    }

    #[test]
    fn test_execution_failure_display_is_redacted() {
        let message = BatchError::from(failure()).to_string();

        assert!(message.contains("chunk 1 at bind set #699"));
        assert!(message.contains("<string:6>"));
        assert!(!message.contains("secret"));
    }

    #[test]
    fn test_partial_failure_exposes_inner_failure() {
        let err = BatchError::PartialBatchFailure {
            committed_chunks: 0..1,
            committed_bind_sets: 500,
            failed_chunk: 1,
            source: Box::new(failure().into()),
        };

        assert_eq!(err.execution_failure().map(|f| f.chunk_index), Some(1));
        assert!(err.to_string().contains("chunks 0..1 were committed (500 bind sets)"));
        assert!(!err.is_caller_error());
    }

    #[test]
    fn test_messages_leave_causes_to_the_source_chain() {
        let err = BatchError::PartialBatchFailure {
            committed_chunks: 0..1,
            committed_bind_sets: 500,
            failed_chunk: 1,
            source: Box::new(failure().into()),
        };

        let mut chain = vec![err.to_string()];
        let mut source = std::error::Error::source(&err);
        while let Some(cause) = source {
            chain.push(cause.to_string());
            source = cause.source();
        }

        assert_eq!(chain.len(), 3);
        assert_eq!(
            chain.iter().filter(|m| m.contains("UNIQUE constraint failed")).count(),
            1
        );
    }

    #[test]
    fn test_commit_error_names_the_chunk() {
        let err = BatchError::Commit {
            chunk_index: 2,
            source: DbError::Transaction("COMMIT failed: FOREIGN KEY constraint failed".into()),
        };

        assert_eq!(err.to_string(), "commit of chunk 2 failed");
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.execution_failure().is_none());
    }

    #[test]
    fn test_caller_errors() {
        assert!(BatchError::InputShape("empty".into()).is_caller_error());
        assert!(BatchError::CardinalityMismatch { statements: 2, binds: 3 }.is_caller_error());
        assert!(!BatchError::Connection(DbError::Closed).is_caller_error());
    }
}

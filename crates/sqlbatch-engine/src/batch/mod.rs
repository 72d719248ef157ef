//! Batch execution pipeline
//!
//! normalize → classify → plan chunks → per chunk: begin, dispatch, commit →
//! collect results.

mod dispatch;
mod executor;
mod normalize;
mod planner;
mod results;
mod transaction;
#[cfg(test)]
mod tests;

pub use dispatch::Strategy;
pub use executor::{BatchExecutor, PlanSummary};
pub use normalize::{BatchRequest, Binds, Statements, bind_product, normalize};
pub use planner::{Chunk, ChunkPlan, plan_chunks};
pub use results::{ExecutionHandle, Outcome, ResultCollection};
pub use transaction::{TransactionMode, TransactionScope};

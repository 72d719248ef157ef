//! sqlbatch core - engine-facing abstractions shared by the batch engine and drivers
//!
//! This crate defines the pieces every other sqlbatch crate depends on:
//!
//! - `Connection` / `Transaction` - traits a database driver implements
//! - `ConnectionProvider` - hands out connections to the batch engine
//! - `Statement` and `BindSet` - SQL text with named placeholders and their values
//! - `RowCursor` and `WriteOutcome` - what a single execution yields
//! - `Value` and `Row` - driver-neutral data representation

mod binds;
mod connection;
mod cursor;
mod error;
pub mod parameters;
mod statement;
mod types;

pub use binds::*;
pub use connection::*;
pub use cursor::*;
pub use error::*;
pub use statement::*;
pub use types::*;

//! Named placeholder extraction and binding
//!
//! Statements carry named placeholders in any of the common styles:
//!
//! - `:name` - Oracle, SQLite
//! - `@name` - SQL Server, MySQL user variables
//! - `$name` - SQLite, Tcl-style
//!
//! Positional placeholders (`$1`, `?`) are recognized so that they can be
//! reported, but bind sets only ever address placeholders by name.
//!
//! # Example
//!
//! ```
//! use sqlbatch_core::parameters::{extract_parameters, Parameter};
//!
//! let params = extract_parameters("SELECT * FROM users WHERE id = :id AND status = $1");
//! assert_eq!(params, vec![Parameter::Named("id".into()), Parameter::Positional(1)]);
//! ```

pub mod binder;
mod extractor;

pub use binder::{BindError, BindResult, BoundStatement, PlaceholderStyle, bind_named};
pub(crate) use extractor::has_returning_clause;
pub use extractor::{
    ExtractionResult, Parameter, ParameterStyle, extract_parameters, extract_parameters_with_style,
};

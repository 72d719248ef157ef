//! SQLite driver for sqlbatch

mod connection;
mod provider;

pub use connection::{SqliteConnection, SqliteTransaction};
pub use provider::SqliteProvider;

//! Crate error types.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("schema sync failed for table {table}: {message}")]
    Sync { table: String, message: String },

    /// A row the flow depends on is missing from the named table.
    #[error("no matching row in {0}")]
    NotFound(String),
}

//! Typed error type for the db crate.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("sqlx error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("row not found")]
    NotFound,

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A JSONB column could not be decoded into its domain type.
    #[error("corrupt {column} column: {source}")]
    Corrupt {
        column: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid column name '{0}'")]
    InvalidColumn(String),

    /// The store refused the write (used by the in-memory store's fault injection).
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

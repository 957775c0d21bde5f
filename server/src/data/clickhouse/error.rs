//! ClickHouse error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClickhouseError {
    #[error("Database error: {0}")]
    Database(#[from] clickhouse::error::Error),

    #[error("Migration {version} ({name}) failed: {error}")]
    MigrationFailed {
        version: i32,
        name: String,
        error: String,
    },

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query timeout after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },
}

//! Unified error type for data layer
//!
//! Repository methods both compile and execute queries, so this error carries
//! compilation failures next to store failures. Store errors are passed
//! through unchanged; nothing here retries.

use thiserror::Error;

use crate::domain::CompileError;

/// Unified error type for data layer operations
#[derive(Error, Debug)]
pub enum DataError {
    /// Definition or filter rejected before any SQL was sent
    #[error("Compile error: {0}")]
    Compile(#[from] CompileError),

    /// ClickHouse database error
    #[error("ClickHouse error: {0}")]
    Clickhouse(#[from] clickhouse::error::Error),

    /// Migration failed
    #[error("Migration {version} ({name}) failed: {error}")]
    MigrationFailed {
        version: i32,
        name: String,
        error: String,
    },

    /// Store unreachable or rejected the connection
    #[error("Connection error: {0}")]
    Connection(String),

    /// Query timeout
    #[error("Query timeout after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },
}

/// Convert from the ClickHouse service error
impl From<crate::data::clickhouse::ClickhouseError> for DataError {
    fn from(e: crate::data::clickhouse::ClickhouseError) -> Self {
        use crate::data::clickhouse::ClickhouseError;
        match e {
            ClickhouseError::Database(e) => Self::Clickhouse(e),
            ClickhouseError::MigrationFailed {
                version,
                name,
                error,
            } => Self::MigrationFailed {
                version,
                name,
                error,
            },
            ClickhouseError::Connection(msg) => Self::Connection(msg),
            ClickhouseError::Timeout { timeout_secs } => Self::Timeout { timeout_secs },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::clickhouse::ClickhouseError;

    #[test]
    fn test_compile_error_display() {
        let err: DataError = CompileError::UnknownProperty("plan".into()).into();
        assert!(matches!(err, DataError::Compile(_)));
        assert_eq!(err.to_string(), "Compile error: Unknown property: plan");
    }

    #[test]
    fn test_from_clickhouse_error() {
        let err: DataError = ClickhouseError::Timeout { timeout_secs: 5 }.into();
        assert!(matches!(err, DataError::Timeout { timeout_secs: 5 }));

        assert_eq!(err.to_string(), "Query timeout after 5s");

        let err: DataError = ClickhouseError::Connection("refused".into()).into();
        assert!(matches!(err, DataError::Connection(ref msg) if msg == "refused"));
        assert_eq!(err.to_string(), "Connection error: refused");

        let err: DataError = ClickhouseError::MigrationFailed {
            version: 3,
            name: "x".into(),
            error: "boom".into(),
        }
        .into();
        assert_eq!(err.to_string(), "Migration 3 (x) failed: boom");
    }
}

//! Data storage layer
//!
//! - `clickhouse` - ClickHouse service, schema and repositories
//! - `types` - Query result types
//! - `traits` - Repository trait implemented by the ClickHouse backend
//! - `error` - Unified error type for the data layer

pub mod clickhouse;
pub mod error;
pub mod traits;
pub mod types;

pub use clickhouse::ClickhouseService;
pub use error::DataError;
pub use traits::{AnalyticsRepository, CohortRequest};

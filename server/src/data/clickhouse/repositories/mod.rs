//! ClickHouse repository modules
//!
//! Each function executes an already compiled query and decodes its rows:
//! - **events**: event listing and the count/trend/top rollups
//! - **cohorts**: cohort membership and materialization
//! - **properties**: property-name discovery

pub mod cohorts;
pub mod events;
pub mod properties;

use chrono::{DateTime, Utc};
use time::OffsetDateTime;

/// Convert a decoded ClickHouse timestamp to the chrono type used in results
pub(crate) fn to_utc(ts: OffsetDateTime) -> DateTime<Utc> {
    let millis = ts.unix_timestamp_nanos() / 1_000_000;
    i64::try_from(millis)
        .ok()
        .and_then(DateTime::from_timestamp_millis)
        .unwrap_or(DateTime::UNIX_EPOCH)
}

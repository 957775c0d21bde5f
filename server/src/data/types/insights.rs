//! Query result types
//!
//! Returned by [`crate::data::AnalyticsRepository`] and printed as JSON by the CLI.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// One raw event row
#[derive(Debug, Clone, Serialize)]
pub struct EventRecord {
    pub event_id: String,
    pub event_name: String,
    pub event_type: String,
    pub distinct_id: String,
    /// Person id stamped at ingestion
    pub person_id: String,
    /// Person id after applying identity overrides
    pub resolved_person_id: String,
    pub session_id: Option<String>,
    pub properties: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EventCounts {
    pub count: u64,
    pub unique_users: u64,
    pub sessions: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrendPoint {
    pub period: DateTime<Utc>,
    pub count: u64,
    pub unique_users: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopEvent {
    pub event_name: String,
    pub count: u64,
    pub unique_users: u64,
}

/// A distinct id that satisfies a cohort definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CohortMember {
    pub distinct_id: String,
    pub resolved_person_id: String,
}

/// Outcome of writing a cohort into `cohort_members`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MaterializedCohort {
    pub cohort_id: String,
    pub members: u64,
}

/// Parse a stored properties blob, keeping malformed text as a JSON string
pub fn parse_properties(raw: &str) -> serde_json::Value {
    if raw.is_empty() {
        return serde_json::Value::Object(Default::default());
    }
    serde_json::from_str(raw).unwrap_or_else(|_| serde_json::Value::String(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_properties() {
        assert_eq!(parse_properties(r#"{"plan":"pro"}"#), json!({"plan": "pro"}));
        assert_eq!(parse_properties(""), json!({}));
        assert_eq!(parse_properties("{broken"), json!("{broken"));
    }

    #[test]
    fn test_trend_point_serializes_rfc3339() {
        let point = TrendPoint {
            period: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
            count: 3,
            unique_users: 2,
        };
        let value = serde_json::to_value(&point).unwrap();
        assert_eq!(value["period"], "2023-11-14T22:13:20Z");
        assert_eq!(value["count"], 3);
    }
}

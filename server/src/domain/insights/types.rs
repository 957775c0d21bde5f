//! Aggregation query inputs

use serde::{Deserialize, Serialize};

/// Optional filters shared by every aggregation query.
///
/// `from`/`to` accept ISO-8601 or the store's `YYYY-MM-DD HH:MM:SS[.fff]` form.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct EventQueryFilter {
    #[serde(default)]
    pub event_name: Option<String>,
    #[serde(default)]
    pub distinct_id: Option<String>,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
}

impl EventQueryFilter {
    pub fn with_event_name(mut self, event_name: impl Into<String>) -> Self {
        self.event_name = Some(event_name.into());
        self
    }

    pub fn with_distinct_id(mut self, distinct_id: impl Into<String>) -> Self {
        self.distinct_id = Some(distinct_id.into());
        self
    }

    pub fn with_range(mut self, from: Option<String>, to: Option<String>) -> Self {
        self.from = from;
        self.to = to;
        self
    }
}

/// Trend bucket size
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Hour,
    #[default]
    Day,
    Week,
    Month,
}

impl Granularity {
    /// Bucket expression, always of type `DateTime`
    pub fn bucket_expr(&self) -> &'static str {
        match self {
            Self::Hour => "toDateTime(toStartOfHour(timestamp))",
            Self::Day => "toDateTime(toStartOfDay(timestamp))",
            Self::Week => "toDateTime(toStartOfWeek(timestamp, 1))",
            Self::Month => "toDateTime(toStartOfMonth(timestamp))",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hour => "hour",
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
        }
    }
}

impl std::str::FromStr for Granularity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hour" => Ok(Self::Hour),
            "day" => Ok(Self::Day),
            "week" => Ok(Self::Week),
            "month" => Ok(Self::Month),
            other => Err(format!(
                "invalid granularity '{}', expected hour, day, week or month",
                other
            )),
        }
    }
}

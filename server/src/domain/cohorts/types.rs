//! Cohort definition types
//!
//! A cohort definition is a boolean tree: groups combine members with AND/OR,
//! leaves are one of a closed set of condition kinds. Definitions arrive as
//! JSON (see [`super::parser`]) with each node tagged by `kind`.

use serde::{Deserialize, Serialize};

use super::property::PropertyOperator;

/// Combinator for a condition group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupKind {
    #[serde(alias = "AND")]
    And,
    #[serde(alias = "OR")]
    Or,
}

impl GroupKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::And => "and",
            Self::Or => "or",
        }
    }

    /// SQL keyword joining members
    pub fn sql_operator(&self) -> &'static str {
        match self {
            Self::And => " AND ",
            Self::Or => " OR ",
        }
    }

    /// Fragment an empty group compiles to (the identity element of the operator)
    pub fn empty_sql(&self) -> &'static str {
        match self {
            Self::And => "1 = 1",
            Self::Or => "1 = 0",
        }
    }
}

/// AND/OR group of conditions
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionGroup {
    pub kind: GroupKind,
    pub members: Vec<Condition>,
}

impl ConditionGroup {
    pub fn and(members: Vec<Condition>) -> Self {
        Self {
            kind: GroupKind::And,
            members,
        }
    }

    pub fn or(members: Vec<Condition>) -> Self {
        Self {
            kind: GroupKind::Or,
            members,
        }
    }
}

/// One node of a cohort definition tree
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Group(ConditionGroup),
    Event(EventCondition),
    PersonProperty(PersonPropertyCondition),
    FirstTimeEvent(FirstTimeEventCondition),
    PerformedRegularly(PerformedRegularlyCondition),
    Cohort(CohortCondition),
}

impl Condition {
    /// The `kind` tag this node carries in JSON
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Group(group) => group.kind.as_str(),
            Self::Event(_) => "event",
            Self::PersonProperty(_) => "person_property",
            Self::FirstTimeEvent(_) => "first_time_event",
            Self::PerformedRegularly(_) => "performed_regularly",
            Self::Cohort(_) => "cohort",
        }
    }
}

impl From<ConditionGroup> for Condition {
    fn from(group: ConditionGroup) -> Self {
        Self::Group(group)
    }
}

/// Comparison applied to an event count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CountOperator {
    Gte,
    Gt,
    Lte,
    Lt,
    Eq,
    Neq,
}

impl CountOperator {
    pub fn sql(&self) -> &'static str {
        match self {
            Self::Gte => ">=",
            Self::Gt => ">",
            Self::Lte => "<=",
            Self::Lt => "<",
            Self::Eq => "=",
            Self::Neq => "!=",
        }
    }

    /// Whether `count <op> n` can only be met by users with zero matching
    /// events, who never appear in a per-user event aggregate.
    pub fn requires_zero(&self, n: u32) -> bool {
        match self {
            Self::Eq | Self::Lte => n == 0,
            Self::Lt => n <= 1,
            Self::Gte | Self::Gt | Self::Neq => false,
        }
    }
}

/// Bucket size for regularity conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodType {
    Day,
    Week,
    Month,
}

impl PeriodType {
    /// Truncation expression over the `timestamp` column
    pub fn truncate_timestamp(&self) -> &'static str {
        match self {
            Self::Day => "toStartOfDay(timestamp)",
            // mode 1: weeks start on Monday (ISO)
            Self::Week => "toStartOfWeek(timestamp, 1)",
            Self::Month => "toStartOfMonth(timestamp)",
        }
    }
}

/// Predicate over one event property
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct EventFilter {
    pub property: String,
    #[serde(default = "default_filter_operator")]
    pub operator: PropertyOperator,
    #[serde(default)]
    pub value: Option<serde_json::Value>,
}

fn default_filter_operator() -> PropertyOperator {
    PropertyOperator::Eq
}

impl EventFilter {
    /// Equality filter, the common case
    pub fn eq(property: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            operator: PropertyOperator::Eq,
            value: Some(serde_json::Value::String(value.into())),
        }
    }
}

/// Performed `event_name` a number of times in the trailing window
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct EventCondition {
    pub event_name: String,
    pub count_operator: CountOperator,
    pub count: u32,
    pub time_window_days: u32,
    #[serde(default)]
    pub event_filters: Vec<EventFilter>,
}

/// Comparison against the person's property bag
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PersonPropertyCondition {
    pub property: String,
    pub operator: PropertyOperator,
    #[serde(default)]
    pub value: Option<serde_json::Value>,
}

/// First occurrence of `event_name` falls inside the trailing window
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct FirstTimeEventCondition {
    pub event_name: String,
    pub time_window_days: u32,
}

/// Performed `event_name` in at least `min_periods` distinct periods.
///
/// The lookback is `time_window_days`. `total_periods` describes the
/// definition for display (how many periods the editor offered) and never
/// reaches the generated SQL.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PerformedRegularlyCondition {
    pub event_name: String,
    pub period_type: PeriodType,
    pub total_periods: u32,
    pub min_periods: u32,
    pub time_window_days: u32,
    #[serde(default)]
    pub event_filters: Vec<EventFilter>,
}

/// Membership in a materialized cohort
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CohortCondition {
    pub cohort_id: String,
    #[serde(default)]
    pub negated: bool,
}

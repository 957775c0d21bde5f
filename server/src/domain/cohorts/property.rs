//! Property comparisons and the property-name allow-list
//!
//! Property names end up as the literal key argument of `JSONExtractString`,
//! which cannot be a bound parameter. A name is embedded only after it matches
//! [`PROPERTY_NAME_PATTERN`] and appears in the caller's [`PropertyAllowList`].
//! Values always travel as bound parameters.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::constants::{EVENTS_TABLE_FINAL, MAX_TIME_WINDOW_DAYS};
use crate::domain::error::CompileError;
use crate::domain::params::{BuildContext, CompiledQuery, QueryValue};
use crate::utils::sql::contains_pattern;

/// Accepted shape of a property name (no quotes, whitespace or backslashes)
pub const PROPERTY_NAME_PATTERN: &str = r"^[A-Za-z_$][A-Za-z0-9_$.:\-]{0,199}$";

/// Comparison operators for property predicates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyOperator {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    Contains,
    NotContains,
    IsSet,
    IsNotSet,
}

impl PropertyOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Neq => "neq",
            Self::Gt => "gt",
            Self::Gte => "gte",
            Self::Lt => "lt",
            Self::Lte => "lte",
            Self::Contains => "contains",
            Self::NotContains => "not_contains",
            Self::IsSet => "is_set",
            Self::IsNotSet => "is_not_set",
        }
    }
}

/// JSON column a property is read from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertySource {
    /// Event-level `properties`
    Event,
    /// Person bag stamped on each event row
    Person,
}

impl PropertySource {
    pub fn column(&self) -> &'static str {
        match self {
            Self::Event => "properties",
            Self::Person => "person_properties",
        }
    }
}

fn property_name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(PROPERTY_NAME_PATTERN).expect("Invalid regex"))
}

/// Property names that may be embedded into generated SQL
#[derive(Debug, Clone, Default)]
pub struct PropertyAllowList {
    names: HashSet<String>,
}

impl PropertyAllowList {
    /// Build from known names; names with an unsafe shape are dropped
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut list = Self::default();
        for name in names {
            list.insert(name);
        }
        list
    }

    /// Add a name, returning false when its shape is rejected
    pub fn insert(&mut self, name: impl Into<String>) -> bool {
        let name = name.into();
        if !property_name_regex().is_match(&name) {
            tracing::warn!(property = %name, "Skipping property with unsafe name");
            return false;
        }
        self.names.insert(name);
        true
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Validate a name before it is embedded as a SQL literal
    pub fn check(&self, name: &str) -> Result<(), CompileError> {
        if !property_name_regex().is_match(name) {
            return Err(CompileError::InvalidPropertyName(name.to_string()));
        }
        if !self.contains(name) {
            return Err(CompileError::UnknownProperty(name.to_string()));
        }
        Ok(())
    }
}

impl<S: Into<String>> FromIterator<S> for PropertyAllowList {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::new(iter)
    }
}

/// Compile one property predicate to a boolean SQL fragment
pub fn compile_property_comparison(
    source: PropertySource,
    property: &str,
    operator: PropertyOperator,
    value: Option<&Value>,
    allowed: &PropertyAllowList,
    ctx: &mut BuildContext,
) -> Result<String, CompileError> {
    allowed.check(property)?;

    let column = source.column();
    let extract = format!("JSONExtractString({}, '{}')", column, property);

    let sql = match operator {
        PropertyOperator::Eq | PropertyOperator::Neq => {
            let eq = operator == PropertyOperator::Eq;
            match scalar(property, value)? {
                Scalar::Text(text) => {
                    let placeholder = ctx.bind("coh_prop", QueryValue::String(text));
                    format!("{} {} {}", extract, if eq { "=" } else { "!=" }, placeholder)
                }
                // Missing or non-numeric values count as "not equal"
                Scalar::Number(number) => {
                    let placeholder = ctx.bind("coh_prop", QueryValue::Float64(number));
                    let numeric = numeric_expr(column, property);
                    if eq {
                        format!("{} = {}", numeric, placeholder)
                    } else {
                        format!("ifNull({} != {}, 1)", numeric, placeholder)
                    }
                }
                Scalar::Bool(flag) => {
                    let placeholder = ctx.bind("coh_prop", QueryValue::String(flag.to_string()));
                    format!(
                        "JSONExtractRaw({}, '{}') {} {}",
                        column,
                        property,
                        if eq { "=" } else { "!=" },
                        placeholder
                    )
                }
            }
        }
        PropertyOperator::Gt
        | PropertyOperator::Gte
        | PropertyOperator::Lt
        | PropertyOperator::Lte => {
            let number = numeric_value(property, value)?;
            let placeholder = ctx.bind("coh_prop", QueryValue::Float64(number));
            let op = match operator {
                PropertyOperator::Gt => ">",
                PropertyOperator::Gte => ">=",
                PropertyOperator::Lt => "<",
                _ => "<=",
            };
            format!("{} {} {}", numeric_expr(column, property), op, placeholder)
        }
        PropertyOperator::Contains | PropertyOperator::NotContains => {
            let text = scalar(property, value)?.into_text();
            if text.is_empty() {
                return Err(CompileError::invalid_value(
                    property,
                    "contains requires a non-empty value",
                ));
            }
            let placeholder = ctx.bind("coh_prop", QueryValue::String(contains_pattern(&text)));
            let op = if operator == PropertyOperator::Contains {
                "LIKE"
            } else {
                "NOT LIKE"
            };
            format!("{} {} {}", extract, op, placeholder)
        }
        PropertyOperator::IsSet => {
            format!("nullIf(JSONExtractRaw({}, '{}'), '') IS NOT NULL", column, property)
        }
        PropertyOperator::IsNotSet => {
            format!("nullIf(JSONExtractRaw({}, '{}'), '') IS NULL", column, property)
        }
    };

    Ok(sql)
}

/// Names of the event and person properties seen in the last `days` days.
///
/// Feeds [`PropertyAllowList`]; the store returns each name once, sorted.
pub fn compile_property_discovery(
    project_id: &str,
    days: u32,
    limit: u32,
) -> Result<CompiledQuery, CompileError> {
    if days == 0 || days > MAX_TIME_WINDOW_DAYS {
        return Err(CompileError::InvalidWindow {
            days,
            max: MAX_TIME_WINDOW_DAYS,
        });
    }
    let mut ctx = BuildContext::new(project_id)?;
    let days = ctx.bind_named("days", QueryValue::UInt32(days));
    let limit = ctx.bind_named("limit", QueryValue::UInt32(limit.max(1)));

    let sql = format!(
        "SELECT DISTINCT arrayJoin(arrayConcat(JSONExtractKeys({event}), JSONExtractKeys({person}))) AS property \
         FROM {table} \
         WHERE project_id = {project} AND timestamp >= now64(3) - INTERVAL {days} DAY \
         ORDER BY property \
         LIMIT {limit}",
        event = PropertySource::Event.column(),
        person = PropertySource::Person.column(),
        table = EVENTS_TABLE_FINAL,
        project = ctx.project_id_param(),
        days = days,
        limit = limit,
    );
    Ok(ctx.finish(sql))
}

/// Numeric reading of a property: JSON numbers as-is, numeric strings parsed
fn numeric_expr(column: &str, property: &str) -> String {
    format!(
        "coalesce(JSONExtract({c}, '{p}', 'Nullable(Float64)'), toFloat64OrNull(JSONExtractString({c}, '{p}')))",
        c = column,
        p = property
    )
}

/// Scalar comparison value, keeping its JSON type
enum Scalar {
    Text(String),
    Number(f64),
    Bool(bool),
}

impl Scalar {
    fn into_text(self) -> String {
        match self {
            Self::Text(s) => s,
            Self::Number(n) => n.to_string(),
            Self::Bool(b) => b.to_string(),
        }
    }
}

fn scalar(property: &str, value: Option<&Value>) -> Result<Scalar, CompileError> {
    match value {
        Some(Value::String(s)) => Ok(Scalar::Text(s.clone())),
        Some(Value::Number(n)) => match n.as_f64() {
            Some(f) if f.is_finite() => Ok(Scalar::Number(f)),
            _ => Err(CompileError::invalid_value(property, "expected a finite number")),
        },
        Some(Value::Bool(b)) => Ok(Scalar::Bool(*b)),
        Some(Value::Null) | None => Err(CompileError::invalid_value(property, "value is required")),
        Some(_) => Err(CompileError::invalid_value(
            property,
            "expected a string, number or boolean",
        )),
    }
}

fn numeric_value(property: &str, value: Option<&Value>) -> Result<f64, CompileError> {
    let number = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match number {
        Some(n) if n.is_finite() => Ok(n),
        _ => Err(CompileError::invalid_value(property, "expected a number")),
    }
}

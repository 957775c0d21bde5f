//! Definition parsing
//!
//! Parses a JSON cohort definition into a [`ConditionGroup`]. The tree is
//! walked by hand rather than through a derived tagged enum so that an
//! unknown `kind` surfaces as [`CompileError::UnsupportedCondition`] naming
//! the offending tag, and so that size limits apply before deep recursion.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::core::constants::MAX_CONDITION_DEPTH;
use crate::domain::error::CompileError;

use super::property::PropertyOperator;
use super::types::{
    CohortCondition, Condition, ConditionGroup, CountOperator, EventCondition,
    FirstTimeEventCondition, GroupKind, PerformedRegularlyCondition, PersonPropertyCondition,
};

/// Maximum size of definition JSON in bytes (64KB)
const MAX_DEFINITION_JSON_SIZE: usize = 64 * 1024;

/// Maximum members in a single group
const MAX_GROUP_MEMBERS: usize = 50;

/// Maximum leaf conditions in a whole definition
const MAX_CONDITIONS: usize = 200;

/// Parse a definition from JSON text. The root must be an `and`/`or` group.
pub fn parse_definition(json_str: &str) -> Result<ConditionGroup, CompileError> {
    if json_str.len() > MAX_DEFINITION_JSON_SIZE {
        return Err(CompileError::InvalidDefinition(format!(
            "definition exceeds maximum size of {} bytes",
            MAX_DEFINITION_JSON_SIZE
        )));
    }

    let value: Value = serde_json::from_str(json_str)
        .map_err(|e| CompileError::InvalidDefinition(e.to_string()))?;
    parse_definition_value(&value)
}

/// Parse a definition that has already been decoded into a JSON value
pub fn parse_definition_value(value: &Value) -> Result<ConditionGroup, CompileError> {
    let mut parser = Parser { leaves: 0 };
    match parser.node(value, 0)? {
        Condition::Group(group) => Ok(group),
        other => Err(CompileError::InvalidDefinition(format!(
            "root must be an 'and' or 'or' group, got '{}'",
            other.kind()
        ))),
    }
}

struct Parser {
    leaves: usize,
}

impl Parser {
    fn node(&mut self, value: &Value, depth: usize) -> Result<Condition, CompileError> {
        let obj = value.as_object().ok_or_else(|| {
            CompileError::InvalidDefinition("condition must be a JSON object".to_string())
        })?;
        let kind = obj
            .get("kind")
            .and_then(Value::as_str)
            .ok_or_else(|| CompileError::InvalidDefinition("condition is missing 'kind'".to_string()))?;

        if let Ok(group_kind) = serde_json::from_value::<GroupKind>(Value::String(kind.to_string()))
        {
            return self.group(group_kind, obj, depth).map(Condition::Group);
        }

        self.leaves += 1;
        if self.leaves > MAX_CONDITIONS {
            return Err(CompileError::InvalidDefinition(format!(
                "maximum {} conditions allowed",
                MAX_CONDITIONS
            )));
        }

        match kind {
            "event" => {
                check_operator::<CountOperator>(obj, "count_operator", kind)?;
                check_event_filters(obj, kind)?;
                leaf::<EventCondition>(value, kind).map(Condition::Event)
            }
            "person_property" => {
                check_operator::<PropertyOperator>(obj, "operator", kind)?;
                leaf::<PersonPropertyCondition>(value, kind).map(Condition::PersonProperty)
            }
            "first_time_event" => {
                leaf::<FirstTimeEventCondition>(value, kind).map(Condition::FirstTimeEvent)
            }
            "performed_regularly" => {
                check_event_filters(obj, kind)?;
                leaf::<PerformedRegularlyCondition>(value, kind).map(Condition::PerformedRegularly)
            }
            "cohort" => leaf::<CohortCondition>(value, kind).map(Condition::Cohort),
            other => Err(CompileError::UnsupportedCondition(other.to_string())),
        }
    }

    fn group(
        &mut self,
        kind: GroupKind,
        obj: &Map<String, Value>,
        depth: usize,
    ) -> Result<ConditionGroup, CompileError> {
        if depth >= MAX_CONDITION_DEPTH {
            return Err(CompileError::TooDeep {
                max: MAX_CONDITION_DEPTH,
            });
        }

        let members = match obj.get("members") {
            None | Some(Value::Null) => &[][..],
            Some(Value::Array(items)) => items.as_slice(),
            Some(_) => {
                return Err(CompileError::InvalidDefinition(
                    "'members' must be an array".to_string(),
                ));
            }
        };
        if members.len() > MAX_GROUP_MEMBERS {
            return Err(CompileError::InvalidDefinition(format!(
                "maximum {} members per group allowed",
                MAX_GROUP_MEMBERS
            )));
        }

        let members = members
            .iter()
            .map(|member| self.node(member, depth + 1))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ConditionGroup { kind, members })
    }
}

fn leaf<T: DeserializeOwned>(value: &Value, kind: &str) -> Result<T, CompileError> {
    T::deserialize(value)
        .map_err(|e| CompileError::InvalidDefinition(format!("invalid '{}' condition: {}", kind, e)))
}

/// Surface an unknown operator as `InvalidOperator` instead of a generic decode error
fn check_operator<T: DeserializeOwned>(
    obj: &Map<String, Value>,
    field: &str,
    context: &str,
) -> Result<(), CompileError> {
    let Some(raw) = obj.get(field) else {
        return Ok(());
    };
    if serde_json::from_value::<T>(raw.clone()).is_err() {
        let operator = raw
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| raw.to_string());
        return Err(CompileError::InvalidOperator {
            operator,
            context: context.to_string(),
        });
    }
    Ok(())
}

fn check_event_filters(obj: &Map<String, Value>, context: &str) -> Result<(), CompileError> {
    let Some(Value::Array(filters)) = obj.get("event_filters") else {
        return Ok(());
    };
    for filter in filters {
        if let Some(filter) = filter.as_object() {
            check_operator::<PropertyOperator>(filter, "operator", context)?;
        }
    }
    Ok(())
}

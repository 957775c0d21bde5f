//! Leaf condition compilers
//!
//! Each compiler turns one condition into a boolean SQL fragment evaluated
//! against an `events` row. Behavioral conditions become correlated
//! `distinct_id IN (SELECT ...)` predicates over a per-user aggregate.

use crate::core::constants::{COHORT_MEMBERS_TABLE, EVENTS_TABLE_FINAL, MAX_TIME_WINDOW_DAYS};
use crate::domain::error::CompileError;
use crate::domain::params::{BuildContext, QueryValue};
use crate::domain::sql::SelectBuilder;

use super::property::{PropertyAllowList, PropertySource, compile_property_comparison};
use super::types::{
    CohortCondition, EventCondition, EventFilter, FirstTimeEventCondition,
    PersonPropertyCondition,
};

/// `count()` compared against `count` within the trailing window
pub fn compile_event(
    condition: &EventCondition,
    ctx: &mut BuildContext,
    allowed: &PropertyAllowList,
) -> Result<String, CompileError> {
    if condition.count_operator.requires_zero(condition.count) {
        return Err(CompileError::invalid_value(
            "count",
            format!(
                "'{} {}' only matches users without the event, which an event count cannot express",
                condition.count_operator.sql(),
                condition.count
            ),
        ));
    }

    let mut query = windowed_event_query(
        ctx,
        &condition.event_name,
        condition.time_window_days,
        &condition.event_filters,
        allowed,
    )?;

    let count = ctx.bind("coh_count", QueryValue::UInt32(condition.count));
    query.having().add_raw(format!(
        "count() {} {}",
        condition.count_operator.sql(),
        count
    ));

    Ok(in_subquery(&query))
}

/// Direct comparison against the person property bag
pub fn compile_person_property(
    condition: &PersonPropertyCondition,
    ctx: &mut BuildContext,
    allowed: &PropertyAllowList,
) -> Result<String, CompileError> {
    compile_property_comparison(
        PropertySource::Person,
        &condition.property,
        condition.operator,
        condition.value.as_ref(),
        allowed,
        ctx,
    )
}

/// First-ever occurrence of the event lies inside the trailing window.
///
/// The scan is not time-bounded: the minimum has to be taken over the
/// user's whole history, otherwise any user active in the window would
/// look new.
pub fn compile_first_time_event(
    condition: &FirstTimeEventCondition,
    ctx: &mut BuildContext,
) -> Result<String, CompileError> {
    validate_window(condition.time_window_days)?;
    let mut query = event_scope_query(ctx, &condition.event_name)?;

    let upper = ctx.upper_bound();
    let window = ctx.bind("coh_window", QueryValue::UInt32(condition.time_window_days));
    query
        .having()
        .add_raw(format!("min(timestamp) >= {} - INTERVAL {} DAY", upper, window));
    query
        .having()
        .add_raw(format!("min(timestamp) <= {}", upper));

    Ok(in_subquery(&query))
}

/// Membership in a materialized cohort, optionally inverted
pub fn compile_cohort(
    condition: &CohortCondition,
    ctx: &mut BuildContext,
) -> Result<String, CompileError> {
    if condition.cohort_id.trim().is_empty() {
        return Err(CompileError::invalid_value("cohort_id", "must not be empty"));
    }

    let mut query = SelectBuilder::from(COHORT_MEMBERS_TABLE).column("distinct_id");
    let project = ctx.project_id_param().to_string();
    query.filters().add_raw(format!("project_id = {}", project));
    query.filters().add_eq(
        ctx,
        "cohort_id",
        "coh_cohort",
        QueryValue::String(condition.cohort_id.clone()),
    );

    let membership = in_subquery(&query);
    if condition.negated {
        Ok(format!("NOT ({})", membership))
    } else {
        Ok(membership)
    }
}

/// Per-user subquery over one event inside the trailing window.
///
/// Predicate order is fixed: project, event name, lower bound, upper bound,
/// then event filters. Callers add their HAVING clause.
pub(super) fn windowed_event_query(
    ctx: &mut BuildContext,
    event_name: &str,
    time_window_days: u32,
    event_filters: &[EventFilter],
    allowed: &PropertyAllowList,
) -> Result<SelectBuilder, CompileError> {
    validate_window(time_window_days)?;
    let mut query = event_scope_query(ctx, event_name)?;

    let upper = ctx.upper_bound();
    let window = ctx.bind("coh_window", QueryValue::UInt32(time_window_days));
    query
        .filters()
        .add_raw(format!("timestamp >= {} - INTERVAL {} DAY", upper, window));
    query.filters().add_raw(format!("timestamp <= {}", upper));

    for filter in event_filters {
        let predicate = compile_property_comparison(
            PropertySource::Event,
            &filter.property,
            filter.operator,
            filter.value.as_ref(),
            allowed,
            ctx,
        )?;
        query.filters().add_raw(predicate);
    }

    Ok(query)
}

/// Per-user scan of one event in the project: `project_id` then `event_name`
fn event_scope_query(ctx: &mut BuildContext, event_name: &str) -> Result<SelectBuilder, CompileError> {
    validate_event_name(event_name)?;

    let mut query = SelectBuilder::from(EVENTS_TABLE_FINAL)
        .column("distinct_id")
        .group_by("distinct_id");

    let project = ctx.project_id_param().to_string();
    query.filters().add_raw(format!("project_id = {}", project));
    query.filters().add_eq(
        ctx,
        "event_name",
        "coh_event",
        QueryValue::String(event_name.to_string()),
    );
    Ok(query)
}

pub(super) fn in_subquery(query: &SelectBuilder) -> String {
    format!("distinct_id IN ({})", query.build())
}

fn validate_event_name(event_name: &str) -> Result<(), CompileError> {
    if event_name.trim().is_empty() {
        return Err(CompileError::invalid_value("event_name", "must not be empty"));
    }
    Ok(())
}

fn validate_window(days: u32) -> Result<(), CompileError> {
    if days == 0 || days > MAX_TIME_WINDOW_DAYS {
        return Err(CompileError::InvalidWindow {
            days,
            max: MAX_TIME_WINDOW_DAYS,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::cohorts::property::PropertyOperator;
    use crate::domain::cohorts::types::CountOperator;
    use serde_json::json;

    fn ctx() -> BuildContext {
        BuildContext::new("6f1c2b8e-3d4a-4e5f-8a9b-0c1d2e3f4a5b").unwrap()
    }

    fn allowed() -> PropertyAllowList {
        PropertyAllowList::new(["plan", "$browser"])
    }

    fn event(op: CountOperator, count: u32) -> EventCondition {
        EventCondition {
            event_name: "purchase".into(),
            count_operator: op,
            count,
            time_window_days: 14,
            event_filters: vec![],
        }
    }

    #[test]
    fn test_event_condition_sql() {
        let mut ctx = ctx();
        let sql = compile_event(&event(CountOperator::Gte, 3), &mut ctx, &allowed()).unwrap();
        assert_eq!(
            sql,
            "distinct_id IN (SELECT distinct_id FROM events FINAL \
             WHERE project_id = {project_id:UUID} AND event_name = {coh_event_0:String} \
             AND timestamp >= now64(3) - INTERVAL {coh_window_1:UInt32} DAY \
             AND timestamp <= now64(3) \
             GROUP BY distinct_id HAVING count() >= {coh_count_2:UInt32})"
        );
        assert_eq!(
            ctx.params().get("coh_event_0"),
            Some(&QueryValue::String("purchase".into()))
        );
        assert_eq!(ctx.params().get("coh_window_1"), Some(&QueryValue::UInt32(14)));
        assert_eq!(ctx.params().get("coh_count_2"), Some(&QueryValue::UInt32(3)));
    }

    #[test]
    fn test_event_condition_operators() {
        for (op, sql_op) in [
            (CountOperator::Gt, ">"),
            (CountOperator::Lte, "<="),
            (CountOperator::Lt, "<"),
            (CountOperator::Eq, "="),
            (CountOperator::Neq, "!="),
        ] {
            let mut ctx = ctx();
            let sql = compile_event(&event(op, 5), &mut ctx, &allowed()).unwrap();
            assert!(sql.contains(&format!("HAVING count() {} {{coh_count_2:UInt32}}", sql_op)));
        }
    }

    #[test]
    fn test_event_condition_honors_date_to() {
        let mut ctx = ctx().with_date_to("2025-03-31 23:59:59").unwrap();
        let sql = compile_event(&event(CountOperator::Gte, 1), &mut ctx, &allowed()).unwrap();
        assert!(sql.contains(
            "timestamp >= {coh_date_to:DateTime64(3)} - INTERVAL {coh_window_1:UInt32} DAY"
        ));
        assert!(sql.contains("timestamp <= {coh_date_to:DateTime64(3)}"));
        assert!(!sql.contains("now64"));
    }

    #[test]
    fn test_event_condition_with_filters() {
        let mut ctx = ctx();
        let mut cond = event(CountOperator::Gte, 1);
        cond.event_filters = vec![
            EventFilter::eq("$browser", "Chrome"),
            EventFilter {
                property: "plan".into(),
                operator: PropertyOperator::Neq,
                value: Some(json!("free")),
            },
        ];
        let sql = compile_event(&cond, &mut ctx, &allowed()).unwrap();
        assert!(sql.contains(
            "AND timestamp <= now64(3) \
             AND JSONExtractString(properties, '$browser') = {coh_prop_2:String} \
             AND JSONExtractString(properties, 'plan') != {coh_prop_3:String} GROUP BY"
        ));
    }

    #[test]
    fn test_event_condition_rejects_zero_only_counts() {
        let mut ctx = ctx();
        for (op, n) in [
            (CountOperator::Eq, 0),
            (CountOperator::Lte, 0),
            (CountOperator::Lt, 1),
        ] {
            let err = compile_event(&event(op, n), &mut ctx, &allowed()).unwrap_err();
            assert!(matches!(err, CompileError::InvalidValue { .. }));
        }
    }

    #[test]
    fn test_event_condition_rejects_bad_window() {
        let mut ctx = ctx();
        let mut cond = event(CountOperator::Gte, 1);
        cond.time_window_days = 0;
        let err = compile_event(&cond, &mut ctx, &allowed()).unwrap_err();
        assert_eq!(
            err,
            CompileError::InvalidWindow {
                days: 0,
                max: MAX_TIME_WINDOW_DAYS
            }
        );
    }

    #[test]
    fn test_event_condition_rejects_empty_name() {
        let mut ctx = ctx();
        let mut cond = event(CountOperator::Gte, 1);
        cond.event_name = "  ".into();
        assert!(compile_event(&cond, &mut ctx, &allowed()).is_err());
    }

    #[test]
    fn test_event_filter_unknown_property_fails() {
        let mut ctx = ctx();
        let mut cond = event(CountOperator::Gte, 1);
        cond.event_filters = vec![EventFilter::eq("referrer", "x")];
        let err = compile_event(&cond, &mut ctx, &allowed()).unwrap_err();
        assert_eq!(err, CompileError::UnknownProperty("referrer".into()));
    }

    #[test]
    fn test_person_property_is_direct_comparison() {
        let mut ctx = ctx();
        let cond = PersonPropertyCondition {
            property: "plan".into(),
            operator: PropertyOperator::Eq,
            value: Some(json!("enterprise")),
        };
        let sql = compile_person_property(&cond, &mut ctx, &allowed()).unwrap();
        assert_eq!(
            sql,
            "JSONExtractString(person_properties, 'plan') = {coh_prop_0:String}"
        );
        assert!(!sql.contains("SELECT"));
    }

    #[test]
    fn test_first_time_event_sql() {
        let mut ctx = ctx();
        let cond = FirstTimeEventCondition {
            event_name: "signup".into(),
            time_window_days: 7,
        };
        let sql = compile_first_time_event(&cond, &mut ctx).unwrap();
        assert_eq!(
            sql,
            "distinct_id IN (SELECT distinct_id FROM events FINAL \
             WHERE project_id = {project_id:UUID} AND event_name = {coh_event_0:String} \
             GROUP BY distinct_id \
             HAVING min(timestamp) >= now64(3) - INTERVAL {coh_window_1:UInt32} DAY \
             AND min(timestamp) <= now64(3))"
        );
    }

    #[test]
    fn test_first_time_event_honors_date_to() {
        let mut ctx = ctx().with_date_to("2025-03-31T23:59:59Z").unwrap();
        let cond = FirstTimeEventCondition {
            event_name: "signup".into(),
            time_window_days: 7,
        };
        let sql = compile_first_time_event(&cond, &mut ctx).unwrap();
        assert!(sql.contains("min(timestamp) <= {coh_date_to:DateTime64(3)}"));
        assert!(!sql.contains("now64"));
    }

    #[test]
    fn test_cohort_membership() {
        let mut ctx = ctx();
        let cond = CohortCondition {
            cohort_id: "42".into(),
            negated: false,
        };
        assert_eq!(
            compile_cohort(&cond, &mut ctx).unwrap(),
            "distinct_id IN (SELECT distinct_id FROM cohort_members \
             WHERE project_id = {project_id:UUID} AND cohort_id = {coh_cohort_0:String})"
        );
    }

    #[test]
    fn test_cohort_membership_negated() {
        let mut ctx = ctx();
        let cond = CohortCondition {
            cohort_id: "42".into(),
            negated: true,
        };
        assert_eq!(
            compile_cohort(&cond, &mut ctx).unwrap(),
            "NOT (distinct_id IN (SELECT distinct_id FROM cohort_members \
             WHERE project_id = {project_id:UUID} AND cohort_id = {coh_cohort_0:String}))"
        );
    }

    #[test]
    fn test_cohort_membership_rejects_empty_id() {
        let mut ctx = ctx();
        let cond = CohortCondition {
            cohort_id: "".into(),
            negated: false,
        };
        assert!(compile_cohort(&cond, &mut ctx).is_err());
    }
}

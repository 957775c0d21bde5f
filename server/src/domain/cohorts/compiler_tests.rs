use super::*;
use crate::domain::cohorts::property::PropertyOperator;
use crate::domain::cohorts::types::{
    CohortCondition, CountOperator, EventCondition, EventFilter, FirstTimeEventCondition,
    PerformedRegularlyCondition, PeriodType, PersonPropertyCondition,
};
use regex::Regex;
use serde_json::json;

const PROJECT: &str = "6f1c2b8e-3d4a-4e5f-8a9b-0c1d2e3f4a5b";

fn ctx() -> BuildContext {
    BuildContext::new(PROJECT).unwrap()
}

fn allowed() -> PropertyAllowList {
    PropertyAllowList::new(["plan", "country", "$browser"])
}

fn signed_up(days: u32) -> Condition {
    Condition::Event(EventCondition {
        event_name: "signup".into(),
        count_operator: CountOperator::Gte,
        count: 1,
        time_window_days: days,
        event_filters: vec![],
    })
}

fn on_plan(plan: &str) -> Condition {
    Condition::PersonProperty(PersonPropertyCondition {
        property: "plan".into(),
        operator: PropertyOperator::Eq,
        value: Some(json!(plan)),
    })
}

fn regular(window: u32, total: u32) -> Condition {
    Condition::PerformedRegularly(PerformedRegularlyCondition {
        event_name: "session_start".into(),
        period_type: PeriodType::Week,
        total_periods: total,
        min_periods: 2,
        time_window_days: window,
        event_filters: vec![EventFilter::eq("$browser", "Firefox")],
    })
}

fn compile(condition: &Condition, ctx: &mut BuildContext) -> Result<String, CompileError> {
    let allowed = allowed();
    CohortCompiler::new(&allowed).compile(condition, ctx)
}

/// Replace parameter names with `?`, keeping their types
fn erase_param_names(sql: &str) -> String {
    let re = Regex::new(r"\{[A-Za-z0-9_]+:").unwrap();
    re.replace_all(sql, "{?:").into_owned()
}

#[test]
fn test_empty_and_is_tautology() {
    let mut ctx = ctx();
    let sql = compile(&ConditionGroup::and(vec![]).into(), &mut ctx).unwrap();
    assert_eq!(sql, "1 = 1");
    assert_eq!(ctx.counter(), 0);
}

#[test]
fn test_empty_or_is_contradiction() {
    let mut ctx = ctx();
    let sql = compile(&ConditionGroup::or(vec![]).into(), &mut ctx).unwrap();
    assert_eq!(sql, "1 = 0");
}

#[test]
fn test_empty_group_nested_keeps_identity() {
    let mut ctx = ctx();
    let tree = ConditionGroup::and(vec![on_plan("pro"), ConditionGroup::or(vec![]).into()]);
    let sql = compile(&tree.into(), &mut ctx).unwrap();
    assert_eq!(
        sql,
        "(JSONExtractString(person_properties, 'plan') = {coh_prop_0:String} AND 1 = 0)"
    );
}

#[test]
fn test_single_member_group_is_unwrapped() {
    let mut ctx = ctx();
    let sql = compile(&ConditionGroup::or(vec![on_plan("pro")]).into(), &mut ctx).unwrap();
    assert_eq!(
        sql,
        "JSONExtractString(person_properties, 'plan') = {coh_prop_0:String}"
    );
}

#[test]
fn test_nested_groups_are_parenthesized() {
    let mut ctx = ctx();
    let tree = ConditionGroup::or(vec![
        ConditionGroup::and(vec![on_plan("pro"), on_plan("team")]).into(),
        on_plan("enterprise"),
    ]);
    let sql = compile(&tree.into(), &mut ctx).unwrap();
    assert_eq!(
        sql,
        "((JSONExtractString(person_properties, 'plan') = {coh_prop_0:String} \
         AND JSONExtractString(person_properties, 'plan') = {coh_prop_1:String}) \
         OR JSONExtractString(person_properties, 'plan') = {coh_prop_2:String})"
    );
    assert_eq!(
        ctx.params().get("coh_prop_2"),
        Some(&QueryValue::String("enterprise".into()))
    );
}

#[test]
fn test_counter_threads_through_recursion() {
    let mut ctx = ctx();
    let tree = ConditionGroup::and(vec![
        signed_up(7),
        ConditionGroup::or(vec![on_plan("pro"), signed_up(30)]).into(),
    ]);
    compile(&tree.into(), &mut ctx).unwrap();

    // 3 + 1 + 3 bindings, no name reused
    assert_eq!(ctx.counter(), 7);
    assert_eq!(ctx.params().len(), 8);
    assert_eq!(ctx.params().get("coh_window_1"), Some(&QueryValue::UInt32(7)));
    assert_eq!(ctx.params().get("coh_window_5"), Some(&QueryValue::UInt32(30)));
}

#[test]
fn test_compilation_is_deterministic() {
    let tree: Condition = ConditionGroup::and(vec![
        signed_up(14),
        regular(60, 8),
        ConditionGroup::or(vec![on_plan("pro"), on_plan("team")]).into(),
    ])
    .into();

    let mut first = ctx();
    let mut second = ctx();
    let a = compile(&tree, &mut first).unwrap();
    let b = compile(&tree, &mut second).unwrap();

    assert_eq!(a, b);
    assert_eq!(first.params(), second.params());
}

#[test]
fn test_compilation_is_stable_modulo_param_names() {
    let tree: Condition =
        ConditionGroup::or(vec![signed_up(14), regular(60, 8), on_plan("pro")]).into();

    let mut fresh = ctx();
    let mut shifted = ctx();
    shifted.bind("other", QueryValue::UInt32(1));

    let a = compile(&tree, &mut fresh).unwrap();
    let b = compile(&tree, &mut shifted).unwrap();

    assert_ne!(a, b);
    assert_eq!(erase_param_names(&a), erase_param_names(&b));

    let values = |ctx: &BuildContext, skip: &str| -> Vec<QueryValue> {
        let mut entries: Vec<(usize, QueryValue)> = ctx
            .params()
            .iter()
            .filter(|(name, _)| name.starts_with("coh_") && name.as_str() != skip)
            .filter_map(|(name, value)| {
                let n = name.rsplit('_').next()?.parse().ok()?;
                Some((n, value.clone()))
            })
            .collect();
        entries.sort_by_key(|(n, _)| *n);
        entries.into_iter().map(|(_, v)| v).collect()
    };
    assert_eq!(values(&fresh, ""), values(&shifted, "other_0"));
}

#[test]
fn test_date_to_reaches_every_time_bound() {
    let mut ctx = ctx().with_date_to("2025-03-31 23:59:59").unwrap();
    let tree = ConditionGroup::and(vec![
        signed_up(7),
        regular(30, 4),
        Condition::FirstTimeEvent(FirstTimeEventCondition {
            event_name: "purchase".into(),
            time_window_days: 90,
        }),
    ]);
    let sql = compile(&tree.into(), &mut ctx).unwrap();

    assert!(!sql.contains("now64"));
    assert_eq!(sql.matches("{coh_date_to:DateTime64(3)} - INTERVAL").count(), 3);
    assert_eq!(
        ctx.params().get("coh_date_to"),
        Some(&QueryValue::DateTime64("2025-03-31 23:59:59.000".into()))
    );
}

#[test]
fn test_regularity_inside_tree_binds_window_not_total() {
    let mut ctx = ctx();
    let tree = ConditionGroup::and(vec![on_plan("pro"), regular(30, 52)]);
    compile(&tree.into(), &mut ctx).unwrap();

    let windows: Vec<&QueryValue> = ctx
        .params()
        .iter()
        .filter(|(name, _)| name.starts_with("coh_window_"))
        .map(|(_, v)| v)
        .collect();
    assert_eq!(windows, [&QueryValue::UInt32(30)]);
    assert!(!ctx.params().values().any(|v| *v == QueryValue::UInt32(52)));
}

#[test]
fn test_error_in_any_branch_fails_compilation() {
    let mut ctx = ctx();
    let tree = ConditionGroup::or(vec![
        on_plan("pro"),
        Condition::PersonProperty(PersonPropertyCondition {
            property: "age".into(),
            operator: PropertyOperator::Gt,
            value: Some(json!(30)),
        }),
    ]);
    let err = compile(&tree.into(), &mut ctx).unwrap_err();
    assert_eq!(err, CompileError::UnknownProperty("age".into()));
}

#[test]
fn test_depth_limit() {
    let mut node: Condition = on_plan("pro");
    for _ in 0..=MAX_CONDITION_DEPTH {
        node = ConditionGroup::and(vec![node]).into();
    }
    let mut ctx = ctx();
    let err = compile(&node, &mut ctx).unwrap_err();
    assert_eq!(
        err,
        CompileError::TooDeep {
            max: MAX_CONDITION_DEPTH
        }
    );
}

#[test]
fn test_depth_within_limit() {
    let mut node: Condition = on_plan("pro");
    for _ in 0..MAX_CONDITION_DEPTH {
        node = ConditionGroup::and(vec![node]).into();
    }
    let mut ctx = ctx();
    assert!(compile(&node, &mut ctx).is_ok());
}

#[test]
fn test_cohort_query_shape() {
    let definition = ConditionGroup::and(vec![on_plan("pro"), signed_up(7)]);
    let query = compile_cohort_query(&definition, ctx(), &allowed()).unwrap();

    assert!(query.sql.starts_with(
        "SELECT DISTINCT distinct_id, coalesce(dictGetOrNull('person_overrides_dict', 'person_id', \
         (project_id, distinct_id)), person_id) AS resolved_person_id FROM events FINAL \
         WHERE project_id = {project_id:UUID} AND ((JSONExtractString(person_properties, 'plan')"
    ));
    assert!(query.sql.ends_with(")) ORDER BY distinct_id"));
    assert_eq!(
        query.param("project_id"),
        Some(&QueryValue::Uuid(PROJECT.into()))
    );
    assert_eq!(query.param("coh_window_2"), Some(&QueryValue::UInt32(7)));
}

#[test]
fn test_cohort_query_empty_definition() {
    let query = compile_cohort_query(&ConditionGroup::and(vec![]), ctx(), &allowed()).unwrap();
    assert!(query.sql.contains("WHERE project_id = {project_id:UUID} AND (1 = 1)"));
    assert_eq!(query.params.len(), 1);
}

#[test]
fn test_cohort_query_references_other_cohort() {
    let definition = ConditionGroup::and(vec![Condition::Cohort(CohortCondition {
        cohort_id: "churned".into(),
        negated: true,
    })]);
    let query = compile_cohort_query(&definition, ctx(), &allowed()).unwrap();
    assert!(query.sql.contains(
        "AND (NOT (distinct_id IN (SELECT distinct_id FROM cohort_members \
         WHERE project_id = {project_id:UUID} AND cohort_id = {coh_cohort_0:String})))"
    ));
}

#[test]
fn test_materialization_statements() {
    let definition = ConditionGroup::and(vec![on_plan("pro")]);
    let statements =
        compile_cohort_materialization("power-users", &definition, ctx(), &allowed()).unwrap();

    assert_eq!(
        statements.clear.sql,
        "DELETE FROM cohort_members WHERE project_id = {project_id:UUID} AND cohort_id = {cohort_id:String}"
    );
    assert_eq!(
        statements.clear.param("cohort_id"),
        Some(&QueryValue::String("power-users".into()))
    );
    assert_eq!(statements.clear.params.len(), 2);
    assert_eq!(
        statements.count.sql,
        "SELECT count() FROM cohort_members FINAL \
         WHERE project_id = {project_id:UUID} AND cohort_id = {cohort_id:String}"
    );
    assert_eq!(statements.count.params, statements.clear.params);
    assert_eq!(
        statements.insert.sql,
        "INSERT INTO cohort_members (project_id, cohort_id, distinct_id) \
         SELECT DISTINCT project_id, {cohort_id:String}, distinct_id FROM events FINAL \
         WHERE project_id = {project_id:UUID} \
         AND (JSONExtractString(person_properties, 'plan') = {coh_prop_0:String})"
    );
    assert_eq!(statements.insert.params.len(), 3);
}

#[test]
fn test_materialization_scoped_to_project() {
    let definition = ConditionGroup::and(vec![on_plan("pro")]);
    let other = BuildContext::new("0194f0a4-6c2e-7d3a-9b1e-2f4c5d6e7f80").unwrap();
    let a = compile_cohort_materialization("churned", &definition, ctx(), &allowed()).unwrap();
    let b = compile_cohort_materialization("churned", &definition, other, &allowed()).unwrap();

    assert_eq!(a.clear.sql, b.clear.sql);
    assert_ne!(a.clear.params, b.clear.params);
    assert_eq!(
        a.clear.param("project_id"),
        Some(&QueryValue::Uuid(PROJECT.into()))
    );
    assert_eq!(
        b.count.param("project_id"),
        Some(&QueryValue::Uuid("0194f0a4-6c2e-7d3a-9b1e-2f4c5d6e7f80".into()))
    );
}

#[test]
fn test_materialization_rejects_empty_cohort_id() {
    let err = compile_cohort_materialization(" ", &ConditionGroup::and(vec![]), ctx(), &allowed())
        .unwrap_err();
    assert!(matches!(err, CompileError::InvalidValue { .. }));
}

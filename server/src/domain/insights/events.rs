//! Aggregation query builders over the events table
//!
//! Four query families share one WHERE assembly: the project scope is always
//! present, the remaining filters only when set. User counts always go through
//! the identity resolution expression.

use crate::core::constants::{
    EVENTS_TABLE_FINAL, IDENTIFY_EVENT_TYPE, QUERY_MAX_EVENTS_LIMIT, QUERY_MAX_TOP_EVENTS,
};
use crate::domain::error::CompileError;
use crate::domain::params::{BuildContext, CompiledQuery, QueryValue};
use crate::domain::sql::SelectBuilder;
use crate::utils::time::{to_datetime64_end_text, to_datetime64_text};

use super::identity::{resolved_person_id_select, unique_users_expr};
use super::types::{EventQueryFilter, Granularity};

/// Raw events, newest first, one page at a time
pub fn build_list_events(
    project_id: &str,
    filter: &EventQueryFilter,
    limit: u32,
    offset: u32,
) -> Result<CompiledQuery, CompileError> {
    let mut ctx = BuildContext::new(project_id)?;
    let limit = clamp_limit(limit, QUERY_MAX_EVENTS_LIMIT);

    let mut query = SelectBuilder::from(EVENTS_TABLE_FINAL)
        .column("event_id")
        .column("event_name")
        .column("event_type")
        .column("distinct_id")
        .column("person_id")
        .column(resolved_person_id_select())
        .column("session_id")
        .column("properties")
        .column("timestamp");
    apply_filters(&mut ctx, &mut query, filter)?;

    let limit = ctx.bind_named("limit", QueryValue::UInt32(limit));
    let offset = ctx.bind_named("offset", QueryValue::UInt32(offset));
    let query = query
        .order_by("timestamp DESC")
        .limit(limit)
        .offset(offset);

    Ok(ctx.finish(query.build()))
}

/// `{count, unique_users, sessions}` over the filtered window, identify calls excluded
pub fn build_event_counts(
    project_id: &str,
    filter: &EventQueryFilter,
) -> Result<CompiledQuery, CompileError> {
    let mut ctx = BuildContext::new(project_id)?;

    let mut query = SelectBuilder::from(EVENTS_TABLE_FINAL)
        .column_as("count()", "count")
        .column_as(unique_users_expr(), "unique_users")
        .column_as("uniqIf(session_id, session_id != '')", "sessions");
    apply_filters(&mut ctx, &mut query, filter)?;
    exclude_identify(&mut query);

    Ok(ctx.finish(query.build()))
}

/// `{period, count, unique_users}` per bucket, identify calls excluded
pub fn build_event_trend(
    project_id: &str,
    filter: &EventQueryFilter,
    granularity: Granularity,
) -> Result<CompiledQuery, CompileError> {
    let mut ctx = BuildContext::new(project_id)?;

    let mut query = SelectBuilder::from(EVENTS_TABLE_FINAL)
        .column_as(granularity.bucket_expr(), "period")
        .column_as("count()", "count")
        .column_as(unique_users_expr(), "unique_users");
    apply_filters(&mut ctx, &mut query, filter)?;
    exclude_identify(&mut query);
    let query = query.group_by("period").order_by("period");

    tracing::trace!(granularity = granularity.as_str(), "Built trend query");
    Ok(ctx.finish(query.build()))
}

/// `{event_name, count, unique_users}` for the N most frequent events
pub fn build_top_events(
    project_id: &str,
    filter: &EventQueryFilter,
    limit: u32,
) -> Result<CompiledQuery, CompileError> {
    let mut ctx = BuildContext::new(project_id)?;
    let limit = clamp_limit(limit, QUERY_MAX_TOP_EVENTS);

    let mut query = SelectBuilder::from(EVENTS_TABLE_FINAL)
        .column("event_name")
        .column_as("count()", "count")
        .column_as(unique_users_expr(), "unique_users");
    apply_filters(&mut ctx, &mut query, filter)?;

    let limit = ctx.bind_named("limit", QueryValue::UInt32(limit));
    let query = query
        .group_by("event_name")
        .order_by("count DESC")
        .order_by("event_name")
        .limit(limit);

    Ok(ctx.finish(query.build()))
}

/// Project scope plus the optional filters, in a fixed order
fn apply_filters(
    ctx: &mut BuildContext,
    query: &mut SelectBuilder,
    filter: &EventQueryFilter,
) -> Result<(), CompileError> {
    let from = normalize_bound("from", filter.from.as_deref(), to_datetime64_text)?;
    // A bare `to` date includes that whole day
    let to = normalize_bound("to", filter.to.as_deref(), to_datetime64_end_text)?;
    if let (Some(from), Some(to)) = (&from, &to)
        && from > to
    {
        return Err(CompileError::invalid_value("from", "must not be after 'to'"));
    }

    let project = ctx.project_id_param().to_string();
    let filters = query.filters();
    filters.add_raw(format!("project_id = {}", project));

    if let Some(event_name) = non_empty(filter.event_name.as_deref()) {
        filters.add_eq_named(
            ctx,
            "event_name",
            "event_name",
            QueryValue::String(event_name.to_string()),
        );
    }
    if let Some(distinct_id) = non_empty(filter.distinct_id.as_deref()) {
        filters.add_eq_named(
            ctx,
            "distinct_id",
            "distinct_id",
            QueryValue::String(distinct_id.to_string()),
        );
    }
    if let Some(from) = from {
        let from = ctx.bind_named("from", QueryValue::DateTime64(from));
        filters.add_raw(format!("timestamp >= {}", from));
    }
    if let Some(to) = to {
        let to = ctx.bind_named("to", QueryValue::DateTime64(to));
        filters.add_raw(format!("timestamp <= {}", to));
    }

    Ok(())
}

fn exclude_identify(query: &mut SelectBuilder) {
    query
        .filters()
        .add_raw(format!("event_type != '{}'", IDENTIFY_EVENT_TYPE));
}

fn normalize_bound(
    field: &str,
    value: Option<&str>,
    normalize: fn(&str) -> Option<String>,
) -> Result<Option<String>, CompileError> {
    match non_empty(value) {
        None => Ok(None),
        Some(raw) => normalize(raw)
            .map(Some)
            .ok_or_else(|| CompileError::InvalidTimestamp(format!("{}: {}", field, raw))),
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn clamp_limit(limit: u32, max: u32) -> u32 {
    let clamped = limit.clamp(1, max);
    if clamped != limit {
        tracing::debug!(requested = limit, applied = clamped, "Clamped query limit");
    }
    clamped
}

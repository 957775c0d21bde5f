//! "Performed regularly" conditions
//!
//! A user matches when their events fall into at least `min_periods` distinct
//! day/week/month buckets inside the trailing `time_window_days`. The window
//! bound to SQL is always `time_window_days`. `total_periods` is descriptive
//! metadata and is never bound or rendered.

use crate::domain::error::CompileError;
use crate::domain::params::{BuildContext, QueryValue};

use super::leaf::{in_subquery, windowed_event_query};
use super::property::PropertyAllowList;
use super::types::PerformedRegularlyCondition;

pub fn compile_performed_regularly(
    condition: &PerformedRegularlyCondition,
    ctx: &mut BuildContext,
    allowed: &PropertyAllowList,
) -> Result<String, CompileError> {
    if condition.min_periods == 0 {
        return Err(CompileError::invalid_value(
            "min_periods",
            "must be at least 1",
        ));
    }

    let mut query = windowed_event_query(
        ctx,
        &condition.event_name,
        condition.time_window_days,
        &condition.event_filters,
        allowed,
    )?;

    let min_periods = ctx.bind("coh_min", QueryValue::UInt32(condition.min_periods));
    query.having().add_raw(format!(
        "uniqExact({}) >= {}",
        condition.period_type.truncate_timestamp(),
        min_periods
    ));

    tracing::trace!(
        event = %condition.event_name,
        period = ?condition.period_type,
        window_days = condition.time_window_days,
        min_periods = condition.min_periods,
        "Compiled regularity condition"
    );

    Ok(in_subquery(&query))
}

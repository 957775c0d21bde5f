//! AnalyticsRepository trait implementation for ClickHouse

use std::sync::Arc;

use async_trait::async_trait;

use crate::core::constants::{PROPERTY_DISCOVERY_DAYS, PROPERTY_DISCOVERY_LIMIT};
use crate::data::error::DataError;
use crate::data::traits::{AnalyticsRepository, CohortRequest};
use crate::data::types::{
    CohortMember, EventCounts, EventRecord, MaterializedCohort, TopEvent, TrendPoint,
};
use crate::domain::BuildContext;
use crate::domain::cohorts::{
    PropertyAllowList, compile_cohort_materialization, compile_cohort_query,
    compile_property_discovery,
};
use crate::domain::error::CompileError;
use crate::domain::insights::{
    EventQueryFilter, Granularity, build_event_counts, build_event_trend, build_list_events,
    build_top_events,
};

use super::ClickhouseService;
use super::repositories::{cohorts, events, properties};

/// Fresh binder state for one cohort compilation
fn cohort_context(request: &CohortRequest<'_>) -> Result<BuildContext, CompileError> {
    let ctx = BuildContext::new(request.project_id)?;
    match request.date_to {
        Some(date_to) => ctx.with_date_to(date_to),
        None => Ok(ctx),
    }
}

#[async_trait]
impl AnalyticsRepository for Arc<ClickhouseService> {
    // ==================== Event Operations ====================

    async fn list_events(
        &self,
        project_id: &str,
        filter: &EventQueryFilter,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<EventRecord>, DataError> {
        let query = build_list_events(project_id, filter, limit, offset)?;
        events::list_events(self, &query).await.map_err(Into::into)
    }

    async fn event_counts(
        &self,
        project_id: &str,
        filter: &EventQueryFilter,
    ) -> Result<EventCounts, DataError> {
        let query = build_event_counts(project_id, filter)?;
        events::event_counts(self, &query).await.map_err(Into::into)
    }

    async fn event_trend(
        &self,
        project_id: &str,
        filter: &EventQueryFilter,
        granularity: Granularity,
    ) -> Result<Vec<TrendPoint>, DataError> {
        let query = build_event_trend(project_id, filter, granularity)?;
        events::event_trend(self, &query).await.map_err(Into::into)
    }

    async fn top_events(
        &self,
        project_id: &str,
        filter: &EventQueryFilter,
        limit: u32,
    ) -> Result<Vec<TopEvent>, DataError> {
        let query = build_top_events(project_id, filter, limit)?;
        events::top_events(self, &query).await.map_err(Into::into)
    }

    // ==================== Property Operations ====================

    async fn property_allow_list(&self, project_id: &str) -> Result<PropertyAllowList, DataError> {
        let query =
            compile_property_discovery(project_id, PROPERTY_DISCOVERY_DAYS, PROPERTY_DISCOVERY_LIMIT)?;
        let names = properties::property_names(self, &query).await?;
        Ok(PropertyAllowList::new(names))
    }

    // ==================== Cohort Operations ====================

    async fn cohort_members(
        &self,
        request: CohortRequest<'_>,
        limit: usize,
    ) -> Result<Vec<CohortMember>, DataError> {
        let ctx = cohort_context(&request)?;
        let query = compile_cohort_query(request.definition, ctx, request.properties)?;
        cohorts::cohort_members(self, &query, limit)
            .await
            .map_err(Into::into)
    }

    async fn materialize_cohort(
        &self,
        request: CohortRequest<'_>,
        cohort_id: &str,
    ) -> Result<MaterializedCohort, DataError> {
        let ctx = cohort_context(&request)?;
        let statements =
            compile_cohort_materialization(cohort_id, request.definition, ctx, request.properties)?;
        let members = cohorts::materialize_cohort(self, cohort_id, &statements).await?;
        Ok(MaterializedCohort {
            cohort_id: cohort_id.to_string(),
            members,
        })
    }
}

//! Repository trait for the analytics store
//!
//! Methods compile their query from caller input and execute it, so a bad
//! definition or filter surfaces as [`DataError::Compile`] before any request
//! is sent.

use async_trait::async_trait;

use crate::data::error::DataError;
use crate::data::types::{
    CohortMember, EventCounts, EventRecord, MaterializedCohort, TopEvent, TrendPoint,
};
use crate::domain::cohorts::{ConditionGroup, PropertyAllowList};
use crate::domain::insights::{EventQueryFilter, Granularity};

/// Cohort evaluation inputs shared by membership and materialization
#[derive(Debug, Clone, Copy)]
pub struct CohortRequest<'a> {
    pub project_id: &'a str,
    pub definition: &'a ConditionGroup,
    /// Evaluate time windows as of this timestamp instead of now
    pub date_to: Option<&'a str>,
    pub properties: &'a PropertyAllowList,
}

#[async_trait]
pub trait AnalyticsRepository: Send + Sync {
    // ==================== Event Operations ====================

    /// Raw events, newest first
    async fn list_events(
        &self,
        project_id: &str,
        filter: &EventQueryFilter,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<EventRecord>, DataError>;

    /// Totals over the filtered window, identify calls excluded
    async fn event_counts(
        &self,
        project_id: &str,
        filter: &EventQueryFilter,
    ) -> Result<EventCounts, DataError>;

    /// Counts per time bucket, identify calls excluded
    async fn event_trend(
        &self,
        project_id: &str,
        filter: &EventQueryFilter,
        granularity: Granularity,
    ) -> Result<Vec<TrendPoint>, DataError>;

    async fn top_events(
        &self,
        project_id: &str,
        filter: &EventQueryFilter,
        limit: u32,
    ) -> Result<Vec<TopEvent>, DataError>;

    // ==================== Property Operations ====================

    /// Allow-list of property names seen recently in the project
    async fn property_allow_list(&self, project_id: &str) -> Result<PropertyAllowList, DataError>;

    // ==================== Cohort Operations ====================

    /// Distinct ids matching a definition, at most `limit`
    async fn cohort_members(
        &self,
        request: CohortRequest<'_>,
        limit: usize,
    ) -> Result<Vec<CohortMember>, DataError>;

    /// Replace the stored members of `cohort_id` with the definition's current members
    async fn materialize_cohort(
        &self,
        request: CohortRequest<'_>,
        cohort_id: &str,
    ) -> Result<MaterializedCohort, DataError>;
}

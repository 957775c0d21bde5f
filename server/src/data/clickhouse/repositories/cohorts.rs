//! Cohort membership and materialization (ClickHouse backend)

use clickhouse::Row;
use serde::Deserialize;

use crate::data::clickhouse::{ClickhouseError, ClickhouseService};
use crate::data::types::CohortMember;
use crate::domain::CompiledQuery;
use crate::domain::cohorts::CohortMaterialization;

/// ClickHouse row for a cohort member
#[derive(Row, Deserialize)]
struct ChCohortMemberRow {
    distinct_id: String,
    resolved_person_id: String,
}

impl From<ChCohortMemberRow> for CohortMember {
    fn from(row: ChCohortMemberRow) -> Self {
        Self {
            distinct_id: row.distinct_id,
            resolved_person_id: row.resolved_person_id,
        }
    }
}

/// Stream members of a compiled cohort query, stopping after `limit` rows
pub async fn cohort_members(
    service: &ClickhouseService,
    query: &CompiledQuery,
    limit: usize,
) -> Result<Vec<CohortMember>, ClickhouseError> {
    let collect = async {
        let mut cursor = service.prepare(query).fetch::<ChCohortMemberRow>()?;
        let mut members = Vec::new();
        while members.len() < limit {
            match cursor.next().await? {
                Some(row) => members.push(CohortMember::from(row)),
                None => break,
            }
        }
        Ok::<_, clickhouse::error::Error>(members)
    };
    let members = service.with_timeout(collect).await?;

    if members.len() == limit {
        tracing::debug!(limit, "Cohort member listing truncated");
    }
    Ok(members)
}

/// Replace the stored members of one cohort and return the new member count
pub async fn materialize_cohort(
    service: &ClickhouseService,
    cohort_id: &str,
    statements: &CohortMaterialization,
) -> Result<u64, ClickhouseError> {
    service
        .with_timeout(service.prepare(&statements.clear).execute())
        .await?;
    service
        .with_timeout(service.prepare(&statements.insert).execute())
        .await?;

    let members: u64 = service
        .with_timeout(service.prepare(&statements.count).fetch_one())
        .await?;

    tracing::debug!(cohort_id, members, "Cohort materialized");
    Ok(members)
}

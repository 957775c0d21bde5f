//! Event listing and rollups (ClickHouse backend)

use clickhouse::Row;
use serde::Deserialize;

use super::to_utc;
use crate::data::clickhouse::{ClickhouseError, ClickhouseService};
use crate::data::types::{EventCounts, EventRecord, TopEvent, TrendPoint, parse_properties};
use crate::domain::CompiledQuery;

/// ClickHouse row for event listing
#[derive(Row, Deserialize)]
struct ChEventRow {
    #[serde(with = "clickhouse::serde::uuid")]
    event_id: uuid::Uuid,
    event_name: String,
    event_type: String,
    distinct_id: String,
    person_id: String,
    resolved_person_id: String,
    session_id: String,
    properties: String,
    #[serde(with = "clickhouse::serde::time::datetime64::millis")]
    timestamp: time::OffsetDateTime,
}

impl From<ChEventRow> for EventRecord {
    fn from(row: ChEventRow) -> Self {
        Self {
            event_id: row.event_id.to_string(),
            event_name: row.event_name,
            event_type: row.event_type,
            distinct_id: row.distinct_id,
            person_id: row.person_id,
            resolved_person_id: row.resolved_person_id,
            session_id: Some(row.session_id).filter(|s| !s.is_empty()),
            properties: parse_properties(&row.properties),
            timestamp: to_utc(row.timestamp),
        }
    }
}

/// ClickHouse row for the count rollup
#[derive(Row, Deserialize)]
struct ChCountsRow {
    count: u64,
    unique_users: u64,
    sessions: u64,
}

/// ClickHouse row for one trend bucket
#[derive(Row, Deserialize)]
struct ChTrendRow {
    #[serde(with = "clickhouse::serde::time::datetime")]
    period: time::OffsetDateTime,
    count: u64,
    unique_users: u64,
}

/// ClickHouse row for top events
#[derive(Row, Deserialize)]
struct ChTopEventRow {
    event_name: String,
    count: u64,
    unique_users: u64,
}

pub async fn list_events(
    service: &ClickhouseService,
    query: &CompiledQuery,
) -> Result<Vec<EventRecord>, ClickhouseError> {
    let rows: Vec<ChEventRow> = service
        .with_timeout(service.prepare(query).fetch_all())
        .await?;
    tracing::debug!(rows = rows.len(), "Listed events");
    Ok(rows.into_iter().map(EventRecord::from).collect())
}

pub async fn event_counts(
    service: &ClickhouseService,
    query: &CompiledQuery,
) -> Result<EventCounts, ClickhouseError> {
    // Aggregates without GROUP BY always return exactly one row
    let row: ChCountsRow = service
        .with_timeout(service.prepare(query).fetch_one())
        .await?;
    Ok(EventCounts {
        count: row.count,
        unique_users: row.unique_users,
        sessions: row.sessions,
    })
}

pub async fn event_trend(
    service: &ClickhouseService,
    query: &CompiledQuery,
) -> Result<Vec<TrendPoint>, ClickhouseError> {
    let rows: Vec<ChTrendRow> = service
        .with_timeout(service.prepare(query).fetch_all())
        .await?;
    Ok(rows
        .into_iter()
        .map(|row| TrendPoint {
            period: to_utc(row.period),
            count: row.count,
            unique_users: row.unique_users,
        })
        .collect())
}

pub async fn top_events(
    service: &ClickhouseService,
    query: &CompiledQuery,
) -> Result<Vec<TopEvent>, ClickhouseError> {
    let rows: Vec<ChTopEventRow> = service
        .with_timeout(service.prepare(query).fetch_all())
        .await?;
    Ok(rows
        .into_iter()
        .map(|row| TopEvent {
            event_name: row.event_name,
            count: row.count,
            unique_users: row.unique_users,
        })
        .collect())
}

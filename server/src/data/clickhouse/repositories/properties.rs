//! Property-name discovery (ClickHouse backend)

use crate::data::clickhouse::{ClickhouseError, ClickhouseService};
use crate::domain::CompiledQuery;

/// Distinct property names, one per row
pub async fn property_names(
    service: &ClickhouseService,
    query: &CompiledQuery,
) -> Result<Vec<String>, ClickhouseError> {
    let names: Vec<String> = service
        .with_timeout(service.prepare(query).fetch_all())
        .await?;
    tracing::debug!(count = names.len(), "Discovered property names");
    Ok(names)
}

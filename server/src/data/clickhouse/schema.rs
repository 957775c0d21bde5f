//! ClickHouse schema definitions
//!
//! - `events`: append-only event rows, deduplicated on `event_id` by
//!   ReplacingMergeTree and always read with `FINAL`
//! - `person_overrides` + `person_overrides_dict`: identity merges, looked up
//!   per row with `dictGetOrNull`
//! - `cohort_members`: materialized static cohorts
//! - `schema_version`: single-row migration bookkeeping

use crate::core::config::ClickhouseConfig;
use crate::core::constants::{
    COHORT_MEMBERS_TABLE, EVENTS_TABLE, PERSON_OVERRIDES_DICT, PERSON_OVERRIDES_TABLE,
};

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// Upgrades applied in order after the initial schema: `(version, name, sql)`
pub const MIGRATIONS: &[(i32, &str, &str)] = &[];

/// Generate schema version table
pub fn schema_version_table() -> String {
    r#"
CREATE TABLE IF NOT EXISTS schema_version (
    id UInt8,
    version Int32,
    applied_at Int64,
    description Nullable(String)
) ENGINE = ReplacingMergeTree()
ORDER BY id
"#
    .to_string()
}

fn events_table() -> String {
    format!(
        r#"
CREATE TABLE IF NOT EXISTS {table} (
    -- IDENTITY
    project_id          UUID,
    event_id            UUID,
    event_name          LowCardinality(String),
    event_type          LowCardinality(String) DEFAULT 'track',

    -- ACTOR
    distinct_id         String,
    person_id           String,
    session_id          String DEFAULT '',

    -- PAYLOAD
    properties          String DEFAULT '{{}}',
    person_properties   String DEFAULT '{{}}',

    -- TIMING
    timestamp           DateTime64(3, 'UTC'),
    ingested_at         DateTime64(3, 'UTC') DEFAULT now64(3),

    INDEX idx_distinct_id distinct_id TYPE bloom_filter(0.01) GRANULARITY 4,
    INDEX idx_session_id session_id TYPE bloom_filter(0.01) GRANULARITY 4
) ENGINE = ReplacingMergeTree(ingested_at)
PARTITION BY toYYYYMM(timestamp)
ORDER BY (project_id, event_name, toDate(timestamp), distinct_id, event_id)
"#,
        table = EVENTS_TABLE
    )
}

fn person_overrides_table() -> String {
    format!(
        r#"
CREATE TABLE IF NOT EXISTS {table} (
    project_id          UUID,
    distinct_id         String,
    person_id           String,
    version             UInt64
) ENGINE = ReplacingMergeTree(version)
ORDER BY (project_id, distinct_id)
"#,
        table = PERSON_OVERRIDES_TABLE
    )
}

/// Dictionary over the latest override per `(project_id, distinct_id)`.
///
/// The dictionary source connects back to the server with the configured
/// credentials, so they are embedded as string literals.
fn person_overrides_dictionary(config: &ClickhouseConfig) -> String {
    let mut source = format!(
        "QUERY 'SELECT project_id, distinct_id, argMax(person_id, version) AS person_id FROM {db}.{table} GROUP BY project_id, distinct_id'",
        db = quote_literal(&config.database),
        table = PERSON_OVERRIDES_TABLE
    );
    if let Some(ref user) = config.user {
        source.push_str(&format!(" USER '{}'", quote_literal(user)));
    }
    if let Some(ref password) = config.password {
        source.push_str(&format!(" PASSWORD '{}'", quote_literal(password)));
    }

    format!(
        r#"
CREATE DICTIONARY IF NOT EXISTS {dict} (
    project_id          UUID,
    distinct_id         String,
    person_id           String
)
PRIMARY KEY project_id, distinct_id
SOURCE(CLICKHOUSE({source}))
LAYOUT(COMPLEX_KEY_HASHED())
LIFETIME(MIN 30 MAX 60)
"#,
        dict = PERSON_OVERRIDES_DICT,
        source = source
    )
}

fn cohort_members_table() -> String {
    format!(
        r#"
CREATE TABLE IF NOT EXISTS {table} (
    project_id          UUID,
    cohort_id           String,
    distinct_id         String,
    created_at          DateTime64(3, 'UTC') DEFAULT now64(3)
) ENGINE = ReplacingMergeTree(created_at)
ORDER BY (project_id, cohort_id, distinct_id)
"#,
        table = COHORT_MEMBERS_TABLE
    )
}

/// Statements for a fresh database, in dependency order
pub fn generate_schema(config: &ClickhouseConfig) -> Vec<String> {
    vec![
        schema_version_table(),
        events_table(),
        person_overrides_table(),
        person_overrides_dictionary(config),
        cohort_members_table(),
    ]
}

/// Migration for one version, if defined
pub fn migration(version: i32) -> Option<(&'static str, &'static str)> {
    MIGRATIONS
        .iter()
        .find(|(v, _, _)| *v == version)
        .map(|(_, name, sql)| (*name, *sql))
}

/// Escape a value for a single-quoted ClickHouse string literal
fn quote_literal(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

// =============================================================================
// Application Identity
// =============================================================================

/// Application name in title case (for display)
pub const APP_NAME: &str = "CohortQL";

/// Application name in lowercase (for paths, identifiers and log targets)
pub const APP_NAME_LOWER: &str = "cohortql";

/// Unix-style dotfile folder name
pub const APP_DOT_FOLDER: &str = ".cohortql";

// =============================================================================
// Configuration Files
// =============================================================================

/// Config file name
pub const CONFIG_FILE_NAME: &str = "cohortql.json";

/// Environment variable for config file path
pub const ENV_CONFIG: &str = "COHORTQL_CONFIG";

// =============================================================================
// Environment Variables - Logging
// =============================================================================

/// Environment variable for log level/filter
pub const ENV_LOG: &str = "COHORTQL_LOG";

// =============================================================================
// Environment Variables - ClickHouse
// =============================================================================

/// Environment variable for ClickHouse connection URL
pub const ENV_CLICKHOUSE_URL: &str = "COHORTQL_CLICKHOUSE_URL";

/// Environment variable for ClickHouse database name
pub const ENV_CLICKHOUSE_DATABASE: &str = "COHORTQL_CLICKHOUSE_DATABASE";

/// Environment variable for ClickHouse user
pub const ENV_CLICKHOUSE_USER: &str = "COHORTQL_CLICKHOUSE_USER";

/// Environment variable for ClickHouse password
pub const ENV_CLICKHOUSE_PASSWORD: &str = "COHORTQL_CLICKHOUSE_PASSWORD";

/// Environment variable for query timeout in seconds
pub const ENV_CLICKHOUSE_TIMEOUT_SECS: &str = "COHORTQL_CLICKHOUSE_TIMEOUT_SECS";

// =============================================================================
// ClickHouse Database
// =============================================================================

/// ClickHouse default URL
pub const CLICKHOUSE_DEFAULT_URL: &str = "http://localhost:8123";

/// ClickHouse default database name
pub const CLICKHOUSE_DEFAULT_DATABASE: &str = "cohortql";

/// ClickHouse default query timeout in seconds
pub const CLICKHOUSE_DEFAULT_TIMEOUT_SECS: u64 = 30;

// =============================================================================
// Physical Schema
// =============================================================================

/// Wide events table
pub const EVENTS_TABLE: &str = "events";

/// Events table with merge-on-read dedup resolved at query time
pub const EVENTS_TABLE_FINAL: &str = "events FINAL";

/// Materialized (static) cohort membership
pub const COHORT_MEMBERS_TABLE: &str = "cohort_members";

/// Identity override table backing the dictionary
pub const PERSON_OVERRIDES_TABLE: &str = "person_overrides";

/// Dictionary mapping (project_id, distinct_id) to person_id
pub const PERSON_OVERRIDES_DICT: &str = "person_overrides_dict";

/// Event type of identity calls, excluded from behavioral counts
pub const IDENTIFY_EVENT_TYPE: &str = "identify";

// =============================================================================
// Compiler Limits
// =============================================================================

/// Largest trailing window a condition may request (about ten years)
pub const MAX_TIME_WINDOW_DAYS: u32 = 3650;

/// Maximum nesting of condition groups
pub const MAX_CONDITION_DEPTH: usize = 10;

/// Days of history scanned when discovering event property names
pub const PROPERTY_DISCOVERY_DAYS: u32 = 30;

/// Maximum property names returned by discovery
pub const PROPERTY_DISCOVERY_LIMIT: u32 = 1000;

// =============================================================================
// Query Limits
// =============================================================================

/// Default page size for event listing
pub const QUERY_DEFAULT_EVENTS_LIMIT: u32 = 100;

/// Maximum page size for event listing (memory safety)
pub const QUERY_MAX_EVENTS_LIMIT: u32 = 1000;

/// Default N for top-events queries
pub const QUERY_DEFAULT_TOP_EVENTS: u32 = 10;

/// Maximum N for top-events queries
pub const QUERY_MAX_TOP_EVENTS: u32 = 100;

/// Maximum cohort members printed or returned in one query
pub const QUERY_MAX_COHORT_MEMBERS: u32 = 100_000;

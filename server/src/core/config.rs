use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::utils::file::expand_path;

use super::cli::CliConfig;
use super::constants::{
    APP_DOT_FOLDER, CLICKHOUSE_DEFAULT_DATABASE, CLICKHOUSE_DEFAULT_TIMEOUT_SECS,
    CLICKHOUSE_DEFAULT_URL, CONFIG_FILE_NAME, QUERY_DEFAULT_EVENTS_LIMIT,
    QUERY_DEFAULT_TOP_EVENTS, QUERY_MAX_EVENTS_LIMIT, QUERY_MAX_TOP_EVENTS,
};

// =============================================================================
// File Config (JSON)
// =============================================================================

/// ClickHouse configuration section (from JSON config file)
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ClickhouseFileConfig {
    /// HTTP URL (or use COHORTQL_CLICKHOUSE_URL env var)
    pub url: Option<String>,
    /// Database name (default: "cohortql")
    pub database: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    /// Per-query timeout in seconds
    pub timeout_secs: Option<u64>,
    /// Enable LZ4 compression (default: true)
    pub compression: Option<bool>,
}

/// Query limits section (from JSON config file)
#[derive(Debug, Default, Clone, Deserialize)]
pub struct QueryFileConfig {
    /// Page size for event listing when none is given
    pub default_limit: Option<u32>,
    /// Largest accepted page size for event listing
    pub max_limit: Option<u32>,
    /// Rows returned by the top-events query when none is given
    pub top_events_limit: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    pub clickhouse: Option<ClickhouseFileConfig>,
    pub query: Option<QueryFileConfig>,
    #[serde(flatten)]
    pub extra: serde_json::Value,
}

impl FileConfig {
    /// Load configuration from a JSON file
    fn load_from_file(path: &Path) -> Result<Self> {
        tracing::debug!(path = %path.display(), "Loading config file");
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        tracing::trace!(config = ?config, "Parsed config file");
        Ok(config)
    }

    /// Warn about unknown top-level fields
    fn warn_unknown_fields(&self) {
        if let serde_json::Value::Object(map) = &self.extra
            && !map.is_empty()
        {
            let keys_str: String = map
                .keys()
                .map(|k| k.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            tracing::warn!(
                fields = %keys_str,
                "Unknown fields in config file (possible typos)"
            );
        }
    }

    /// Merge another FileConfig into this one (other takes precedence)
    fn merge(&mut self, other: FileConfig) {
        if let Some(clickhouse) = other.clickhouse {
            let current = self
                .clickhouse
                .get_or_insert_with(ClickhouseFileConfig::default);
            if clickhouse.url.is_some() {
                tracing::trace!(url = "***", "Merging clickhouse.url");
                current.url = clickhouse.url;
            }
            if clickhouse.database.is_some() {
                tracing::trace!(database = ?clickhouse.database, "Merging clickhouse.database");
                current.database = clickhouse.database;
            }
            if clickhouse.user.is_some() {
                tracing::trace!(user = "***", "Merging clickhouse.user");
                current.user = clickhouse.user;
            }
            if clickhouse.password.is_some() {
                tracing::trace!(password = "***", "Merging clickhouse.password");
                current.password = clickhouse.password;
            }
            if clickhouse.timeout_secs.is_some() {
                tracing::trace!(timeout_secs = ?clickhouse.timeout_secs, "Merging clickhouse.timeout_secs");
                current.timeout_secs = clickhouse.timeout_secs;
            }
            if clickhouse.compression.is_some() {
                tracing::trace!(compression = ?clickhouse.compression, "Merging clickhouse.compression");
                current.compression = clickhouse.compression;
            }
        }

        if let Some(query) = other.query {
            let current = self.query.get_or_insert_with(QueryFileConfig::default);
            if query.default_limit.is_some() {
                tracing::trace!(default_limit = ?query.default_limit, "Merging query.default_limit");
                current.default_limit = query.default_limit;
            }
            if query.max_limit.is_some() {
                tracing::trace!(max_limit = ?query.max_limit, "Merging query.max_limit");
                current.max_limit = query.max_limit;
            }
            if query.top_events_limit.is_some() {
                tracing::trace!(top_events_limit = ?query.top_events_limit, "Merging query.top_events_limit");
                current.top_events_limit = query.top_events_limit;
            }
        }
    }
}

// =============================================================================
// Runtime Config
// =============================================================================

#[derive(Debug, Clone)]
pub struct ClickhouseConfig {
    pub url: String,
    pub database: String,
    pub user: Option<String>,
    pub password: Option<String>,
    /// Per-query timeout in seconds
    pub timeout_secs: u64,
    /// Enable LZ4 compression for requests/responses
    pub compression: bool,
}

#[derive(Debug, Clone)]
pub struct QueryConfig {
    pub default_limit: u32,
    pub max_limit: u32,
    pub top_events_limit: u32,
}

impl QueryConfig {
    /// Page size to use for a listing request
    pub fn events_limit(&self, requested: Option<u32>) -> u32 {
        requested
            .unwrap_or(self.default_limit)
            .clamp(1, self.max_limit)
    }

    /// Row count to use for a top-events request
    pub fn top_limit(&self, requested: Option<u32>) -> u32 {
        requested
            .unwrap_or(self.top_events_limit)
            .clamp(1, QUERY_MAX_TOP_EVENTS)
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub clickhouse: ClickhouseConfig,
    pub query: QueryConfig,
}

impl AppConfig {
    /// Load configuration from all sources
    ///
    /// Priority (lowest to highest):
    /// 1. Defaults
    /// 2. Profile directory config (~/.cohortql/cohortql.json)
    /// 3. Local directory config OR CLI-specified config path
    /// 4. CLI arguments (which include env var fallbacks via clap)
    pub fn load(cli: &CliConfig) -> Result<Self> {
        tracing::debug!("Loading application configuration");

        let mut file_config = FileConfig::default();
        let mut found_configs: Vec<String> = Vec::new();

        if let Some(profile_path) = get_profile_config_path()
            && profile_path.exists()
        {
            let profile_config = FileConfig::load_from_file(&profile_path)?;
            profile_config.warn_unknown_fields();
            file_config.merge(profile_config);
            found_configs.push(profile_path.display().to_string());
        }

        let overlay_path = if let Some(ref path) = cli.config {
            let expanded = expand_path(&path.to_string_lossy());
            if !expanded.exists() {
                anyhow::bail!("Config file not found: {}", expanded.display());
            }
            Some(expanded)
        } else {
            let local = PathBuf::from(CONFIG_FILE_NAME);
            if local.exists() { Some(local) } else { None }
        };

        if let Some(path) = overlay_path {
            let overlay_config = FileConfig::load_from_file(&path)?;
            overlay_config.warn_unknown_fields();
            file_config.merge(overlay_config);
            found_configs.push(path.display().to_string());
        }

        tracing::debug!(configs = ?found_configs, "Config files loaded");

        let config = Self::layer(cli, file_config);
        config.validate()?;
        Ok(config)
    }

    /// Apply CLI/env overrides on top of file values and defaults
    fn layer(cli: &CliConfig, file_config: FileConfig) -> Self {
        let file_ch = file_config.clickhouse.unwrap_or_default();
        let file_query = file_config.query.unwrap_or_default();

        let clickhouse = ClickhouseConfig {
            url: cli
                .clickhouse_url
                .clone()
                .or(file_ch.url)
                .unwrap_or_else(|| CLICKHOUSE_DEFAULT_URL.to_string()),
            database: cli
                .clickhouse_database
                .clone()
                .or(file_ch.database)
                .unwrap_or_else(|| CLICKHOUSE_DEFAULT_DATABASE.to_string()),
            user: cli.clickhouse_user.clone().or(file_ch.user),
            password: cli.clickhouse_password.clone().or(file_ch.password),
            timeout_secs: cli
                .clickhouse_timeout_secs
                .or(file_ch.timeout_secs)
                .unwrap_or(CLICKHOUSE_DEFAULT_TIMEOUT_SECS),
            compression: file_ch.compression.unwrap_or(true),
        };

        let query = QueryConfig {
            default_limit: file_query
                .default_limit
                .unwrap_or(QUERY_DEFAULT_EVENTS_LIMIT),
            max_limit: file_query.max_limit.unwrap_or(QUERY_MAX_EVENTS_LIMIT),
            top_events_limit: file_query
                .top_events_limit
                .unwrap_or(QUERY_DEFAULT_TOP_EVENTS),
        };

        Self { clickhouse, query }
    }

    fn validate(&self) -> Result<()> {
        if self.clickhouse.url.trim().is_empty() {
            anyhow::bail!(
                "Configuration error: clickhouse.url must not be empty. \
                 Set via COHORTQL_CLICKHOUSE_URL env var or clickhouse.url in config file."
            );
        }
        if self.clickhouse.database.trim().is_empty() {
            anyhow::bail!("Configuration error: clickhouse.database must not be empty");
        }
        if self.clickhouse.timeout_secs == 0 {
            anyhow::bail!("Configuration error: clickhouse.timeout_secs must be greater than 0");
        }

        let query = &self.query;
        if query.max_limit == 0 || query.max_limit > QUERY_MAX_EVENTS_LIMIT {
            anyhow::bail!(
                "Configuration error: query.max_limit must be between 1 and {}",
                QUERY_MAX_EVENTS_LIMIT
            );
        }
        if query.default_limit == 0 || query.default_limit > query.max_limit {
            anyhow::bail!(
                "Configuration error: query.default_limit ({}) must be between 1 and query.max_limit ({})",
                query.default_limit,
                query.max_limit
            );
        }
        if query.top_events_limit == 0 || query.top_events_limit > QUERY_MAX_TOP_EVENTS {
            anyhow::bail!(
                "Configuration error: query.top_events_limit must be between 1 and {}",
                QUERY_MAX_TOP_EVENTS
            );
        }

        Ok(())
    }
}

/// Get the profile config path (~/.cohortql/cohortql.json)
fn get_profile_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(APP_DOT_FOLDER).join(CONFIG_FILE_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(json: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_file_config_parse_full() {
        let json = r#"{
            "clickhouse": {
                "url": "http://ch:8123",
                "database": "analytics",
                "user": "reader",
                "password": "secret",
                "timeout_secs": 10,
                "compression": false
            },
            "query": { "default_limit": 50, "max_limit": 500, "top_events_limit": 20 }
        }"#;
        let config: FileConfig = serde_json::from_str(json).unwrap();

        let ch = config.clickhouse.as_ref().unwrap();
        assert_eq!(ch.url.as_deref(), Some("http://ch:8123"));
        assert_eq!(ch.database.as_deref(), Some("analytics"));
        assert_eq!(ch.timeout_secs, Some(10));
        assert_eq!(ch.compression, Some(false));

        let query = config.query.as_ref().unwrap();
        assert_eq!(query.default_limit, Some(50));
        assert_eq!(query.max_limit, Some(500));
        assert_eq!(query.top_events_limit, Some(20));
    }

    #[test]
    fn test_file_config_parse_empty() {
        let config: FileConfig = serde_json::from_str("{}").unwrap();
        assert!(config.clickhouse.is_none());
        assert!(config.query.is_none());
    }

    #[test]
    fn test_file_config_parse_extra_fields() {
        let json = r#"{ "clickhouse": { "url": "http://ch" }, "clikhouse": 1 }"#;
        let config: FileConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.extra.get("clikhouse").unwrap(), 1);
        assert!(config.extra.get("clickhouse").is_none());
    }

    #[test]
    fn test_file_config_merge() {
        let mut base: FileConfig = serde_json::from_str(
            r#"{ "clickhouse": { "url": "http://base", "database": "base_db" },
                 "query": { "default_limit": 10 } }"#,
        )
        .unwrap();
        let overlay: FileConfig = serde_json::from_str(
            r#"{ "clickhouse": { "database": "overlay_db", "timeout_secs": 5 },
                 "query": { "max_limit": 200 } }"#,
        )
        .unwrap();

        base.merge(overlay);

        let ch = base.clickhouse.as_ref().unwrap();
        assert_eq!(ch.url.as_deref(), Some("http://base"));
        assert_eq!(ch.database.as_deref(), Some("overlay_db"));
        assert_eq!(ch.timeout_secs, Some(5));
        let query = base.query.as_ref().unwrap();
        assert_eq!(query.default_limit, Some(10));
        assert_eq!(query.max_limit, Some(200));
    }

    #[test]
    fn test_layer_defaults() {
        let config = AppConfig::layer(&CliConfig::default(), FileConfig::default());
        assert_eq!(config.clickhouse.url, CLICKHOUSE_DEFAULT_URL);
        assert_eq!(config.clickhouse.database, CLICKHOUSE_DEFAULT_DATABASE);
        assert_eq!(config.clickhouse.timeout_secs, CLICKHOUSE_DEFAULT_TIMEOUT_SECS);
        assert!(config.clickhouse.compression);
        assert!(config.clickhouse.user.is_none());
        assert_eq!(config.query.default_limit, QUERY_DEFAULT_EVENTS_LIMIT);
        assert_eq!(config.query.max_limit, QUERY_MAX_EVENTS_LIMIT);
        assert_eq!(config.query.top_events_limit, QUERY_DEFAULT_TOP_EVENTS);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_layer_cli_overrides_file() {
        let file: FileConfig = serde_json::from_str(
            r#"{ "clickhouse": { "url": "http://file", "user": "file_user", "timeout_secs": 60 } }"#,
        )
        .unwrap();
        let cli = CliConfig {
            clickhouse_url: Some("http://cli".to_string()),
            clickhouse_timeout_secs: Some(3),
            ..Default::default()
        };

        let config = AppConfig::layer(&cli, file);
        assert_eq!(config.clickhouse.url, "http://cli");
        assert_eq!(config.clickhouse.user.as_deref(), Some("file_user"));
        assert_eq!(config.clickhouse.timeout_secs, 3);
    }

    #[test]
    fn test_load_from_cli_config_path() {
        let file = write_config(
            r#"{ "clickhouse": { "database": "from_file" }, "query": { "top_events_limit": 25 } }"#,
        );
        let cli = CliConfig {
            config: Some(file.path().to_path_buf()),
            clickhouse_url: Some("http://localhost:8123".to_string()),
            clickhouse_database: None,
            ..Default::default()
        };

        let config = AppConfig::load(&cli).unwrap();
        assert_eq!(config.query.top_events_limit, 25);
    }

    #[test]
    fn test_load_missing_config_path() {
        let cli = CliConfig {
            config: Some(PathBuf::from("/nonexistent/cohortql.json")),
            ..Default::default()
        };
        let err = AppConfig::load(&cli).unwrap_err();
        assert!(err.to_string().contains("Config file not found"));
    }

    #[test]
    fn test_load_invalid_json() {
        let file = write_config("{ not json");
        let cli = CliConfig {
            config: Some(file.path().to_path_buf()),
            ..Default::default()
        };
        let err = AppConfig::load(&cli).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }

    #[test]
    fn test_validate_default_above_max() {
        let file: FileConfig =
            serde_json::from_str(r#"{ "query": { "default_limit": 300, "max_limit": 200 } }"#)
                .unwrap();
        let config = AppConfig::layer(&CliConfig::default(), file);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("query.default_limit"));
    }

    #[test]
    fn test_validate_max_limit_ceiling() {
        let file: FileConfig =
            serde_json::from_str(r#"{ "query": { "max_limit": 5000 } }"#).unwrap();
        let config = AppConfig::layer(&CliConfig::default(), file);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_empty_url() {
        let cli = CliConfig {
            clickhouse_url: Some("  ".to_string()),
            ..Default::default()
        };
        let config = AppConfig::layer(&cli, FileConfig::default());
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("clickhouse.url"));
    }

    #[test]
    fn test_query_limits() {
        let config = AppConfig::layer(&CliConfig::default(), FileConfig::default());
        assert_eq!(config.query.events_limit(None), QUERY_DEFAULT_EVENTS_LIMIT);
        assert_eq!(config.query.events_limit(Some(0)), 1);
        assert_eq!(config.query.events_limit(Some(50_000)), QUERY_MAX_EVENTS_LIMIT);
        assert_eq!(config.query.top_limit(None), QUERY_DEFAULT_TOP_EVENTS);
        assert_eq!(config.query.top_limit(Some(1_000)), QUERY_MAX_TOP_EVENTS);
    }
}

//! ClickHouse analytics service
//!
//! Owns the shared client, applies the schema, and executes compiled queries.
//! Every compiled query carries its values as named parameters; they are
//! forwarded to the server as-is and never spliced into the SQL text.

pub mod error;
pub mod repositories;
mod repository_impl;
pub mod schema;

pub use error::ClickhouseError;

use std::future::Future;
use std::time::Duration;

use clickhouse::Client;
use clickhouse::query::Query;

use crate::core::config::ClickhouseConfig;
use crate::domain::CompiledQuery;

/// ClickHouse analytics service
///
/// The client pools HTTP connections internally and is safe to share between
/// concurrent queries.
pub struct ClickhouseService {
    client: Client,
    config: ClickhouseConfig,
}

impl ClickhouseService {
    /// Build the client without touching the server
    pub fn connect(config: &ClickhouseConfig) -> Self {
        let mut client = Client::default()
            .with_url(&config.url)
            .with_database(&config.database);

        if let Some(ref user) = config.user {
            client = client.with_user(user);
        }
        if let Some(ref password) = config.password {
            client = client.with_password(password);
        }

        if config.compression {
            client = client.with_compression(clickhouse::Compression::Lz4);
        }

        // Every read goes through FINAL; let each monthly partition be
        // collapsed independently instead of merging across all of them.
        client = client.with_option("do_not_merge_across_partitions_select_final", "1");

        tracing::debug!(
            url = %config.url,
            database = %config.database,
            compression = config.compression,
            timeout_secs = config.timeout_secs,
            "ClickhouseService configured"
        );

        Self {
            client,
            config: config.clone(),
        }
    }

    /// Turn a compiled query into a client query with every parameter bound by name
    pub fn prepare(&self, compiled: &CompiledQuery) -> Query {
        tracing::trace!(sql = %compiled.sql, params = compiled.params.len(), "Preparing query");
        compiled
            .params
            .iter()
            .fold(self.client.query(&compiled.sql), |query, (name, value)| {
                query.param(name, value)
            })
    }

    /// Await a store call, failing with [`ClickhouseError::Timeout`] past the configured limit
    pub async fn with_timeout<T, F>(&self, call: F) -> Result<T, ClickhouseError>
    where
        F: Future<Output = Result<T, clickhouse::error::Error>>,
    {
        let timeout_secs = self.config.timeout_secs;
        match tokio::time::timeout(Duration::from_secs(timeout_secs), call).await {
            Ok(result) => result.map_err(ClickhouseError::from),
            Err(_) => {
                tracing::warn!(timeout_secs, "ClickHouse query timed out");
                Err(ClickhouseError::Timeout { timeout_secs })
            }
        }
    }

    /// Run schema migrations
    pub async fn run_migrations(&self) -> Result<(), ClickhouseError> {
        let table_exists: bool = self
            .client
            .query(
                "SELECT count() > 0 FROM system.tables WHERE database = currentDatabase() AND name = 'schema_version'",
            )
            .fetch_one()
            .await
            .map_err(|e| ClickhouseError::Connection(format!(
                "Failed to check schema_version table: {}. Verify ClickHouse is running and accessible.",
                e
            )))?;

        let current_version: Option<i32> = if table_exists {
            self.client
                .query("SELECT version FROM schema_version FINAL WHERE id = 1")
                .fetch_optional()
                .await?
        } else {
            None
        };

        match current_version {
            None => {
                tracing::debug!(
                    "Applying initial ClickHouse schema v{}",
                    schema::SCHEMA_VERSION
                );
                self.apply_initial_schema().await?;
            }
            Some(v) if v < schema::SCHEMA_VERSION => {
                tracing::debug!(
                    "Migrating ClickHouse schema from v{} to v{}",
                    v,
                    schema::SCHEMA_VERSION
                );
                for version in (v + 1)..=schema::SCHEMA_VERSION {
                    self.apply_versioned_migration(version).await?;
                }
            }
            Some(v) if v > schema::SCHEMA_VERSION => {
                return Err(ClickhouseError::MigrationFailed {
                    version: v,
                    name: "version_check".to_string(),
                    error: format!(
                        "Database schema version {} is newer than application version {}. Upgrade the application.",
                        v,
                        schema::SCHEMA_VERSION
                    ),
                });
            }
            _ => {
                tracing::debug!(
                    "ClickHouse schema is up to date (v{})",
                    schema::SCHEMA_VERSION
                );
            }
        }

        Ok(())
    }

    async fn apply_initial_schema(&self) -> Result<(), ClickhouseError> {
        let statements = schema::generate_schema(&self.config);
        tracing::debug!(statements = statements.len(), "Applying ClickHouse schema");

        for statement in &statements {
            self.client
                .query(statement)
                .execute()
                .await
                .map_err(|e| ClickhouseError::MigrationFailed {
                    version: schema::SCHEMA_VERSION,
                    name: "initial".to_string(),
                    error: e.to_string(),
                })?;
        }

        self.record_version(schema::SCHEMA_VERSION, "Initial schema")
            .await?;

        tracing::debug!(
            version = schema::SCHEMA_VERSION,
            "ClickHouse schema applied successfully"
        );
        Ok(())
    }

    async fn apply_versioned_migration(&self, version: i32) -> Result<(), ClickhouseError> {
        let Some((name, sql)) = schema::migration(version) else {
            return Err(ClickhouseError::MigrationFailed {
                version,
                name: "unknown".to_string(),
                error: format!("No migration defined for version {}", version),
            });
        };

        self.client
            .query(sql)
            .execute()
            .await
            .map_err(|e| ClickhouseError::MigrationFailed {
                version,
                name: name.to_string(),
                error: e.to_string(),
            })?;

        self.record_version(version, name).await?;
        tracing::debug!("ClickHouse migration v{} ({}) applied", version, name);
        Ok(())
    }

    /// Upsert the single schema_version row (ReplacingMergeTree keeps the latest)
    async fn record_version(&self, version: i32, description: &str) -> Result<(), ClickhouseError> {
        let now = chrono::Utc::now().timestamp();
        self.client
            .query(
                "INSERT INTO schema_version (id, version, applied_at, description) VALUES (?, ?, ?, ?)",
            )
            .bind(1u8)
            .bind(version)
            .bind(now)
            .bind(description)
            .execute()
            .await
            .map_err(ClickhouseError::from)
    }
}

//! Core application

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::CommandFactory;
use serde::Serialize;

use crate::core::cli::{self, Cli, CliConfig, Commands, DefinitionArgs};
use crate::core::config::AppConfig;
use crate::core::constants::{APP_NAME_LOWER, ENV_LOG, QUERY_MAX_COHORT_MEMBERS};
use crate::data::clickhouse::schema::SCHEMA_VERSION;
use crate::data::{AnalyticsRepository, ClickhouseService, CohortRequest};
use crate::domain::BuildContext;
use crate::domain::cohorts::{
    ConditionGroup, PropertyAllowList, compile_cohort_materialization, compile_cohort_query,
    parse_definition,
};
use crate::utils::file::read_text;

pub struct CoreApp {
    pub config: AppConfig,
    pub analytics: Arc<ClickhouseService>,
}

impl CoreApp {
    /// Run the application with CLI argument parsing
    pub async fn run() -> Result<()> {
        dotenvy::dotenv().ok();
        Self::init_logging();

        tracing::debug!("Application starting");

        let (cli_config, command) = cli::parse();
        tracing::trace!(command = ?command, "Parsed command");

        let Some(command) = command else {
            Cli::command().print_help()?;
            return Ok(());
        };

        match command {
            // Compilation never needs config or the store
            Commands::Compile {
                definition,
                materialize,
            } => Self::compile(&definition, materialize.as_deref()),
            command => Self::init(&cli_config)?.execute(command).await,
        }
    }

    fn init(cli: &CliConfig) -> Result<Self> {
        let config = AppConfig::load(cli)?;
        let analytics = Arc::new(ClickhouseService::connect(&config.clickhouse));
        Ok(Self { config, analytics })
    }

    async fn execute(&self, command: Commands) -> Result<()> {
        match command {
            Commands::Cohort {
                definition,
                materialize,
                limit,
            } => self.cohort(&definition, materialize.as_deref(), limit).await,
            Commands::Events {
                project_id,
                filter,
                limit,
                offset,
            } => {
                let limit = self.config.query.events_limit(limit);
                let rows = self
                    .analytics
                    .list_events(&project_id, &filter.into(), limit, offset)
                    .await?;
                print_json(&rows)
            }
            Commands::Counts { project_id, filter } => {
                let counts = self
                    .analytics
                    .event_counts(&project_id, &filter.into())
                    .await?;
                print_json(&counts)
            }
            Commands::Trend {
                project_id,
                filter,
                granularity,
            } => {
                let points = self
                    .analytics
                    .event_trend(&project_id, &filter.into(), granularity)
                    .await?;
                print_json(&points)
            }
            Commands::Top {
                project_id,
                filter,
                limit,
            } => {
                let limit = self.config.query.top_limit(limit);
                let rows = self
                    .analytics
                    .top_events(&project_id, &filter.into(), limit)
                    .await?;
                print_json(&rows)
            }
            Commands::Properties { project_id } => {
                let allowed = self.analytics.property_allow_list(&project_id).await?;
                let mut names: Vec<&str> = allowed.iter().collect();
                names.sort_unstable();
                print_json(&names)
            }
            Commands::Migrate => {
                self.analytics
                    .run_migrations()
                    .await
                    .context("Failed to apply ClickHouse schema")?;
                println!("Schema is at version {}", SCHEMA_VERSION);
                Ok(())
            }
            Commands::Compile {
                definition,
                materialize,
            } => Self::compile(&definition, materialize.as_deref()),
        }
    }

    async fn cohort(
        &self,
        args: &DefinitionArgs,
        materialize: Option<&str>,
        limit: Option<u32>,
    ) -> Result<()> {
        let definition = load_definition(args)?;
        let properties = if args.properties.is_empty() {
            self.analytics.property_allow_list(&args.project_id).await?
        } else {
            PropertyAllowList::new(args.properties.iter().cloned())
        };
        tracing::debug!(properties = properties.len(), "Property allow-list ready");

        let request = CohortRequest {
            project_id: &args.project_id,
            definition: &definition,
            date_to: args.date_to.as_deref(),
            properties: &properties,
        };

        if let Some(cohort_id) = materialize {
            let result = self.analytics.materialize_cohort(request, cohort_id).await?;
            return print_json(&result);
        }

        let limit = limit
            .unwrap_or(QUERY_MAX_COHORT_MEMBERS)
            .min(QUERY_MAX_COHORT_MEMBERS) as usize;
        let members = self.analytics.cohort_members(request, limit).await?;
        print_json(&members)
    }

    /// Print the compiled SQL and parameters without contacting the store
    fn compile(args: &DefinitionArgs, materialize: Option<&str>) -> Result<()> {
        let definition = load_definition(args)?;
        let properties = PropertyAllowList::new(args.properties.iter().cloned());

        let mut ctx = BuildContext::new(&args.project_id)?;
        if let Some(ref date_to) = args.date_to {
            ctx = ctx.with_date_to(date_to)?;
        }

        match materialize {
            Some(cohort_id) => print_json(&compile_cohort_materialization(
                cohort_id,
                &definition,
                ctx,
                &properties,
            )?),
            None => print_json(&compile_cohort_query(&definition, ctx, &properties)?),
        }
    }

    fn init_logging() {
        let default_filter = format!("info,{}=info", APP_NAME_LOWER);

        let filter = std::env::var(ENV_LOG)
            .or_else(|_| std::env::var("RUST_LOG"))
            .unwrap_or(default_filter);

        tracing_subscriber::fmt()
            .with_target(false)
            .with_thread_ids(false)
            .with_level(true)
            .with_ansi(true)
            .with_writer(std::io::stderr)
            .compact()
            .with_env_filter(filter)
            .init();
    }
}

fn load_definition(args: &DefinitionArgs) -> Result<ConditionGroup> {
    let json = read_text(&args.definition)?;
    parse_definition(&json)
        .with_context(|| format!("Invalid cohort definition: {}", args.definition.display()))
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

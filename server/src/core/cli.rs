use clap::{Args, Parser, Subcommand};

use std::path::PathBuf;

use super::constants::{
    ENV_CLICKHOUSE_DATABASE, ENV_CLICKHOUSE_PASSWORD, ENV_CLICKHOUSE_TIMEOUT_SECS,
    ENV_CLICKHOUSE_URL, ENV_CLICKHOUSE_USER, ENV_CONFIG,
};
use crate::domain::insights::{EventQueryFilter, Granularity};

#[derive(Parser)]
#[command(name = "cohortql")]
#[command(version, about = "Cohort and insight queries over ClickHouse events", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to config file
    #[arg(long, short = 'c', global = true, env = ENV_CONFIG)]
    pub config: Option<PathBuf>,

    /// ClickHouse HTTP URL
    #[arg(long, global = true, env = ENV_CLICKHOUSE_URL)]
    pub clickhouse_url: Option<String>,

    /// ClickHouse database name
    #[arg(long, global = true, env = ENV_CLICKHOUSE_DATABASE)]
    pub clickhouse_database: Option<String>,

    /// ClickHouse user
    #[arg(long, global = true, env = ENV_CLICKHOUSE_USER)]
    pub clickhouse_user: Option<String>,

    /// ClickHouse password
    #[arg(long, global = true, env = ENV_CLICKHOUSE_PASSWORD, hide_env_values = true)]
    pub clickhouse_password: Option<String>,

    /// Per-query timeout in seconds
    #[arg(long, global = true, env = ENV_CLICKHOUSE_TIMEOUT_SECS, value_parser = parse_timeout_secs)]
    pub clickhouse_timeout_secs: Option<u64>,
}

/// Parse a non-zero timeout from CLI/env string
fn parse_timeout_secs(s: &str) -> Result<u64, String> {
    match s.trim().parse::<u64>() {
        Ok(0) => Err("Timeout must be greater than 0".to_string()),
        Ok(secs) => Ok(secs),
        Err(_) => Err(format!("Invalid timeout '{}'. Expected seconds", s)),
    }
}

/// Parse trend granularity from CLI string
fn parse_granularity(s: &str) -> Result<Granularity, String> {
    s.parse()
}

/// Filters shared by the aggregation commands
#[derive(Args, Clone, Debug, Default)]
pub struct FilterArgs {
    /// Only events with this name
    #[arg(long)]
    pub event_name: Option<String>,

    /// Only events from this distinct id
    #[arg(long)]
    pub distinct_id: Option<String>,

    /// Lower time bound (ISO-8601 or `YYYY-MM-DD HH:MM:SS`)
    #[arg(long)]
    pub from: Option<String>,

    /// Upper time bound (ISO-8601 or `YYYY-MM-DD HH:MM:SS`)
    #[arg(long)]
    pub to: Option<String>,
}

impl From<FilterArgs> for EventQueryFilter {
    fn from(args: FilterArgs) -> Self {
        Self {
            event_name: args.event_name,
            distinct_id: args.distinct_id,
            from: args.from,
            to: args.to,
        }
    }
}

/// Inputs shared by the cohort commands
#[derive(Args, Clone, Debug)]
pub struct DefinitionArgs {
    /// Path to the cohort definition JSON
    #[arg(long, short = 'd')]
    pub definition: PathBuf,

    /// Project the cohort is scoped to
    #[arg(long)]
    pub project_id: String,

    /// Evaluate time windows as of this timestamp instead of now
    #[arg(long)]
    pub date_to: Option<String>,

    /// Known property names; discovered from the store when omitted
    #[arg(long, value_delimiter = ',')]
    pub properties: Vec<String>,
}

#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Compile a cohort definition and print the SQL with its parameters
    Compile {
        #[command(flatten)]
        definition: DefinitionArgs,

        /// Print the materialization statements for this cohort id instead
        #[arg(long)]
        materialize: Option<String>,
    },
    /// Evaluate a cohort definition against the store
    Cohort {
        #[command(flatten)]
        definition: DefinitionArgs,

        /// Write the members into cohort_members under this cohort id
        #[arg(long)]
        materialize: Option<String>,

        /// Maximum members to print
        #[arg(long)]
        limit: Option<u32>,
    },
    /// List raw events, newest first
    Events {
        #[arg(long)]
        project_id: String,

        #[command(flatten)]
        filter: FilterArgs,

        #[arg(long)]
        limit: Option<u32>,

        #[arg(long, default_value_t = 0)]
        offset: u32,
    },
    /// Event, user and session totals
    Counts {
        #[arg(long)]
        project_id: String,

        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Event and user counts per time bucket
    Trend {
        #[arg(long)]
        project_id: String,

        #[command(flatten)]
        filter: FilterArgs,

        /// Bucket size (hour, day, week, month)
        #[arg(long, default_value = "day", value_parser = parse_granularity)]
        granularity: Granularity,
    },
    /// Most frequent events
    Top {
        #[arg(long)]
        project_id: String,

        #[command(flatten)]
        filter: FilterArgs,

        #[arg(long)]
        limit: Option<u32>,
    },
    /// Property names seen recently in a project
    Properties {
        #[arg(long)]
        project_id: String,
    },
    /// Create or upgrade the ClickHouse schema
    Migrate,
}

/// Configuration derived from CLI arguments
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub config: Option<PathBuf>,
    pub clickhouse_url: Option<String>,
    pub clickhouse_database: Option<String>,
    pub clickhouse_user: Option<String>,
    pub clickhouse_password: Option<String>,
    pub clickhouse_timeout_secs: Option<u64>,
}

/// Parse CLI arguments and return config with command
pub fn parse() -> (CliConfig, Option<Commands>) {
    split(Cli::parse())
}

fn split(cli: Cli) -> (CliConfig, Option<Commands>) {
    let config = CliConfig {
        config: cli.config,
        clickhouse_url: cli.clickhouse_url,
        clickhouse_database: cli.clickhouse_database,
        clickhouse_user: cli.clickhouse_user,
        clickhouse_password: cli.clickhouse_password,
        clickhouse_timeout_secs: cli.clickhouse_timeout_secs,
    };
    (config, cli.command)
}

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};

use crate::cache::CacheBackendKind;

/// Command-line arguments for the Murmur binary.
#[derive(Debug, Parser)]
#[command(name = "murmur", version, about = "Murmur social feed server")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "MURMUR_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the HTTP API.
    Serve(Box<ServeArgs>),
    /// Run the background fan-out workers.
    Worker(WorkerArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    /// Keep all state in process memory and run fan-out jobs in-process.
    #[arg(long = "in-memory", action = clap::ArgAction::SetTrue)]
    pub in_memory: bool,

    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct WorkerArgs {
    #[command(flatten)]
    pub common: CommonOverrides,

    /// Override the spread-post worker concurrency.
    #[arg(long = "jobs-spread-post-concurrency", value_name = "COUNT")]
    pub jobs_spread_post_concurrency: Option<u32>,

    /// Override the collect-feed worker concurrency.
    #[arg(long = "jobs-collect-feed-concurrency", value_name = "COUNT")]
    pub jobs_collect_feed_concurrency: Option<u32>,
}

/// Overrides understood by every command.
#[derive(Debug, Args, Default, Clone)]
pub struct CommonOverrides {
    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,

    /// Override the database pool size.
    #[arg(long = "database-max-connections", value_name = "COUNT")]
    pub database_max_connections: Option<u32>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    #[command(flatten)]
    pub common: CommonOverrides,

    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the per-request deadline.
    #[arg(long = "server-request-timeout-seconds", value_name = "SECONDS")]
    pub request_timeout_seconds: Option<u64>,

    /// Enable or disable the post cache.
    #[arg(
        long = "cache-enabled",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub cache_enabled: Option<bool>,

    /// Override the cache backend (memory|postgres).
    #[arg(long = "cache-backend", value_name = "BACKEND", value_parser = parse_backend)]
    pub cache_backend: Option<CacheBackendKind>,

    /// Override the cache entry lifetime.
    #[arg(long = "cache-ttl-seconds", value_name = "SECONDS")]
    pub cache_ttl_seconds: Option<u64>,
}

fn parse_backend(value: &str) -> Result<CacheBackendKind, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "memory" => Ok(CacheBackendKind::Memory),
        "postgres" => Ok(CacheBackendKind::Postgres),
        other => Err(format!("unknown cache backend `{other}`")),
    }
}

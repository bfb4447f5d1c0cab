use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "horos", about = "Admin CLI and server for the horos routing mesh")]
pub struct Cli {
    /// Path to the SQLite store shared by every subsystem.
    #[arg(long, global = true, default_value = "horos.db")]
    pub db: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// CRUD on the `routes` table.
    Route {
        #[command(subcommand)]
        action: RouteAction,
    },
    /// CRUD on the `dynamic_tools` table, plus reading its history.
    Tool {
        #[command(subcommand)]
        action: ToolAction,
    },
    /// CRUD on DBSync targets (routes with `service_name LIKE 'dbsync:%'`).
    Target {
        #[command(subcommand)]
        action: TargetAction,
    },
    /// Boot every subsystem and block until SIGINT.
    Serve(ServeArgs),
}

#[derive(Debug, Subcommand)]
pub enum RouteAction {
    List,
    Set(RouteSetArgs),
    Rm { service_name: String },
}

#[derive(Debug, Args)]
pub struct RouteSetArgs {
    pub service_name: String,
    pub strategy: String,
    #[arg(long)]
    pub endpoint: Option<String>,
    #[arg(long, default_value = "{}")]
    pub config: String,
}

#[derive(Debug, Subcommand)]
pub enum ToolAction {
    List,
    Set(ToolSetArgs),
    Rm { name: String },
    History { name: String },
}

#[derive(Debug, Args)]
pub struct ToolSetArgs {
    pub name: String,
    #[arg(long, default_value = "general")]
    pub category: String,
    #[arg(long, default_value = "")]
    pub description: String,
    #[arg(long)]
    pub handler_type: String,
    #[arg(long, default_value = "{}")]
    pub handler_config: String,
    #[arg(long, default_value = "{}")]
    pub input_schema: String,
    #[arg(long, default_value = "readwrite")]
    pub mode: String,
}

#[derive(Debug, Subcommand)]
pub enum TargetAction {
    List,
    Set(TargetSetArgs),
    Rm { name: String },
}

#[derive(Debug, Args)]
pub struct TargetSetArgs {
    pub name: String,
    pub endpoint: String,
    #[arg(long, default_value = "dbsync")]
    pub strategy: String,
}

#[derive(Debug, Args)]
pub struct ServeArgs {
    /// QUIC listen address for DBSync pushes, e.g. 0.0.0.0:4433.
    #[arg(long)]
    pub listen: Option<String>,
    /// QUIC target addresses to publish snapshots to.
    #[arg(long = "publish-to")]
    pub publish_to: Vec<String>,
    /// Overrides the configured poll interval; omit to use the config
    /// file/env/default value.
    #[arg(long)]
    pub poll_interval_ms: Option<u64>,
    /// Overrides the configured debounce window; omit to use the config
    /// file/env/default value.
    #[arg(long)]
    pub debounce_ms: Option<u64>,
    /// Optional TOML config file; CLI flags here take precedence.
    #[arg(long)]
    pub config: Option<PathBuf>,
}

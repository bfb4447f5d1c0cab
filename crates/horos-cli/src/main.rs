mod cli_args;
mod commands;
mod config;
mod telemetry;

use cli_args::{Cli, Command, RouteAction, TargetAction, ToolAction};
use clap::Parser;
use rusqlite::Connection;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init_tracing("horos-cli");

    let cli = Cli::parse();

    match &cli.command {
        Command::Route { action } => {
            let conn = Connection::open(&cli.db)?;
            match action {
                RouteAction::List => commands::route::list(&conn)?,
                RouteAction::Set(args) => commands::route::set(&conn, args)?,
                RouteAction::Rm { service_name } => commands::route::rm(&conn, service_name)?,
            }
        }
        Command::Tool { action } => {
            let conn = Connection::open(&cli.db)?;
            match action {
                ToolAction::List => commands::tool::list(&conn)?,
                ToolAction::Set(args) => commands::tool::set(&conn, args)?,
                ToolAction::Rm { name } => commands::tool::rm(&conn, name)?,
                ToolAction::History { name } => commands::tool::history(&conn, name)?,
            }
        }
        Command::Target { action } => {
            let conn = Connection::open(&cli.db)?;
            match action {
                TargetAction::List => commands::target::list(&conn)?,
                TargetAction::Set(args) => commands::target::set(&conn, args)?,
                TargetAction::Rm { name } => commands::target::rm(&conn, name)?,
            }
        }
        Command::Serve(args) => {
            commands::serve::run(&cli.db, args).await?;
        }
    }

    Ok(())
}

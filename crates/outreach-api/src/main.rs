//! Outreach CLI entry point.
//!
//! Binary name: `outreach`
//!
//! Parses CLI arguments, sets up tracing, signs the user in to the
//! connection cache, then dispatches to the command handler.

mod cli;
mod state;

use anyhow::Context;
use clap::Parser;
use clap_complete::generate;
use outreach_observe::{TracingOptions, init_tracing, shutdown_tracing};

use cli::{Cli, Commands};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info,outreach_core=debug,outreach_infra=debug",
        _ => "trace",
    };
    init_tracing(&TracingOptions {
        default_filter: filter.to_string(),
        json: cli.log_json,
        enable_otel: cli.otel,
    })
    .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    // Shell completions don't need app state
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "outreach", &mut std::io::stdout());
        return Ok(());
    }

    let user = cli
        .user
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .context("no user signed in; pass --user or set OUTREACH_USER")?;
    let state = AppState::init(user).await?;

    let result = match cli.command {
        Commands::Connections { action } => {
            cli::connections::handle_connections_command(action, &state, cli.json).await
        }
        Commands::Generate(args) => {
            cli::generate::handle_generate(args, &state, cli.json, cli.quiet).await
        }
        Commands::Completions { .. } => Ok(()),
    };

    shutdown_tracing();
    result
}

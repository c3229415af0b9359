//! CLI command definitions for the `outreach` binary.
//!
//! Uses clap derive macros for argument parsing.

pub mod connections;
pub mod generate;
pub mod render;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

/// Generate and approve personalized outreach messages for your connections.
#[derive(Parser)]
#[command(name = "outreach", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Emit logs as JSON lines on stderr.
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Export tracing spans via OpenTelemetry (stdout exporter).
    #[arg(long, global = true)]
    pub otel: bool,

    /// Signed-in user id; scopes the connection cache.
    #[arg(long, short, global = true, env = "OUTREACH_USER")]
    pub user: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Inspect and refresh the cached connection list.
    #[command(alias = "conn")]
    Connections {
        #[command(subcommand)]
        action: connections::ConnectionsCommand,
    },

    /// Generate a message for each selected ally and approve them one by one.
    #[command(alias = "gen")]
    Generate(generate::GenerateArgs),

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

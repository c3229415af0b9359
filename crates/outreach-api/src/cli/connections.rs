//! Connection cache subcommands.

use anyhow::Result;
use clap::Subcommand;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;

use outreach_core::cache::LoadSource;
use outreach_types::connection::{Connection, ConnectionStatus};

use crate::state::AppState;

#[derive(Subcommand)]
pub enum ConnectionsCommand {
    /// List connections, fetching only when the cache is stale.
    #[command(alias = "ls")]
    List {
        /// Only show connections with this status.
        #[arg(long)]
        status: Option<ConnectionStatus>,
    },

    /// Fetch the full list from the service now.
    Refresh,

    /// Flag the cache stale so the next list refetches.
    MarkChanged,

    /// Show cache details for the signed-in user.
    Status,

    /// Drop the cached list and flags for the signed-in user.
    Clear,
}

pub async fn handle_connections_command(
    cmd: ConnectionsCommand,
    state: &AppState,
    json: bool,
) -> Result<()> {
    match cmd {
        ConnectionsCommand::List { status } => list(state, status, json).await,
        ConnectionsCommand::Refresh => refresh(state, json).await,
        ConnectionsCommand::MarkChanged => mark_changed(state, json).await,
        ConnectionsCommand::Status => status(state, json).await,
        ConnectionsCommand::Clear => clear(state, json).await,
    }
}

async fn list(state: &AppState, status: Option<ConnectionStatus>, json: bool) -> Result<()> {
    let loaded = state.loader.load_connections().await?;
    let connections: Vec<Connection> = loaded
        .connections
        .into_iter()
        .filter(|c| status.as_ref().is_none_or(|s| &c.status == s))
        .collect();
    let source = match loaded.source {
        LoadSource::Network => "network",
        LoadSource::Cache => "cache",
    };

    if json {
        let result = serde_json::json!({
            "user": state.user_id,
            "source": source,
            "count": connections.len(),
            "connections": connections,
        });
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    if connections.is_empty() {
        println!();
        println!("  {} No connections found.", style("i").blue().bold());
        println!();
        return Ok(());
    }

    println!();
    println!(
        "  {} connection(s) for '{}' {}",
        connections.len(),
        style(&state.user_id).cyan(),
        style(format!("(from {source})")).dim(),
    );
    println!();
    println!("{}", connection_table(&connections));
    println!();
    Ok(())
}

async fn refresh(state: &AppState, json: bool) -> Result<()> {
    let connections = state.loader.refresh().await?;
    let allies = connections.iter().filter(|c| c.is_ally()).count();

    if json {
        let result = serde_json::json!({
            "user": state.user_id,
            "count": connections.len(),
            "allies": allies,
        });
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!();
        println!(
            "  {} Fetched {} connection(s), {} allies",
            style("ok").green(),
            connections.len(),
            allies,
        );
        println!();
    }
    Ok(())
}

async fn mark_changed(state: &AppState, json: bool) -> Result<()> {
    state.loader.mark_changed().await?;

    if json {
        println!("{}", serde_json::json!({ "user": state.user_id, "changed": true }));
    } else {
        println!();
        println!(
            "  {} Cache marked stale; the next list will refetch",
            style("ok").green()
        );
        println!();
    }
    Ok(())
}

async fn status(state: &AppState, json: bool) -> Result<()> {
    let cache = state.loader.cache();
    let cached = cache.len().await;
    let changed = cache.is_changed().await?;
    let last_fetched = state.loader.last_fetched_at().await?;

    if json {
        let result = serde_json::json!({
            "user": state.user_id,
            "cached": cached,
            "changed": changed,
            "last_fetched_at": last_fetched,
            "data_dir": state.data_dir,
            "service": state.config.service.base_url,
        });
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    println!();
    println!("  User:          {}", style(&state.user_id).cyan());
    println!("  Cached:        {cached}");
    println!(
        "  Stale:         {}",
        if changed { style("yes").yellow() } else { style("no").green() }
    );
    println!(
        "  Last fetched:  {}",
        last_fetched
            .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| "never".to_string())
    );
    println!("  Service:       {}", state.config.service.base_url);
    println!("  Data dir:      {}", state.data_dir.display());
    println!();
    Ok(())
}

async fn clear(state: &AppState, json: bool) -> Result<()> {
    state.loader.sign_out().await?;

    if json {
        println!("{}", serde_json::json!({ "user": state.user_id, "cleared": true }));
    } else {
        println!();
        println!(
            "  {} Cleared cached connections for '{}'",
            style("ok").green(),
            style(&state.user_id).cyan()
        );
        println!();
    }
    Ok(())
}

fn connection_table(connections: &[Connection]) -> Table {
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("ID").fg(Color::White),
        Cell::new("Name").fg(Color::White),
        Cell::new("Status").fg(Color::White),
        Cell::new("Company").fg(Color::White),
    ]);

    for connection in connections {
        let status_color = match connection.status {
            ConnectionStatus::Ally => Color::Green,
            ConnectionStatus::Processed => Color::DarkGrey,
            _ => Color::Yellow,
        };
        table.add_row(vec![
            Cell::new(&connection.id).fg(Color::DarkGrey),
            Cell::new(&connection.name).fg(Color::Cyan),
            Cell::new(connection.status.to_string()).fg(status_color),
            Cell::new(connection.company.as_deref().unwrap_or("-")),
        ]);
    }
    table
}

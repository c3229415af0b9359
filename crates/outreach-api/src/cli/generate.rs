//! The `generate` command: run the outreach workflow interactively.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Result, bail};
use clap::Args;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use dialoguer::{MultiSelect, Select};
use indicatif::ProgressBar;

use outreach_types::connection::Connection;
use outreach_types::workflow::{ItemStatus, RunOutcome, RunReport, WorkflowState};

use super::render::EventRenderer;
use crate::state::{AppState, ConcreteOrchestrator};

#[derive(Args)]
pub struct GenerateArgs {
    /// What the messages should be about.
    #[arg(long, short)]
    pub topic: String,

    /// Connection ids to process, in order. Prompts for a selection when omitted.
    pub ids: Vec<String>,

    /// Process every cached ally.
    #[arg(long, conflicts_with = "ids")]
    pub all_allies: bool,

    /// Approve every generated message without prompting.
    #[arg(long, short)]
    pub yes: bool,
}

pub async fn handle_generate(args: GenerateArgs, state: &AppState, json: bool, quiet: bool) -> Result<()> {
    let loaded = state.loader.load_connections().await?;
    let names: HashMap<String, String> = loaded
        .connections
        .iter()
        .map(|c| (c.id.clone(), c.name.clone()))
        .collect();
    let allies: Vec<Connection> = loaded.connections.into_iter().filter(Connection::is_ally).collect();

    let ids = if !args.ids.is_empty() {
        args.ids
    } else if args.all_allies {
        allies.iter().map(|c| c.id.clone()).collect()
    } else if json || args.yes {
        bail!("pass connection ids or --all-allies when not prompting");
    } else {
        select_allies(allies).await?
    };

    if ids.is_empty() {
        if !json {
            println!();
            println!("  {} No connections selected.", style("i").blue().bold());
            println!();
        }
        return Ok(());
    }

    let orchestrator = Arc::clone(&state.orchestrator);
    let renderer = EventRenderer::new(json || quiet);
    let bar = renderer.bar().clone();
    let render_task = renderer.spawn(orchestrator.events());
    let mut state_rx = orchestrator.subscribe_state();

    let mut run = tokio::spawn({
        let orchestrator = Arc::clone(&orchestrator);
        let topic = args.topic;
        async move { orchestrator.process_selected_connections(&ids, &topic).await }
    });

    let interrupt = tokio::spawn({
        let orchestrator = Arc::clone(&orchestrator);
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                orchestrator.handle_stop_generation();
            }
        }
    });

    let result = loop {
        tokio::select! {
            result = &mut run => break result,
            changed = state_rx.changed() => {
                if changed.is_err() {
                    break (&mut run).await;
                }
                let current = *state_rx.borrow_and_update();
                if current == WorkflowState::AwaitingApproval {
                    review_current(&orchestrator, &bar, args.yes).await;
                }
            }
        }
    };
    interrupt.abort();

    let report = match result? {
        Ok(report) => {
            let _ = render_task.await;
            report
        }
        Err(e) => {
            render_task.abort();
            return Err(e.into());
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if !quiet {
        print_summary(&report, &names);
    }
    Ok(())
}

async fn select_allies(allies: Vec<Connection>) -> Result<Vec<String>> {
    if allies.is_empty() {
        bail!("no ally connections cached; run `outreach connections refresh` first");
    }
    let items: Vec<String> = allies
        .iter()
        .map(|c| match &c.company {
            Some(company) => format!("{} ({company})", c.name),
            None => c.name.clone(),
        })
        .collect();

    let chosen = tokio::task::spawn_blocking(move || {
        MultiSelect::new()
            .with_prompt("Select connections (space to toggle, enter to confirm)")
            .items(&items)
            .interact()
    })
    .await??;

    Ok(chosen.into_iter().map(|i| allies[i].id.clone()).collect())
}

/// Show the pending message and deliver the operator's decision.
async fn review_current(orchestrator: &Arc<ConcreteOrchestrator>, bar: &ProgressBar, auto_approve: bool) {
    let progress = orchestrator.progress();
    let Some(id) = progress.current_id else {
        return;
    };

    let decision = if auto_approve {
        orchestrator.approve_and_next()
    } else {
        let name = progress.current_name.unwrap_or_else(|| id.clone());
        let text = orchestrator
            .message(&id)
            .map(|m| m.text)
            .unwrap_or_default();
        let bar = bar.clone();
        let choice = tokio::task::spawn_blocking(move || {
            bar.suspend(|| {
                eprintln!();
                eprintln!("  {} {}", style("Message for").dim(), style(&name).cyan().bold());
                eprintln!();
                for line in text.lines() {
                    eprintln!("    {line}");
                }
                eprintln!();
                Select::new()
                    .with_prompt("Send this message?")
                    .items(&["Approve and continue", "Skip this connection", "Stop the run"])
                    .default(0)
                    .interact()
            })
        })
        .await;

        match choice {
            Ok(Ok(0)) => orchestrator.approve_and_next(),
            Ok(Ok(1)) => orchestrator.skip_connection(),
            Ok(Ok(_)) => {
                orchestrator.handle_stop_generation();
                Ok(())
            }
            Ok(Err(e)) => {
                tracing::debug!(error = %e, "prompt aborted, stopping the run");
                orchestrator.handle_stop_generation();
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "approval prompt panicked, stopping the run");
                orchestrator.handle_stop_generation();
                Ok(())
            }
        }
    };

    if let Err(e) = decision {
        tracing::debug!(error = %e, "decision arrived after the run moved on");
    }
}

fn print_summary(report: &RunReport, names: &HashMap<String, String>) {
    let headline = match &report.outcome {
        RunOutcome::Completed => format!("{} Run completed", style("ok").green().bold()),
        RunOutcome::Stopped => format!("{} Run stopped", style("i").blue().bold()),
        RunOutcome::Failed { connection_id, error } => format!(
            "{} Run failed on {}: {}",
            style("x").red().bold(),
            names.get(connection_id).unwrap_or(connection_id),
            error
        ),
    };
    println!();
    println!("  {headline}");
    println!();

    if report.processed_order.is_empty() {
        return;
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Connection").fg(Color::White),
        Cell::new("Result").fg(Color::White),
        Cell::new("Message").fg(Color::White),
    ]);

    for id in &report.processed_order {
        let status = report.item_statuses.get(id).copied().unwrap_or(ItemStatus::Pending);
        let color = match status {
            ItemStatus::Done => Color::Green,
            ItemStatus::Failed => Color::Red,
            ItemStatus::Skipped => Color::Yellow,
            _ => Color::DarkGrey,
        };
        let preview = report
            .messages
            .iter()
            .find(|m| &m.connection_id == id)
            .map(|m| truncate(&m.text, 60))
            .unwrap_or_else(|| "-".to_string());
        table.add_row(vec![
            Cell::new(names.get(id).unwrap_or(id)).fg(Color::Cyan),
            Cell::new(status.to_string()).fg(color),
            Cell::new(preview),
        ]);
    }

    println!("{table}");
    println!();
    println!("  {} approved, {} processed", report.approved.len(), report.processed_order.len());
    println!();
}

fn truncate(text: &str, max_chars: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars {
        flat
    } else {
        let cut: String = flat.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{cut}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_flattens_and_shortens() {
        assert_eq!(truncate("Hi  Ada,\nhow are\tyou?", 60), "Hi Ada, how are you?");
        let long = "word ".repeat(30);
        let cut = truncate(&long, 20);
        assert_eq!(cut.chars().count(), 20);
        assert!(cut.ends_with("..."));
    }
}

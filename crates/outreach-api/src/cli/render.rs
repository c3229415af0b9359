//! Terminal rendering of engine events during a run.

use console::style;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

use outreach_types::event::{NotificationLevel, OutreachEvent};

/// Draws run progress and operator notifications from the event bus.
pub struct EventRenderer {
    bar: ProgressBar,
}

impl EventRenderer {
    /// A renderer drawing to stderr, or to nothing in JSON/quiet mode.
    pub fn new(hidden: bool) -> Self {
        let bar = ProgressBar::with_draw_target(Some(0), draw_target(hidden));
        let bar_style = ProgressStyle::with_template("{spinner:.cyan} [{bar:24.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ");
        bar.set_style(bar_style);
        Self { bar }
    }

    pub fn bar(&self) -> &ProgressBar {
        &self.bar
    }

    /// Render events until the run finishes or the bus closes.
    pub fn spawn(self, mut rx: broadcast::Receiver<OutreachEvent>) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        self.render(&event);
                        if matches!(event, OutreachEvent::RunFinished { .. }) {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(missed)) => {
                        tracing::debug!(missed, "renderer lagged behind the event bus");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            self.bar.finish_and_clear();
        })
    }

    fn render(&self, event: &OutreachEvent) {
        match event {
            OutreachEvent::RunStarted { total, topic, .. } => {
                self.bar.reset();
                self.bar.set_length(*total as u64);
                self.bar.set_message(format!("topic: {topic}"));
                self.bar.enable_steady_tick(std::time::Duration::from_millis(80));
            }
            OutreachEvent::Progress(progress) => {
                self.bar.set_position(progress.current_index as u64);
                if progress.loading.is_loading {
                    self.bar.set_message(progress.loading.text.clone());
                } else if let Some(name) = &progress.current_name {
                    self.bar.set_message(name.clone());
                }
            }
            OutreachEvent::GenerationFailed {
                connection_id,
                error,
                retry_count,
                action,
                ..
            } => {
                self.bar.println(format!(
                    "  {} {} failed (attempt {}): {} -> {:?}",
                    style("!").yellow().bold(),
                    connection_id,
                    retry_count + 1,
                    error,
                    action,
                ));
            }
            OutreachEvent::Notification {
                level,
                title,
                message,
            } => {
                let marker = match level {
                    NotificationLevel::Info => style("i").blue().bold(),
                    NotificationLevel::Success => style("ok").green().bold(),
                    NotificationLevel::Warning => style("!").yellow().bold(),
                    NotificationLevel::Error => style("x").red().bold(),
                };
                self.bar
                    .println(format!("  {marker} {} {}", style(title).bold(), message));
            }
            OutreachEvent::RunFinished { .. } => {
                self.bar.disable_steady_tick();
                self.bar.finish_and_clear();
            }
            _ => {}
        }
    }
}

fn draw_target(hidden: bool) -> ProgressDrawTarget {
    if hidden {
        ProgressDrawTarget::hidden()
    } else {
        ProgressDrawTarget::stderr()
    }
}

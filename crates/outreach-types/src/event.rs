//! Event types for the outreach event bus.
//!
//! `OutreachEvent` is broadcast by the core while loading connections and
//! running the approval workflow. Operator notifications travel on the same
//! channel as lifecycle events so a single subscriber can render both.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::workflow::{ProgressState, RecoveryAction, WorkflowState};

/// Severity of an operator notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// Events emitted by the outreach engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutreachEvent {
    /// A toast-style message for the operator.
    Notification {
        level: NotificationLevel,
        title: String,
        message: String,
    },

    /// The last error notification should be dismissed.
    ErrorCleared,

    /// The orchestrator moved to a new state.
    StateChanged { from: WorkflowState, to: WorkflowState },

    /// Progress snapshot after every tracker mutation.
    Progress(ProgressState),

    // -- Connection loading --

    /// A network fetch of the connection list finished.
    ConnectionsFetched { namespace: String, count: usize },

    // -- Workflow lifecycle --

    /// A run passed validation and began processing.
    RunStarted { run_id: Uuid, total: usize, topic: String },

    /// A message was generated and is awaiting the operator.
    MessageGenerated {
        run_id: Uuid,
        connection_id: String,
        connection_name: String,
        text: String,
    },

    /// A generation attempt failed and the recovery policy decided.
    GenerationFailed {
        run_id: Uuid,
        connection_id: String,
        error: String,
        retry_count: u32,
        action: RecoveryAction,
    },

    /// The run ended. `outcome` mirrors `RunOutcome` in snake_case.
    RunFinished { run_id: Uuid, outcome: String },
}

impl OutreachEvent {
    /// The run this event belongs to, if any.
    pub fn run_id(&self) -> Option<Uuid> {
        match self {
            OutreachEvent::RunStarted { run_id, .. }
            | OutreachEvent::MessageGenerated { run_id, .. }
            | OutreachEvent::GenerationFailed { run_id, .. }
            | OutreachEvent::RunFinished { run_id, .. } => Some(*run_id),
            _ => None,
        }
    }

    /// Shorthand for a notification event.
    pub fn notification(
        level: NotificationLevel,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        OutreachEvent::Notification {
            level,
            title: title.into(),
            message: message.into(),
        }
    }
}

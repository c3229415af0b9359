//! Workflow state, progress and run result types.
//!
//! These are the read-side shapes the orchestrator publishes. Only
//! `outreach-core` mutates them.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;

/// Top-level state of a "generate messages" invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    #[default]
    Idle,
    Generating,
    AwaitingApproval,
    Stopping,
    Completed,
    Error,
}

impl WorkflowState {
    /// A run is in progress and owns the pipeline.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            WorkflowState::Generating | WorkflowState::AwaitingApproval | WorkflowState::Stopping
        )
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WorkflowState::Idle => "idle",
            WorkflowState::Generating => "generating",
            WorkflowState::AwaitingApproval => "awaiting_approval",
            WorkflowState::Stopping => "stopping",
            WorkflowState::Completed => "completed",
            WorkflowState::Error => "error",
        };
        f.write_str(s)
    }
}

/// Per-connection status within one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Pending,
    Generating,
    WaitingApproval,
    Done,
    Skipped,
    Failed,
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ItemStatus::Pending => "pending",
            ItemStatus::Generating => "generating",
            ItemStatus::WaitingApproval => "waiting_approval",
            ItemStatus::Done => "done",
            ItemStatus::Skipped => "skipped",
            ItemStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Status argument to a progress update: an item status, or the run-level
/// completion sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressStatus {
    Item(ItemStatus),
    Completed,
}

impl From<ItemStatus> for ProgressStatus {
    fn from(status: ItemStatus) -> Self {
        ProgressStatus::Item(status)
    }
}

/// Cosmetic loading indicator for the operator surface.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoadingMessage {
    pub text: String,
    pub percent: u8,
    pub is_loading: bool,
}

/// Snapshot of workflow progress.
///
/// Invariant: `current_index <= total`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressState {
    pub total: usize,
    pub current_index: usize,
    pub current_id: Option<String>,
    pub current_name: Option<String>,
    pub per_item_status: BTreeMap<String, ItemStatus>,
    pub loading: LoadingMessage,
}

/// A message produced for one connection during a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedMessage {
    pub connection_id: String,
    pub text: String,
    pub generated_at: DateTime<Utc>,
}

/// Decision returned by the error recovery policy for a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecoveryAction {
    /// Re-attempt the same connection.
    Retry,
    /// Give up on this connection and move on.
    Skip,
    /// Abort the whole run.
    Stop,
}

/// Operator decision delivered through the approval gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalDecision {
    Approve,
    Skip,
    Stop,
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunOutcome {
    Completed,
    /// Operator-initiated stop.
    Stopped,
    /// The recovery policy decided to stop on this connection's failure.
    Failed { connection_id: String, error: String },
}

/// Result of one `process_selected_connections` invocation.
///
/// `item_statuses` is captured independently of the progress tracker, so it
/// survives the progress reset that ends every run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub outcome: RunOutcome,
    /// Eligible connection ids in processing order.
    pub processed_order: Vec<String>,
    pub item_statuses: BTreeMap<String, ItemStatus>,
    /// Every message generated during the run, in generation order.
    pub messages: Vec<GeneratedMessage>,
    /// Ids whose message the operator approved.
    pub approved: Vec<String>,
}

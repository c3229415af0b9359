//! The human-gated generation workflow.
//!
//! - `progress`: pure progress bookkeeping
//! - `recovery`: failure classification and operator feedback
//! - `approval`: the cancellable approval gate
//! - `orchestrator`: the state machine driving a run

pub mod approval;
pub mod orchestrator;
pub mod progress;
pub mod recovery;

pub use approval::{ApprovalGate, ApprovalTicket};
pub use orchestrator::WorkflowOrchestrator;
pub use progress::ProgressTracker;
pub use recovery::{ClassifyingPolicy, ErrorRecoveryHandler, RecoveryPolicy};

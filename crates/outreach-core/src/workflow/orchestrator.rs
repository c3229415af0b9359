//! The sequential, human-gated message generation workflow.
//!
//! `WorkflowOrchestrator` walks the selected ally connections one at a time:
//! generate a message, pause for operator approval, move on. Failures go
//! through the `ErrorRecoveryHandler`, whose `RecoveryAction` is the only
//! thing that decides between retrying the same connection, skipping it,
//! or aborting the run.
//!
//! # State
//!
//! `WorkflowState` lives in a `watch` channel owned by the orchestrator.
//! Every transition goes through `transition_state`, which applies it
//! atomically and publishes `OutreachEvent::StateChanged`. Once a run is
//! `stopping`, nothing but the idle reset may move it elsewhere.
//!
//! # Cancellation
//!
//! `handle_stop_generation` flips the state to `stopping` and cancels the
//! run's `CancellationToken`. The loop observes this at the top of each
//! iteration, while awaiting the generator (the in-flight future is
//! dropped), and inside the approval wait. Approved messages are kept.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::Utc;
use outreach_types::config::WorkflowConfig;
use outreach_types::connection::{Connection, ConnectionPatch, ConnectionStatus, SenderProfile};
use outreach_types::error::WorkflowError;
use outreach_types::event::OutreachEvent;
use outreach_types::generation::{GenerationRequest, clean_topic};
use outreach_types::workflow::{
    ApprovalDecision, GeneratedMessage, ItemStatus, ProgressState, ProgressStatus,
    RecoveryAction, RunOutcome, RunReport, WorkflowState,
};
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use crate::cache::ConnectionCache;
use crate::event::EventBus;
use crate::service::MessageGenerator;
use crate::storage::kv_store::KvStore;

use super::approval::ApprovalGate;
use super::progress::ProgressTracker;
use super::recovery::{ClassifyingPolicy, ErrorRecoveryHandler, RecoveryPolicy};

// ---------------------------------------------------------------------------
// WorkflowOrchestrator
// ---------------------------------------------------------------------------

pub struct WorkflowOrchestrator<G: MessageGenerator, K: KvStore> {
    cache: Arc<ConnectionCache<K>>,
    generator: Arc<G>,
    recovery: ErrorRecoveryHandler,
    gate: ApprovalGate,
    event_bus: EventBus,
    config: WorkflowConfig,
    sender: SenderProfile,
    state: Arc<watch::Sender<WorkflowState>>,
    progress: Arc<Mutex<ProgressTracker>>,
    /// Insertion-ordered, one entry per connection.
    messages: Mutex<Vec<GeneratedMessage>>,
    cancel: Mutex<CancellationToken>,
    /// Bumped on every run start; a pending idle reset only applies to its own run.
    run_seq: Arc<AtomicU64>,
}

/// How one run left the loop.
enum LoopExit {
    Finished,
    Stopped,
    Failed { connection_id: String, error: String },
}

impl<G, K> WorkflowOrchestrator<G, K>
where
    G: MessageGenerator + 'static,
    K: KvStore + 'static,
{
    /// Create an orchestrator with the default `ClassifyingPolicy`.
    pub fn new(
        cache: Arc<ConnectionCache<K>>,
        generator: Arc<G>,
        event_bus: EventBus,
        config: WorkflowConfig,
    ) -> Self {
        let recovery = ErrorRecoveryHandler::new(
            Box::new(ClassifyingPolicy::new(config.max_retries)),
            event_bus.clone(),
        );
        let (state, _) = watch::channel(WorkflowState::Idle);

        Self {
            cache,
            generator,
            recovery,
            gate: ApprovalGate::new(),
            event_bus,
            config,
            sender: SenderProfile::default(),
            state: Arc::new(state),
            progress: Arc::new(Mutex::new(ProgressTracker::new())),
            messages: Mutex::new(Vec::new()),
            cancel: Mutex::new(CancellationToken::new()),
            run_seq: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Replace the recovery policy.
    pub fn with_recovery_policy(mut self, policy: impl RecoveryPolicy + 'static) -> Self {
        self.recovery = ErrorRecoveryHandler::new(Box::new(policy), self.event_bus.clone());
        self
    }

    /// Profile of the person the messages are sent on behalf of.
    pub fn with_sender_profile(mut self, sender: SenderProfile) -> Self {
        self.sender = sender;
        self
    }

    // -----------------------------------------------------------------------
    // Run
    // -----------------------------------------------------------------------

    /// Generate, one by one, a message for every selected ally connection,
    /// pausing after each for an operator decision.
    ///
    /// Selection order is preserved; ids that are not cached allies are
    /// dropped. Returns once the run completes, is stopped, or fails.
    pub async fn process_selected_connections(
        &self,
        selected_ids: &[String],
        topic: &str,
    ) -> Result<RunReport, WorkflowError> {
        let topic = clean_topic(topic);

        if self.state().is_active() {
            return Err(self.reject(WorkflowError::AlreadyRunning));
        }
        if selected_ids.is_empty() {
            return Err(self.reject(WorkflowError::Validation(
                "select at least one connection".to_string(),
            )));
        }
        if topic.is_empty() {
            return Err(self.reject(WorkflowError::Validation(
                "enter a topic for the messages".to_string(),
            )));
        }

        let eligible = self.eligible_connections(selected_ids).await;
        if eligible.is_empty() {
            return Err(self.reject(WorkflowError::Validation(
                "none of the selected connections are allies".to_string(),
            )));
        }

        // Claim the run atomically; a concurrent caller may have won the race.
        if !self.transition(WorkflowState::Generating, |s| !s.is_active()) {
            return Err(self.reject(WorkflowError::AlreadyRunning));
        }
        self.run_seq.fetch_add(1, Ordering::SeqCst);

        let cancel = CancellationToken::new();
        *self.cancel.lock().unwrap_or_else(PoisonError::into_inner) = cancel.clone();
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.recovery.clear_error();

        let run_id = Uuid::now_v7();
        let total = eligible.len();
        self.with_progress(|p| p.initialize_progress(total));
        self.event_bus.publish(OutreachEvent::RunStarted {
            run_id,
            total,
            topic: topic.clone(),
        });

        let span = tracing::info_span!("outreach_run", run_id = %run_id, total);
        async move {
            tracing::info!(skipped = selected_ids.len() - total, "run started");
            let mut report = RunReport {
                run_id,
                outcome: RunOutcome::Completed,
                processed_order: Vec::new(),
                item_statuses: BTreeMap::new(),
                messages: Vec::new(),
                approved: Vec::new(),
            };

            let exit = self
                .run_loop(&mut report, &eligible, &topic, &cancel)
                .await;
            report.outcome = self.finish(exit, total);

            tracing::info!(
                outcome = ?report.outcome,
                approved = report.approved.len(),
                "run finished"
            );
            self.event_bus.publish(OutreachEvent::RunFinished {
                run_id,
                outcome: outcome_label(&report.outcome).to_string(),
            });
            Ok(report)
        }
        .instrument(span)
        .await
    }

    async fn run_loop(
        &self,
        report: &mut RunReport,
        connections: &[Connection],
        topic: &str,
        cancel: &CancellationToken,
    ) -> LoopExit {
        let total = connections.len();
        let mut index = 0;
        let mut retry_count: u32 = 0;

        while index < total {
            if cancel.is_cancelled() || self.state() == WorkflowState::Stopping {
                return LoopExit::Stopped;
            }

            let connection = &connections[index];
            let id = connection.id.as_str();
            let name = connection.name.as_str();

            if retry_count == 0 {
                report.processed_order.push(id.to_string());
            }
            self.record(report, index, connection, ItemStatus::Generating);
            let loading = if retry_count == 0 {
                format!("Generating message for {name}")
            } else {
                format!("Retrying message for {name} (attempt {})", retry_count + 1)
            };
            self.with_progress(|p| {
                let percent = ((index * 100) / total).min(100) as u8;
                p.set_loading_message(loading, percent, true);
            });

            let request = GenerationRequest {
                connection: connection.clone(),
                topic: topic.to_string(),
                sender: self.sender.clone(),
                include_history: self.config.include_message_history,
            };

            let result = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    tracing::info!(connection_id = id, "generation aborted by stop");
                    return LoopExit::Stopped;
                }
                result = self.generator.generate_message(&request) => result,
            };

            match result {
                Ok(text) => {
                    self.recovery.clear_error();
                    let message = GeneratedMessage {
                        connection_id: id.to_string(),
                        text: text.clone(),
                        generated_at: Utc::now(),
                    };
                    self.store_message(message.clone());
                    report.messages.push(message);
                    self.event_bus.publish(OutreachEvent::MessageGenerated {
                        run_id: report.run_id,
                        connection_id: id.to_string(),
                        connection_name: name.to_string(),
                        text,
                    });

                    self.record(report, index, connection, ItemStatus::WaitingApproval);
                    self.with_progress(|p| p.set_loading_message("Waiting for approval", 0, false));

                    let ticket = self.gate.open();
                    if !self.transition(WorkflowState::AwaitingApproval, |s| s != WorkflowState::Stopping) {
                        self.gate.close();
                        return LoopExit::Stopped;
                    }

                    match ticket.wait(cancel).await {
                        ApprovalDecision::Approve => {
                            self.record(report, index, connection, ItemStatus::Done);
                            report.approved.push(id.to_string());
                            tracing::info!(connection_id = id, "message approved");
                            self.mark_processed(id).await;
                        }
                        ApprovalDecision::Skip => {
                            self.record(report, index, connection, ItemStatus::Skipped);
                            tracing::info!(connection_id = id, "message skipped by operator");
                        }
                        ApprovalDecision::Stop => return LoopExit::Stopped,
                    }

                    // Operator actions already moved the state; this covers
                    // decisions delivered some other way.
                    self.transition(WorkflowState::Generating, |s| s != WorkflowState::Stopping);
                    index += 1;
                    retry_count = 0;
                }
                Err(error) => {
                    let action = self.recovery.handle_error(&error, id, name, retry_count);
                    self.event_bus.publish(OutreachEvent::GenerationFailed {
                        run_id: report.run_id,
                        connection_id: id.to_string(),
                        error: error.to_string(),
                        retry_count,
                        action,
                    });

                    match action {
                        RecoveryAction::Retry => {
                            retry_count += 1;
                        }
                        RecoveryAction::Skip => {
                            self.record(report, index, connection, ItemStatus::Failed);
                            self.recovery.show_info_feedback(
                                "Connection skipped",
                                &format!("Could not generate a message for {name}: {error}"),
                            );
                            index += 1;
                            retry_count = 0;
                        }
                        RecoveryAction::Stop => {
                            // An operator stop that landed first wins.
                            if !self.transition(WorkflowState::Error, |s| s != WorkflowState::Stopping) {
                                return LoopExit::Stopped;
                            }
                            self.with_progress(ProgressTracker::reset_progress);
                            self.recovery.show_error_feedback(
                                "Generation stopped",
                                &format!("Message generation failed for {name}: {error}"),
                            );
                            return LoopExit::Failed {
                                connection_id: id.to_string(),
                                error: error.to_string(),
                            };
                        }
                    }
                }
            }
        }

        LoopExit::Finished
    }

    /// Apply the terminal transitions for a finished loop.
    fn finish(&self, exit: LoopExit, total: usize) -> RunOutcome {
        match exit {
            LoopExit::Finished
                if self.transition(WorkflowState::Completed, |s| s != WorkflowState::Stopping) =>
            {
                self.with_progress(|p| p.update_progress(total, None, ProgressStatus::Completed));
                self.recovery.show_success_feedback(
                    "Messages generated",
                    &format!("Finished processing {total} connection(s)"),
                );
                self.schedule_idle_reset(WorkflowState::Completed);
                RunOutcome::Completed
            }
            LoopExit::Finished | LoopExit::Stopped => {
                self.gate.close();
                self.with_progress(ProgressTracker::reset_progress);
                self.transition(WorkflowState::Stopping, |_| true);
                self.schedule_idle_reset(WorkflowState::Stopping);
                RunOutcome::Stopped
            }
            LoopExit::Failed {
                connection_id,
                error,
            } => RunOutcome::Failed {
                connection_id,
                error,
            },
        }
    }

    // -----------------------------------------------------------------------
    // Operator actions
    // -----------------------------------------------------------------------

    /// Stop the active run. Returns false if nothing is running, including
    /// a run that already stopped and is waiting for its idle reset.
    ///
    /// Cooperative: the loop halts at its next checkpoint; an in-flight
    /// generation is abandoned and its result discarded.
    pub fn handle_stop_generation(&self) -> bool {
        let running = |s: WorkflowState| {
            matches!(s, WorkflowState::Generating | WorkflowState::AwaitingApproval)
        };
        if !self.transition(WorkflowState::Stopping, running) {
            return false;
        }

        self.cancel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .cancel();
        self.gate.close();
        self.with_progress(ProgressTracker::reset_progress);
        self.recovery
            .show_info_feedback("Generation stopped", "Stopped by operator");
        tracing::info!("stop requested");
        true
    }

    /// Approve the pending message and continue with the next connection.
    pub fn approve_and_next(&self) -> Result<(), WorkflowError> {
        self.resolve_approval(ApprovalDecision::Approve)
    }

    /// Discard the pending message and continue with the next connection.
    pub fn skip_connection(&self) -> Result<(), WorkflowError> {
        self.resolve_approval(ApprovalDecision::Skip)
    }

    fn resolve_approval(&self, decision: ApprovalDecision) -> Result<(), WorkflowError> {
        if !self.transition(WorkflowState::Generating, |s| s == WorkflowState::AwaitingApproval) {
            return Err(WorkflowError::NotAwaitingApproval);
        }
        if !self.gate.resolve(decision) {
            tracing::warn!(?decision, "approval resolved with no open ticket");
        }
        Ok(())
    }

    /// Clear messages, progress and errors and return to idle.
    pub fn reset(&self) -> Result<(), WorkflowError> {
        if self.state().is_active() {
            return Err(WorkflowError::AlreadyRunning);
        }
        self.run_seq.fetch_add(1, Ordering::SeqCst);
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.with_progress(ProgressTracker::reset_progress);
        self.recovery.clear_error();
        self.transition(WorkflowState::Idle, |s| !s.is_active());
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Read side
    // -----------------------------------------------------------------------

    pub fn state(&self) -> WorkflowState {
        *self.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<WorkflowState> {
        self.state.subscribe()
    }

    pub fn progress(&self) -> ProgressState {
        self.progress
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .snapshot()
    }

    /// The generated message for a connection in the current run.
    pub fn message(&self, connection_id: &str) -> Option<GeneratedMessage> {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|m| m.connection_id == connection_id)
            .cloned()
    }

    pub fn messages(&self) -> Vec<GeneratedMessage> {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn events(&self) -> broadcast::Receiver<OutreachEvent> {
        self.event_bus.subscribe()
    }

    pub fn recovery(&self) -> &ErrorRecoveryHandler {
        &self.recovery
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    async fn eligible_connections(&self, selected_ids: &[String]) -> Vec<Connection> {
        let mut seen = HashSet::new();
        let mut eligible = Vec::new();
        for id in selected_ids {
            if !seen.insert(id.as_str()) {
                continue;
            }
            match self.cache.get(id).await {
                Some(connection) if connection.is_ally() => eligible.push(connection),
                Some(connection) => {
                    tracing::debug!(connection_id = %id, status = %connection.status, "not an ally, skipping")
                }
                None => tracing::debug!(connection_id = %id, "not in cache, skipping"),
            }
        }
        eligible
    }

    fn reject(&self, error: WorkflowError) -> WorkflowError {
        tracing::warn!("run rejected: {error}");
        self.recovery
            .show_warning_feedback("Cannot start generation", &error.to_string());
        error
    }

    fn transition(&self, to: WorkflowState, allowed: impl Fn(WorkflowState) -> bool) -> bool {
        transition_state(&self.state, &self.event_bus, to, allowed)
    }

    /// Set an item status in both the live progress and the run report.
    fn record(
        &self,
        report: &mut RunReport,
        index: usize,
        connection: &Connection,
        status: ItemStatus,
    ) {
        report.item_statuses.insert(connection.id.clone(), status);
        self.with_progress(|p| {
            p.update_progress(
                index,
                Some((connection.id.as_str(), connection.name.as_str())),
                status,
            )
        });
    }

    /// Mutate progress and publish the resulting snapshot.
    fn with_progress(&self, f: impl FnOnce(&mut ProgressTracker)) {
        let snapshot = {
            let mut tracker = self.progress.lock().unwrap_or_else(PoisonError::into_inner);
            f(&mut tracker);
            tracker.snapshot()
        };
        self.event_bus.publish(OutreachEvent::Progress(snapshot));
    }

    fn store_message(&self, message: GeneratedMessage) {
        let mut messages = self.messages.lock().unwrap_or_else(PoisonError::into_inner);
        match messages
            .iter_mut()
            .find(|m| m.connection_id == message.connection_id)
        {
            Some(existing) => *existing = message,
            None => messages.push(message),
        }
    }

    async fn mark_processed(&self, connection_id: &str) {
        if !self.config.mark_processed_on_approve {
            return;
        }
        let patch = ConnectionPatch::status(ConnectionStatus::Processed);
        let result = match self.cache.update(connection_id, &patch).await {
            Ok(true) => self.cache.mark_changed().await,
            Ok(false) => Ok(()),
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            tracing::warn!(connection_id, "failed to mark connection processed: {e}");
        }
    }

    /// Return to idle after `reset_delay_ms`, unless another run started or
    /// the state moved on in the meantime.
    fn schedule_idle_reset(&self, from: WorkflowState) {
        let state = Arc::clone(&self.state);
        let progress = Arc::clone(&self.progress);
        let run_seq = Arc::clone(&self.run_seq);
        let event_bus = self.event_bus.clone();
        let seq = run_seq.load(Ordering::SeqCst);
        let delay = Duration::from_millis(self.config.reset_delay_ms);

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if run_seq.load(Ordering::SeqCst) != seq {
                return;
            }
            if transition_state(&state, &event_bus, WorkflowState::Idle, |s| s == from) {
                let snapshot = {
                    let mut tracker = progress.lock().unwrap_or_else(PoisonError::into_inner);
                    tracker.reset_progress();
                    tracker.snapshot()
                };
                event_bus.publish(OutreachEvent::Progress(snapshot));
            }
        });
    }
}

/// Move to `to` if `allowed(current)`. Returns whether the state is now `to`.
fn transition_state(
    state: &watch::Sender<WorkflowState>,
    event_bus: &EventBus,
    to: WorkflowState,
    allowed: impl Fn(WorkflowState) -> bool,
) -> bool {
    let mut from = None;
    let mut reached = false;
    state.send_if_modified(|current| {
        if !allowed(*current) {
            return false;
        }
        reached = true;
        if *current == to {
            return false;
        }
        from = Some(*current);
        *current = to;
        true
    });

    if let Some(from) = from {
        tracing::debug!(%from, %to, "workflow state changed");
        event_bus.publish(OutreachEvent::StateChanged { from, to });
    }
    reached
}

fn outcome_label(outcome: &RunOutcome) -> &'static str {
    match outcome {
        RunOutcome::Completed => "completed",
        RunOutcome::Stopped => "stopped",
        RunOutcome::Failed { .. } => "failed",
    }
}

impl<G: MessageGenerator, K: KvStore> std::fmt::Debug for WorkflowOrchestrator<G, K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowOrchestrator")
            .field("state", &*self.state.borrow())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Error recovery for per-connection generation failures.
//!
//! Every failed generation attempt is routed through
//! `ErrorRecoveryHandler::handle_error` exactly once, and the returned
//! `RecoveryAction` is the only thing the orchestrator acts on. The mapping
//! from error to action is a pluggable `RecoveryPolicy`; the default
//! `ClassifyingPolicy` carries an explicit retry ceiling.
//!
//! The handler doubles as the operator feedback channel (info, success,
//! warning and error notifications).

use std::sync::{Mutex, PoisonError};

use outreach_types::error::GenerationError;
use outreach_types::event::{NotificationLevel, OutreachEvent};
use outreach_types::workflow::RecoveryAction;

use crate::event::EventBus;

// ---------------------------------------------------------------------------
// RecoveryPolicy
// ---------------------------------------------------------------------------

/// Maps one failed attempt to a recovery decision.
///
/// `retry_count` is the number of retries already made for this connection
/// (0 on the first failure).
pub trait RecoveryPolicy: Send + Sync {
    fn decide(&self, error: &GenerationError, connection_id: &str, retry_count: u32) -> RecoveryAction;
}

impl<F> RecoveryPolicy for F
where
    F: Fn(&GenerationError, &str, u32) -> RecoveryAction + Send + Sync,
{
    fn decide(&self, error: &GenerationError, connection_id: &str, retry_count: u32) -> RecoveryAction {
        self(error, connection_id, retry_count)
    }
}

/// Default policy, classifying errors by kind.
///
/// - transient (rate limit, timeout, unavailable): retry up to `max_retries`, then skip
/// - systemic (unauthorized, misconfigured): stop the run
/// - anything else is specific to this connection: skip
#[derive(Debug, Clone, Copy)]
pub struct ClassifyingPolicy {
    pub max_retries: u32,
}

impl ClassifyingPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self { max_retries }
    }
}

impl RecoveryPolicy for ClassifyingPolicy {
    fn decide(&self, error: &GenerationError, _connection_id: &str, retry_count: u32) -> RecoveryAction {
        if error.is_systemic() {
            RecoveryAction::Stop
        } else if error.is_transient() && retry_count < self.max_retries {
            RecoveryAction::Retry
        } else {
            RecoveryAction::Skip
        }
    }
}

// ---------------------------------------------------------------------------
// ErrorRecoveryHandler
// ---------------------------------------------------------------------------

/// Classifies generation failures and emits operator feedback.
pub struct ErrorRecoveryHandler {
    policy: Box<dyn RecoveryPolicy>,
    event_bus: EventBus,
    last_error: Mutex<Option<String>>,
}

impl ErrorRecoveryHandler {
    pub fn new(policy: Box<dyn RecoveryPolicy>, event_bus: EventBus) -> Self {
        Self {
            policy,
            event_bus,
            last_error: Mutex::new(None),
        }
    }

    /// Decide what to do about one failed attempt for a connection.
    pub fn handle_error(
        &self,
        error: &GenerationError,
        connection_id: &str,
        connection_name: &str,
        retry_count: u32,
    ) -> RecoveryAction {
        let action = self.policy.decide(error, connection_id, retry_count);
        tracing::warn!(
            connection_id,
            connection_name,
            retry_count,
            ?action,
            "message generation failed: {error}"
        );
        *self.last_error.lock().unwrap_or_else(PoisonError::into_inner) =
            Some(format!("{connection_name}: {error}"));
        action
    }

    /// The most recent failure description, until cleared.
    pub fn last_error(&self) -> Option<String> {
        self.last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn clear_error(&self) {
        let had_error = self
            .last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .is_some();
        if had_error {
            self.event_bus.publish(OutreachEvent::ErrorCleared);
        }
    }

    pub fn show_info_feedback(&self, title: &str, message: &str) {
        self.notify(NotificationLevel::Info, title, message);
    }

    pub fn show_success_feedback(&self, title: &str, message: &str) {
        self.notify(NotificationLevel::Success, title, message);
    }

    pub fn show_warning_feedback(&self, title: &str, message: &str) {
        self.notify(NotificationLevel::Warning, title, message);
    }

    pub fn show_error_feedback(&self, title: &str, message: &str) {
        self.notify(NotificationLevel::Error, title, message);
    }

    fn notify(&self, level: NotificationLevel, title: &str, message: &str) {
        tracing::debug!(?level, title, message, "operator notification");
        self.event_bus
            .publish(OutreachEvent::notification(level, title, message));
    }
}

impl std::fmt::Debug for ErrorRecoveryHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorRecoveryHandler")
            .field("last_error", &self.last_error())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn handler(policy: impl RecoveryPolicy + 'static) -> (ErrorRecoveryHandler, EventBus) {
        let bus = EventBus::new(16);
        (ErrorRecoveryHandler::new(Box::new(policy), bus.clone()), bus)
    }

    #[test]
    fn transient_errors_retry_until_ceiling() {
        let policy = ClassifyingPolicy::new(2);
        assert_eq!(policy.decide(&GenerationError::Timeout, "c1", 0), RecoveryAction::Retry);
        assert_eq!(policy.decide(&GenerationError::RateLimited, "c1", 1), RecoveryAction::Retry);
        assert_eq!(policy.decide(&GenerationError::Timeout, "c1", 2), RecoveryAction::Skip);
    }

    #[test]
    fn zero_ceiling_never_retries() {
        let policy = ClassifyingPolicy::new(0);
        assert_eq!(
            policy.decide(&GenerationError::Unavailable("503".into()), "c1", 0),
            RecoveryAction::Skip
        );
    }

    #[test]
    fn systemic_errors_stop() {
        let policy = ClassifyingPolicy::new(5);
        assert_eq!(policy.decide(&GenerationError::Unauthorized, "c1", 0), RecoveryAction::Stop);
        assert_eq!(
            policy.decide(&GenerationError::Configuration("no model".into()), "c1", 0),
            RecoveryAction::Stop
        );
    }

    #[test]
    fn per_connection_errors_skip() {
        let policy = ClassifyingPolicy::new(5);
        assert_eq!(policy.decide(&GenerationError::EmptyMessage, "c1", 0), RecoveryAction::Skip);
        assert_eq!(
            policy.decide(&GenerationError::InvalidRequest("profile too long".into()), "c1", 0),
            RecoveryAction::Skip
        );
    }

    #[test]
    fn closures_are_policies() {
        let (handler, _bus) = handler(|_: &GenerationError, id: &str, _: u32| {
            if id == "vip" { RecoveryAction::Retry } else { RecoveryAction::Stop }
        });
        assert_eq!(
            handler.handle_error(&GenerationError::EmptyMessage, "vip", "Very", 9),
            RecoveryAction::Retry
        );
        assert_eq!(
            handler.handle_error(&GenerationError::EmptyMessage, "c1", "Ada", 0),
            RecoveryAction::Stop
        );
    }

    #[test]
    fn handle_error_records_last_error_until_cleared() {
        let (handler, bus) = handler(ClassifyingPolicy::new(1));
        let mut rx = bus.subscribe();

        handler.handle_error(&GenerationError::Timeout, "c1", "Ada", 0);
        assert!(handler.last_error().unwrap().contains("Ada"));

        handler.clear_error();
        assert!(handler.last_error().is_none());
        assert!(matches!(rx.try_recv().unwrap(), OutreachEvent::ErrorCleared));

        // Clearing twice publishes nothing more.
        handler.clear_error();
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn feedback_levels_are_distinguishable() {
        let (handler, bus) = handler(ClassifyingPolicy::new(1));
        let mut rx = bus.subscribe();

        handler.show_info_feedback("Stopped", "by operator");
        handler.show_error_feedback("Stopped", "service unauthorized");

        let levels: Vec<NotificationLevel> = [rx.try_recv().unwrap(), rx.try_recv().unwrap()]
            .into_iter()
            .map(|e| match e {
                OutreachEvent::Notification { level, .. } => level,
                other => panic!("unexpected event {other:?}"),
            })
            .collect();
        assert_eq!(levels, vec![NotificationLevel::Info, NotificationLevel::Error]);
    }
}

//! Approval gate between message generation and the next connection.
//!
//! The orchestrator opens the gate after each successful generation and
//! awaits the ticket; the operator resolves it with approve, skip or stop.
//! Cancellation of the run resolves any open ticket as `Stop`.

use std::sync::{Mutex, PoisonError};

use outreach_types::workflow::ApprovalDecision;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Default)]
pub struct ApprovalGate {
    pending: Mutex<Option<oneshot::Sender<ApprovalDecision>>>,
}

/// Receiving half of one open approval.
#[derive(Debug)]
pub struct ApprovalTicket {
    rx: oneshot::Receiver<ApprovalDecision>,
}

impl ApprovalGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new approval, replacing any stale one.
    pub fn open(&self) -> ApprovalTicket {
        let (tx, rx) = oneshot::channel();
        let previous = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(tx);
        if previous.is_some() {
            tracing::debug!("replacing unresolved approval");
        }
        ApprovalTicket { rx }
    }

    /// Deliver a decision. Returns false when nothing is awaiting one.
    pub fn resolve(&self, decision: ApprovalDecision) -> bool {
        let pending = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match pending {
            Some(tx) => tx.send(decision).is_ok(),
            None => false,
        }
    }

    pub fn is_open(&self) -> bool {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|tx| !tx.is_closed())
    }

    /// Drop any pending approval; its ticket resolves as `Stop`.
    pub fn close(&self) {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}

impl ApprovalTicket {
    /// Wait for the operator, or for the run to be cancelled.
    pub async fn wait(self, cancel: &CancellationToken) -> ApprovalDecision {
        let mut rx = self.rx;
        tokio::select! {
            biased;
            decision = &mut rx => decision.unwrap_or(ApprovalDecision::Stop),
            () = cancel.cancelled() => ApprovalDecision::Stop,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolve_delivers_decision() {
        let gate = ApprovalGate::new();
        let ticket = gate.open();
        assert!(gate.is_open());

        assert!(gate.resolve(ApprovalDecision::Skip));
        assert!(!gate.is_open());
        assert_eq!(ticket.wait(&CancellationToken::new()).await, ApprovalDecision::Skip);
    }

    #[test]
    fn resolve_without_open_gate_is_rejected() {
        let gate = ApprovalGate::new();
        assert!(!gate.resolve(ApprovalDecision::Approve));
    }

    #[tokio::test]
    async fn cancellation_resolves_as_stop() {
        let gate = ApprovalGate::new();
        let ticket = gate.open();
        let cancel = CancellationToken::new();

        let waiter = {
            let cancel = cancel.clone();
            tokio::spawn(async move { ticket.wait(&cancel).await })
        };
        cancel.cancel();

        assert_eq!(waiter.await.unwrap(), ApprovalDecision::Stop);
    }

    #[tokio::test]
    async fn closing_the_gate_resolves_as_stop() {
        let gate = ApprovalGate::new();
        let ticket = gate.open();
        gate.close();
        assert_eq!(ticket.wait(&CancellationToken::new()).await, ApprovalDecision::Stop);
    }

    #[tokio::test]
    async fn reopening_replaces_stale_ticket() {
        let gate = ApprovalGate::new();
        let stale = gate.open();
        let fresh = gate.open();

        assert!(gate.resolve(ApprovalDecision::Approve));
        let cancel = CancellationToken::new();
        assert_eq!(stale.wait(&cancel).await, ApprovalDecision::Stop);
        assert_eq!(fresh.wait(&cancel).await, ApprovalDecision::Approve);
    }
}

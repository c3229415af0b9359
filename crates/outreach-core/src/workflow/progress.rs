//! Pure progress bookkeeping for a generation run.
//!
//! `ProgressTracker` owns a `ProgressState` and nothing else: no I/O, no
//! events. The orchestrator drives it and publishes snapshots.

use outreach_types::workflow::{ItemStatus, LoadingMessage, ProgressState, ProgressStatus};

#[derive(Debug, Clone, Default)]
pub struct ProgressTracker {
    state: ProgressState,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a fresh run over `total` connections.
    pub fn initialize_progress(&mut self, total: usize) {
        self.state = ProgressState {
            total,
            ..ProgressState::default()
        };
    }

    /// Record progress at `index`.
    ///
    /// `connection` is `(id, name)` of the connection at that index; when
    /// `None`, an item status applies to the current connection, if any.
    /// `ProgressStatus::Completed` marks the whole run finished.
    pub fn update_progress(
        &mut self,
        index: usize,
        connection: Option<(&str, &str)>,
        status: impl Into<ProgressStatus>,
    ) {
        self.state.current_index = index.min(self.state.total);

        match status.into() {
            ProgressStatus::Completed => {
                self.state.current_index = self.state.total;
                self.state.current_id = None;
                self.state.current_name = None;
                self.state.loading = LoadingMessage::default();
            }
            ProgressStatus::Item(item) => {
                if let Some((id, name)) = connection {
                    self.state.current_id = Some(id.to_string());
                    self.state.current_name = Some(name.to_string());
                }
                if let Some(id) = &self.state.current_id {
                    self.state.per_item_status.insert(id.clone(), item);
                }
            }
        }
    }

    /// Cosmetic loading text; no effect on control flow.
    pub fn set_loading_message(&mut self, text: impl Into<String>, percent: u8, is_loading: bool) {
        self.state.loading = LoadingMessage {
            text: text.into(),
            percent: percent.min(100),
            is_loading,
        };
    }

    pub fn reset_progress(&mut self) {
        self.state = ProgressState::default();
    }

    pub fn state(&self) -> &ProgressState {
        &self.state
    }

    pub fn snapshot(&self) -> ProgressState {
        self.state.clone()
    }

    /// Share of connections that reached a terminal item status, 0-100.
    pub fn percent_complete(&self) -> u8 {
        if self.state.total == 0 {
            return 0;
        }
        let finished = self
            .state
            .per_item_status
            .values()
            .filter(|s| matches!(s, ItemStatus::Done | ItemStatus::Skipped | ItemStatus::Failed))
            .count();
        ((finished * 100) / self.state.total).min(100) as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initialize_resets_everything_but_total() {
        let mut tracker = ProgressTracker::new();
        tracker.initialize_progress(2);
        tracker.update_progress(1, Some(("c2", "Bea")), ItemStatus::Generating);

        tracker.initialize_progress(3);
        let state = tracker.state();
        assert_eq!(state.total, 3);
        assert_eq!(state.current_index, 0);
        assert!(state.current_name.is_none());
        assert!(state.per_item_status.is_empty());
    }

    #[test]
    fn update_records_item_status_for_connection() {
        let mut tracker = ProgressTracker::new();
        tracker.initialize_progress(2);

        tracker.update_progress(0, Some(("c1", "Ada")), ItemStatus::Generating);
        tracker.update_progress(0, None, ItemStatus::WaitingApproval);

        let state = tracker.state();
        assert_eq!(state.current_index, 0);
        assert_eq!(state.current_name.as_deref(), Some("Ada"));
        assert_eq!(state.per_item_status["c1"], ItemStatus::WaitingApproval);
    }

    #[test]
    fn index_never_exceeds_total() {
        let mut tracker = ProgressTracker::new();
        tracker.initialize_progress(2);
        tracker.update_progress(7, Some(("c1", "Ada")), ItemStatus::Generating);
        assert_eq!(tracker.state().current_index, 2);
    }

    #[test]
    fn completed_sentinel_moves_to_end() {
        let mut tracker = ProgressTracker::new();
        tracker.initialize_progress(2);
        tracker.update_progress(1, Some(("c2", "Bea")), ItemStatus::Done);
        tracker.set_loading_message("Generating for Bea", 50, true);

        tracker.update_progress(2, None, ProgressStatus::Completed);

        let state = tracker.state();
        assert_eq!(state.current_index, 2);
        assert!(state.current_id.is_none());
        assert!(!state.loading.is_loading);
        assert_eq!(state.per_item_status["c2"], ItemStatus::Done);
    }

    #[test]
    fn percent_counts_terminal_items() {
        let mut tracker = ProgressTracker::new();
        tracker.initialize_progress(4);
        assert_eq!(tracker.percent_complete(), 0);

        tracker.update_progress(0, Some(("a", "A")), ItemStatus::Done);
        tracker.update_progress(1, Some(("b", "B")), ItemStatus::Skipped);
        tracker.update_progress(2, Some(("c", "C")), ItemStatus::Generating);
        assert_eq!(tracker.percent_complete(), 50);
    }

    #[test]
    fn reset_returns_to_empty() {
        let mut tracker = ProgressTracker::new();
        tracker.initialize_progress(2);
        tracker.update_progress(0, Some(("c1", "Ada")), ItemStatus::Generating);

        tracker.reset_progress();
        assert_eq!(tracker.snapshot(), ProgressState::default());
    }
}

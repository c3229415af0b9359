//! Request shape for the external message generation service.

use serde::{Deserialize, Serialize};

use crate::connection::{Connection, SenderProfile};

/// Everything the generator needs to write one outreach message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub connection: Connection,
    /// Conversation topic, whitespace-collapsed.
    pub topic: String,
    pub sender: SenderProfile,
    /// Let the generator take earlier messages with this connection into account.
    #[serde(default)]
    pub include_history: bool,
}

/// Collapse runs of whitespace and trim. Returns an empty string for a blank topic.
pub fn clean_topic(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

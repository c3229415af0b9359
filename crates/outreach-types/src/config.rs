//! Global configuration types for the outreach engine.
//!
//! `GlobalConfig` represents the top-level `config.toml` that controls the
//! workflow's retry ceiling and reset timing, the remote service endpoint,
//! and the sender profile passed to message generation.

use serde::{Deserialize, Serialize};

use crate::connection::SenderProfile;

/// Top-level configuration.
///
/// Loaded from `~/.outreach/config.toml`. All fields have sensible defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlobalConfig {
    #[serde(default)]
    pub workflow: WorkflowConfig,

    #[serde(default)]
    pub service: ServiceConfig,

    /// Profile of the person sending the outreach.
    #[serde(default)]
    pub sender: SenderProfile,
}

/// Tuning for the approval workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Retries allowed per connection for transient generation failures.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay before a finished run drops back to idle.
    #[serde(default = "default_reset_delay_ms")]
    pub reset_delay_ms: u64,

    /// Ask the generator to consider earlier messages with the connection.
    #[serde(default)]
    pub include_message_history: bool,

    /// Move approved connections to `processed` in the cache.
    #[serde(default = "default_true")]
    pub mark_processed_on_approve: bool,
}

fn default_max_retries() -> u32 {
    2
}

fn default_reset_delay_ms() -> u64 {
    1_500
}

fn default_true() -> bool {
    true
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            reset_delay_ms: default_reset_delay_ms(),
            include_message_history: false,
            mark_processed_on_approve: true,
        }
    }
}

/// Remote endpoint serving connections and message generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://127.0.0.1:8787".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

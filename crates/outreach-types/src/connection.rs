//! Connection records as delivered by the connection source.
//!
//! The core only interprets `id` and `status`. Everything else is payload
//! handed through to message generation untouched.

use serde::{Deserialize, Serialize};

use std::fmt;
use std::str::FromStr;

/// A discovered professional contact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    /// Stable identity key for caching and selection.
    pub id: String,
    /// Current lifecycle stage.
    pub status: ConnectionStatus,
    /// Display name.
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headline: Option<String>,
    /// User-managed freeform tags.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Remaining profile data from the source, passed through opaquely.
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub profile: serde_json::Value,
}

impl Connection {
    /// Minimal record with the given id, name and status.
    pub fn new(id: impl Into<String>, name: impl Into<String>, status: ConnectionStatus) -> Self {
        Self {
            id: id.into(),
            status,
            name: name.into(),
            company: None,
            headline: None,
            tags: Vec::new(),
            profile: serde_json::Value::Null,
        }
    }

    /// Whether this connection may receive a generated outreach message.
    pub fn is_ally(&self) -> bool {
        self.status == ConnectionStatus::Ally
    }

    /// Merge a patch into this record. Returns `true` if anything changed.
    pub fn apply(&mut self, patch: &ConnectionPatch) -> bool {
        let before = self.clone();
        if let Some(status) = &patch.status {
            self.status = status.clone();
        }
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        if let Some(company) = &patch.company {
            self.company = Some(company.clone());
        }
        if let Some(headline) = &patch.headline {
            self.headline = Some(headline.clone());
        }
        if let Some(tags) = &patch.tags {
            self.tags = tags.clone();
        }
        *self != before
    }
}

/// Connection lifecycle stages.
///
/// - Possible: discovered, no request exchanged
/// - Incoming / Outgoing: a pending request in either direction
/// - Ally: established relationship, eligible for outreach
/// - Processed: outreach already sent
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Possible,
    Incoming,
    Outgoing,
    Ally,
    Processed,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionStatus::Possible => write!(f, "possible"),
            ConnectionStatus::Incoming => write!(f, "incoming"),
            ConnectionStatus::Outgoing => write!(f, "outgoing"),
            ConnectionStatus::Ally => write!(f, "ally"),
            ConnectionStatus::Processed => write!(f, "processed"),
        }
    }
}

impl FromStr for ConnectionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "possible" => Ok(ConnectionStatus::Possible),
            "incoming" => Ok(ConnectionStatus::Incoming),
            "outgoing" => Ok(ConnectionStatus::Outgoing),
            "ally" => Ok(ConnectionStatus::Ally),
            "processed" => Ok(ConnectionStatus::Processed),
            other => Err(format!("invalid connection status: '{other}'")),
        }
    }
}

/// Partial update for a cached connection. `None` leaves a field as is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnectionPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ConnectionStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headline: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

impl ConnectionPatch {
    /// Patch that only moves the connection to a new status.
    pub fn status(status: ConnectionStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }
}

/// The sender's own profile, given to the generator alongside each connection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SenderProfile {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headline: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
}

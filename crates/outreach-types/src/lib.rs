//! Shared domain types for the outreach engine.
//!
//! Connections, workflow state and progress, events, configuration, and
//! their associated error types.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod config;
pub mod connection;
pub mod error;
pub mod event;
pub mod generation;
pub mod storage;
pub mod workflow;

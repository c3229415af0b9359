//! Infrastructure layer for the outreach engine.
//!
//! Implements the ports defined in `outreach-core`: SQLite and in-memory
//! key-value storage, HTTP clients for the connection service and the
//! message generator, plus config and data directory resolution.

pub mod config;
pub mod filesystem;
pub mod http;
pub mod memory;
pub mod secret;
pub mod sqlite;

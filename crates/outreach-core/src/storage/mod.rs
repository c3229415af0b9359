//! Storage abstractions.
//!
//! Defines the key-value store trait. Implementations live in outreach-infra.

pub mod kv_store;

//! Business logic and port trait definitions for the outreach engine.
//!
//! This crate defines the ports (`KvStore`, `ConnectionSource`,
//! `MessageGenerator`) that the infrastructure layer implements. It depends
//! only on `outreach-types`, never on `outreach-infra` or any database/IO
//! crate.

pub mod cache;
pub mod event;
pub mod service;
pub mod storage;
pub mod workflow;

#[cfg(test)]
mod test_support;

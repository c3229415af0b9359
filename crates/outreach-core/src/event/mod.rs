//! Event bus for operator notifications and workflow lifecycle events.
//!
//! Provides an `EventBus` that distributes `OutreachEvent` messages to all
//! subscribers via a `tokio::sync::broadcast` channel.

pub mod bus;

pub use bus::EventBus;

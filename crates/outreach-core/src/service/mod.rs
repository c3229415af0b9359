//! External collaborator ports.
//!
//! The connection transport and the message generator are reached only
//! through these traits. Concrete clients live in outreach-infra.

pub mod connections;
pub mod generator;

pub use connections::ConnectionSource;
pub use generator::MessageGenerator;

//! pp-core: Core types, errors and configuration for PeerPrint nodes
//!
//! This crate provides the domain types, error taxonomy and configuration
//! structures shared by the node's address resolver and fileshare reclaimer.

pub mod config;
pub mod error;
pub mod types;

pub use error::PpError;
pub use types::{HealthStatus, Job, PeerId, QueueSnapshots};

//! pp-node: Local plumbing for a PeerPrint node
//!
//! This crate discovers the address a node's P2P server should bind to and
//! keeps the shared fileshare directory from growing without bound.

pub mod address;
pub mod bootstrap;
pub mod fileshare;
pub mod queue_dump;

pub use address::{resolve_local_address, AddressResolver, LocalAddr};
pub use fileshare::{reclaim, FileshareJanitor, Reclaimer};

//! Device-facing node actor: one per managed device per cluster member.

pub mod actor;
pub mod error;
pub mod setup;

pub use actor::*;
pub use error::*;
pub use setup::*;

use crate::clients::NodeClient;

/// Role of a node actor for its device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRole {
    Uninitialized,
    Master,
    Slave,
}

/// Creates a new Node actor and its client.
pub fn new(setup: NodeSetup, buffer_size: usize) -> (NodeActor, NodeClient) {
    NodeActor::new(setup, buffer_size)
}

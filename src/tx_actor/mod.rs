//! Transaction proxy actors: one actor per device transaction, and one per data-tree
//! service session.

pub mod actor;
pub mod adapters;
pub mod data_tree;

pub use actor::*;
pub use adapters::*;
pub use data_tree::*;

use crate::clients::TxClient;
use std::time::Duration;

/// Spawns a [`TransactionActor`] for `handle` and returns its client.
pub fn spawn(
    name: impl Into<String>,
    handle: TransactionHandle,
    idle_timeout: Duration,
    ask_timeout: Duration,
) -> TxClient {
    let (actor, client) = TransactionActor::new(name, handle, idle_timeout, ask_timeout);
    tokio::spawn(actor.run());
    client
}

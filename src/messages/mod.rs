//! Envelope types exchanged with node actors, transaction actors and data-tree session
//! actors.
//!
//! Requests that expect an answer carry a `respond_to` channel; the answer is always either
//! a value or an explicit [`NodeError`](crate::node_actor::NodeError), never a dropped
//! channel under normal operation.

pub mod data_tree;
pub mod node;
pub mod transaction;

pub use data_tree::*;
pub use node::*;
pub use transaction::*;

use crate::framework::Response;
use crate::node_actor::NodeError;

/// Reply channel used by every request in this crate.
pub type Reply<T> = Response<T, NodeError>;

//! Addresses of the actors and the slave-side proxies built on them.
//!
//! - [`NodeClient`] - Requests to a node actor
//! - [`TxClient`] - Requests to a transaction actor
//! - [`DataTreeClient`] - Requests to a data-tree session actor
//! - [`proxy`] - Device and schema collaborators that forward to a remote master

pub mod data_tree_client;
pub mod node_client;
pub mod proxy;
pub mod tx_client;

pub use data_tree_client::*;
pub use node_client::*;
pub use proxy::*;
pub use tx_client::*;

//! Error types reported by device collaborators.

use crate::node_actor::NodeError;
use thiserror::Error;

/// Failures of the device session: transaction factories, transaction handles and
/// RPC/action services.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// The device (or its protocol client) rejected or failed the operation.
    #[error("Device operation failed: {0}")]
    Failed(String),

    /// The transaction was already committed or cancelled.
    #[error("Transaction already closed")]
    TransactionClosed,

    /// A write was attempted through a read-only handle.
    #[error("Transaction is read-only")]
    NotWritable,

    /// The session does not offer the requested service.
    #[error("Operation not supported: {0}")]
    Unsupported(String),

    /// The operation was forwarded to the master and failed there.
    #[error("Remote operation failed: {0}")]
    Remote(#[source] Box<NodeError>),
}

impl From<NodeError> for DeviceError {
    fn from(e: NodeError) -> Self {
        DeviceError::Remote(Box::new(e))
    }
}

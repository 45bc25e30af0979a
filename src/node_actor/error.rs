//! Error types for the Node actor.

use super::NodeRole;
use crate::device::DeviceError;
use crate::framework::FrameworkError;
use crate::model::DeviceId;
use crate::mount::MountError;
use crate::schema::SchemaError;
use thiserror::Error;

/// Failure carried on every node and transaction reply channel.
#[derive(Debug, Error)]
pub enum NodeError {
    /// The node holds no master data for the device.
    #[error("{0} is not master")]
    NotMaster(DeviceId),

    /// The request is not accepted in the node's current role.
    #[error("{request} is not valid in role {role:?}")]
    InvalidRole { request: &'static str, role: NodeRole },

    /// `Commit` was sent to the shared read transaction.
    #[error("Transaction {0} is read-only")]
    ReadOnlyTransaction(String),

    /// An error occurred while communicating with the actor system.
    #[error("Actor communication failed: {0}")]
    Framework(#[from] FrameworkError),

    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Mount(#[from] MountError),
}

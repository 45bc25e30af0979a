use crate::model::DeviceId;
use thiserror::Error;

/// Errors raised by a mount point service.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum MountError {
    /// A previous registration for the device is still open.
    #[error("Mount point for {0} is already registered")]
    AlreadyRegistered(DeviceId),
}

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;

/// Stable identity of a managed device.
///
/// Used as the routing key for every message addressed to a device and as the key of the
/// device's mount registration.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceId {
    pub name: String,
    pub address: SocketAddr,
}

impl DeviceId {
    pub fn new(name: impl Into<String>, address: SocketAddr) -> Self {
        Self { name: name.into(), address }
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RemoteDevice{{{}}}", self.name)
    }
}

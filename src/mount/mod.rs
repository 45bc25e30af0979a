//! Publication of per-device services ("mount points").
//!
//! A mount point bundles the services consumers use to talk to a device: a data broker,
//! an RPC service and, when the device supports them, actions. On the master they are
//! the device session's own services ([`MasterMountFacade`]); on a slave they are proxies
//! forwarding to the master ([`SlaveMountFacade`]).
//!
//! Registrations go to an injected [`MountPointService`]. [`MountPointRegistry`] is the
//! in-memory implementation: one per cluster member, created at startup and dropped at
//! shutdown.

pub mod error;
pub mod master;
pub mod service;
pub mod slave;

pub use error::*;
pub use master::*;
pub use service::*;
pub use slave::*;

//! Interfaces of the live device session.
//!
//! These traits describe what the device protocol client hands to a master node: a data
//! broker producing transaction handles, an RPC service and, when the device supports
//! them, an action service and a data-tree service. The slave side implements the same traits with proxies that forward to the
//! master (see [`crate::clients`]), so consumers of a mount point cannot tell the two apart.
//!
//! [`mock`] provides in-memory fakes for tests and the demo binary.

pub mod error;
pub mod mock;

pub use error::*;

use crate::model::{
    DataTreeIdentifier, Datastore, NodePath, NormalizedNode, NormalizedNodeMessage, QName,
    RpcResult, SchemaPath, SourceIdentifier,
};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// A read handle over the device's data tree.
#[async_trait]
pub trait ReadTransaction: Send + Sync {
    /// Reads the node at `path`, `None` when absent.
    async fn read(
        &self,
        store: Datastore,
        path: &NodePath,
    ) -> Result<Option<NormalizedNode>, DeviceError>;

    async fn exists(&self, store: Datastore, path: &NodePath) -> Result<bool, DeviceError>;

    /// Releases the handle.
    fn close(&mut self) {}
}

/// A write handle over the device's data tree.
///
/// Mutations are staged on the handle and only reach the device on [`commit`].
///
/// [`commit`]: WriteTransaction::commit
#[async_trait]
pub trait WriteTransaction: Send + Sync {
    fn put(
        &mut self,
        store: Datastore,
        path: NodePath,
        node: NormalizedNode,
    ) -> Result<(), DeviceError>;

    fn merge(
        &mut self,
        store: Datastore,
        path: NodePath,
        node: NormalizedNode,
    ) -> Result<(), DeviceError>;

    fn delete(&mut self, store: Datastore, path: NodePath) -> Result<(), DeviceError>;

    /// Discards staged mutations. Returns `false` if the handle was already finished.
    fn cancel(&mut self) -> bool;

    async fn commit(&mut self) -> Result<(), DeviceError>;
}

/// A handle that can both read and write.
pub trait ReadWriteTransaction: ReadTransaction + WriteTransaction {}

impl<T: ReadTransaction + WriteTransaction + ?Sized> ReadWriteTransaction for T {}

/// Transaction factory of a device session.
#[async_trait]
pub trait DataBroker: Send + Sync {
    async fn new_read_only(&self) -> Result<Box<dyn ReadTransaction>, DeviceError>;

    async fn new_write_only(&self) -> Result<Box<dyn WriteTransaction>, DeviceError>;

    async fn new_read_write(&self) -> Result<Box<dyn ReadWriteTransaction>, DeviceError>;
}

/// RPC invocation on the device. `Ok(None)` means the device produced no result at all.
#[async_trait]
pub trait RpcService: Send + Sync {
    async fn invoke_rpc(
        &self,
        name: &QName,
        input: Option<NormalizedNodeMessage>,
    ) -> Result<Option<RpcResult>, DeviceError>;
}

/// Action invocation on a data-tree node of the device.
#[async_trait]
pub trait ActionService: Send + Sync {
    async fn invoke_action(
        &self,
        path: &SchemaPath,
        target: &DataTreeIdentifier,
        input: Option<NormalizedNodeMessage>,
    ) -> Result<Option<RpcResult>, DeviceError>;
}

/// Edit-config session on the device's data tree.
///
/// Unlike a [`WriteTransaction`], edits are sent to the device as they are issued and
/// collect in its candidate configuration until [`commit`] or [`discard_changes`]. Locking
/// is explicit and outlives a commit: callers unlock when they are done.
///
/// [`commit`]: DataTreeService::commit
/// [`discard_changes`]: DataTreeService::discard_changes
#[async_trait]
pub trait DataTreeService: Send + Sync {
    async fn lock(&self) -> Result<Option<RpcResult>, DeviceError>;

    async fn unlock(&self) -> Result<Option<RpcResult>, DeviceError>;

    async fn discard_changes(&self) -> Result<Option<RpcResult>, DeviceError>;

    /// Operational state at `path`.
    async fn get(&self, path: &NodePath) -> Result<Option<NormalizedNode>, DeviceError>;

    /// Configuration at `path`.
    async fn get_config(&self, path: &NodePath) -> Result<Option<NormalizedNode>, DeviceError>;

    async fn merge(
        &self,
        store: Datastore,
        path: NodePath,
        node: NormalizedNode,
    ) -> Result<(), DeviceError>;

    async fn replace(
        &self,
        store: Datastore,
        path: NodePath,
        node: NormalizedNode,
    ) -> Result<(), DeviceError>;

    /// Fails if data already exists at `path`.
    async fn create(
        &self,
        store: Datastore,
        path: NodePath,
        node: NormalizedNode,
    ) -> Result<(), DeviceError>;

    /// Fails if there is no data at `path`.
    async fn delete(&self, store: Datastore, path: NodePath) -> Result<(), DeviceError>;

    /// Like [`delete`](DataTreeService::delete), but absent data is not an error.
    async fn remove(&self, store: Datastore, path: NodePath) -> Result<(), DeviceError>;

    async fn commit(&self) -> Result<(), DeviceError>;
}

/// Everything a master needs from a connected device.
#[derive(Clone)]
pub struct DeviceSession {
    /// Schema sources the device advertised. Fixed for the lifetime of the session.
    pub source_ids: Vec<SourceIdentifier>,
    pub broker: Arc<dyn DataBroker>,
    pub rpc: Arc<dyn RpcService>,
    pub action: Option<Arc<dyn ActionService>>,
    pub data_tree: Option<Arc<dyn DataTreeService>>,
}

impl fmt::Debug for DeviceSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceSession")
            .field("source_ids", &self.source_ids)
            .field("actions", &self.action.is_some())
            .field("data_tree", &self.data_tree.is_some())
            .finish_non_exhaustive()
    }
}

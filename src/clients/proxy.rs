//! # Slave-side proxies
//!
//! Implementations of the device and schema collaborator traits that forward every call to
//! the master's node actor. A slave publishes these in its mount point, so consumers use
//! the same [`DataBroker`] / [`RpcService`] / [`ActionService`] / [`DataTreeService`]
//! interfaces whether the device session is local or not.
//!
//! # Architecture Note
//! Proxy transactions track their own terminal state. After `commit` or `cancel` every
//! further call fails locally with [`DeviceError::TransactionClosed`] and nothing is sent
//! to the master.
//!
//! [`ProxyDataTreeService`] opens its session actor on the master lazily and opens a new
//! one once the previous session has ended (after a commit or an idle timeout).

use super::{DataTreeClient, NodeClient, TxClient};
use crate::device::{
    ActionService, DataBroker, DataTreeService, DeviceError, ReadTransaction,
    ReadWriteTransaction, RpcService, WriteTransaction,
};
use crate::messages::ReadReply;
use crate::model::{
    DataTreeIdentifier, Datastore, NodePath, NormalizedNode, NormalizedNodeMessage, QName,
    RpcResult, SchemaPath, SchemaSource, SourceIdentifier,
};
use crate::schema::{SchemaError, SchemaSourceProvider};
use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

/// [`DataBroker`] whose transactions live on the master.
#[derive(Clone, Debug)]
pub struct ProxyDataBroker {
    master: NodeClient,
}

impl ProxyDataBroker {
    pub fn new(master: NodeClient) -> Self {
        Self { master }
    }
}

#[async_trait]
impl DataBroker for ProxyDataBroker {
    async fn new_read_only(&self) -> Result<Box<dyn ReadTransaction>, DeviceError> {
        let tx = self.master.new_read_transaction().await?;
        Ok(Box::new(ProxyTransaction::new(tx)))
    }

    async fn new_write_only(&self) -> Result<Box<dyn WriteTransaction>, DeviceError> {
        let tx = self.master.new_write_transaction().await?;
        Ok(Box::new(ProxyTransaction::new(tx)))
    }

    async fn new_read_write(&self) -> Result<Box<dyn ReadWriteTransaction>, DeviceError> {
        let tx = self.master.new_read_write_transaction().await?;
        Ok(Box::new(ProxyTransaction::new(tx)))
    }
}

/// A transaction handle backed by a transaction actor on the master.
#[derive(Debug)]
pub struct ProxyTransaction {
    tx: TxClient,
    finished: bool,
}

impl ProxyTransaction {
    pub fn new(tx: TxClient) -> Self {
        Self { tx, finished: false }
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    fn ensure_open(&self) -> Result<(), DeviceError> {
        if self.finished {
            return Err(DeviceError::TransactionClosed);
        }
        Ok(())
    }
}

#[async_trait]
impl ReadTransaction for ProxyTransaction {
    async fn read(
        &self,
        store: Datastore,
        path: &NodePath,
    ) -> Result<Option<NormalizedNode>, DeviceError> {
        self.ensure_open()?;
        Ok(read_result(self.tx.read(store, path.clone()).await?))
    }

    async fn exists(&self, store: Datastore, path: &NodePath) -> Result<bool, DeviceError> {
        self.ensure_open()?;
        Ok(self.tx.exists(store, path.clone()).await?)
    }

    fn close(&mut self) {
        // The read actor on the master is shared; closing only detaches this handle.
        self.finished = true;
    }
}

#[async_trait]
impl WriteTransaction for ProxyTransaction {
    fn put(
        &mut self,
        store: Datastore,
        path: NodePath,
        node: NormalizedNode,
    ) -> Result<(), DeviceError> {
        self.ensure_open()?;
        Ok(self.tx.put(store, NormalizedNodeMessage::new(path, node))?)
    }

    fn merge(
        &mut self,
        store: Datastore,
        path: NodePath,
        node: NormalizedNode,
    ) -> Result<(), DeviceError> {
        self.ensure_open()?;
        Ok(self.tx.merge(store, NormalizedNodeMessage::new(path, node))?)
    }

    fn delete(&mut self, store: Datastore, path: NodePath) -> Result<(), DeviceError> {
        self.ensure_open()?;
        Ok(self.tx.delete(store, path)?)
    }

    fn cancel(&mut self) -> bool {
        if self.finished {
            return false;
        }
        self.finished = true;
        debug!(actor = %self.tx.name(), "Cancelling remote transaction");
        self.tx.cancel_detached().is_ok()
    }

    async fn commit(&mut self) -> Result<(), DeviceError> {
        self.ensure_open()?;
        self.finished = true;
        Ok(self.tx.commit().await?)
    }
}

/// [`RpcService`] forwarding to the master.
#[derive(Clone, Debug)]
pub struct ProxyRpcService {
    master: NodeClient,
}

impl ProxyRpcService {
    pub fn new(master: NodeClient) -> Self {
        Self { master }
    }
}

#[async_trait]
impl RpcService for ProxyRpcService {
    async fn invoke_rpc(
        &self,
        name: &QName,
        input: Option<NormalizedNodeMessage>,
    ) -> Result<Option<RpcResult>, DeviceError> {
        let reply = self.master.invoke_rpc(name.clone(), input).await?;
        Ok(reply.into_result())
    }
}

/// [`ActionService`] forwarding to the master.
#[derive(Clone, Debug)]
pub struct ProxyActionService {
    master: NodeClient,
}

impl ProxyActionService {
    pub fn new(master: NodeClient) -> Self {
        Self { master }
    }
}

#[async_trait]
impl ActionService for ProxyActionService {
    async fn invoke_action(
        &self,
        path: &SchemaPath,
        target: &DataTreeIdentifier,
        input: Option<NormalizedNodeMessage>,
    ) -> Result<Option<RpcResult>, DeviceError> {
        let reply = self
            .master
            .invoke_action(path.clone(), target.clone(), input)
            .await?;
        Ok(reply.into_result())
    }
}

/// [`DataTreeService`] backed by a data-tree session actor on the master.
#[derive(Debug)]
pub struct ProxyDataTreeService {
    master: NodeClient,
    session: Mutex<Option<DataTreeClient>>,
}

impl ProxyDataTreeService {
    pub fn new(master: NodeClient) -> Self {
        Self { master, session: Mutex::new(None) }
    }

    /// The live session, opening one on the master if there is none.
    async fn session(&self) -> Result<DataTreeClient, DeviceError> {
        let mut session = self.session.lock().await;
        if let Some(live) = session.as_ref().filter(|client| !client.is_terminated()) {
            return Ok(live.clone());
        }
        let opened = self.master.new_data_tree_service().await?;
        debug!(actor = %opened.name(), master = %self.master.device(), "Data-tree session opened");
        *session = Some(opened.clone());
        Ok(opened)
    }
}

fn read_result(reply: ReadReply) -> Option<NormalizedNode> {
    match reply {
        ReadReply::Data(message) => Some(message.node),
        ReadReply::Empty => None,
    }
}

#[async_trait]
impl DataTreeService for ProxyDataTreeService {
    async fn lock(&self) -> Result<Option<RpcResult>, DeviceError> {
        Ok(self.session().await?.lock().await?.into_result())
    }

    async fn unlock(&self) -> Result<Option<RpcResult>, DeviceError> {
        Ok(self.session().await?.unlock().await?.into_result())
    }

    async fn discard_changes(&self) -> Result<Option<RpcResult>, DeviceError> {
        Ok(self.session().await?.discard_changes().await?.into_result())
    }

    async fn get(&self, path: &NodePath) -> Result<Option<NormalizedNode>, DeviceError> {
        Ok(read_result(self.session().await?.get(path.clone()).await?))
    }

    async fn get_config(&self, path: &NodePath) -> Result<Option<NormalizedNode>, DeviceError> {
        Ok(read_result(self.session().await?.get_config(path.clone()).await?))
    }

    async fn merge(
        &self,
        store: Datastore,
        path: NodePath,
        node: NormalizedNode,
    ) -> Result<(), DeviceError> {
        Ok(self.session().await?.merge(store, NormalizedNodeMessage::new(path, node))?)
    }

    async fn replace(
        &self,
        store: Datastore,
        path: NodePath,
        node: NormalizedNode,
    ) -> Result<(), DeviceError> {
        Ok(self.session().await?.replace(store, NormalizedNodeMessage::new(path, node))?)
    }

    async fn create(
        &self,
        store: Datastore,
        path: NodePath,
        node: NormalizedNode,
    ) -> Result<(), DeviceError> {
        Ok(self.session().await?.create(store, NormalizedNodeMessage::new(path, node))?)
    }

    async fn delete(&self, store: Datastore, path: NodePath) -> Result<(), DeviceError> {
        Ok(self.session().await?.delete(store, path)?)
    }

    async fn remove(&self, store: Datastore, path: NodePath) -> Result<(), DeviceError> {
        Ok(self.session().await?.remove(store, path)?)
    }

    async fn commit(&self) -> Result<(), DeviceError> {
        Ok(self.session().await?.commit().await?)
    }
}

/// Schema source provider that fetches the text from the master on demand.
#[derive(Clone, Debug)]
pub struct RemoteSchemaProvider {
    master: NodeClient,
}

impl RemoteSchemaProvider {
    pub fn new(master: NodeClient) -> Self {
        Self { master }
    }
}

#[async_trait]
impl SchemaSourceProvider for RemoteSchemaProvider {
    async fn get_source(&self, id: &SourceIdentifier) -> Result<SchemaSource, SchemaError> {
        debug!(source = %id, master = %self.master.device(), "Fetching schema source from master");
        self.master
            .request_schema_source(id.clone())
            .await
            .map_err(|e| SchemaError::Fetch { id: id.clone(), cause: Box::new(e) })
    }
}

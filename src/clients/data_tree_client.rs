use crate::framework::{ask_unbounded, FrameworkError};
use crate::messages::{DataTreeRequest, EditRequest, InvokeReply, ReadReply};
use crate::model::{Datastore, NodePath, NormalizedNodeMessage};
use crate::node_actor::NodeError;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, instrument};

/// Address of a [`DataTreeActor`](crate::tx_actor::DataTreeActor).
///
/// Lock, unlock, discard, reads and commit are asks; edits are fire-and-forget like the
/// writes of a [`TxClient`](super::TxClient).
#[derive(Clone)]
pub struct DataTreeClient {
    sender: mpsc::UnboundedSender<DataTreeRequest>,
    name: Arc<str>,
    ask_timeout: Duration,
}

impl DataTreeClient {
    pub fn new(
        sender: mpsc::UnboundedSender<DataTreeRequest>,
        name: impl Into<Arc<str>>,
        ask_timeout: Duration,
    ) -> Self {
        Self { sender, name: name.into(), ask_timeout }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_terminated(&self) -> bool {
        self.sender.is_closed()
    }

    #[instrument(skip(self), fields(actor = %self.name))]
    pub async fn lock(&self) -> Result<InvokeReply, NodeError> {
        debug!("Sending request");
        ask_unbounded(&self.sender, self.ask_timeout, |respond_to| DataTreeRequest::Lock { respond_to })
            .await
    }

    #[instrument(skip(self), fields(actor = %self.name))]
    pub async fn unlock(&self) -> Result<InvokeReply, NodeError> {
        debug!("Sending request");
        ask_unbounded(&self.sender, self.ask_timeout, |respond_to| DataTreeRequest::Unlock { respond_to })
            .await
    }

    #[instrument(skip(self), fields(actor = %self.name))]
    pub async fn discard_changes(&self) -> Result<InvokeReply, NodeError> {
        debug!("Sending request");
        ask_unbounded(&self.sender, self.ask_timeout, |respond_to| {
            DataTreeRequest::DiscardChanges { respond_to }
        })
        .await
    }

    #[instrument(skip(self), fields(actor = %self.name))]
    pub async fn get(&self, path: NodePath) -> Result<ReadReply, NodeError> {
        debug!("Sending request");
        ask_unbounded(&self.sender, self.ask_timeout, |respond_to| DataTreeRequest::Get { path, respond_to })
            .await
    }

    #[instrument(skip(self), fields(actor = %self.name))]
    pub async fn get_config(&self, path: NodePath) -> Result<ReadReply, NodeError> {
        debug!("Sending request");
        ask_unbounded(&self.sender, self.ask_timeout, |respond_to| {
            DataTreeRequest::GetConfig { path, respond_to }
        })
        .await
    }

    pub fn merge(&self, store: Datastore, data: NormalizedNodeMessage) -> Result<(), NodeError> {
        self.edit(EditRequest::Merge { store, data })
    }

    pub fn replace(&self, store: Datastore, data: NormalizedNodeMessage) -> Result<(), NodeError> {
        self.edit(EditRequest::Replace { store, data })
    }

    pub fn create(&self, store: Datastore, data: NormalizedNodeMessage) -> Result<(), NodeError> {
        self.edit(EditRequest::Create { store, data })
    }

    pub fn delete(&self, store: Datastore, path: NodePath) -> Result<(), NodeError> {
        self.edit(EditRequest::Delete { store, path })
    }

    pub fn remove(&self, store: Datastore, path: NodePath) -> Result<(), NodeError> {
        self.edit(EditRequest::Remove { store, path })
    }

    #[instrument(skip(self), fields(actor = %self.name))]
    pub async fn commit(&self) -> Result<(), NodeError> {
        debug!("Sending request");
        ask_unbounded(&self.sender, self.ask_timeout, |respond_to| DataTreeRequest::Commit { respond_to })
            .await
    }

    fn edit(&self, edit: EditRequest) -> Result<(), NodeError> {
        self.sender
            .send(DataTreeRequest::Edit(edit))
            .map_err(|_| NodeError::from(FrameworkError::ActorClosed))
    }
}

impl fmt::Debug for DataTreeClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataTreeClient")
            .field("name", &self.name)
            .field("closed", &self.sender.is_closed())
            .finish()
    }
}

use crate::framework::{ask_unbounded, FrameworkError};
use crate::messages::{ReadReply, ReadRequest, TxRequest, WriteRequest};
use crate::model::{Datastore, NodePath, NormalizedNodeMessage};
use crate::node_actor::NodeError;
use crate::tx_actor::TxKind;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, instrument};

/// Address of a [`TransactionActor`](crate::tx_actor::TransactionActor).
///
/// Cheap to clone. Reads, cancel and commit wait at most the ask timeout for their reply;
/// writes are fire-and-forget and only fail when the actor is already gone.
#[derive(Clone)]
pub struct TxClient {
    sender: mpsc::UnboundedSender<TxRequest>,
    name: Arc<str>,
    kind: TxKind,
    ask_timeout: Duration,
}

impl TxClient {
    pub fn new(
        sender: mpsc::UnboundedSender<TxRequest>,
        name: impl Into<Arc<str>>,
        kind: TxKind,
        ask_timeout: Duration,
    ) -> Self {
        Self { sender, name: name.into(), kind, ask_timeout }
    }

    pub fn with_ask_timeout(mut self, ask_timeout: Duration) -> Self {
        self.ask_timeout = ask_timeout;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> TxKind {
        self.kind
    }

    /// `true` once the actor stopped accepting messages.
    pub fn is_terminated(&self) -> bool {
        self.sender.is_closed()
    }

    #[instrument(skip(self), fields(actor = %self.name))]
    pub async fn read(&self, store: Datastore, path: NodePath) -> Result<ReadReply, NodeError> {
        debug!("Sending request");
        ask_unbounded(&self.sender, self.ask_timeout, |respond_to| {
            TxRequest::Read(ReadRequest::Read { store, path, respond_to })
        })
        .await
    }

    #[instrument(skip(self), fields(actor = %self.name))]
    pub async fn exists(&self, store: Datastore, path: NodePath) -> Result<bool, NodeError> {
        debug!("Sending request");
        ask_unbounded(&self.sender, self.ask_timeout, |respond_to| {
            TxRequest::Read(ReadRequest::Exists { store, path, respond_to })
        })
        .await
    }

    pub fn put(&self, store: Datastore, data: NormalizedNodeMessage) -> Result<(), NodeError> {
        self.tell(TxRequest::Write(WriteRequest::Put { store, data }))
    }

    pub fn merge(&self, store: Datastore, data: NormalizedNodeMessage) -> Result<(), NodeError> {
        self.tell(TxRequest::Write(WriteRequest::Merge { store, data }))
    }

    pub fn delete(&self, store: Datastore, path: NodePath) -> Result<(), NodeError> {
        self.tell(TxRequest::Write(WriteRequest::Delete { store, path }))
    }

    #[instrument(skip(self), fields(actor = %self.name))]
    pub async fn cancel(&self) -> Result<bool, NodeError> {
        debug!("Sending request");
        ask_unbounded(&self.sender, self.ask_timeout, |respond_to| TxRequest::Cancel { respond_to })
            .await
    }

    /// Sends `Cancel` without waiting for the answer.
    pub fn cancel_detached(&self) -> Result<(), NodeError> {
        let (respond_to, _) = oneshot::channel();
        self.tell(TxRequest::Cancel { respond_to })
    }

    #[instrument(skip(self), fields(actor = %self.name))]
    pub async fn commit(&self) -> Result<(), NodeError> {
        debug!("Sending request");
        ask_unbounded(&self.sender, self.ask_timeout, |respond_to| TxRequest::Commit { respond_to })
            .await
    }

    fn tell(&self, request: TxRequest) -> Result<(), NodeError> {
        self.sender
            .send(request)
            .map_err(|_| NodeError::from(FrameworkError::ActorClosed))
    }
}

impl fmt::Debug for TxClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TxClient")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish()
    }
}

use super::{DataTreeClient, TxClient};
use crate::device::DeviceSession;
use crate::framework::{ask, FrameworkError};
use crate::messages::{InvokeReply, NodeRequest};
use crate::model::{
    DataTreeIdentifier, DeviceId, NormalizedNodeMessage, QName, SchemaPath, SchemaSource,
    SourceIdentifier,
};
use crate::node_actor::{NodeError, NodeRole, NodeSetup};
use std::fmt;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, instrument};

/// Address of a [`NodeActor`](crate::node_actor::NodeActor).
///
/// Every request/reply method waits at most the client's ask timeout; a master that does
/// not answer in time shows up as [`FrameworkError::AskTimeout`] inside
/// [`NodeError::Framework`].
#[derive(Clone)]
pub struct NodeClient {
    sender: mpsc::Sender<NodeRequest>,
    device: DeviceId,
    ask_timeout: Duration,
}

impl NodeClient {
    pub fn new(sender: mpsc::Sender<NodeRequest>, device: DeviceId, ask_timeout: Duration) -> Self {
        Self { sender, device, ask_timeout }
    }

    /// Same address, different ask timeout.
    pub fn with_ask_timeout(mut self, ask_timeout: Duration) -> Self {
        self.ask_timeout = ask_timeout;
        self
    }

    pub fn device(&self) -> &DeviceId {
        &self.device
    }

    pub fn ask_timeout(&self) -> Duration {
        self.ask_timeout
    }

    /// `true` when both clients address the same actor.
    pub fn same_actor(&self, other: &NodeClient) -> bool {
        self.sender.same_channel(&other.sender)
    }

    pub(crate) fn downgrade(&self) -> mpsc::WeakSender<NodeRequest> {
        self.sender.downgrade()
    }

    // --- Orchestrator side ---

    #[instrument(skip(self, session), fields(device = %self.device))]
    pub async fn initialize_as_master(&self, session: DeviceSession) -> Result<(), NodeError> {
        debug!(?session, "Sending request");
        ask(&self.sender, self.ask_timeout, |respond_to| NodeRequest::InitializeAsMaster {
            session,
            respond_to,
        })
        .await
    }

    #[instrument(skip(self, setup), fields(device = %self.device))]
    pub async fn refresh_master_data(&self, setup: NodeSetup) -> Result<(), NodeError> {
        debug!("Sending request");
        ask(&self.sender, self.ask_timeout, |respond_to| NodeRequest::RefreshMasterData {
            setup,
            respond_to,
        })
        .await
    }

    #[instrument(skip(self, master), fields(device = %self.device))]
    pub async fn register_as_slave_of(
        &self,
        master: NodeClient,
        source_ids: Vec<SourceIdentifier>,
    ) -> Result<(), NodeError> {
        debug!(?source_ids, "Sending request");
        ask(&self.sender, self.ask_timeout, |respond_to| NodeRequest::RegisterAsSlaveOf {
            master,
            source_ids,
            respond_to,
        })
        .await
    }

    pub async fn unregister_mount_point(&self) -> Result<(), NodeError> {
        self.tell(NodeRequest::UnregisterMountPoint).await
    }

    pub async fn refresh_slave_setup(&self, setup: NodeSetup) -> Result<(), NodeError> {
        self.tell(NodeRequest::RefreshSlaveSetup { setup }).await
    }

    #[instrument(skip(self), fields(device = %self.device))]
    pub async fn deactivate(&self) -> Result<(), NodeError> {
        debug!("Sending request");
        ask(&self.sender, self.ask_timeout, |respond_to| NodeRequest::Deactivate { respond_to })
            .await
    }

    pub async fn role(&self) -> Result<NodeRole, NodeError> {
        ask(&self.sender, self.ask_timeout, |respond_to| NodeRequest::QueryRole { respond_to })
            .await
    }

    /// Stops the actor after the messages already queued.
    pub async fn stop(&self) -> Result<(), NodeError> {
        self.tell(NodeRequest::Stop).await
    }

    // --- Slave side ---

    #[instrument(skip(self), fields(device = %self.device))]
    pub async fn ask_for_master_mount_point(&self) -> Result<Vec<SourceIdentifier>, NodeError> {
        debug!("Sending request");
        ask(&self.sender, self.ask_timeout, |respond_to| {
            NodeRequest::AskForMasterMountPoint { respond_to }
        })
        .await
    }

    #[instrument(skip(self), fields(device = %self.device))]
    pub async fn request_schema_source(
        &self,
        id: SourceIdentifier,
    ) -> Result<SchemaSource, NodeError> {
        debug!("Sending request");
        ask(&self.sender, self.ask_timeout, |respond_to| NodeRequest::RequestSchemaSource {
            id,
            respond_to,
        })
        .await
    }

    // --- Data access ---

    #[instrument(skip(self), fields(device = %self.device))]
    pub async fn new_read_transaction(&self) -> Result<TxClient, NodeError> {
        debug!("Sending request");
        ask(&self.sender, self.ask_timeout, |respond_to| NodeRequest::NewReadTransaction {
            respond_to,
        })
        .await
    }

    #[instrument(skip(self), fields(device = %self.device))]
    pub async fn new_write_transaction(&self) -> Result<TxClient, NodeError> {
        debug!("Sending request");
        ask(&self.sender, self.ask_timeout, |respond_to| NodeRequest::NewWriteTransaction {
            respond_to,
        })
        .await
    }

    #[instrument(skip(self), fields(device = %self.device))]
    pub async fn new_read_write_transaction(&self) -> Result<TxClient, NodeError> {
        debug!("Sending request");
        ask(&self.sender, self.ask_timeout, |respond_to| {
            NodeRequest::NewReadWriteTransaction { respond_to }
        })
        .await
    }

    /// Opens a data-tree session on the master. Each call spawns a new session actor.
    #[instrument(skip(self), fields(device = %self.device))]
    pub async fn new_data_tree_service(&self) -> Result<DataTreeClient, NodeError> {
        debug!("Sending request");
        ask(&self.sender, self.ask_timeout, |respond_to| NodeRequest::NewDataTreeService {
            respond_to,
        })
        .await
    }

    #[instrument(skip(self, input), fields(device = %self.device))]
    pub async fn invoke_rpc(
        &self,
        name: QName,
        input: Option<NormalizedNodeMessage>,
    ) -> Result<InvokeReply, NodeError> {
        debug!(?input, "Sending request");
        ask(&self.sender, self.ask_timeout, |respond_to| NodeRequest::InvokeRpc {
            name,
            input,
            respond_to,
        })
        .await
    }

    #[instrument(skip(self, input), fields(device = %self.device))]
    pub async fn invoke_action(
        &self,
        path: SchemaPath,
        target: DataTreeIdentifier,
        input: Option<NormalizedNodeMessage>,
    ) -> Result<InvokeReply, NodeError> {
        debug!(?input, "Sending request");
        ask(&self.sender, self.ask_timeout, |respond_to| NodeRequest::InvokeAction {
            path,
            target,
            input,
            respond_to,
        })
        .await
    }

    async fn tell(&self, request: NodeRequest) -> Result<(), NodeError> {
        self.sender
            .send(request)
            .await
            .map_err(|_| NodeError::from(FrameworkError::ActorClosed))
    }
}

impl fmt::Debug for NodeClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeClient")
            .field("device", &self.device)
            .field("closed", &self.sender.is_closed())
            .finish()
    }
}

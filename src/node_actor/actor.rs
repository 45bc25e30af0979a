use super::{NodeError, NodeRole, NodeSetup};
use crate::clients::{DataTreeClient, NodeClient, RemoteSchemaProvider, TxClient};
use crate::device::{DeviceError, DeviceSession};
use crate::framework::Registration;
use crate::messages::{InvokeReply, NodeRequest, Reply};
use crate::model::{
    DataTreeIdentifier, NormalizedNodeMessage, QName, SchemaContext, SchemaPath, SchemaSource,
    SourceIdentifier,
};
use crate::mount::SlaveMountFacade;
use crate::schema::{SchemaError, SchemaResolver};
use crate::tx_actor::{self, TransactionHandle, TxKind};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

// =============================================================================
// ROLE STATE
// =============================================================================

/// Resources held while the local device session is live.
struct MasterState {
    session: DeviceSession,
    /// Shared by every caller of `NewReadTransaction`.
    read_tx: TxClient,
}

/// Resources held while another member is master.
struct SlaveState {
    master: NodeClient,
    source_ids: Vec<SourceIdentifier>,
    generation: u64,
    schema_registrations: Vec<Registration>,
    resolution: Option<JoinHandle<()>>,
    facade: SlaveMountFacade,
}

impl SlaveState {
    /// Mount point first, then the resolution task, then the source registrations.
    fn tear_down(mut self) {
        self.facade.close();
        if let Some(task) = self.resolution.take() {
            task.abort();
        }
        self.release_sources();
    }

    fn release_sources(&mut self) {
        for mut registration in self.schema_registrations.drain(..) {
            registration.close();
        }
    }
}

/// Transactions opened per request. Reads all go through `MasterState::read_tx`.
#[derive(Debug, Clone, Copy)]
enum WriteKind {
    WriteOnly,
    ReadWrite,
}

impl WriteKind {
    fn tx_kind(self) -> TxKind {
        match self {
            WriteKind::WriteOnly => TxKind::Write,
            WriteKind::ReadWrite => TxKind::ReadWrite,
        }
    }
}

enum RoleState {
    Uninitialized,
    Master(MasterState),
    Slave(SlaveState),
}

impl RoleState {
    fn role(&self) -> NodeRole {
        match self {
            RoleState::Uninitialized => NodeRole::Uninitialized,
            RoleState::Master(_) => NodeRole::Master,
            RoleState::Slave(_) => NodeRole::Slave,
        }
    }
}

// =============================================================================
// THE ACTOR
// =============================================================================

/// Per-device coordinator of one cluster member.
///
/// # Architecture Note
/// The node's role is a tagged state: master-only resources exist only inside
/// `RoleState::Master`, slave-only ones only inside `RoleState::Slave`. A request that
/// needs a role the node does not have gets an explicit failure reply.
///
/// **Concurrency Model**:
/// Messages are processed one at a time. Anything that may take long (RPC and action
/// invocation, schema source lookups, slave schema resolution) runs in a spawned task
/// and replies from there, so the mailbox keeps moving while it is pending.
///
/// Slave schema resolution posts its outcome back into this actor's own mailbox as
/// `SlaveSchemaResolved`, tagged with the registration generation it was started for.
/// Outcomes of superseded registrations are dropped.
pub struct NodeActor {
    receiver: mpsc::Receiver<NodeRequest>,
    mailbox: mpsc::WeakSender<NodeRequest>,
    setup: NodeSetup,
    state: RoleState,
    tx_counter: u64,
    generation: u64,
}

impl NodeActor {
    pub fn new(setup: NodeSetup, buffer_size: usize) -> (Self, NodeClient) {
        let (sender, receiver) = mpsc::channel(buffer_size.max(1));
        let client = NodeClient::new(sender, setup.device.clone(), setup.ask_timeout);
        let actor = Self {
            receiver,
            mailbox: client.downgrade(),
            setup,
            state: RoleState::Uninitialized,
            tx_counter: 0,
            generation: 0,
        };
        (actor, client)
    }

    /// Runs the event loop until `Stop` arrives or every client is gone.
    pub async fn run(mut self) {
        info!(device = %self.setup.device, "Node actor started");

        while let Some(msg) = self.receiver.recv().await {
            match msg {
                NodeRequest::InitializeAsMaster { session, respond_to } => {
                    let result = self.initialize_as_master(session).await;
                    let _ = respond_to.send(result);
                }
                NodeRequest::RefreshMasterData { setup, respond_to } => {
                    debug!(device = %self.setup.device, ?setup, "Master data refreshed");
                    self.setup = setup;
                    let _ = respond_to.send(Ok(()));
                }
                NodeRequest::AskForMasterMountPoint { respond_to } => {
                    let result = match &self.state {
                        RoleState::Master(master) => Ok(master.session.source_ids.clone()),
                        _ => Err(self.not_master()),
                    };
                    debug!(device = %self.setup.device, found = result.is_ok(), "AskForMasterMountPoint");
                    let _ = respond_to.send(result);
                }
                NodeRequest::RequestSchemaSource { id, respond_to } => {
                    self.request_schema_source(id, respond_to);
                }
                NodeRequest::NewReadTransaction { respond_to } => {
                    let result = match &self.state {
                        RoleState::Master(master) => Ok(master.read_tx.clone()),
                        _ => Err(self.not_master()),
                    };
                    let _ = respond_to.send(result);
                }
                NodeRequest::NewWriteTransaction { respond_to } => {
                    let result = self.new_transaction(WriteKind::WriteOnly).await;
                    let _ = respond_to.send(result);
                }
                NodeRequest::NewReadWriteTransaction { respond_to } => {
                    let result = self.new_transaction(WriteKind::ReadWrite).await;
                    let _ = respond_to.send(result);
                }
                NodeRequest::NewDataTreeService { respond_to } => {
                    let result = self.new_data_tree_service();
                    let _ = respond_to.send(result);
                }
                NodeRequest::InvokeRpc { name, input, respond_to } => {
                    self.invoke_rpc(name, input, respond_to);
                }
                NodeRequest::InvokeAction { path, target, input, respond_to } => {
                    self.invoke_action(path, target, input, respond_to);
                }
                NodeRequest::RegisterAsSlaveOf { master, source_ids, respond_to } => {
                    let result = self.register_as_slave_of(master, source_ids);
                    let _ = respond_to.send(result);
                }
                NodeRequest::SlaveSchemaResolved { generation, outcome } => {
                    self.on_schema_resolved(generation, outcome);
                }
                NodeRequest::UnregisterMountPoint => {
                    if matches!(self.state, RoleState::Slave(_)) {
                        self.tear_down_role();
                    } else {
                        debug!(device = %self.setup.device, "No slave mount point to unregister");
                    }
                }
                NodeRequest::RefreshSlaveSetup { setup } => {
                    debug!(device = %self.setup.device, ?setup, "Slave setup refreshed");
                    self.setup = setup;
                }
                NodeRequest::Deactivate { respond_to } => {
                    self.tear_down_role();
                    let _ = respond_to.send(Ok(()));
                }
                NodeRequest::QueryRole { respond_to } => {
                    let _ = respond_to.send(Ok(self.state.role()));
                }
                NodeRequest::Stop => {
                    debug!(device = %self.setup.device, "Stop requested");
                    break;
                }
            }
        }

        self.tear_down_role();
        info!(device = %self.setup.device, "Node actor stopped");
    }

    fn not_master(&self) -> NodeError {
        NodeError::NotMaster(self.setup.device.clone())
    }

    /// Drops whatever role-scoped resources are held and returns to `Uninitialized`.
    fn tear_down_role(&mut self) {
        match std::mem::replace(&mut self.state, RoleState::Uninitialized) {
            RoleState::Uninitialized => {}
            RoleState::Master(master) => {
                info!(device = %self.setup.device, read_tx = %master.read_tx.name(), "Master role released");
            }
            RoleState::Slave(slave) => {
                info!(device = %self.setup.device, master = %slave.master.device(), "Slave role released");
                slave.tear_down();
            }
        }
    }

    // --- Master ---

    async fn initialize_as_master(&mut self, session: DeviceSession) -> Result<(), NodeError> {
        if matches!(self.state, RoleState::Slave(_)) {
            warn!(device = %self.setup.device, "InitializeAsMaster rejected while slave");
            return Err(NodeError::InvalidRole { request: "InitializeAsMaster", role: NodeRole::Slave });
        }

        let read = session.broker.new_read_only().await.map_err(|e| {
            warn!(device = %self.setup.device, error = %e, "Shared read transaction could not be created");
            NodeError::from(e)
        })?;
        let read_tx = tx_actor::spawn(
            format!("{}/read-shared", self.setup.device.name),
            TransactionHandle::ReadOnly(read),
            Duration::ZERO,
            self.setup.ask_timeout,
        );

        let refreshed = matches!(self.state, RoleState::Master(_));
        info!(
            device = %self.setup.device,
            sources = session.source_ids.len(),
            refreshed,
            "Initialized as master"
        );
        self.state = RoleState::Master(MasterState { session, read_tx });
        Ok(())
    }

    async fn new_transaction(&mut self, write: WriteKind) -> Result<TxClient, NodeError> {
        let broker = match &self.state {
            RoleState::Master(master) => master.session.broker.clone(),
            _ => return Err(self.not_master()),
        };

        let kind = write.tx_kind();
        let handle = match write {
            WriteKind::WriteOnly => broker.new_write_only().await.map(TransactionHandle::WriteOnly),
            WriteKind::ReadWrite => broker.new_read_write().await.map(TransactionHandle::ReadWrite),
        }
        .map_err(|e| {
            warn!(device = %self.setup.device, %kind, error = %e, "Transaction could not be created");
            NodeError::from(e)
        })?;

        self.tx_counter += 1;
        let name = format!("{}/{}-{}", self.setup.device.name, kind, self.tx_counter);
        debug!(device = %self.setup.device, actor = %name, "Transaction actor created");
        Ok(tx_actor::spawn(name, handle, self.setup.write_tx_idle_timeout, self.setup.ask_timeout))
    }

    fn new_data_tree_service(&mut self) -> Result<DataTreeClient, NodeError> {
        let service = match &self.state {
            RoleState::Master(master) => master.session.data_tree.clone(),
            _ => return Err(self.not_master()),
        };
        let Some(service) = service else {
            warn!(device = %self.setup.device, "Data-tree session requested, device has none");
            return Err(DeviceError::Unsupported(format!("{} has no data-tree service", self.setup.device)).into());
        };

        self.tx_counter += 1;
        let name = format!("{}/data-tree-{}", self.setup.device.name, self.tx_counter);
        debug!(device = %self.setup.device, actor = %name, "Data-tree session actor created");
        Ok(tx_actor::spawn_data_tree(name, service, self.setup.write_tx_idle_timeout, self.setup.ask_timeout))
    }

    fn invoke_rpc(&self, name: QName, input: Option<NormalizedNodeMessage>, respond_to: Reply<InvokeReply>) {
        let RoleState::Master(master) = &self.state else {
            let _ = respond_to.send(Err(self.not_master()));
            return;
        };
        let rpc = master.session.rpc.clone();
        let device = self.setup.device.clone();

        tokio::spawn(async move {
            let result = rpc.invoke_rpc(&name, input).await;
            if let Err(e) = &result {
                warn!(device = %device, rpc = %name, error = %e, "RPC failed");
            }
            let _ = respond_to.send(result.map(InvokeReply::from).map_err(NodeError::from));
        });
    }

    fn invoke_action(
        &self,
        path: SchemaPath,
        target: DataTreeIdentifier,
        input: Option<NormalizedNodeMessage>,
        respond_to: Reply<InvokeReply>,
    ) {
        let RoleState::Master(master) = &self.state else {
            let _ = respond_to.send(Err(self.not_master()));
            return;
        };
        let Some(action) = master.session.action.clone() else {
            let error = DeviceError::Unsupported(format!("{} has no action service", self.setup.device));
            let _ = respond_to.send(Err(error.into()));
            return;
        };
        let device = self.setup.device.clone();

        tokio::spawn(async move {
            let result = action.invoke_action(&path, &target, input).await;
            if let Err(e) = &result {
                warn!(device = %device, error = %e, "Action failed");
            }
            let _ = respond_to.send(result.map(InvokeReply::from).map_err(NodeError::from));
        });
    }

    /// Served in any role from the member's repository.
    fn request_schema_source(&self, id: SourceIdentifier, respond_to: Reply<SchemaSource>) {
        let repository = self.setup.schema.repository.clone();
        let device = self.setup.device.clone();

        tokio::spawn(async move {
            let result = repository.get_source(&id).await;
            match &result {
                Ok(_) => debug!(device = %device, source = %id, "Schema source served"),
                Err(e) => debug!(device = %device, source = %id, error = %e, "Schema source lookup failed"),
            }
            let _ = respond_to.send(result.map_err(NodeError::from));
        });
    }

    // --- Slave ---

    fn register_as_slave_of(&mut self, master: NodeClient, source_ids: Vec<SourceIdentifier>) -> Result<(), NodeError> {
        match std::mem::replace(&mut self.state, RoleState::Uninitialized) {
            RoleState::Master(state) => {
                self.state = RoleState::Master(state);
                warn!(device = %self.setup.device, "RegisterAsSlaveOf rejected while master");
                return Err(NodeError::InvalidRole { request: "RegisterAsSlaveOf", role: NodeRole::Master });
            }
            RoleState::Slave(previous) => previous.tear_down(),
            RoleState::Uninitialized => {}
        }

        self.generation += 1;
        let generation = self.generation;
        let master = master.with_ask_timeout(self.setup.ask_timeout);

        let schema_registrations = source_ids
            .iter()
            .map(|id| {
                self.setup
                    .schema
                    .registry
                    .register_source(id.clone(), Arc::new(RemoteSchemaProvider::new(master.clone())))
            })
            .collect();

        let resolver = SchemaResolver::new(
            self.setup.device.clone(),
            source_ids.clone(),
            self.setup.schema.context_factory.clone(),
            self.setup.retry_classifier.clone(),
            self.setup.schema_retry_delay,
        );
        let mailbox = self.mailbox.clone();
        let resolution = tokio::spawn(async move {
            let outcome = resolver.resolve().await;
            if let Some(mailbox) = mailbox.upgrade() {
                let _ = mailbox.send(NodeRequest::SlaveSchemaResolved { generation, outcome }).await;
            }
        });

        info!(
            device = %self.setup.device,
            master = %master.device(),
            sources = source_ids.len(),
            generation,
            "Registered as slave, resolving schema"
        );
        self.state = RoleState::Slave(SlaveState {
            facade: SlaveMountFacade::new(self.setup.device.clone(), self.setup.mount_service.clone()),
            master,
            source_ids,
            generation,
            schema_registrations,
            resolution: Some(resolution),
        });
        Ok(())
    }

    fn on_schema_resolved(&mut self, generation: u64, outcome: Result<SchemaContext, SchemaError>) {
        let device = &self.setup.device;
        let RoleState::Slave(slave) = &mut self.state else {
            debug!(device = %device, generation, "Schema resolution finished after slave role was released");
            return;
        };
        if slave.generation != generation {
            debug!(device = %device, generation, current = slave.generation, "Stale schema resolution ignored");
            return;
        }
        slave.resolution = None;

        match outcome {
            Ok(context) => {
                if let Err(e) = slave.facade.register(context, &slave.master) {
                    error!(device = %device, error = %e, "Slave mount point registration failed");
                }
            }
            Err(e) => {
                error!(
                    device = %device,
                    sources = ?slave.source_ids,
                    error = %e,
                    "Schema resolution aborted, releasing schema source registrations"
                );
                slave.release_sources();
            }
        }
    }
}

use super::ClusterConfig;
use crate::clients::NodeClient;
use crate::device::DeviceSession;
use crate::model::DeviceId;
use crate::mount::{MasterMountFacade, MountPointRegistry};
use crate::node_actor::{self, NodeError, NodeRole, NodeSetup};
use crate::schema::{SchemaContextFactory, SchemaResources, SharedSchemaRepository};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info, instrument};

fn node_setup(
    device: DeviceId,
    config: &ClusterConfig,
    schema: &SharedSchemaRepository,
    mounts: &MountPointRegistry,
) -> NodeSetup {
    NodeSetup::new(
        device,
        config,
        SchemaResources::shared(schema.clone()),
        Arc::new(mounts.clone()),
    )
}

struct ManagedDevice {
    client: NodeClient,
    master: MasterMountFacade,
}

/// One cluster member: its node actors and the registries they share.
///
/// `ClusterMember` is responsible for:
/// - **Lifecycle Management**: one node actor per managed device, stopped on shutdown
/// - **Dependency Wiring**: every node gets the member's schema repository and mount registry
/// - **Role Notifications**: singleton activation/deactivation and "follow that master"
///   are turned into node actor requests
///
/// Election itself happens elsewhere; whoever wins tells this member through
/// [`activate`](Self::activate), the others through [`follow`](Self::follow).
///
/// # Example
///
/// ```ignore
/// let mut master = ClusterMember::new("member-1", ClusterConfig::default());
/// let mut slave = ClusterMember::new("member-2", ClusterConfig::default());
///
/// master.activate(device.clone(), session).await?;
/// let master_node = master.node(&device).unwrap();
/// slave.follow(device, &master_node).await?;
///
/// slave.shutdown().await?;
/// master.shutdown().await?;
/// ```
pub struct ClusterMember {
    name: String,
    config: ClusterConfig,
    schema: SharedSchemaRepository,
    mounts: MountPointRegistry,
    nodes: HashMap<DeviceId, ManagedDevice>,

    /// Task handles for all running node actors (used for graceful shutdown)
    handles: Vec<JoinHandle<()>>,
}

impl ClusterMember {
    pub fn new(name: impl Into<String>, config: ClusterConfig) -> Self {
        let name = name.into();
        info!(member = %name, ?config, "Cluster member started");
        Self {
            name,
            config,
            schema: SharedSchemaRepository::new(),
            mounts: MountPointRegistry::new(),
            nodes: HashMap::new(),
            handles: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &ClusterConfig {
        &self.config
    }

    /// Schema sources known to this member. Masters serve sources from here.
    pub fn schema_repository(&self) -> &SharedSchemaRepository {
        &self.schema
    }

    /// Mount points published on this member.
    pub fn mounts(&self) -> &MountPointRegistry {
        &self.mounts
    }

    pub fn node(&self, device: &DeviceId) -> Option<NodeClient> {
        self.nodes.get(device).map(|managed| managed.client.clone())
    }

    /// Returns the node actor for `device`, spawning it on first use.
    pub fn manage(&mut self, device: DeviceId) -> NodeClient {
        self.managed(device).client.clone()
    }

    fn managed(&mut self, device: DeviceId) -> &mut ManagedDevice {
        let Self { name, config, schema, mounts, nodes, handles } = self;
        nodes.entry(device).or_insert_with_key(|device| {
            let setup = node_setup(device.clone(), config, schema, mounts);
            let (actor, client) = node_actor::new(setup, config.mailbox_capacity());
            handles.push(tokio::spawn(actor.run()));
            info!(member = %name, device = %device, "Node actor spawned");
            let master = MasterMountFacade::new(client.clone(), Arc::new(mounts.clone()));
            ManagedDevice { client, master }
        })
    }

    /// This member won the singleton for `device` and holds its live session.
    ///
    /// The session's sources must be present in [`schema_repository`](Self::schema_repository);
    /// slaves fetch them from here.
    #[instrument(skip(self, session), fields(member = %self.name, device = %device))]
    pub async fn activate(&mut self, device: DeviceId, session: DeviceSession) -> Result<(), NodeError> {
        let client = self.manage(device.clone());
        if client.role().await? == NodeRole::Slave {
            info!("Leaving slave role before taking over");
            client.deactivate().await?;
        }
        let context = self.schema.create_context(&session.source_ids).await?;
        self.managed(device).master.on_device_connected(context, session).await
    }

    /// This member lost the singleton for `device`, or the session went away.
    #[instrument(skip(self), fields(member = %self.name, device = %device))]
    pub async fn deactivate(&mut self, device: &DeviceId) -> Result<(), NodeError> {
        match self.nodes.get_mut(device) {
            Some(managed) => managed.master.on_device_disconnected().await,
            None => Ok(()),
        }
    }

    /// Makes the local node for `device` a slave of `master`.
    ///
    /// Fails with [`NodeError::NotMaster`] when `master` holds no session, so the caller
    /// can retry elsewhere.
    #[instrument(skip(self, master), fields(member = %self.name, device = %device))]
    pub async fn follow(&mut self, device: DeviceId, master: &NodeClient) -> Result<(), NodeError> {
        let source_ids = master.ask_for_master_mount_point().await?;
        let client = self.manage(device);
        client.register_as_slave_of(master.clone(), source_ids).await
    }

    /// Withdraws the slave mount point of `device`, if any.
    pub async fn unfollow(&self, device: &DeviceId) -> Result<(), NodeError> {
        match self.nodes.get(device) {
            Some(managed) => managed.client.unregister_mount_point().await,
            None => Ok(()),
        }
    }

    /// Applies a new configuration to every node actor in place.
    pub async fn reconfigure(&mut self, config: ClusterConfig) -> Result<(), NodeError> {
        self.config = config;
        for (device, managed) in &self.nodes {
            let setup = node_setup(device.clone(), &self.config, &self.schema, &self.mounts);
            match managed.client.role().await? {
                NodeRole::Master => managed.client.refresh_master_data(setup).await?,
                _ => managed.client.refresh_slave_setup(setup).await?,
            }
        }
        info!(member = %self.name, nodes = self.nodes.len(), "Configuration refreshed");
        Ok(())
    }

    /// Gracefully shuts down every node actor of this member.
    ///
    /// # Returns
    ///
    /// - `Ok(())` if all actors shut down cleanly
    /// - `Err(String)` if any actor task failed or panicked
    pub async fn shutdown(self) -> Result<(), String> {
        info!(member = %self.name, "Shutting down cluster member...");

        // =====================================================================
        // Step 1: Withdraw master mount points, then stop the node actors
        // =====================================================================
        for (device, mut managed) in self.nodes {
            managed.master.close();
            if let Err(e) = managed.client.stop().await {
                error!(member = %self.name, device = %device, error = %e, "Node actor already gone");
            }
        }

        // =====================================================================
        // Step 2: Wait for all actor tasks to complete
        // =====================================================================
        for handle in self.handles {
            if let Err(e) = handle.await {
                error!(member = %self.name, "Node actor failed: {:?}", e);
                return Err(format!("Node actor failed: {:?}", e));
            }
        }

        info!(member = %self.name, "Cluster member shut down");
        Ok(())
    }
}

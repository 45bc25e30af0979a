use super::{MountPointService, MountServices};
use crate::clients::NodeClient;
use crate::device::DeviceSession;
use crate::framework::Registration;
use crate::model::SchemaContext;
use crate::node_actor::NodeError;
use std::fmt;
use std::sync::Arc;
use tracing::{info, instrument};

/// Mount point of the master: the device session's own services.
///
/// Driven by whoever owns the device connection. On connect the local node actor becomes
/// master before anything is published; on disconnect the registration is closed before
/// the node actor is deactivated.
pub struct MasterMountFacade {
    node: NodeClient,
    mount_service: Arc<dyn MountPointService>,
    registration: Option<Registration>,
}

impl MasterMountFacade {
    pub fn new(node: NodeClient, mount_service: Arc<dyn MountPointService>) -> Self {
        Self { node, mount_service, registration: None }
    }

    pub fn is_registered(&self) -> bool {
        self.registration.is_some()
    }

    #[instrument(skip_all, fields(device = %self.node.device()))]
    pub async fn on_device_connected(
        &mut self,
        context: SchemaContext,
        session: DeviceSession,
    ) -> Result<(), NodeError> {
        self.close();
        self.node.initialize_as_master(session.clone()).await?;

        let services = MountServices {
            schema_context: context,
            data_broker: session.broker,
            rpc: session.rpc,
            action: session.action,
            data_tree: session.data_tree,
        };
        let registration = self.mount_service.register_mount_point(self.node.device(), services)?;
        self.registration = Some(registration);
        info!("Master mount point registered");
        Ok(())
    }

    #[instrument(skip_all, fields(device = %self.node.device()))]
    pub async fn on_device_disconnected(&mut self) -> Result<(), NodeError> {
        self.close();
        self.node.deactivate().await
    }

    pub fn close(&mut self) {
        if let Some(mut registration) = self.registration.take() {
            registration.close();
            info!(device = %self.node.device(), "Master mount point closed");
        }
    }
}

impl fmt::Debug for MasterMountFacade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MasterMountFacade")
            .field("device", self.node.device())
            .field("registered", &self.is_registered())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::mock::{MockDevice, MockRpcService};
    use crate::framework::mock::mock_device;
    use crate::lifecycle::ClusterConfig;
    use crate::model::SourceIdentifier;
    use crate::mount::MountPointRegistry;
    use crate::node_actor::{self, NodeRole, NodeSetup};
    use crate::schema::{SchemaResources, SharedSchemaRepository};

    #[tokio::test]
    async fn test_connect_publishes_session_and_disconnect_withdraws_it() {
        let registry = MountPointRegistry::new();
        let setup = NodeSetup::new(
            mock_device("r1"),
            &ClusterConfig::default(),
            SchemaResources::shared(SharedSchemaRepository::new()),
            Arc::new(registry.clone()),
        );
        let (actor, node) = node_actor::new(setup, 8);
        tokio::spawn(actor.run());
        let mut facade = MasterMountFacade::new(node.clone(), Arc::new(registry.clone()));

        let ids = vec![SourceIdentifier::new("ietf-system", None)];
        let session = MockDevice::new().session(ids.clone(), MockRpcService::new(), None);
        facade.on_device_connected(SchemaContext::new(Vec::new()), session.clone()).await.unwrap();
        assert_eq!(node.role().await.unwrap(), NodeRole::Master);
        assert_eq!(node.ask_for_master_mount_point().await.unwrap(), ids);

        // Reconnecting replaces the registration instead of colliding with it.
        facade.on_device_connected(SchemaContext::new(Vec::new()), session).await.unwrap();
        assert_eq!(registry.registered_total(), 2);

        facade.on_device_disconnected().await.unwrap();
        assert!(!registry.is_mounted(&mock_device("r1")));
        assert!(!facade.is_registered());
        assert_eq!(node.role().await.unwrap(), NodeRole::Uninitialized);
    }
}

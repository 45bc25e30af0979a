use super::{MountError, MountPointService, MountServices};
use crate::clients::{
    NodeClient, ProxyActionService, ProxyDataBroker, ProxyDataTreeService, ProxyRpcService,
};
use crate::framework::Registration;
use crate::model::{DeviceId, SchemaContext};
use std::fmt;
use std::sync::Arc;
use tracing::info;

/// Mount point of a slave: proxies bound to the master's node actor.
///
/// Owns at most one registration. Registering again closes the previous registration
/// before the new one is installed.
pub struct SlaveMountFacade {
    device: DeviceId,
    mount_service: Arc<dyn MountPointService>,
    registration: Option<Registration>,
}

impl SlaveMountFacade {
    pub fn new(device: DeviceId, mount_service: Arc<dyn MountPointService>) -> Self {
        Self { device, mount_service, registration: None }
    }

    pub fn is_registered(&self) -> bool {
        self.registration.is_some()
    }

    pub fn register(&mut self, context: SchemaContext, master: &NodeClient) -> Result<(), MountError> {
        self.close();
        let services = MountServices {
            schema_context: context,
            data_broker: Arc::new(ProxyDataBroker::new(master.clone())),
            rpc: Arc::new(ProxyRpcService::new(master.clone())),
            action: Some(Arc::new(ProxyActionService::new(master.clone()))),
            data_tree: Some(Arc::new(ProxyDataTreeService::new(master.clone()))),
        };
        let registration = self.mount_service.register_mount_point(&self.device, services)?;
        info!(device = %self.device, master = %master.device(), "Slave mount point registered");
        self.registration = Some(registration);
        Ok(())
    }

    /// Closes the current registration, if any.
    pub fn close(&mut self) {
        if let Some(mut registration) = self.registration.take() {
            registration.close();
            info!(device = %self.device, "Slave mount point closed");
        }
    }
}

impl fmt::Debug for SlaveMountFacade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlaveMountFacade")
            .field("device", &self.device)
            .field("registered", &self.is_registered())
            .finish()
    }
}

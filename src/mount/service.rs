use super::MountError;
use crate::device::{ActionService, DataBroker, DataTreeService, RpcService};
use crate::framework::Registration;
use crate::model::{DeviceId, SchemaContext};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::info;

/// The services published for one device.
#[derive(Clone)]
pub struct MountServices {
    pub schema_context: SchemaContext,
    pub data_broker: Arc<dyn DataBroker>,
    pub rpc: Arc<dyn RpcService>,
    pub action: Option<Arc<dyn ActionService>>,
    pub data_tree: Option<Arc<dyn DataTreeService>>,
}

impl fmt::Debug for MountServices {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MountServices")
            .field("sources", &self.schema_context.sources().len())
            .field("actions", &self.action.is_some())
            .field("data_tree", &self.data_tree.is_some())
            .finish_non_exhaustive()
    }
}

/// Local service registry mount points are published into.
pub trait MountPointService: Send + Sync {
    /// Publishes `services` under `device`. Closing the registration withdraws them.
    fn register_mount_point(
        &self,
        device: &DeviceId,
        services: MountServices,
    ) -> Result<Registration, MountError>;
}

#[derive(Default)]
struct RegistryInner {
    mounts: Mutex<HashMap<DeviceId, (u64, MountServices)>>,
    next_token: AtomicU64,
    registered_total: AtomicU64,
}

impl RegistryInner {
    fn mounts(&self) -> MutexGuard<'_, HashMap<DeviceId, (u64, MountServices)>> {
        self.mounts.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// In-memory [`MountPointService`] keyed by device identity.
///
/// At most one registration per device is open at a time; a second one is refused until
/// the first is closed.
#[derive(Clone, Default)]
pub struct MountPointRegistry {
    inner: Arc<RegistryInner>,
}

impl MountPointRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_mounted(&self, device: &DeviceId) -> bool {
        self.inner.mounts().contains_key(device)
    }

    pub fn services(&self, device: &DeviceId) -> Option<MountServices> {
        self.inner.mounts().get(device).map(|(_, services)| services.clone())
    }

    pub fn mounted_devices(&self) -> Vec<DeviceId> {
        self.inner.mounts().keys().cloned().collect()
    }

    /// Number of registrations ever accepted.
    pub fn registered_total(&self) -> u64 {
        self.inner.registered_total.load(Ordering::SeqCst)
    }
}

impl MountPointService for MountPointRegistry {
    fn register_mount_point(
        &self,
        device: &DeviceId,
        services: MountServices,
    ) -> Result<Registration, MountError> {
        let token = self.inner.next_token.fetch_add(1, Ordering::SeqCst);
        {
            let mut mounts = self.inner.mounts();
            if mounts.contains_key(device) {
                return Err(MountError::AlreadyRegistered(device.clone()));
            }
            mounts.insert(device.clone(), (token, services));
        }
        self.inner.registered_total.fetch_add(1, Ordering::SeqCst);
        info!(device = %device, "Mount point registered");

        let inner = Arc::downgrade(&self.inner);
        let device = device.clone();
        Ok(Registration::new(format!("mount {device}"), move || {
            let Some(inner) = inner.upgrade() else { return };
            let mut mounts = inner.mounts();
            if mounts.get(&device).is_some_and(|(t, _)| *t == token) {
                mounts.remove(&device);
                info!(device = %device, "Mount point unregistered");
            }
        }))
    }
}

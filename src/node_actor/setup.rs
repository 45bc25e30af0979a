use crate::lifecycle::ClusterConfig;
use crate::model::DeviceId;
use crate::mount::MountPointService;
use crate::schema::{AskTimeoutClassifier, RetryClassifier, SchemaResources};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Everything a node actor is configured with: the device it serves, timeouts and the
/// collaborators of its cluster member.
///
/// Replaced wholesale by `RefreshMasterData` / `RefreshSlaveSetup`.
#[derive(Clone)]
pub struct NodeSetup {
    pub device: DeviceId,
    pub schema: SchemaResources,
    pub mount_service: Arc<dyn MountPointService>,
    pub ask_timeout: Duration,
    /// Zero disables the idle timer of write transactions.
    pub write_tx_idle_timeout: Duration,
    pub schema_retry_delay: Duration,
    pub retry_classifier: Arc<dyn RetryClassifier>,
}

impl NodeSetup {
    pub fn new(
        device: DeviceId,
        config: &ClusterConfig,
        schema: SchemaResources,
        mount_service: Arc<dyn MountPointService>,
    ) -> Self {
        Self {
            device,
            schema,
            mount_service,
            ask_timeout: config.ask_timeout(),
            write_tx_idle_timeout: config.write_transaction_idle_timeout(),
            schema_retry_delay: config.schema_retry_delay(),
            retry_classifier: Arc::new(AskTimeoutClassifier),
        }
    }

    pub fn with_retry_classifier(mut self, classifier: Arc<dyn RetryClassifier>) -> Self {
        self.retry_classifier = classifier;
        self
    }
}

impl fmt::Debug for NodeSetup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeSetup")
            .field("device", &self.device)
            .field("ask_timeout", &self.ask_timeout)
            .field("write_tx_idle_timeout", &self.write_tx_idle_timeout)
            .field("schema_retry_delay", &self.schema_retry_delay)
            .finish_non_exhaustive()
    }
}

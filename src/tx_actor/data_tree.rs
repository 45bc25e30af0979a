use crate::clients::DataTreeClient;
use crate::device::{DataTreeService, DeviceError};
use crate::messages::{DataTreeRequest, EditRequest, InvokeReply, ReadReply, Reply};
use crate::model::{NodePath, NormalizedNode, NormalizedNodeMessage, RpcResult};
use crate::node_actor::NodeError;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Actor serializing one caller's edit-config session on the device's data-tree service.
///
/// # Architecture Note
/// Same mailbox and idle timer as [`TransactionActor`](super::TransactionActor). Every
/// request is awaited before the next one is taken, so lock, edits and commit reach the
/// device in the order they were sent.
///
/// **Lifecycle**:
/// - `Commit` is terminal. The mailbox closes before the commit is issued.
/// - A period without messages longer than the idle timeout discards the candidate
///   changes, unlocks and stops the actor. So does losing every [`DataTreeClient`].
pub struct DataTreeActor {
    name: String,
    receiver: mpsc::UnboundedReceiver<DataTreeRequest>,
    service: Arc<dyn DataTreeService>,
    idle_timeout: Duration,
}

impl DataTreeActor {
    pub fn new(
        name: impl Into<String>,
        service: Arc<dyn DataTreeService>,
        idle_timeout: Duration,
        ask_timeout: Duration,
    ) -> (Self, DataTreeClient) {
        let name = name.into();
        let (sender, receiver) = mpsc::unbounded_channel();
        let client = DataTreeClient::new(sender, name.clone(), ask_timeout);
        let actor = Self { name, receiver, service, idle_timeout };
        (actor, client)
    }

    pub async fn run(mut self) {
        info!(actor = %self.name, "Data-tree session started");

        loop {
            let next = if self.idle_timeout.is_zero() {
                self.receiver.recv().await
            } else {
                match tokio::time::timeout(self.idle_timeout, self.receiver.recv()).await {
                    Ok(next) => next,
                    Err(_) => {
                        warn!(
                            actor = %self.name,
                            idle_timeout = ?self.idle_timeout,
                            "No message within idle timeout, discarding changes and unlocking"
                        );
                        self.release().await;
                        break;
                    }
                }
            };

            let Some(request) = next else {
                debug!(actor = %self.name, "All clients gone, releasing session");
                self.release().await;
                break;
            };

            match request {
                DataTreeRequest::Lock { respond_to } => {
                    let result = self.service.lock().await;
                    self.reply_rpc("Lock", result, respond_to);
                }
                DataTreeRequest::Unlock { respond_to } => {
                    let result = self.service.unlock().await;
                    self.reply_rpc("Unlock", result, respond_to);
                }
                DataTreeRequest::DiscardChanges { respond_to } => {
                    let result = self.service.discard_changes().await;
                    self.reply_rpc("Discard changes", result, respond_to);
                }
                DataTreeRequest::Get { path, respond_to } => {
                    let result = self.service.get(&path).await;
                    self.reply_read(path, result, respond_to);
                }
                DataTreeRequest::GetConfig { path, respond_to } => {
                    let result = self.service.get_config(&path).await;
                    self.reply_read(path, result, respond_to);
                }
                DataTreeRequest::Edit(edit) => self.edit(edit).await,
                DataTreeRequest::Commit { respond_to } => {
                    self.commit(respond_to);
                    return;
                }
            }
        }

        info!(actor = %self.name, "Data-tree session stopped");
    }

    async fn edit(&self, edit: EditRequest) {
        debug!(actor = %self.name, ?edit, "Edit");
        let result = match edit {
            EditRequest::Merge { store, data } => self.service.merge(store, data.path, data.node).await,
            EditRequest::Replace { store, data } => self.service.replace(store, data.path, data.node).await,
            EditRequest::Create { store, data } => self.service.create(store, data.path, data.node).await,
            EditRequest::Delete { store, path } => self.service.delete(store, path).await,
            EditRequest::Remove { store, path } => self.service.remove(store, path).await,
        };
        if let Err(e) = result {
            warn!(actor = %self.name, error = %e, "Edit failed, session continues");
        }
    }

    fn reply_rpc(
        &self,
        operation: &'static str,
        result: Result<Option<RpcResult>, DeviceError>,
        respond_to: Reply<InvokeReply>,
    ) {
        match &result {
            Ok(Some(rpc)) if !rpc.errors.is_empty() => {
                warn!(actor = %self.name, operation, errors = ?rpc.errors, "Completed with errors")
            }
            Ok(_) => debug!(actor = %self.name, operation, "Completed"),
            Err(e) => warn!(actor = %self.name, operation, error = %e, "Failed"),
        }
        let _ = respond_to.send(result.map(InvokeReply::from).map_err(NodeError::from));
    }

    fn reply_read(
        &self,
        path: NodePath,
        result: Result<Option<NormalizedNode>, DeviceError>,
        respond_to: Reply<ReadReply>,
    ) {
        let reply = match result {
            Ok(Some(node)) => Ok(ReadReply::Data(NormalizedNodeMessage::new(path, node))),
            Ok(None) => Ok(ReadReply::Empty),
            Err(e) => {
                warn!(actor = %self.name, %path, error = %e, "Read failed");
                Err(NodeError::from(e))
            }
        };
        let _ = respond_to.send(reply);
    }

    /// Discard, then unlock. Failures are logged only.
    async fn release(&self) {
        if let Err(e) = self.service.discard_changes().await {
            warn!(actor = %self.name, error = %e, "Discard changes failed");
        }
        if let Err(e) = self.service.unlock().await {
            warn!(actor = %self.name, error = %e, "Unlock failed");
        }
    }

    fn commit(self, respond_to: Reply<()>) {
        let Self { name, receiver, service, .. } = self;
        drop(receiver);
        info!(actor = %name, "Data-tree session stopped");
        debug!(actor = %name, "Committing candidate changes");
        tokio::spawn(async move {
            let result = service.commit().await;
            match &result {
                Ok(()) => info!(actor = %name, "Candidate changes committed"),
                Err(e) => warn!(actor = %name, error = %e, "Commit failed"),
            }
            let _ = respond_to.send(result.map_err(NodeError::from));
        });
    }
}

/// Spawns a [`DataTreeActor`] over `service` and returns its client.
pub fn spawn_data_tree(
    name: impl Into<String>,
    service: Arc<dyn DataTreeService>,
    idle_timeout: Duration,
    ask_timeout: Duration,
) -> DataTreeClient {
    let (actor, client) = DataTreeActor::new(name, service, idle_timeout, ask_timeout);
    tokio::spawn(actor.run());
    client
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::mock::{DataTreeOp, MockDevice};
    use crate::framework::FrameworkError;
    use crate::model::{Datastore, NodePath, NormalizedNode};

    const ASK: Duration = Duration::from_secs(1);

    fn session(device: &MockDevice, idle: Duration) -> DataTreeClient {
        spawn_data_tree("r1/data-tree-1", Arc::new(device.clone()), idle, ASK)
    }

    fn leaf(path: &str, value: &str) -> NormalizedNodeMessage {
        NormalizedNodeMessage::new(NodePath::parse(path), NormalizedNode::leaf("leaf", value))
    }

    #[tokio::test]
    async fn test_lock_edit_commit_reach_device_in_order() {
        let device = MockDevice::new();
        device.seed(Datastore::Configuration, NodePath::parse("/old"), NormalizedNode::leaf("leaf", "x"));
        let client = session(&device, Duration::ZERO);

        let lock = client.lock().await.unwrap();
        assert_eq!(lock.into_result().map(|r| r.errors.len()), Some(0));
        client.merge(Datastore::Configuration, leaf("/a", "1")).unwrap();
        client.replace(Datastore::Configuration, leaf("/b", "2")).unwrap();
        client.delete(Datastore::Configuration, NodePath::parse("/old")).unwrap();
        client.commit().await.unwrap();

        assert_eq!(
            device.data_tree_journal(),
            vec![
                DataTreeOp::Lock,
                DataTreeOp::Merge {
                    store: Datastore::Configuration,
                    path: NodePath::parse("/a"),
                    node: NormalizedNode::leaf("leaf", "1"),
                },
                DataTreeOp::Replace {
                    store: Datastore::Configuration,
                    path: NodePath::parse("/b"),
                    node: NormalizedNode::leaf("leaf", "2"),
                },
                DataTreeOp::Delete { store: Datastore::Configuration, path: NodePath::parse("/old") },
                DataTreeOp::Commit,
            ]
        );
        assert_eq!(device.value(Datastore::Configuration, &NodePath::parse("/old")), None);
        assert!(device.value(Datastore::Configuration, &NodePath::parse("/b")).is_some());
        assert!(device.is_locked(), "commit leaves the lock to the caller");
        assert!(client.is_terminated());
        assert!(matches!(
            client.unlock().await,
            Err(NodeError::Framework(FrameworkError::ActorClosed))
        ));
    }

    #[tokio::test]
    async fn test_failed_edit_does_not_stop_session() {
        let device = MockDevice::new();
        let client = session(&device, Duration::ZERO);

        client.create(Datastore::Configuration, leaf("/a", "1")).unwrap();
        client.create(Datastore::Configuration, leaf("/a", "2")).unwrap();
        client.remove(Datastore::Configuration, NodePath::parse("/missing")).unwrap();

        assert_eq!(client.get_config(NodePath::parse("/a")).await.unwrap(), ReadReply::Empty);
        client.commit().await.unwrap();
        assert_eq!(
            device.value(Datastore::Configuration, &NodePath::parse("/a")),
            Some(NormalizedNode::leaf("leaf", "1"))
        );
    }

    #[tokio::test]
    async fn test_get_reads_operational_state() {
        let device = MockDevice::new();
        device.seed(Datastore::Operational, NodePath::parse("/uptime"), NormalizedNode::leaf("uptime", "42"));
        let client = session(&device, Duration::ZERO);

        assert_eq!(
            client.get(NodePath::parse("/uptime")).await.unwrap(),
            ReadReply::Data(NormalizedNodeMessage::new(
                NodePath::parse("/uptime"),
                NormalizedNode::leaf("uptime", "42")
            ))
        );
        assert_eq!(client.get_config(NodePath::parse("/uptime")).await.unwrap(), ReadReply::Empty);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_session_discards_and_unlocks() {
        let device = MockDevice::new();
        let client = session(&device, Duration::from_secs(5));

        client.lock().await.unwrap();
        client.merge(Datastore::Configuration, leaf("/a", "1")).unwrap();
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(!client.is_terminated());

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(client.is_terminated());
        assert!(!device.is_locked());
        assert_eq!(
            device.data_tree_journal()[2..],
            [DataTreeOp::DiscardChanges, DataTreeOp::Unlock]
        );
        assert_eq!(device.value(Datastore::Configuration, &NodePath::parse("/a")), None);
    }

    #[tokio::test]
    async fn test_dropping_last_client_releases_lock() {
        let device = MockDevice::new();
        let (actor, client) = DataTreeActor::new("r1/data-tree-1", Arc::new(device.clone()), Duration::ZERO, ASK);
        let handle = tokio::spawn(actor.run());

        client.lock().await.unwrap();
        drop(client);
        handle.await.unwrap();
        assert!(!device.is_locked());
    }
}

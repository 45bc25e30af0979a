use device_mount_cluster::clients::NodeClient;
use device_mount_cluster::device::mock::{DataTreeOp, DeviceOp, MockActionService, MockDevice, MockRpcService};
use device_mount_cluster::device::DeviceError;
use device_mount_cluster::lifecycle::ClusterConfig;
use device_mount_cluster::messages::{InvokeReply, ReadReply};
use device_mount_cluster::model::{
    DataTreeIdentifier, Datastore, DeviceId, NodePath, NormalizedNode, NormalizedNodeMessage,
    QName, RpcError, RpcResult, SchemaPath, SourceIdentifier,
};
use device_mount_cluster::mount::MountPointRegistry;
use device_mount_cluster::node_actor::{self, NodeError, NodeSetup};
use device_mount_cluster::schema::{SchemaError, SchemaResources, SharedSchemaRepository};
use device_mount_cluster::tx_actor::TxKind;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

fn device() -> DeviceId {
    DeviceId::new("r1", SocketAddr::from(([10, 0, 0, 1], 830)))
}

fn interfaces() -> SourceIdentifier {
    SourceIdentifier::new("ietf-interfaces", Some("2018-02-20"))
}

fn system() -> SourceIdentifier {
    SourceIdentifier::new("ietf-system", Some("2014-08-06"))
}

/// Spawns a real node actor wired to the given repository.
fn spawn_node(repository: &SharedSchemaRepository, config: &ClusterConfig) -> NodeClient {
    let setup = NodeSetup::new(
        device(),
        config,
        SchemaResources::shared(repository.clone()),
        Arc::new(MountPointRegistry::new()),
    );
    let (actor, client) = node_actor::new(setup, config.mailbox_capacity());
    tokio::spawn(actor.run());
    client
}

async fn spawn_master(
    mock: &MockDevice,
    rpc: MockRpcService,
    action: Option<MockActionService>,
) -> NodeClient {
    let node = spawn_node(&SharedSchemaRepository::new(), &ClusterConfig::default());
    node.initialize_as_master(mock.session(vec![interfaces(), system()], rpc, action))
        .await
        .expect("initialize as master");
    node
}

/// Pattern 2: Actor + Mocks
/// - Real Node actor
/// - Mocked device session
#[tokio::test]
async fn test_master_advertises_its_source_ids() {
    let node = spawn_master(&MockDevice::new(), MockRpcService::new(), None).await;

    let advertised = node.ask_for_master_mount_point().await.unwrap();
    assert_eq!(advertised, vec![interfaces(), system()]);
}

#[tokio::test]
async fn test_schema_source_text_is_served_verbatim() {
    let repository = SharedSchemaRepository::new();
    let _registration = repository.add_source(interfaces(), "YANG");
    let node = spawn_node(&repository, &ClusterConfig::default());

    let source = node.request_schema_source(interfaces()).await.unwrap();
    assert_eq!(source.id, interfaces());
    assert_eq!(source.text, "YANG");
}

#[tokio::test]
async fn test_missing_schema_source_is_distinguishable() {
    let node = spawn_node(&SharedSchemaRepository::new(), &ClusterConfig::default());

    let err = node.request_schema_source(system()).await.unwrap_err();
    match err {
        NodeError::Schema(SchemaError::MissingSource(id)) => assert_eq!(id, system()),
        other => panic!("expected MissingSource, got {other:?}"),
    }
}

#[tokio::test]
async fn test_master_only_requests_fail_on_uninitialized_node() {
    let node = spawn_node(&SharedSchemaRepository::new(), &ClusterConfig::default());

    assert!(matches!(node.ask_for_master_mount_point().await, Err(NodeError::NotMaster(ref d)) if *d == device()));
    assert!(matches!(node.new_read_transaction().await, Err(NodeError::NotMaster(_))));
    assert!(matches!(node.new_write_transaction().await, Err(NodeError::NotMaster(_))));
    assert!(matches!(node.new_read_write_transaction().await, Err(NodeError::NotMaster(_))));
    assert!(matches!(
        node.invoke_rpc(QName::new("urn:example", "ping"), None).await,
        Err(NodeError::NotMaster(_))
    ));
    assert!(matches!(node.new_data_tree_service().await, Err(NodeError::NotMaster(_))));
}

#[tokio::test]
async fn test_read_transactions_share_one_actor() {
    let mock = MockDevice::new();
    mock.seed(Datastore::Operational, NodePath::parse("/uptime"), NormalizedNode::leaf("uptime", "42"));
    let node = spawn_master(&mock, MockRpcService::new(), None).await;

    let first = node.new_read_transaction().await.unwrap();
    let second = node.new_read_transaction().await.unwrap();
    assert_eq!(first.name(), second.name());
    assert_eq!(first.kind(), TxKind::Read);
    assert_eq!(mock.transactions_opened(), 1);

    assert!(!first.cancel().await.unwrap());
    let reply = second.read(Datastore::Operational, NodePath::parse("/uptime")).await.unwrap();
    assert!(matches!(reply, ReadReply::Data(ref data) if data.node == NormalizedNode::leaf("uptime", "42")));
}

#[tokio::test]
async fn test_write_transactions_are_fresh_instances() {
    let mock = MockDevice::new();
    let node = spawn_master(&mock, MockRpcService::new(), None).await;

    let write = node.new_write_transaction().await.unwrap();
    let read_write = node.new_read_write_transaction().await.unwrap();
    assert_ne!(write.name(), read_write.name());
    assert_eq!(write.kind(), TxKind::Write);
    assert_eq!(read_write.kind(), TxKind::ReadWrite);

    read_write
        .put(
            Datastore::Configuration,
            NormalizedNodeMessage::new(NodePath::parse("/system/hostname"), NormalizedNode::leaf("hostname", "r1")),
        )
        .unwrap();
    read_write.commit().await.unwrap();
    assert_eq!(
        mock.value(Datastore::Configuration, &NodePath::parse("/system/hostname")),
        Some(NormalizedNode::leaf("hostname", "r1"))
    );
}

#[tokio::test]
async fn test_transaction_construction_failure_is_replied() {
    let mock = MockDevice::new();
    let node = spawn_master(&mock, MockRpcService::new(), None).await;

    mock.fail_next_transaction("session is reconnecting");
    let err = node.new_read_write_transaction().await.unwrap_err();
    assert!(matches!(err, NodeError::Device(DeviceError::Failed(ref reason)) if reason == "session is reconnecting"));

    // The node keeps serving.
    assert!(node.new_write_transaction().await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_configured_idle_timeout_reclaims_write_transactions() {
    let config = ClusterConfig::from_json(r#"{ "write_transaction_idle_timeout_secs": 2 }"#).unwrap();
    let mock = MockDevice::new();
    let node = spawn_node(&SharedSchemaRepository::new(), &config);
    node.initialize_as_master(mock.session(vec![interfaces()], MockRpcService::new(), None))
        .await
        .unwrap();

    let write = node.new_write_transaction().await.unwrap();
    tokio::time::sleep(Duration::from_secs(3)).await;

    assert!(write.is_terminated());
    let cancels: Vec<DeviceOp> = mock
        .journal()
        .into_iter()
        .filter(|op| matches!(op, DeviceOp::Cancel { .. }))
        .collect();
    assert_eq!(cancels.len(), 1);
}

#[tokio::test]
async fn test_rpc_replies() {
    let rpc = MockRpcService::new();
    rpc.respond_with(Ok(None));
    rpc.respond_with(Ok(Some(RpcResult {
        output: Some(NormalizedNode::leaf("status", "ok")),
        errors: vec![RpcError { tag: "warning".into(), message: "slow".into() }],
    })));
    rpc.respond_with(Err(DeviceError::Failed("timeout talking to device".into())));
    let node = spawn_master(&MockDevice::new(), rpc.clone(), None).await;
    let ping = QName::new("urn:example", "ping");

    assert_eq!(node.invoke_rpc(ping.clone(), None).await.unwrap(), InvokeReply::Empty);

    match node.invoke_rpc(ping.clone(), None).await.unwrap() {
        InvokeReply::Output { output: Some(message), errors } => {
            assert_eq!(message.path, NodePath::root());
            assert_eq!(message.node, NormalizedNode::leaf("status", "ok"));
            assert_eq!(errors.len(), 1);
        }
        other => panic!("expected output, got {other:?}"),
    }

    assert!(matches!(
        node.invoke_rpc(ping.clone(), None).await,
        Err(NodeError::Device(DeviceError::Failed(_)))
    ));
    assert_eq!(rpc.calls().len(), 3);
}

#[tokio::test]
async fn test_pending_rpc_does_not_block_mailbox() {
    let rpc = MockRpcService::new();
    let gate = Arc::new(Notify::new());
    rpc.hold_until(gate.clone());
    rpc.respond_with(Ok(None));
    let node = spawn_master(&MockDevice::new(), rpc, None).await;

    let pending = tokio::spawn({
        let node = node.clone();
        async move { node.invoke_rpc(QName::new("urn:example", "slow"), None).await }
    });

    // Answered while the RPC is still held.
    assert_eq!(node.ask_for_master_mount_point().await.unwrap().len(), 2);
    assert!(!pending.is_finished());

    gate.notify_one();
    assert_eq!(pending.await.unwrap().unwrap(), InvokeReply::Empty);
}

#[tokio::test]
async fn test_actions() {
    let target = DataTreeIdentifier { datastore: Datastore::Operational, path: NodePath::parse("/interfaces/eth0") };
    let reset = SchemaPath(vec![QName::new("urn:example", "interfaces"), QName::new("urn:example", "reset")]);

    let without_actions = spawn_master(&MockDevice::new(), MockRpcService::new(), None).await;
    let err = without_actions.invoke_action(reset.clone(), target.clone(), None).await.unwrap_err();
    assert!(matches!(err, NodeError::Device(DeviceError::Unsupported(_))));

    let action = MockActionService::new();
    action.respond_with(Ok(Some(RpcResult::default())));
    let node = spawn_master(&MockDevice::new(), MockRpcService::new(), Some(action.clone())).await;
    let reply = node.invoke_action(reset.clone(), target.clone(), None).await.unwrap();
    assert_eq!(reply, InvokeReply::Output { output: None, errors: Vec::new() });
    assert_eq!(action.calls(), vec![(reset, target)]);
}

#[tokio::test]
async fn test_data_tree_session_lock_edit_commit_in_order() {
    let mock = MockDevice::new();
    let node = spawn_master(&mock, MockRpcService::new(), None).await;
    let hostname = NodePath::parse("/system/hostname");

    let session = node.new_data_tree_service().await.unwrap();
    let locked = session.lock().await.unwrap().into_result().unwrap();
    assert!(locked.errors.is_empty());
    session
        .merge(
            Datastore::Configuration,
            NormalizedNodeMessage::new(hostname.clone(), NormalizedNode::leaf("hostname", "r1")),
        )
        .unwrap();
    session.commit().await.unwrap();

    assert_eq!(
        mock.data_tree_journal(),
        vec![
            DataTreeOp::Lock,
            DataTreeOp::Merge {
                store: Datastore::Configuration,
                path: hostname.clone(),
                node: NormalizedNode::leaf("hostname", "r1"),
            },
            DataTreeOp::Commit,
        ]
    );
    assert_eq!(mock.value(Datastore::Configuration, &hostname), Some(NormalizedNode::leaf("hostname", "r1")));
    assert!(session.is_terminated());

    // A second session on the same device can release the lock.
    let second = node.new_data_tree_service().await.unwrap();
    assert_ne!(second.name(), session.name());
    second.unlock().await.unwrap();
    assert!(!mock.is_locked());
}

#[tokio::test]
async fn test_data_tree_session_needs_device_support() {
    let mock = MockDevice::new();
    let node = spawn_node(&SharedSchemaRepository::new(), &ClusterConfig::default());
    let mut session = mock.session(vec![interfaces()], MockRpcService::new(), None);
    session.data_tree = None;
    node.initialize_as_master(session).await.unwrap();

    let err = node.new_data_tree_service().await.unwrap_err();
    assert!(matches!(err, NodeError::Device(DeviceError::Unsupported(_))));
}

#[tokio::test(start_paused = true)]
async fn test_configured_idle_timeout_reclaims_data_tree_sessions() {
    let config = ClusterConfig::from_json(r#"{ "write_transaction_idle_timeout_secs": 2 }"#).unwrap();
    let mock = MockDevice::new();
    let node = spawn_node(&SharedSchemaRepository::new(), &config);
    node.initialize_as_master(mock.session(vec![interfaces()], MockRpcService::new(), None))
        .await
        .unwrap();

    let session = node.new_data_tree_service().await.unwrap();
    session.lock().await.unwrap();
    session
        .replace(
            Datastore::Configuration,
            NormalizedNodeMessage::new(NodePath::parse("/a"), NormalizedNode::leaf("a", "1")),
        )
        .unwrap();
    tokio::time::sleep(Duration::from_secs(3)).await;

    assert!(session.is_terminated());
    assert!(!mock.is_locked());
    assert_eq!(mock.value(Datastore::Configuration, &NodePath::parse("/a")), None);
    assert_eq!(
        mock.data_tree_journal().last(),
        Some(&DataTreeOp::Unlock)
    );
}

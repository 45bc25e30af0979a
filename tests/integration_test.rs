use device_mount_cluster::device::mock::{DataTreeOp, DeviceOp, MockDevice, MockRpcService};
use device_mount_cluster::device::{ReadTransaction, WriteTransaction};
use device_mount_cluster::framework::mock::{create_mock_node, MockMaster};
use device_mount_cluster::framework::Registration;
use device_mount_cluster::lifecycle::{ClusterConfig, ClusterMember};
use device_mount_cluster::messages::ReadReply;
use device_mount_cluster::model::{
    Datastore, DeviceId, NodePath, NormalizedNode, QName, RpcResult, SchemaSource, SourceIdentifier,
};
use device_mount_cluster::mount::MountServices;
use device_mount_cluster::node_actor::{NodeError, NodeRole};
use std::net::SocketAddr;
use std::time::Duration;

fn device() -> DeviceId {
    DeviceId::new("edge-1", SocketAddr::from(([192, 0, 2, 1], 830)))
}

fn source_ids() -> Vec<SourceIdentifier> {
    vec![
        SourceIdentifier::new("ietf-interfaces", Some("2018-02-20")),
        SourceIdentifier::new("ietf-system", Some("2014-08-06")),
    ]
}

/// What the device session registers when it comes up on a member.
fn register_sources(member: &ClusterMember) -> Vec<Registration> {
    source_ids()
        .into_iter()
        .map(|id| {
            let text = format!("module {} {{}}", id.name);
            member.schema_repository().add_source(id, text)
        })
        .collect()
}

async fn wait_for_mount(member: &ClusterMember, device: &DeviceId) -> MountServices {
    for _ in 0..500 {
        if let Some(services) = member.mounts().services(device) {
            return services;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("{device} never mounted on {}", member.name());
}

/// Full end-to-end test: a master member and a slave member sharing one device.
#[tokio::test]
async fn test_slave_mount_point_forwards_to_master() {
    let mut master = ClusterMember::new("member-1", ClusterConfig::default());
    let mut slave = ClusterMember::new("member-2", ClusterConfig::default());
    let _sources = register_sources(&master);

    let fake = MockDevice::new();
    let rpc = MockRpcService::new();
    rpc.respond_with(Ok(Some(RpcResult { output: Some(NormalizedNode::leaf("status", "ok")), errors: Vec::new() })));
    master
        .activate(device(), fake.session(source_ids(), rpc.clone(), None))
        .await
        .expect("activate");
    assert!(master.mounts().is_mounted(&device()));

    let master_node = master.node(&device()).expect("master node");
    slave.follow(device(), &master_node).await.expect("follow");
    let services = wait_for_mount(&slave, &device()).await;
    assert_eq!(services.schema_context.sources().len(), 2);
    assert_eq!(slave.node(&device()).unwrap().role().await.unwrap(), NodeRole::Slave);

    // Write through the slave.
    let hostname = NodePath::parse("/system/hostname");
    let mut tx = services.data_broker.new_read_write().await.unwrap();
    tx.put(Datastore::Configuration, hostname.clone(), NormalizedNode::leaf("hostname", "edge-1"))
        .unwrap();
    tx.commit().await.unwrap();
    assert!(matches!(
        tx.put(Datastore::Configuration, hostname.clone(), NormalizedNode::leaf("hostname", "x")),
        Err(device_mount_cluster::device::DeviceError::TransactionClosed)
    ));

    let write_tx = fake
        .journal()
        .iter()
        .find(|op| matches!(op, DeviceOp::Put { .. }))
        .map(DeviceOp::tx)
        .expect("put reached the device");
    assert_eq!(
        fake.ops_for(write_tx),
        vec![
            DeviceOp::Put {
                tx: write_tx,
                store: Datastore::Configuration,
                path: hostname.clone(),
                node: NormalizedNode::leaf("hostname", "edge-1"),
            },
            DeviceOp::Commit { tx: write_tx },
        ]
    );

    // Read back through the slave's shared read transaction.
    let read = services.data_broker.new_read_only().await.unwrap();
    assert_eq!(
        read.read(Datastore::Configuration, &hostname).await.unwrap(),
        Some(NormalizedNode::leaf("hostname", "edge-1"))
    );
    assert!(!read.exists(Datastore::Configuration, &NodePath::parse("/missing")).await.unwrap());

    // RPC through the slave reaches the device once.
    let result = services.rpc.invoke_rpc(&QName::new("urn:example", "ping"), None).await.unwrap();
    assert_eq!(result.and_then(|r| r.output), Some(NormalizedNode::leaf("status", "ok")));
    assert_eq!(rpc.calls().len(), 1);

    slave.shutdown().await.unwrap();
    master.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_failover_keeps_one_master_and_one_mount_per_member() {
    let mut member_1 = ClusterMember::new("member-1", ClusterConfig::default());
    let mut member_2 = ClusterMember::new("member-2", ClusterConfig::default());
    let _sources_1 = register_sources(&member_1);
    let _sources_2 = register_sources(&member_2);
    let fake = MockDevice::new();

    member_1
        .activate(device(), fake.session(source_ids(), MockRpcService::new(), None))
        .await
        .unwrap();
    let node_1 = member_1.node(&device()).unwrap();
    member_2.follow(device(), &node_1).await.unwrap();
    wait_for_mount(&member_2, &device()).await;

    // member-1 loses the singleton, member-2 takes over.
    member_1.deactivate(&device()).await.unwrap();
    assert!(!member_1.mounts().is_mounted(&device()));
    assert_eq!(node_1.role().await.unwrap(), NodeRole::Uninitialized);

    member_2
        .activate(device(), fake.session(source_ids(), MockRpcService::new(), None))
        .await
        .expect("slave mount must be closed before the master mount is installed");
    let node_2 = member_2.node(&device()).unwrap();
    assert_eq!(node_2.role().await.unwrap(), NodeRole::Master);
    assert!(matches!(node_1.ask_for_master_mount_point().await, Err(NodeError::NotMaster(_))));

    // The old master now follows the new one.
    member_1.follow(device(), &node_2).await.unwrap();
    wait_for_mount(&member_1, &device()).await;
    assert_eq!(node_1.role().await.unwrap(), NodeRole::Slave);

    assert_eq!(member_1.mounts().mounted_devices(), vec![device()]);
    assert_eq!(member_2.mounts().mounted_devices(), vec![device()]);
    assert_eq!(member_1.mounts().registered_total(), 2);
    assert_eq!(member_2.mounts().registered_total(), 2);

    member_1.shutdown().await.unwrap();
    member_2.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_following_a_non_master_is_refused() {
    let mut member_1 = ClusterMember::new("member-1", ClusterConfig::default());
    let mut member_2 = ClusterMember::new("member-2", ClusterConfig::default());
    let idle = member_1.manage(device());

    let err = member_2.follow(device(), &idle).await.unwrap_err();
    assert!(matches!(err, NodeError::NotMaster(_)));
    assert!(member_2.node(&device()).is_none());

    member_1.shutdown().await.unwrap();
    member_2.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_missing_source_on_master_aborts_slave_resolution() {
    let mut master = ClusterMember::new("member-1", ClusterConfig::default());
    let mut slave = ClusterMember::new("member-2", ClusterConfig::default());
    let sources = register_sources(&master);
    master
        .activate(device(), MockDevice::new().session(source_ids(), MockRpcService::new(), None))
        .await
        .unwrap();

    // The master's repository forgets its sources before the slave fetches them.
    drop(sources);
    slave.follow(device(), &master.node(&device()).unwrap()).await.unwrap();

    for _ in 0..500 {
        if source_ids().iter().all(|id| slave.schema_repository().provider_count(id) == 0) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(source_ids().iter().all(|id| slave.schema_repository().provider_count(id) == 0));
    assert!(!slave.mounts().is_mounted(&device()));

    slave.shutdown().await.unwrap();
    master.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_slave_keeps_retrying_while_master_is_silent() {
    let config = ClusterConfig::from_json(r#"{ "ask_timeout_ms": 200 }"#).unwrap();
    let mut slave = ClusterMember::new("member-2", config);
    let (silent_master, _mailbox) = create_mock_node(64);

    slave
        .manage(device())
        .register_as_slave_of(silent_master, source_ids())
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_secs(60)).await;

    assert!(!slave.mounts().is_mounted(&device()));
    assert_eq!(slave.node(&device()).unwrap().role().await.unwrap(), NodeRole::Slave);

    slave.unfollow(&device()).await.unwrap();
    assert_eq!(slave.node(&device()).unwrap().role().await.unwrap(), NodeRole::Uninitialized);
    assert_eq!(slave.schema_repository().provider_count(&source_ids()[0]), 0);

    slave.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_slave_mounts_once_when_master_answers_late() {
    let config = ClusterConfig::from_json(r#"{ "ask_timeout_ms": 200, "schema_retry_delay_ms": 50 }"#).unwrap();
    let mut slave = ClusterMember::new("member-2", config);
    let id = SourceIdentifier::new("ietf-system", Some("2014-08-06"));

    let mut master = MockMaster::new(device());
    master.expect_master_mount_point().return_ok(vec![id.clone()]);
    for _ in 0..7 {
        master.expect_schema_source().no_reply();
    }
    master.expect_schema_source().return_ok(SchemaSource { id: id.clone(), text: "YANG".into() });

    slave.follow(device(), &master.client()).await.unwrap();
    let services = wait_for_mount(&slave, &device()).await;

    assert!(services.schema_context.contains(&id));
    assert_eq!(slave.mounts().registered_total(), 1);
    master.verify();

    slave.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_reconfigured_master_applies_new_idle_timeout() {
    let mut master = ClusterMember::new("member-1", ClusterConfig::default());
    let _sources = register_sources(&master);
    let fake = MockDevice::new();
    let uptime = NodePath::parse("/system/uptime");
    fake.seed(Datastore::Operational, uptime.clone(), NormalizedNode::leaf("uptime", "42"));
    master
        .activate(device(), fake.session(source_ids(), MockRpcService::new(), None))
        .await
        .unwrap();
    let node = master.node(&device()).unwrap();
    let shared_read = node.new_read_transaction().await.unwrap();

    let config = ClusterConfig::from_json(r#"{ "write_transaction_idle_timeout_secs": 2 }"#).unwrap();
    master.reconfigure(config).await.unwrap();
    assert_eq!(node.role().await.unwrap(), NodeRole::Master);
    assert_eq!(master.config().write_transaction_idle_timeout(), Duration::from_secs(2));

    let write = node.new_write_transaction().await.unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(!write.is_terminated());
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(write.is_terminated());
    let write_tx = fake.transactions_opened();
    assert_eq!(fake.ops_for(write_tx).last(), Some(&DeviceOp::Cancel { tx: write_tx }));

    // The shared read actor created before the refresh keeps answering.
    assert_eq!(node.new_read_transaction().await.unwrap().name(), shared_read.name());
    let reply = shared_read.read(Datastore::Operational, uptime).await.unwrap();
    assert!(matches!(reply, ReadReply::Data(ref data) if data.node == NormalizedNode::leaf("uptime", "42")));
    assert!(master.mounts().is_mounted(&device()));

    master.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_reconfigured_slave_keeps_role_and_mount() {
    let mut master = ClusterMember::new("member-1", ClusterConfig::default());
    let mut slave = ClusterMember::new("member-2", ClusterConfig::default());
    let _sources = register_sources(&master);
    let fake = MockDevice::new();
    fake.seed(Datastore::Configuration, NodePath::parse("/system/hostname"), NormalizedNode::leaf("hostname", "edge-1"));
    master
        .activate(device(), fake.session(source_ids(), MockRpcService::new(), None))
        .await
        .unwrap();
    slave.follow(device(), &master.node(&device()).unwrap()).await.unwrap();
    wait_for_mount(&slave, &device()).await;

    let config = ClusterConfig::from_json(r#"{ "ask_timeout_ms": 2000, "schema_retry_delay_ms": 10 }"#).unwrap();
    slave.reconfigure(config).await.unwrap();

    let node = slave.node(&device()).unwrap();
    assert_eq!(node.role().await.unwrap(), NodeRole::Slave);
    assert!(slave.mounts().is_mounted(&device()));
    assert_eq!(slave.mounts().registered_total(), 1);

    let services = slave.mounts().services(&device()).unwrap();
    let read = services.data_broker.new_read_only().await.unwrap();
    assert_eq!(
        read.read(Datastore::Configuration, &NodePath::parse("/system/hostname")).await.unwrap(),
        Some(NormalizedNode::leaf("hostname", "edge-1"))
    );

    slave.shutdown().await.unwrap();
    master.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_slave_data_tree_session_reaches_master_device() {
    let mut master = ClusterMember::new("member-1", ClusterConfig::default());
    let mut slave = ClusterMember::new("member-2", ClusterConfig::default());
    let _sources = register_sources(&master);
    let fake = MockDevice::new();
    master
        .activate(device(), fake.session(source_ids(), MockRpcService::new(), None))
        .await
        .unwrap();
    slave.follow(device(), &master.node(&device()).unwrap()).await.unwrap();
    let services = wait_for_mount(&slave, &device()).await;
    let data_tree = services.data_tree.expect("slave publishes a data-tree service");
    let eth0 = NodePath::parse("/interfaces/eth0");

    let locked = data_tree.lock().await.unwrap().expect("lock result");
    assert!(locked.errors.is_empty());
    data_tree
        .create(Datastore::Configuration, eth0.clone(), NormalizedNode::leaf("eth0", "up"))
        .await
        .unwrap();
    data_tree.commit().await.unwrap();
    data_tree.unlock().await.unwrap();

    assert_eq!(
        fake.data_tree_journal(),
        vec![
            DataTreeOp::Lock,
            DataTreeOp::Create {
                store: Datastore::Configuration,
                path: eth0.clone(),
                node: NormalizedNode::leaf("eth0", "up"),
            },
            DataTreeOp::Commit,
            DataTreeOp::Unlock,
        ]
    );
    assert_eq!(data_tree.get_config(&eth0).await.unwrap(), Some(NormalizedNode::leaf("eth0", "up")));
    assert!(!fake.is_locked());

    slave.shutdown().await.unwrap();
    master.shutdown().await.unwrap();
}

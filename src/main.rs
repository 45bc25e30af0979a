//! # Device Mount Cluster demo
//!
//! Two cluster members share one (fake) device:
//! 1.  `member-1` wins the device and becomes master.
//! 2.  `member-2` follows it, resolves the schema through the master and publishes a
//!     proxy mount point.
//! 3.  A write, a read, an RPC and an edit-config session go through the slave's mount
//!     point and end up on the master's device session.

use device_mount_cluster::device::mock::{MockDevice, MockRpcService};
use device_mount_cluster::device::{ReadTransaction, WriteTransaction};
use device_mount_cluster::lifecycle::{setup_tracing, ClusterConfig, ClusterMember};
use device_mount_cluster::model::{
    Datastore, DeviceId, NodePath, NormalizedNode, QName, RpcResult, SourceIdentifier,
};
use device_mount_cluster::mount::MountServices;
use std::net::SocketAddr;
use std::time::Duration;
use tracing::{error, info, Instrument};

#[tokio::main]
async fn main() -> Result<(), String> {
    // Setup tracing once for the entire application
    setup_tracing();

    let config = ClusterConfig::from_env().map_err(|e| e.to_string())?;
    info!(?config, "Starting two-member device cluster");

    let device = DeviceId::new("router-1", SocketAddr::from(([192, 0, 2, 10], 830)));
    let source = SourceIdentifier::new("ietf-system", Some("2014-08-06"));

    let mut member_1 = ClusterMember::new("member-1", config.clone());
    let mut member_2 = ClusterMember::new("member-2", config);

    // The master's member learned the device's schema when the session came up.
    let _source_registration = member_1
        .schema_repository()
        .add_source(source.clone(), "module ietf-system { namespace \"urn:ietf:params:xml:ns:yang:ietf-system\"; }");

    let fake_device = MockDevice::new();
    let rpc = MockRpcService::new();
    rpc.respond_with(Ok(Some(RpcResult {
        output: Some(NormalizedNode::leaf("status", "rebooting")),
        errors: Vec::new(),
    })));
    let session = fake_device.session(vec![source], rpc, None);

    // 1. Master
    member_1
        .activate(device.clone(), session)
        .await
        .map_err(|e| e.to_string())?;
    let master = member_1.node(&device).ok_or("master node missing")?;

    // 2. Slave
    let span = tracing::info_span!("follow");
    let services = async {
        member_2.follow(device.clone(), &master).await.map_err(|e| e.to_string())?;
        wait_for_mount(&member_2, &device).await
    }
    .instrument(span)
    .await?;

    // 3. Proxied traffic
    let span = tracing::info_span!("proxied_traffic");
    let traffic = async {
        let hostname = NodePath::parse("/system/hostname");

        let mut tx = services.data_broker.new_read_write().await.map_err(|e| e.to_string())?;
        tx.put(Datastore::Configuration, hostname.clone(), NormalizedNode::leaf("hostname", "edge-1"))
            .map_err(|e| e.to_string())?;
        tx.commit().await.map_err(|e| e.to_string())?;

        let read = services.data_broker.new_read_only().await.map_err(|e| e.to_string())?;
        let value = read
            .read(Datastore::Configuration, &hostname)
            .await
            .map_err(|e| e.to_string())?;
        info!(?value, "Read back through the slave mount point");

        let reboot = QName::new("urn:ietf:params:xml:ns:yang:ietf-system", "system-restart");
        let result = services.rpc.invoke_rpc(&reboot, None).await.map_err(|e| e.to_string())?;
        info!(?result, "RPC answered through the slave mount point");

        if let Some(data_tree) = &services.data_tree {
            let contact = NodePath::parse("/system/contact");
            data_tree.lock().await.map_err(|e| e.to_string())?;
            data_tree
                .merge(Datastore::Configuration, contact.clone(), NormalizedNode::leaf("contact", "noc"))
                .await
                .map_err(|e| e.to_string())?;
            data_tree.commit().await.map_err(|e| e.to_string())?;
            data_tree.unlock().await.map_err(|e| e.to_string())?;
            let value = data_tree.get_config(&contact).await.map_err(|e| e.to_string())?;
            info!(?value, "Edit-config session committed through the slave mount point");
        }
        Ok::<_, String>(())
    }
    .instrument(span)
    .await;

    if let Err(e) = traffic {
        error!(error = %e, "Proxied traffic failed");
    }

    // Shutdown slave first so its proxies stop talking to the master
    member_2.shutdown().await?;
    member_1.shutdown().await?;

    info!("Application completed successfully");
    Ok(())
}

async fn wait_for_mount(member: &ClusterMember, device: &DeviceId) -> Result<MountServices, String> {
    let wait = async {
        loop {
            if let Some(services) = member.mounts().services(device) {
                return services;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    };
    tokio::time::timeout(Duration::from_secs(10), wait)
        .await
        .map_err(|_| format!("{device} was not mounted on {}", member.name()))
}

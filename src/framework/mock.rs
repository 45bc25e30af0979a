//! # Mock Framework
//!
//! Utilities for testing code that talks to node and transaction actors, without spinning
//! up the real actors.
//!
//! Use [`create_mock_node`] / [`create_mock_tx`] to get a client and the receiving end of
//! its mailbox, then answer requests with helpers like [`expect_read`] or
//! [`expect_schema_source`]. [`MockMaster`] plays a scripted master in the background.

use crate::clients::{DataTreeClient, NodeClient, TxClient};
use crate::messages::{DataTreeRequest, InvokeReply, NodeRequest, ReadReply, ReadRequest, TxRequest};
use crate::model::{Datastore, DeviceId, NodePath, QName, SchemaSource, SourceIdentifier};
use crate::node_actor::NodeError;
use crate::tx_actor::TxKind;
use std::collections::VecDeque;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::mpsc;

const MOCK_ASK_TIMEOUT: Duration = Duration::from_secs(1);

/// Identity used by mock clients.
pub fn mock_device(name: &str) -> DeviceId {
    DeviceId::new(name, SocketAddr::from((Ipv4Addr::LOCALHOST, 830)))
}

// =============================================================================
// EXPECTATION BUILDER API
// =============================================================================

/// One scripted answer of a [`MockMaster`].
#[derive(Debug)]
enum Expectation {
    MasterMountPoint(Result<Vec<SourceIdentifier>, NodeError>),
    SchemaSource(Result<SchemaSource, NodeError>),
    /// Swallow the request so the caller runs into its ask timeout.
    NoReply,
}

type Expectations = Arc<Mutex<VecDeque<Expectation>>>;

fn lock(expectations: &Expectations) -> MutexGuard<'_, VecDeque<Expectation>> {
    expectations.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// A master node that answers slave-side requests from a script.
///
/// # Example
/// ```ignore
/// let mut master = MockMaster::new(mock_device("r1"));
/// master.expect_schema_source().no_reply();
/// master.expect_schema_source().return_ok(source);
///
/// let client = master.client();
/// // Register a slave of `client`...
/// master.verify();
/// ```
pub struct MockMaster {
    client: NodeClient,
    expectations: Expectations,
    _handle: tokio::task::JoinHandle<()>,
}

impl MockMaster {
    pub fn new(device: DeviceId) -> Self {
        let (sender, mut receiver) = mpsc::channel::<NodeRequest>(100);
        let expectations: Expectations = Arc::new(Mutex::new(VecDeque::new()));
        let script = expectations.clone();

        let handle = tokio::spawn(async move {
            // Swallowed reply channels stay alive so the caller times out instead of
            // seeing a dropped actor.
            let mut swallowed = Vec::new();
            while let Some(request) = receiver.recv().await {
                let expectation = lock(&script).pop_front();
                match (request, expectation) {
                    (
                        NodeRequest::AskForMasterMountPoint { respond_to },
                        Some(Expectation::MasterMountPoint(response)),
                    ) => {
                        let _ = respond_to.send(response);
                    }
                    (
                        NodeRequest::RequestSchemaSource { respond_to, .. },
                        Some(Expectation::SchemaSource(response)),
                    ) => {
                        let _ = respond_to.send(response);
                    }
                    (request, Some(Expectation::NoReply)) => swallowed.push(request),
                    (request, expectation) => {
                        panic!("Unexpected request {request:?}, expected {expectation:?}");
                    }
                }
            }
        });

        Self {
            client: NodeClient::new(sender, device, MOCK_ASK_TIMEOUT),
            expectations,
            _handle: handle,
        }
    }

    /// Returns the client for use in tests.
    pub fn client(&self) -> NodeClient {
        self.client.clone()
    }

    /// Expects an `AskForMasterMountPoint` request.
    pub fn expect_master_mount_point(&mut self) -> MountPointExpectationBuilder {
        MountPointExpectationBuilder { expectations: self.expectations.clone() }
    }

    /// Expects a `RequestSchemaSource` request.
    pub fn expect_schema_source(&mut self) -> SchemaSourceExpectationBuilder {
        SchemaSourceExpectationBuilder { expectations: self.expectations.clone() }
    }

    /// Number of scripted answers not consumed yet.
    pub fn remaining(&self) -> usize {
        lock(&self.expectations).len()
    }

    /// Verifies that all expectations were met.
    pub fn verify(&self) {
        let remaining = self.remaining();
        if remaining > 0 {
            panic!("Not all expectations were met. {remaining} remaining");
        }
    }
}

/// Builder for `AskForMasterMountPoint` expectations.
pub struct MountPointExpectationBuilder {
    expectations: Expectations,
}

impl MountPointExpectationBuilder {
    pub fn return_ok(self, source_ids: Vec<SourceIdentifier>) {
        lock(&self.expectations).push_back(Expectation::MasterMountPoint(Ok(source_ids)));
    }

    pub fn return_err(self, error: NodeError) {
        lock(&self.expectations).push_back(Expectation::MasterMountPoint(Err(error)));
    }
}

/// Builder for `RequestSchemaSource` expectations.
pub struct SchemaSourceExpectationBuilder {
    expectations: Expectations,
}

impl SchemaSourceExpectationBuilder {
    pub fn return_ok(self, source: SchemaSource) {
        lock(&self.expectations).push_back(Expectation::SchemaSource(Ok(source)));
    }

    pub fn return_err(self, error: NodeError) {
        lock(&self.expectations).push_back(Expectation::SchemaSource(Err(error)));
    }

    /// Never answers, the request runs into the caller's ask timeout.
    pub fn no_reply(self) {
        lock(&self.expectations).push_back(Expectation::NoReply);
    }
}

// =============================================================================
// RAW MAILBOX HELPERS
// =============================================================================

/// Creates a node client and the receiver of its mailbox.
///
/// # Testing Strategy
/// Code under test sends to a channel we control; the test inspects what arrives and
/// answers with whatever reply (or silence) the scenario needs.
pub fn create_mock_node(buffer_size: usize) -> (NodeClient, mpsc::Receiver<NodeRequest>) {
    let (sender, receiver) = mpsc::channel(buffer_size);
    (NodeClient::new(sender, mock_device("mock"), MOCK_ASK_TIMEOUT), receiver)
}

/// Creates a read-write transaction client and the receiver of its mailbox.
pub fn create_mock_tx() -> (TxClient, mpsc::UnboundedReceiver<TxRequest>) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (TxClient::new(sender, "mock/read-write-1", TxKind::ReadWrite, MOCK_ASK_TIMEOUT), receiver)
}

/// Creates a data-tree session client and the receiver of its mailbox.
pub fn create_mock_data_tree(name: &str) -> (DataTreeClient, mpsc::UnboundedReceiver<DataTreeRequest>) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (DataTreeClient::new(sender, name, MOCK_ASK_TIMEOUT), receiver)
}

/// Answers the next request, which must be a `NewDataTreeService`.
pub async fn expect_new_data_tree_service(
    receiver: &mut mpsc::Receiver<NodeRequest>,
    response: Result<DataTreeClient, NodeError>,
) {
    match receiver.recv().await {
        Some(NodeRequest::NewDataTreeService { respond_to }) => {
            let _ = respond_to.send(response);
        }
        other => panic!("Expected NewDataTreeService request, got {other:?}"),
    }
}

/// Answers the next request, which must be a `Read`, and returns what was read.
pub async fn expect_read(
    receiver: &mut mpsc::UnboundedReceiver<TxRequest>,
    response: Result<ReadReply, NodeError>,
) -> (Datastore, NodePath) {
    match receiver.recv().await {
        Some(TxRequest::Read(ReadRequest::Read { store, path, respond_to })) => {
            let _ = respond_to.send(response);
            (store, path)
        }
        other => panic!("Expected Read request, got {other:?}"),
    }
}

/// Answers the next request, which must be a `Commit`.
pub async fn expect_commit(
    receiver: &mut mpsc::UnboundedReceiver<TxRequest>,
    response: Result<(), NodeError>,
) {
    match receiver.recv().await {
        Some(TxRequest::Commit { respond_to }) => {
            let _ = respond_to.send(response);
        }
        other => panic!("Expected Commit request, got {other:?}"),
    }
}

/// Answers the next request, which must be an `InvokeRpc`, and returns the RPC name.
pub async fn expect_invoke_rpc(
    receiver: &mut mpsc::Receiver<NodeRequest>,
    response: Result<InvokeReply, NodeError>,
) -> QName {
    match receiver.recv().await {
        Some(NodeRequest::InvokeRpc { name, respond_to, .. }) => {
            let _ = respond_to.send(response);
            name
        }
        other => panic!("Expected InvokeRpc request, got {other:?}"),
    }
}

/// Answers the next request, which must be a `RequestSchemaSource`, and returns the id.
pub async fn expect_schema_source(
    receiver: &mut mpsc::Receiver<NodeRequest>,
    response: Result<SchemaSource, NodeError>,
) -> SourceIdentifier {
    match receiver.recv().await {
        Some(NodeRequest::RequestSchemaSource { id, respond_to }) => {
            let _ = respond_to.send(response);
            id
        }
        other => panic!("Expected RequestSchemaSource request, got {other:?}"),
    }
}

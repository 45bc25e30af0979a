//! # Mock Device
//!
//! In-memory stand-ins for a device session.
//!
//! [`MockDevice`] is a [`DataBroker`] whose transactions stage mutations and apply them on
//! commit. Every operation that reaches the device is appended to a journal, so tests can
//! assert exactly what the device observed and in which order.
//!
//! The same device also serves as a [`DataTreeService`]: edits collect in a candidate
//! configuration and are journaled separately as [`DataTreeOp`]s.
//!
//! [`MockRpcService`] and [`MockActionService`] answer from a queue of scripted responses.

use super::{
    ActionService, DataBroker, DataTreeService, DeviceError, DeviceSession, ReadTransaction,
    ReadWriteTransaction, RpcService, WriteTransaction,
};
use crate::model::{
    DataTreeIdentifier, Datastore, NodePath, NormalizedNode, NormalizedNodeMessage, QName,
    RpcError, RpcResult, SchemaPath, SourceIdentifier,
};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Notify;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// One operation as observed by the device, tagged with the transaction it belongs to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeviceOp {
    Read { tx: u64, store: Datastore, path: NodePath },
    Exists { tx: u64, store: Datastore, path: NodePath },
    Put { tx: u64, store: Datastore, path: NodePath, node: NormalizedNode },
    Merge { tx: u64, store: Datastore, path: NodePath, node: NormalizedNode },
    Delete { tx: u64, store: Datastore, path: NodePath },
    Cancel { tx: u64 },
    Commit { tx: u64 },
    Close { tx: u64 },
}

impl DeviceOp {
    pub fn tx(&self) -> u64 {
        match self {
            DeviceOp::Read { tx, .. }
            | DeviceOp::Exists { tx, .. }
            | DeviceOp::Put { tx, .. }
            | DeviceOp::Merge { tx, .. }
            | DeviceOp::Delete { tx, .. }
            | DeviceOp::Cancel { tx }
            | DeviceOp::Commit { tx }
            | DeviceOp::Close { tx } => *tx,
        }
    }
}

/// One data-tree service operation as observed by the device.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DataTreeOp {
    Lock,
    Unlock,
    DiscardChanges,
    Get { path: NodePath },
    GetConfig { path: NodePath },
    Merge { store: Datastore, path: NodePath, node: NormalizedNode },
    Replace { store: Datastore, path: NodePath, node: NormalizedNode },
    Create { store: Datastore, path: NodePath, node: NormalizedNode },
    Delete { store: Datastore, path: NodePath },
    Remove { store: Datastore, path: NodePath },
    Commit,
}

#[derive(Default)]
struct DeviceState {
    data: BTreeMap<(Datastore, NodePath), NormalizedNode>,
    journal: Vec<DeviceOp>,
    data_tree_journal: Vec<DataTreeOp>,
    locked: bool,
    candidate: Vec<Staged>,
    next_tx: u64,
    fail_next_transaction: Option<String>,
    fail_next_commit: Option<String>,
    rejected_paths: HashSet<NodePath>,
}

/// A fake device data tree.
#[derive(Clone, Default)]
pub struct MockDevice {
    state: Arc<Mutex<DeviceState>>,
}

impl MockDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `node` at `path` as already-committed device data.
    pub fn seed(&self, store: Datastore, path: NodePath, node: NormalizedNode) {
        lock(&self.state).data.insert((store, path), node);
    }

    /// Committed value at `path`.
    pub fn value(&self, store: Datastore, path: &NodePath) -> Option<NormalizedNode> {
        lock(&self.state).data.get(&(store, path.clone())).cloned()
    }

    pub fn journal(&self) -> Vec<DeviceOp> {
        lock(&self.state).journal.clone()
    }

    /// Data-tree service operations, in device order.
    pub fn data_tree_journal(&self) -> Vec<DataTreeOp> {
        lock(&self.state).data_tree_journal.clone()
    }

    /// `true` while the configuration is locked through the data-tree service.
    pub fn is_locked(&self) -> bool {
        lock(&self.state).locked
    }

    /// Journal entries of one transaction, in device order.
    pub fn ops_for(&self, tx: u64) -> Vec<DeviceOp> {
        lock(&self.state)
            .journal
            .iter()
            .filter(|op| op.tx() == tx)
            .cloned()
            .collect()
    }

    pub fn transactions_opened(&self) -> u64 {
        lock(&self.state).next_tx
    }

    /// The next transaction factory call fails with `reason`.
    pub fn fail_next_transaction(&self, reason: impl Into<String>) {
        lock(&self.state).fail_next_transaction = Some(reason.into());
    }

    /// The next commit fails with `reason` (after being journaled).
    pub fn fail_next_commit(&self, reason: impl Into<String>) {
        lock(&self.state).fail_next_commit = Some(reason.into());
    }

    /// Writes to `path` are rejected when applied to a transaction.
    pub fn reject_writes_to(&self, path: NodePath) {
        lock(&self.state).rejected_paths.insert(path);
    }

    /// A session exposing this device as data broker and data-tree service, plus the given
    /// RPC service and optional action service.
    pub fn session(
        &self,
        source_ids: Vec<SourceIdentifier>,
        rpc: MockRpcService,
        action: Option<MockActionService>,
    ) -> DeviceSession {
        DeviceSession {
            source_ids,
            broker: Arc::new(self.clone()),
            rpc: Arc::new(rpc),
            action: action.map(|service| Arc::new(service) as Arc<dyn ActionService>),
            data_tree: Some(Arc::new(self.clone())),
        }
    }

    fn open(&self) -> Result<MockTransaction, DeviceError> {
        let mut state = lock(&self.state);
        if let Some(reason) = state.fail_next_transaction.take() {
            return Err(DeviceError::Failed(reason));
        }
        state.next_tx += 1;
        Ok(MockTransaction {
            id: state.next_tx,
            device: self.clone(),
            staged: Vec::new(),
            finished: false,
        })
    }

    fn record(&self, op: DeviceOp) {
        lock(&self.state).journal.push(op);
    }
}

#[async_trait]
impl DataBroker for MockDevice {
    async fn new_read_only(&self) -> Result<Box<dyn ReadTransaction>, DeviceError> {
        Ok(Box::new(self.open()?))
    }

    async fn new_write_only(&self) -> Result<Box<dyn WriteTransaction>, DeviceError> {
        Ok(Box::new(self.open()?))
    }

    async fn new_read_write(&self) -> Result<Box<dyn ReadWriteTransaction>, DeviceError> {
        Ok(Box::new(self.open()?))
    }
}

enum Staged {
    Write(Datastore, NodePath, NormalizedNode),
    Delete(Datastore, NodePath),
}

fn overlay(
    data: &BTreeMap<(Datastore, NodePath), NormalizedNode>,
    staged: &[Staged],
    store: Datastore,
    path: &NodePath,
) -> Option<NormalizedNode> {
    let mut current = data.get(&(store, path.clone())).cloned();
    for staged in staged {
        match staged {
            Staged::Write(s, p, node) if *s == store && p == path => current = Some(node.clone()),
            Staged::Delete(s, p) if *s == store && p == path => current = None,
            _ => {}
        }
    }
    current
}

fn ok_result() -> Option<RpcResult> {
    Some(RpcResult { output: None, errors: Vec::new() })
}

impl MockDevice {
    fn edit(&self, op: DataTreeOp, staged: Staged) -> Result<(), DeviceError> {
        let mut state = lock(&self.state);
        state.data_tree_journal.push(op.clone());
        let (store, path) = match &staged {
            Staged::Write(store, path, _) | Staged::Delete(store, path) => (*store, path.clone()),
        };
        if state.rejected_paths.contains(&path) {
            return Err(DeviceError::Failed(format!("edit of {path} rejected")));
        }
        let exists = overlay(&state.data, &state.candidate, store, &path).is_some();
        match op {
            DataTreeOp::Create { .. } if exists => {
                return Err(DeviceError::Failed(format!("data exists at {path}")));
            }
            DataTreeOp::Delete { .. } if !exists => {
                return Err(DeviceError::Failed(format!("data missing at {path}")));
            }
            _ => {}
        }
        state.candidate.push(staged);
        Ok(())
    }
}

#[async_trait]
impl DataTreeService for MockDevice {
    async fn lock(&self) -> Result<Option<RpcResult>, DeviceError> {
        let mut state = lock(&self.state);
        state.data_tree_journal.push(DataTreeOp::Lock);
        if state.locked {
            return Ok(Some(RpcResult {
                output: None,
                errors: vec![RpcError { tag: "lock-denied".into(), message: "already locked".into() }],
            }));
        }
        state.locked = true;
        Ok(ok_result())
    }

    async fn unlock(&self) -> Result<Option<RpcResult>, DeviceError> {
        let mut state = lock(&self.state);
        state.data_tree_journal.push(DataTreeOp::Unlock);
        state.locked = false;
        Ok(ok_result())
    }

    async fn discard_changes(&self) -> Result<Option<RpcResult>, DeviceError> {
        let mut state = lock(&self.state);
        state.data_tree_journal.push(DataTreeOp::DiscardChanges);
        state.candidate.clear();
        Ok(ok_result())
    }

    async fn get(&self, path: &NodePath) -> Result<Option<NormalizedNode>, DeviceError> {
        let mut state = lock(&self.state);
        state.data_tree_journal.push(DataTreeOp::Get { path: path.clone() });
        Ok(state.data.get(&(Datastore::Operational, path.clone())).cloned())
    }

    async fn get_config(&self, path: &NodePath) -> Result<Option<NormalizedNode>, DeviceError> {
        let mut state = lock(&self.state);
        state.data_tree_journal.push(DataTreeOp::GetConfig { path: path.clone() });
        Ok(state.data.get(&(Datastore::Configuration, path.clone())).cloned())
    }

    async fn merge(
        &self,
        store: Datastore,
        path: NodePath,
        node: NormalizedNode,
    ) -> Result<(), DeviceError> {
        let op = DataTreeOp::Merge { store, path: path.clone(), node: node.clone() };
        self.edit(op, Staged::Write(store, path, node))
    }

    async fn replace(
        &self,
        store: Datastore,
        path: NodePath,
        node: NormalizedNode,
    ) -> Result<(), DeviceError> {
        let op = DataTreeOp::Replace { store, path: path.clone(), node: node.clone() };
        self.edit(op, Staged::Write(store, path, node))
    }

    async fn create(
        &self,
        store: Datastore,
        path: NodePath,
        node: NormalizedNode,
    ) -> Result<(), DeviceError> {
        let op = DataTreeOp::Create { store, path: path.clone(), node: node.clone() };
        self.edit(op, Staged::Write(store, path, node))
    }

    async fn delete(&self, store: Datastore, path: NodePath) -> Result<(), DeviceError> {
        let op = DataTreeOp::Delete { store, path: path.clone() };
        self.edit(op, Staged::Delete(store, path))
    }

    async fn remove(&self, store: Datastore, path: NodePath) -> Result<(), DeviceError> {
        let op = DataTreeOp::Remove { store, path: path.clone() };
        self.edit(op, Staged::Delete(store, path))
    }

    async fn commit(&self) -> Result<(), DeviceError> {
        let mut state = lock(&self.state);
        state.data_tree_journal.push(DataTreeOp::Commit);
        if let Some(reason) = state.fail_next_commit.take() {
            return Err(DeviceError::Failed(reason));
        }
        let candidate = std::mem::take(&mut state.candidate);
        for staged in candidate {
            match staged {
                Staged::Write(store, path, node) => {
                    state.data.insert((store, path), node);
                }
                Staged::Delete(store, path) => {
                    state.data.remove(&(store, path));
                }
            }
        }
        Ok(())
    }
}

/// A transaction on a [`MockDevice`]. Reads see committed data overlaid with the
/// transaction's own staged mutations.
pub struct MockTransaction {
    id: u64,
    device: MockDevice,
    staged: Vec<Staged>,
    finished: bool,
}

impl MockTransaction {
    pub fn id(&self) -> u64 {
        self.id
    }

    fn view(&self, store: Datastore, path: &NodePath) -> Option<NormalizedNode> {
        overlay(&lock(&self.device.state).data, &self.staged, store, path)
    }

    fn stage(&mut self, op: DeviceOp, staged: Staged) -> Result<(), DeviceError> {
        if self.finished {
            return Err(DeviceError::TransactionClosed);
        }
        let path = match &staged {
            Staged::Write(_, path, _) | Staged::Delete(_, path) => path.clone(),
        };
        if lock(&self.device.state).rejected_paths.contains(&path) {
            return Err(DeviceError::Failed(format!("write to {path} rejected")));
        }
        self.device.record(op);
        self.staged.push(staged);
        Ok(())
    }
}

#[async_trait]
impl ReadTransaction for MockTransaction {
    async fn read(
        &self,
        store: Datastore,
        path: &NodePath,
    ) -> Result<Option<NormalizedNode>, DeviceError> {
        self.device.record(DeviceOp::Read { tx: self.id, store, path: path.clone() });
        Ok(self.view(store, path))
    }

    async fn exists(&self, store: Datastore, path: &NodePath) -> Result<bool, DeviceError> {
        self.device.record(DeviceOp::Exists { tx: self.id, store, path: path.clone() });
        Ok(self.view(store, path).is_some())
    }

    fn close(&mut self) {
        if !self.finished {
            self.finished = true;
            self.device.record(DeviceOp::Close { tx: self.id });
        }
    }
}

#[async_trait]
impl WriteTransaction for MockTransaction {
    fn put(
        &mut self,
        store: Datastore,
        path: NodePath,
        node: NormalizedNode,
    ) -> Result<(), DeviceError> {
        let op = DeviceOp::Put { tx: self.id, store, path: path.clone(), node: node.clone() };
        self.stage(op, Staged::Write(store, path, node))
    }

    fn merge(
        &mut self,
        store: Datastore,
        path: NodePath,
        node: NormalizedNode,
    ) -> Result<(), DeviceError> {
        let op = DeviceOp::Merge { tx: self.id, store, path: path.clone(), node: node.clone() };
        self.stage(op, Staged::Write(store, path, node))
    }

    fn delete(&mut self, store: Datastore, path: NodePath) -> Result<(), DeviceError> {
        let op = DeviceOp::Delete { tx: self.id, store, path: path.clone() };
        self.stage(op, Staged::Delete(store, path))
    }

    fn cancel(&mut self) -> bool {
        if self.finished {
            return false;
        }
        self.finished = true;
        self.staged.clear();
        self.device.record(DeviceOp::Cancel { tx: self.id });
        true
    }

    async fn commit(&mut self) -> Result<(), DeviceError> {
        if self.finished {
            return Err(DeviceError::TransactionClosed);
        }
        self.finished = true;
        let mut state = lock(&self.device.state);
        state.journal.push(DeviceOp::Commit { tx: self.id });
        if let Some(reason) = state.fail_next_commit.take() {
            return Err(DeviceError::Failed(reason));
        }
        for staged in self.staged.drain(..) {
            match staged {
                Staged::Write(store, path, node) => {
                    state.data.insert((store, path), node);
                }
                Staged::Delete(store, path) => {
                    state.data.remove(&(store, path));
                }
            }
        }
        Ok(())
    }
}

// =============================================================================
// SCRIPTED SERVICES
// =============================================================================

struct Script<C> {
    responses: Mutex<VecDeque<Result<Option<RpcResult>, DeviceError>>>,
    calls: Mutex<Vec<C>>,
    gate: Mutex<Option<Arc<Notify>>>,
}

impl<C: Clone> Script<C> {
    fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
            gate: Mutex::new(None),
        }
    }

    async fn answer(&self, call: C) -> Result<Option<RpcResult>, DeviceError> {
        lock(&self.calls).push(call);
        let gate = lock(&self.gate).clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        lock(&self.responses)
            .pop_front()
            .unwrap_or_else(|| Err(DeviceError::Failed("no scripted response".into())))
    }
}

/// An [`RpcService`] answering from scripted responses.
#[derive(Clone)]
pub struct MockRpcService {
    script: Arc<Script<(QName, Option<NormalizedNodeMessage>)>>,
}

impl Default for MockRpcService {
    fn default() -> Self {
        Self { script: Arc::new(Script::new()) }
    }
}

impl MockRpcService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues the response of the next invocation.
    pub fn respond_with(&self, response: Result<Option<RpcResult>, DeviceError>) {
        lock(&self.script.responses).push_back(response);
    }

    /// Invocations block until `gate` is notified.
    pub fn hold_until(&self, gate: Arc<Notify>) {
        *lock(&self.script.gate) = Some(gate);
    }

    pub fn calls(&self) -> Vec<(QName, Option<NormalizedNodeMessage>)> {
        lock(&self.script.calls).clone()
    }
}

#[async_trait]
impl RpcService for MockRpcService {
    async fn invoke_rpc(
        &self,
        name: &QName,
        input: Option<NormalizedNodeMessage>,
    ) -> Result<Option<RpcResult>, DeviceError> {
        self.script.answer((name.clone(), input)).await
    }
}

/// An [`ActionService`] answering from scripted responses.
#[derive(Clone)]
pub struct MockActionService {
    script: Arc<Script<(SchemaPath, DataTreeIdentifier)>>,
}

impl Default for MockActionService {
    fn default() -> Self {
        Self { script: Arc::new(Script::new()) }
    }
}

impl MockActionService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond_with(&self, response: Result<Option<RpcResult>, DeviceError>) {
        lock(&self.script.responses).push_back(response);
    }

    pub fn calls(&self) -> Vec<(SchemaPath, DataTreeIdentifier)> {
        lock(&self.script.calls).clone()
    }
}

#[async_trait]
impl ActionService for MockActionService {
    async fn invoke_action(
        &self,
        path: &SchemaPath,
        target: &DataTreeIdentifier,
        _input: Option<NormalizedNodeMessage>,
    ) -> Result<Option<RpcResult>, DeviceError> {
        self.script.answer((path.clone(), target.clone())).await
    }
}

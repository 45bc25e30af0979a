use super::adapters::{ReadAdapter, WriteAdapter};
use crate::clients::TxClient;
use crate::device::{DeviceError, ReadTransaction, ReadWriteTransaction, WriteTransaction};
use crate::messages::{ReadRequest, Reply, TxRequest};
use crate::node_actor::NodeError;
use std::fmt;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Kind of transaction a [`TransactionActor`] wraps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxKind {
    Read,
    Write,
    ReadWrite,
}

impl fmt::Display for TxKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TxKind::Read => "read",
            TxKind::Write => "write",
            TxKind::ReadWrite => "read-write",
        })
    }
}

/// The single device transaction owned by a [`TransactionActor`].
pub enum TransactionHandle {
    ReadOnly(Box<dyn ReadTransaction>),
    WriteOnly(Box<dyn WriteTransaction>),
    ReadWrite(Box<dyn ReadWriteTransaction>),
}

impl TransactionHandle {
    pub fn kind(&self) -> TxKind {
        match self {
            TransactionHandle::ReadOnly(_) => TxKind::Read,
            TransactionHandle::WriteOnly(_) => TxKind::Write,
            TransactionHandle::ReadWrite(_) => TxKind::ReadWrite,
        }
    }

    fn is_writable(&self) -> bool {
        !matches!(self, TransactionHandle::ReadOnly(_))
    }

    /// Cancels a write handle, closes a read handle.
    fn release(&mut self) -> bool {
        match self {
            TransactionHandle::ReadOnly(tx) => {
                tx.close();
                true
            }
            TransactionHandle::WriteOnly(tx) => tx.cancel(),
            TransactionHandle::ReadWrite(tx) => tx.cancel(),
        }
    }

    async fn commit(self) -> Result<(), DeviceError> {
        match self {
            TransactionHandle::ReadOnly(_) => Err(DeviceError::NotWritable),
            TransactionHandle::WriteOnly(mut tx) => tx.commit().await,
            TransactionHandle::ReadWrite(mut tx) => tx.commit().await,
        }
    }
}

/// Actor owning exactly one device transaction.
///
/// # Architecture Note
/// Messages are handled one at a time in arrival order, so the device observes the
/// operations of one transaction in exactly the order they were sent.
///
/// **Lifecycle**:
/// - `Cancel` and `Commit` are terminal for write-capable actors. On `Commit` the mailbox
///   is closed before the handle is finalized, so anything sent afterwards is
///   undeliverable.
/// - With a non-zero idle timeout, a period without messages cancels the handle and
///   stops the actor. The timer is re-armed by every message.
/// - When every [`TxClient`] is gone the handle is released as well.
///
/// A read-only actor may be shared by many callers: `Cancel` and `Commit` do not stop it.
pub struct TransactionActor {
    name: String,
    receiver: mpsc::UnboundedReceiver<TxRequest>,
    handle: TransactionHandle,
    idle_timeout: Duration,
}

impl TransactionActor {
    pub fn new(
        name: impl Into<String>,
        handle: TransactionHandle,
        idle_timeout: Duration,
        ask_timeout: Duration,
    ) -> (Self, TxClient) {
        let name = name.into();
        let (sender, receiver) = mpsc::unbounded_channel();
        let client = TxClient::new(sender, name.clone(), handle.kind(), ask_timeout);
        let actor = Self { name, receiver, handle, idle_timeout };
        (actor, client)
    }

    pub async fn run(mut self) {
        info!(actor = %self.name, kind = %self.handle.kind(), "Transaction actor started");

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
                            "No message within idle timeout, cancelling transaction"
                        );
                        self.handle.release();
                        break;
                    }
                }
            };

            let Some(request) = next else {
                debug!(actor = %self.name, "All clients gone, releasing transaction");
                self.handle.release();
                break;
            };

            match request {
                TxRequest::Read(request) => read(&self.handle, &self.name, request).await,
                TxRequest::Write(request) => match &mut self.handle {
                    TransactionHandle::WriteOnly(tx) => WriteAdapter::handle(&mut **tx, &self.name, request),
                    TransactionHandle::ReadWrite(tx) => WriteAdapter::handle(&mut **tx, &self.name, request),
                    TransactionHandle::ReadOnly(_) => {
                        warn!(actor = %self.name, ?request, "Write on read-only transaction ignored")
                    }
                },
                TxRequest::Cancel { respond_to } => {
                    if !self.handle.is_writable() {
                        debug!(actor = %self.name, "Cancel on shared read transaction ignored");
                        let _ = respond_to.send(Ok(false));
                        continue;
                    }
                    let cancelled = self.handle.release();
                    info!(actor = %self.name, cancelled, "Transaction cancelled");
                    let _ = respond_to.send(Ok(cancelled));
                    break;
                }
                TxRequest::Commit { respond_to } => {
                    if !self.handle.is_writable() {
                        let _ = respond_to.send(Err(NodeError::ReadOnlyTransaction(self.name.clone())));
                        continue;
                    }
                    self.commit(respond_to);
                    return;
                }
            }
        }

        info!(actor = %self.name, "Transaction actor stopped");
    }

    fn commit(self, respond_to: Reply<()>) {
        let Self { name, receiver, handle, .. } = self;
        // Closing the mailbox first makes every later message undeliverable.
        drop(receiver);
        info!(actor = %name, "Transaction actor stopped");
        debug!(actor = %name, "Committing transaction");
        tokio::spawn(async move {
            let result = handle.commit().await;
            match &result {
                Ok(()) => info!(actor = %name, "Transaction committed"),
                Err(e) => warn!(actor = %name, error = %e, "Commit failed"),
            }
            let _ = respond_to.send(result.map_err(NodeError::from));
        });
    }
}

async fn read(handle: &TransactionHandle, name: &str, request: ReadRequest) {
    match handle {
        TransactionHandle::ReadOnly(tx) => ReadAdapter::handle(&**tx, name, request).await,
        TransactionHandle::ReadWrite(tx) => ReadAdapter::handle(&**tx, name, request).await,
        TransactionHandle::WriteOnly(_) => {
            let error = DeviceError::Unsupported("read on a write-only transaction".into());
            match request {
                ReadRequest::Read { respond_to, .. } => {
                    let _ = respond_to.send(Err(error.into()));
                }
                ReadRequest::Exists { respond_to, .. } => {
                    let _ = respond_to.send(Err(error.into()));
                }
            }
        }
    }
}

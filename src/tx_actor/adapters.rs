//! Stateless translation of one envelope into one call on a transaction handle.
//!
//! Reads produce exactly one reply. Writes produce none: a failed write is logged and the
//! transaction carries on, leaving commit to report whatever state resulted.

use crate::device::{ReadTransaction, WriteTransaction};
use crate::messages::{ReadReply, ReadRequest, WriteRequest};
use crate::model::NormalizedNodeMessage;
use crate::node_actor::NodeError;
use tracing::{debug, warn};

pub struct ReadAdapter;

impl ReadAdapter {
    pub async fn handle<T>(tx: &T, actor: &str, request: ReadRequest)
    where
        T: ReadTransaction + ?Sized,
    {
        match request {
            ReadRequest::Read { store, path, respond_to } => {
                debug!(actor, ?store, %path, "Read");
                let reply = match tx.read(store, &path).await {
                    Ok(Some(node)) => Ok(ReadReply::Data(NormalizedNodeMessage::new(path, node))),
                    Ok(None) => Ok(ReadReply::Empty),
                    Err(e) => {
                        warn!(actor, %path, error = %e, "Read failed");
                        Err(NodeError::from(e))
                    }
                };
                let _ = respond_to.send(reply);
            }
            ReadRequest::Exists { store, path, respond_to } => {
                debug!(actor, ?store, %path, "Exists");
                let reply = tx.exists(store, &path).await.map_err(|e| {
                    warn!(actor, %path, error = %e, "Exists failed");
                    NodeError::from(e)
                });
                let _ = respond_to.send(reply);
            }
        }
    }
}

pub struct WriteAdapter;

impl WriteAdapter {
    pub fn handle<T>(tx: &mut T, actor: &str, request: WriteRequest)
    where
        T: WriteTransaction + ?Sized,
    {
        debug!(actor, ?request, "Write");
        let result = match request {
            WriteRequest::Put { store, data } => tx.put(store, data.path, data.node),
            WriteRequest::Merge { store, data } => tx.merge(store, data.path, data.node),
            WriteRequest::Delete { store, path } => tx.delete(store, path),
        };
        if let Err(e) = result {
            warn!(actor, error = %e, "Write failed, transaction continues");
        }
    }
}

use super::Reply;
use crate::model::{Datastore, NodePath, NormalizedNodeMessage};
use serde::{Deserialize, Serialize};

/// Reads against a transaction actor's handle.
#[derive(Debug)]
pub enum ReadRequest {
    Read {
        store: Datastore,
        path: NodePath,
        respond_to: Reply<ReadReply>,
    },
    Exists {
        store: Datastore,
        path: NodePath,
        respond_to: Reply<bool>,
    },
}

/// Fire-and-forget mutations of a transaction actor's handle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WriteRequest {
    Put { store: Datastore, data: NormalizedNodeMessage },
    Merge { store: Datastore, data: NormalizedNodeMessage },
    Delete { store: Datastore, path: NodePath },
}

/// Everything a transaction actor accepts.
#[derive(Debug)]
pub enum TxRequest {
    Read(ReadRequest),
    Write(WriteRequest),
    /// Terminal. Replies whether the handle was actually cancelled.
    Cancel { respond_to: Reply<bool> },
    /// Terminal for write-capable actors.
    Commit { respond_to: Reply<()> },
}

/// Answer to [`ReadRequest::Read`]. An absent node is a distinct reply, not an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ReadReply {
    Data(NormalizedNodeMessage),
    Empty,
}

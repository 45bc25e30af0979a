use super::{InvokeReply, ReadReply, Reply};
use crate::model::{Datastore, NodePath, NormalizedNodeMessage};
use serde::{Deserialize, Serialize};

/// Fire-and-forget edits of the device's candidate configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EditRequest {
    Merge { store: Datastore, data: NormalizedNodeMessage },
    Replace { store: Datastore, data: NormalizedNodeMessage },
    Create { store: Datastore, data: NormalizedNodeMessage },
    Delete { store: Datastore, path: NodePath },
    Remove { store: Datastore, path: NodePath },
}

/// Everything a data-tree session actor accepts.
#[derive(Debug)]
pub enum DataTreeRequest {
    Lock { respond_to: Reply<InvokeReply> },
    Unlock { respond_to: Reply<InvokeReply> },
    DiscardChanges { respond_to: Reply<InvokeReply> },
    Get { path: NodePath, respond_to: Reply<ReadReply> },
    GetConfig { path: NodePath, respond_to: Reply<ReadReply> },
    Edit(EditRequest),
    /// Terminal.
    Commit { respond_to: Reply<()> },
}

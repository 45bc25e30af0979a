use super::Reply;
use crate::clients::{DataTreeClient, NodeClient, TxClient};
use crate::device::DeviceSession;
use crate::model::{
    DataTreeIdentifier, NodePath, NormalizedNodeMessage, QName, RpcError, RpcResult,
    SchemaContext, SchemaPath, SchemaSource, SourceIdentifier,
};
use crate::node_actor::{NodeRole, NodeSetup};
use crate::schema::SchemaError;
use serde::{Deserialize, Serialize};

/// Everything a node actor accepts.
///
/// | Request | Sent by | Answer |
/// |---|---|---|
/// | `InitializeAsMaster` | orchestrator | ack |
/// | `RefreshMasterData` | orchestrator | ack |
/// | `AskForMasterMountPoint` | slave | source ids, or `NotMaster` |
/// | `RequestSchemaSource` | slave | source text |
/// | `New*Transaction` | clients | transaction actor |
/// | `NewDataTreeService` | clients | data-tree session actor |
/// | `InvokeRpc` / `InvokeAction` | clients | [`InvokeReply`] |
/// | `RegisterAsSlaveOf` | orchestrator | ack (resolution continues afterwards) |
/// | `UnregisterMountPoint` | orchestrator | none |
/// | `RefreshSlaveSetup` | orchestrator | none |
/// | `Deactivate` | orchestrator | ack |
/// | `QueryRole` | anyone | [`NodeRole`] |
/// | `Stop` | orchestrator | none |
#[derive(Debug)]
pub enum NodeRequest {
    InitializeAsMaster {
        session: DeviceSession,
        respond_to: Reply<()>,
    },
    RefreshMasterData {
        setup: NodeSetup,
        respond_to: Reply<()>,
    },
    AskForMasterMountPoint {
        respond_to: Reply<Vec<SourceIdentifier>>,
    },
    RequestSchemaSource {
        id: SourceIdentifier,
        respond_to: Reply<SchemaSource>,
    },
    NewReadTransaction {
        respond_to: Reply<TxClient>,
    },
    NewWriteTransaction {
        respond_to: Reply<TxClient>,
    },
    NewReadWriteTransaction {
        respond_to: Reply<TxClient>,
    },
    NewDataTreeService {
        respond_to: Reply<DataTreeClient>,
    },
    InvokeRpc {
        name: QName,
        input: Option<NormalizedNodeMessage>,
        respond_to: Reply<InvokeReply>,
    },
    InvokeAction {
        path: SchemaPath,
        target: DataTreeIdentifier,
        input: Option<NormalizedNodeMessage>,
        respond_to: Reply<InvokeReply>,
    },
    RegisterAsSlaveOf {
        master: NodeClient,
        source_ids: Vec<SourceIdentifier>,
        respond_to: Reply<()>,
    },
    UnregisterMountPoint,
    RefreshSlaveSetup {
        setup: NodeSetup,
    },
    Deactivate {
        respond_to: Reply<()>,
    },
    QueryRole {
        respond_to: Reply<NodeRole>,
    },
    Stop,
    /// Posted by the node's own schema resolution task when it finishes.
    SlaveSchemaResolved {
        generation: u64,
        outcome: Result<SchemaContext, SchemaError>,
    },
}

/// Answer to an RPC or action invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InvokeReply {
    /// The device produced no result at all.
    Empty,
    Output {
        output: Option<NormalizedNodeMessage>,
        errors: Vec<RpcError>,
    },
}

impl InvokeReply {
    /// Back to the device-side result, `None` for [`InvokeReply::Empty`].
    pub fn into_result(self) -> Option<RpcResult> {
        match self {
            InvokeReply::Empty => None,
            InvokeReply::Output { output, errors } => Some(RpcResult {
                output: output.map(|message| message.node),
                errors,
            }),
        }
    }
}

impl From<Option<RpcResult>> for InvokeReply {
    fn from(result: Option<RpcResult>) -> Self {
        match result {
            None => InvokeReply::Empty,
            Some(RpcResult { output, errors }) => InvokeReply::Output {
                output: output.map(|node| NormalizedNodeMessage::new(NodePath::root(), node)),
                errors,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NormalizedNode;

    #[test]
    fn test_invoke_reply_keeps_empty_distinct_from_no_output() {
        assert_eq!(InvokeReply::from(None), InvokeReply::Empty);

        let no_output = RpcResult { output: None, errors: Vec::new() };
        let reply = InvokeReply::from(Some(no_output.clone()));
        assert_eq!(reply, InvokeReply::Output { output: None, errors: Vec::new() });
        assert_eq!(reply.into_result(), Some(no_output));
    }

    #[test]
    fn test_invoke_reply_wraps_output_at_root() {
        let result = RpcResult {
            output: Some(NormalizedNode::leaf("status", "ok")),
            errors: vec![RpcError { tag: "partial".into(), message: "one port down".into() }],
        };
        let reply = InvokeReply::from(Some(result.clone()));
        let InvokeReply::Output { output: Some(message), errors } = &reply else {
            panic!("expected output, got {reply:?}");
        };
        assert_eq!(message.path, NodePath::root());
        assert_eq!(errors.len(), 1);
        assert_eq!(reply.into_result(), Some(result));
    }
}

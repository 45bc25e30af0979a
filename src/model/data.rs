use serde::{Deserialize, Serialize};
use std::fmt;

/// Logical datastore a data operation targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Datastore {
    Configuration,
    Operational,
}

/// Path from the data-tree root to a node, one segment per level.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodePath(pub Vec<String>);

impl NodePath {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn parse(path: &str) -> Self {
        Self(
            path.split('/')
                .filter(|segment| !segment.is_empty())
                .map(str::to_owned)
                .collect(),
        )
    }

    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment.into());
        Self(segments)
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.0.join("/"))
    }
}

/// A subtree of the device's data model.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum NormalizedNode {
    Leaf { name: String, value: String },
    Container { name: String, children: Vec<NormalizedNode> },
}

impl NormalizedNode {
    pub fn leaf(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Leaf { name: name.into(), value: value.into() }
    }

    pub fn container(name: impl Into<String>, children: Vec<NormalizedNode>) -> Self {
        Self::Container { name: name.into(), children }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Leaf { name, .. } | Self::Container { name, .. } => name,
        }
    }
}

/// A (path, value) pair: the payload unit of read and write envelopes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedNodeMessage {
    pub path: NodePath,
    pub node: NormalizedNode,
}

impl NormalizedNodeMessage {
    pub fn new(path: NodePath, node: NormalizedNode) -> Self {
        Self { path, node }
    }
}

/// Qualified name of an RPC or action.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QName {
    pub namespace: String,
    pub local_name: String,
}

impl QName {
    pub fn new(namespace: impl Into<String>, local_name: impl Into<String>) -> Self {
        Self { namespace: namespace.into(), local_name: local_name.into() }
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}){}", self.namespace, self.local_name)
    }
}

/// Schema path naming an action definition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaPath(pub Vec<QName>);

/// Data-tree location an action is invoked on.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataTreeIdentifier {
    pub datastore: Datastore,
    pub path: NodePath,
}

/// A protocol-level error reported by the device alongside an RPC result.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcError {
    pub tag: String,
    pub message: String,
}

/// Outcome of an RPC or action invocation that produced a result.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcResult {
    pub output: Option<NormalizedNode>,
    pub errors: Vec<RpcError>,
}

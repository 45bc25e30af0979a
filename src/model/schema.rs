use serde::{Deserialize, Serialize};
use std::fmt;

/// Name + revision key of one schema source.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SourceIdentifier {
    pub name: String,
    pub revision: Option<String>,
}

impl SourceIdentifier {
    pub fn new(name: impl Into<String>, revision: Option<&str>) -> Self {
        Self {
            name: name.into(),
            revision: revision.map(str::to_owned),
        }
    }
}

impl fmt::Display for SourceIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.revision {
            Some(revision) => write!(f, "{}@{}", self.name, revision),
            None => f.write_str(&self.name),
        }
    }
}

/// The text of one schema source, as served by a master to its slaves.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaSource {
    pub id: SourceIdentifier,
    pub text: String,
}

/// Resolved model context built from a complete set of schema sources.
///
/// The model itself is opaque to this crate; the context only records which sources
/// it was built from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaContext {
    sources: Vec<SchemaSource>,
}

impl SchemaContext {
    pub fn new(mut sources: Vec<SchemaSource>) -> Self {
        sources.sort_by(|a, b| a.id.cmp(&b.id));
        Self { sources }
    }

    pub fn sources(&self) -> &[SchemaSource] {
        &self.sources
    }

    pub fn contains(&self, id: &SourceIdentifier) -> bool {
        self.sources.iter().any(|source| &source.id == id)
    }
}

use crate::model::SourceIdentifier;
use crate::node_actor::NodeError;
use thiserror::Error;

/// Failures while locating schema sources or building a schema context.
///
/// Variants keep their cause as a real `source()` chain so callers can classify a failure
/// by its root cause (see [`RetryClassifier`](super::RetryClassifier)).
#[derive(Debug, Error)]
pub enum SchemaError {
    /// No provider is registered for the requested source.
    #[error("No providers registered for source {0}")]
    MissingSource(SourceIdentifier),

    /// A remote provider could not fetch the source from the master.
    #[error("Failed to fetch source {id} from master: {cause}")]
    Fetch {
        id: SourceIdentifier,
        #[source]
        cause: Box<NodeError>,
    },

    /// Building the schema context failed.
    #[error("{message}")]
    Resolution {
        message: String,
        #[source]
        cause: Box<SchemaError>,
    },
}

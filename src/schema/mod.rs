//! Schema sources and schema contexts.
//!
//! A master serves the schema sources its device advertised; a slave registers one
//! [`RemoteSchemaProvider`](crate::clients::RemoteSchemaProvider) per source and lets the
//! [`SchemaResolver`] build a [`SchemaContext`] from them, fetching each text from the
//! master only when the context factory asks for it.
//!
//! The repository is shared by every node actor of a cluster member and does its own
//! locking.

pub mod error;
pub mod repository;
pub mod resolver;

pub use error::*;
pub use repository::*;
pub use resolver::*;

use crate::framework::Registration;
use crate::model::{SchemaContext, SchemaSource, SourceIdentifier};
use async_trait::async_trait;
use std::sync::Arc;

/// Something that can produce the text of a schema source.
#[async_trait]
pub trait SchemaSourceProvider: Send + Sync {
    async fn get_source(&self, id: &SourceIdentifier) -> Result<SchemaSource, SchemaError>;
}

/// Registry of source providers. Closing the returned registration removes the provider.
pub trait SchemaRegistry: Send + Sync {
    fn register_source(
        &self,
        id: SourceIdentifier,
        provider: Arc<dyn SchemaSourceProvider>,
    ) -> Registration;
}

/// Lookup of schema sources through the registered providers.
#[async_trait]
pub trait SchemaRepository: Send + Sync {
    async fn get_source(&self, id: &SourceIdentifier) -> Result<SchemaSource, SchemaError>;
}

/// Materializes a schema context from a complete set of source identifiers.
#[async_trait]
pub trait SchemaContextFactory: Send + Sync {
    async fn create_context(&self, ids: &[SourceIdentifier])
        -> Result<SchemaContext, SchemaError>;
}

/// The schema collaborators a node actor works with.
#[derive(Clone)]
pub struct SchemaResources {
    pub registry: Arc<dyn SchemaRegistry>,
    pub repository: Arc<dyn SchemaRepository>,
    pub context_factory: Arc<dyn SchemaContextFactory>,
}

impl SchemaResources {
    /// Uses one shared repository for all three roles.
    pub fn shared(repository: SharedSchemaRepository) -> Self {
        Self {
            registry: Arc::new(repository.clone()),
            repository: Arc::new(repository.clone()),
            context_factory: Arc::new(repository),
        }
    }
}

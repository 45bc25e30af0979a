use super::{
    SchemaContextFactory, SchemaError, SchemaRegistry, SchemaRepository, SchemaSourceProvider,
};
use crate::framework::Registration;
use crate::model::{SchemaContext, SchemaSource, SourceIdentifier};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

type ProviderList = Vec<(u64, Arc<dyn SchemaSourceProvider>)>;

#[derive(Default)]
struct RepositoryInner {
    providers: Mutex<HashMap<SourceIdentifier, ProviderList>>,
    next_token: AtomicU64,
}

impl RepositoryInner {
    fn providers(&self) -> MutexGuard<'_, HashMap<SourceIdentifier, ProviderList>> {
        self.providers.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// In-memory schema repository shared by the node actors of one cluster member.
///
/// Acts as registry, repository and context factory at once. Providers for the same
/// source are tried in registration order until one succeeds.
#[derive(Clone, Default)]
pub struct SharedSchemaRepository {
    inner: Arc<RepositoryInner>,
}

impl SharedSchemaRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a provider serving a fixed text.
    pub fn add_source(&self, id: SourceIdentifier, text: impl Into<String>) -> Registration {
        let provider = StaticSourceProvider::new(SchemaSource { id: id.clone(), text: text.into() });
        self.register_source(id, Arc::new(provider))
    }

    pub fn provider_count(&self, id: &SourceIdentifier) -> usize {
        self.inner.providers().get(id).map_or(0, Vec::len)
    }

    async fn fetch(&self, id: &SourceIdentifier) -> Result<SchemaSource, SchemaError> {
        let providers: Vec<Arc<dyn SchemaSourceProvider>> = self
            .inner
            .providers()
            .get(id)
            .map(|list| list.iter().map(|(_, provider)| provider.clone()).collect())
            .unwrap_or_default();

        let mut last_error = SchemaError::MissingSource(id.clone());
        for provider in providers {
            match provider.get_source(id).await {
                Ok(source) => return Ok(source),
                Err(e) => {
                    debug!(source = %id, error = %e, "Provider failed");
                    last_error = e;
                }
            }
        }
        Err(last_error)
    }
}

impl SchemaRegistry for SharedSchemaRepository {
    fn register_source(
        &self,
        id: SourceIdentifier,
        provider: Arc<dyn SchemaSourceProvider>,
    ) -> Registration {
        let token = self.inner.next_token.fetch_add(1, Ordering::SeqCst);
        self.inner
            .providers()
            .entry(id.clone())
            .or_default()
            .push((token, provider));

        let inner = Arc::downgrade(&self.inner);
        Registration::new(format!("schema-source {id}"), move || {
            let Some(inner) = inner.upgrade() else { return };
            let mut providers = inner.providers();
            if let Some(list) = providers.get_mut(&id) {
                list.retain(|(t, _)| *t != token);
                if list.is_empty() {
                    providers.remove(&id);
                }
            }
        })
    }
}

#[async_trait]
impl SchemaRepository for SharedSchemaRepository {
    async fn get_source(&self, id: &SourceIdentifier) -> Result<SchemaSource, SchemaError> {
        self.fetch(id).await
    }
}

#[async_trait]
impl SchemaContextFactory for SharedSchemaRepository {
    async fn create_context(
        &self,
        ids: &[SourceIdentifier],
    ) -> Result<SchemaContext, SchemaError> {
        let mut sources = Vec::with_capacity(ids.len());
        for id in ids {
            let source = self.fetch(id).await.map_err(|cause| SchemaError::Resolution {
                message: format!("Unable to build schema context, source {id} unavailable"),
                cause: Box::new(cause),
            })?;
            sources.push(source);
        }
        Ok(SchemaContext::new(sources))
    }
}

/// Provider serving one source from memory.
#[derive(Clone, Debug)]
pub struct StaticSourceProvider {
    source: SchemaSource,
}

impl StaticSourceProvider {
    pub fn new(source: SchemaSource) -> Self {
        Self { source }
    }
}

#[async_trait]
impl SchemaSourceProvider for StaticSourceProvider {
    async fn get_source(&self, id: &SourceIdentifier) -> Result<SchemaSource, SchemaError> {
        if id == &self.source.id {
            Ok(self.source.clone())
        } else {
            Err(SchemaError::MissingSource(id.clone()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(name: &str) -> SourceIdentifier {
        SourceIdentifier::new(name, Some("2024-01-01"))
    }

    #[tokio::test]
    async fn test_missing_source_is_reported_by_id() {
        let repository = SharedSchemaRepository::new();
        let err = repository.get_source(&id("ietf-interfaces")).await.unwrap_err();
        assert!(matches!(err, SchemaError::MissingSource(ref missing) if missing == &id("ietf-interfaces")));
        assert_eq!(
            err.to_string(),
            "No providers registered for source ietf-interfaces@2024-01-01"
        );
    }

    #[tokio::test]
    async fn test_closing_registration_removes_provider() {
        let repository = SharedSchemaRepository::new();
        let mut registration = repository.add_source(id("ietf-ip"), "module ietf-ip {}");
        assert_eq!(repository.provider_count(&id("ietf-ip")), 1);
        assert_eq!(repository.get_source(&id("ietf-ip")).await.unwrap().text, "module ietf-ip {}");

        registration.close();
        assert_eq!(repository.provider_count(&id("ietf-ip")), 0);
        assert!(repository.get_source(&id("ietf-ip")).await.is_err());
    }

    #[tokio::test]
    async fn test_context_needs_every_source() {
        let repository = SharedSchemaRepository::new();
        let _a = repository.add_source(id("a"), "module a {}");
        let _b = repository.add_source(id("b"), "module b {}");

        let context = repository.create_context(&[id("b"), id("a")]).await.unwrap();
        assert_eq!(context.sources().len(), 2);
        assert!(context.contains(&id("a")));

        let err = repository.create_context(&[id("a"), id("c")]).await.unwrap_err();
        match err {
            SchemaError::Resolution { cause, .. } => {
                assert!(matches!(*cause, SchemaError::MissingSource(_)))
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
}

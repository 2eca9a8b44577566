use crate::backend::dataproxy::DataProxyBackend;
use crate::backend::gdocs::GdocsBackend;
use crate::backend::local_index::LocalIndexBackend;
use crate::backend::memory::MemoryBackend;
use crate::backend::remote::RemoteClient;
use crate::backend::store::{DocumentStore, FileStore};
use crate::backend::webstore::WebstoreBackend;
use crate::backend::{Backend, BackendError, BackendKind, BackendResult};
use crate::config::config::Config;
use crate::data::query_engine::QueryEngine;
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// Adapters by kind. Built once at startup, then shared read-only through
/// an `Arc` with every dataset.
#[derive(Clone, Default)]
pub struct BackendRegistry {
    backends: HashMap<BackendKind, Arc<dyn Backend>>,
    local_index: Option<Arc<LocalIndexBackend>>,
}

impl std::fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}

impl BackendRegistry {
    /// Empty registry; add adapters with [`register`](Self::register)
    pub fn new() -> Self {
        Self::default()
    }

    /// Every built-in adapter, with the local index persisting into `store`
    pub fn with_store(config: &Config, store: Arc<dyn DocumentStore>) -> Self {
        let client = RemoteClient::new(config.backend.request_timeout());
        let engine = QueryEngine::with_facet_size(config.query.facet_size);
        let local_index = Arc::new(LocalIndexBackend::new(store, engine.clone()));

        let mut registry = Self::new();
        registry.register(
            BackendKind::Memory,
            Arc::new(MemoryBackend::with_engine(engine.clone())),
        );
        registry.register(
            BackendKind::Webstore,
            Arc::new(WebstoreBackend::new(client.clone())),
        );
        registry.register(
            BackendKind::Dataproxy,
            Arc::new(DataProxyBackend::new(
                client.clone(),
                config.backend.dataproxy_url.clone(),
            )),
        );
        registry.register(
            BackendKind::Gdocs,
            Arc::new(GdocsBackend::new(client, engine)),
        );
        registry.register(BackendKind::Localindex, local_index.clone());
        registry.local_index = Some(local_index);

        info!(
            timeout_secs = config.backend.request_timeout_secs,
            "Registered backends: {:?}",
            registry.kinds()
        );
        registry
    }

    /// Every built-in adapter, with the local index in the configured store directory
    pub fn with_defaults(config: &Config) -> Result<Self> {
        let dir = config.store_dir()?;
        let store = FileStore::new(&dir)
            .with_context(|| format!("Failed to open document store at {}", dir.display()))?;
        Ok(Self::with_store(config, Arc::new(store)))
    }

    /// Add or replace the adapter for `kind`, returning the previous one
    pub fn register(&mut self, kind: BackendKind, backend: Arc<dyn Backend>) -> Option<Arc<dyn Backend>> {
        self.backends.insert(kind, backend)
    }

    pub fn get(&self, kind: BackendKind) -> BackendResult<Arc<dyn Backend>> {
        self.backends
            .get(&kind)
            .cloned()
            .ok_or(BackendError::UnknownBackend(kind))
    }

    /// The built-in local index adapter, for adding datasets to it
    pub fn local_index(&self) -> Option<&Arc<LocalIndexBackend>> {
        self.local_index.as_ref()
    }

    pub fn kinds(&self) -> Vec<BackendKind> {
        let mut kinds: Vec<BackendKind> = self.backends.keys().copied().collect();
        kinds.sort();
        kinds
    }
}

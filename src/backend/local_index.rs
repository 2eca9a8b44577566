//! Locally-indexed adapter
//!
//! Datasets are persisted in a [`DocumentStore`] keyed by dataset id. The
//! first read loads a dataset's rows into an in-process index whose
//! per-field [`Dimension`](crate::data::dimension::Dimension)s are built
//! lazily, cached per `(field, direction)` and dropped on every write.

use crate::backend::store::{DocumentStore, StoredDataset};
use crate::backend::{
    expect_kind, Backend, BackendError, BackendKind, BackendResult, DatasetRef, Schema,
};
use crate::data::dimension::DimensionCache;
use crate::data::document::{assign_index_ids, infer_field_types, row_id, Document, Field};
use crate::data::query::{QueryResult, QueryState};
use crate::data::query_engine::QueryEngine;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

#[derive(Debug)]
struct IndexEntry {
    fields: Vec<Field>,
    rows: Vec<Value>,
    dimensions: DimensionCache,
}

impl IndexEntry {
    fn new(stored: StoredDataset) -> Self {
        Self {
            fields: stored.fields,
            rows: stored.documents,
            dimensions: DimensionCache::new(),
        }
    }
}

// The index map is behind an async mutex so a write and its write-through
// to the store complete before the next operation on the index starts.
pub struct LocalIndexBackend {
    store: Arc<dyn DocumentStore>,
    engine: QueryEngine,
    indexes: Mutex<HashMap<String, IndexEntry>>,
}

impl std::fmt::Debug for LocalIndexBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalIndexBackend")
            .field("engine", &self.engine)
            .finish_non_exhaustive()
    }
}

impl LocalIndexBackend {
    pub fn new(store: Arc<dyn DocumentStore>, engine: QueryEngine) -> Self {
        Self {
            store,
            engine,
            indexes: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// Persist `documents` under `dataset_id`, replacing anything stored
    /// there. Rows without an `id` get their position as id and missing
    /// field types are inferred.
    pub async fn add_dataset(
        &self,
        dataset_id: &str,
        mut fields: Vec<Field>,
        mut documents: Vec<Value>,
    ) -> BackendResult<()> {
        assign_index_ids(&mut documents);
        infer_field_types(&mut fields, &documents);
        let stored = StoredDataset::new(fields, documents);

        let mut indexes = self.indexes.lock().await;
        self.store.save(dataset_id, &stored).await?;
        info!(dataset = dataset_id, rows = stored.documents.len(), "Added dataset to local index");
        indexes.insert(dataset_id.to_string(), IndexEntry::new(stored));
        Ok(())
    }

    /// Number of dimensions built so far for a loaded dataset
    pub async fn dimension_builds(&self, dataset_id: &str) -> Option<usize> {
        self.indexes
            .lock()
            .await
            .get(dataset_id)
            .map(|entry| entry.dimensions.build_count())
    }

    /// Number of dimensions currently cached for a loaded dataset
    pub async fn cached_dimensions(&self, dataset_id: &str) -> Option<usize> {
        self.indexes
            .lock()
            .await
            .get(dataset_id)
            .map(|entry| entry.dimensions.len())
    }

    async fn load(&self, dataset_id: &str) -> BackendResult<IndexEntry> {
        let stored = self
            .store
            .load(dataset_id)
            .await?
            .ok_or_else(|| {
                BackendError::Storage(format!("No stored dataset with id '{}'", dataset_id))
            })?;
        info!(dataset = dataset_id, rows = stored.documents.len(), "Loaded dataset into local index");
        Ok(IndexEntry::new(stored))
    }

    /// The dataset's index entry, loading it from the store on first use
    async fn entry<'a>(
        &self,
        indexes: &'a mut HashMap<String, IndexEntry>,
        dataset_id: &str,
    ) -> BackendResult<&'a mut IndexEntry> {
        if !indexes.contains_key(dataset_id) {
            let entry = self.load(dataset_id).await?;
            indexes.insert(dataset_id.to_string(), entry);
        }
        indexes
            .get_mut(dataset_id)
            .ok_or_else(|| BackendError::Storage(format!("Index for '{}' disappeared", dataset_id)))
    }
}

#[async_trait]
impl Backend for LocalIndexBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Localindex
    }

    /// Reloads the dataset from the store, discarding cached dimensions
    async fn read_schema(&self, dataset: &DatasetRef<'_>) -> BackendResult<Schema> {
        expect_kind(dataset, BackendKind::Localindex)?;
        let entry = self.load(dataset.id).await?;
        let schema = Schema::new(entry.fields.clone(), Some(entry.rows.len()));
        self.indexes
            .lock()
            .await
            .insert(dataset.id.to_string(), entry);
        Ok(schema)
    }

    async fn query(&self, dataset: &DatasetRef<'_>, query: &QueryState) -> BackendResult<QueryResult> {
        expect_kind(dataset, BackendKind::Localindex)?;
        let mut indexes = self.indexes.lock().await;
        let IndexEntry {
            fields,
            rows,
            dimensions,
        } = self.entry(&mut indexes, dataset.id).await?;
        let result = self.engine.execute_indexed(rows, fields, query, dimensions);
        debug!(
            dataset = dataset.id,
            rows = result.rows.len(),
            total = result.total,
            dimensions = dimensions.len(),
            "Local index query"
        );
        Ok(result)
    }

    async fn update(&self, dataset: &DatasetRef<'_>, document: &Document) -> BackendResult<Document> {
        expect_kind(dataset, BackendKind::Localindex)?;
        let id = document.id();
        let row = document.to_json();

        let mut indexes = self.indexes.lock().await;
        let entry = self.entry(&mut indexes, dataset.id).await?;
        let position = entry
            .rows
            .iter()
            .position(|r| row_id(r).as_deref() == Some(id))
            .ok_or_else(|| BackendError::not_found(id))?;

        // The index only changes once the store has accepted the write
        self.store.put_document(dataset.id, &row).await?;
        entry.rows[position] = row;
        entry.dimensions.invalidate();
        debug!(dataset = dataset.id, id, "Updated row in local index");
        Ok(document.clone())
    }

    async fn delete(&self, dataset: &DatasetRef<'_>, document: &Document) -> BackendResult<()> {
        expect_kind(dataset, BackendKind::Localindex)?;
        let id = document.id();

        let mut indexes = self.indexes.lock().await;
        let entry = self.entry(&mut indexes, dataset.id).await?;
        if !entry.rows.iter().any(|r| row_id(r).as_deref() == Some(id)) {
            debug!(dataset = dataset.id, id, "Delete of absent row");
            return Ok(());
        }

        self.store.delete_document(dataset.id, id).await?;
        entry.rows.retain(|r| row_id(r).as_deref() != Some(id));
        entry.dimensions.invalidate();
        debug!(dataset = dataset.id, id, "Deleted row from local index");
        Ok(())
    }
}

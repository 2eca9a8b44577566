//! Durable document storage for the locally-indexed adapter
//!
//! [`FileStore`] keeps a catalog (`datasets.json`) describing every stored
//! dataset plus one JSON file of rows per dataset. Row files are named by
//! the SHA-256 of the dataset id so any id is a safe file name.

use crate::backend::error::{BackendError, BackendResult};
use crate::data::document::{row_id, Field};
use async_trait::async_trait;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

const CATALOG_FILE: &str = "datasets.json";

/// Schema and rows of one stored dataset
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoredDataset {
    pub fields: Vec<Field>,
    pub documents: Vec<Value>,
}

impl StoredDataset {
    pub fn new(fields: Vec<Field>, documents: Vec<Value>) -> Self {
        Self { fields, documents }
    }

    /// Replace the row with the same id, or append it
    fn upsert(&mut self, document: Value) {
        let id = row_id(&document);
        match self
            .documents
            .iter_mut()
            .find(|row| id.is_some() && row_id(row) == id)
        {
            Some(row) => *row = document,
            None => self.documents.push(document),
        }
    }

    fn remove(&mut self, document_id: &str) -> usize {
        let before = self.documents.len();
        self.documents
            .retain(|row| row_id(row).as_deref() != Some(document_id));
        before - self.documents.len()
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// The stored dataset, or `None` if the id was never saved
    async fn load(&self, dataset_id: &str) -> BackendResult<Option<StoredDataset>>;

    /// Replace everything stored for `dataset_id`
    async fn save(&self, dataset_id: &str, dataset: &StoredDataset) -> BackendResult<()>;

    /// Write one row, matched by its `id`
    async fn put_document(&self, dataset_id: &str, document: &Value) -> BackendResult<()>;

    /// Remove one row by id. Removing an absent row succeeds.
    async fn delete_document(&self, dataset_id: &str, document_id: &str) -> BackendResult<()>;

    /// Forget a dataset; returns whether it existed
    async fn remove(&self, dataset_id: &str) -> BackendResult<bool>;

    /// Ids of every stored dataset, sorted
    async fn list(&self) -> BackendResult<Vec<String>>;
}

fn unknown_dataset(dataset_id: &str) -> BackendError {
    BackendError::Storage(format!("Dataset '{}' is not in the store", dataset_id))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CatalogEntry {
    fields: Vec<Field>,
    file: String,
    doc_count: usize,
    updated_at: DateTime<Local>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Catalog {
    datasets: BTreeMap<String, CatalogEntry>,
}

/// Directory-backed store
#[derive(Debug)]
pub struct FileStore {
    dir: PathBuf,
    catalog_path: PathBuf,
    // Serializes read-modify-write cycles on the catalog and row files
    write_lock: tokio::sync::Mutex<()>,
}

impl FileStore {
    /// Open (creating if needed) a store rooted at `dir`
    pub fn new(dir: impl Into<PathBuf>) -> BackendResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        let catalog_path = dir.join(CATALOG_FILE);
        Ok(Self {
            dir,
            catalog_path,
            write_lock: tokio::sync::Mutex::new(()),
        })
    }

    /// Row file name for a dataset id
    pub fn file_name(dataset_id: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(dataset_id.as_bytes());
        format!("{:x}.json", hasher.finalize())
    }

    async fn read_catalog(&self) -> BackendResult<Catalog> {
        match tokio::fs::read(&self.catalog_path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| BackendError::Storage(format!("Corrupt catalog: {}", e))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Catalog::default()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_catalog(&self, catalog: &Catalog) -> BackendResult<()> {
        let json = serde_json::to_vec_pretty(catalog)?;
        self.write_file(&self.catalog_path, &json).await
    }

    async fn read_rows(&self, file: &str) -> BackendResult<Vec<Value>> {
        let bytes = tokio::fs::read(self.dir.join(file)).await?;
        serde_json::from_slice(&bytes)
            .map_err(|e| BackendError::Storage(format!("Corrupt row file {}: {}", file, e)))
    }

    /// Write through a temporary file so readers never see half a file
    async fn write_file(&self, path: &Path, contents: &[u8]) -> BackendResult<()> {
        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, contents).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }

    async fn write_dataset(
        &self,
        catalog: &mut Catalog,
        dataset_id: &str,
        dataset: &StoredDataset,
    ) -> BackendResult<()> {
        let file = Self::file_name(dataset_id);
        let rows = serde_json::to_vec(&dataset.documents)?;
        self.write_file(&self.dir.join(&file), &rows).await?;
        catalog.datasets.insert(
            dataset_id.to_string(),
            CatalogEntry {
                fields: dataset.fields.clone(),
                file,
                doc_count: dataset.documents.len(),
                updated_at: Local::now(),
            },
        );
        self.write_catalog(catalog).await
    }

    /// Load, change and write back one dataset under the write lock
    async fn modify<F>(&self, dataset_id: &str, change: F) -> BackendResult<()>
    where
        F: FnOnce(&mut StoredDataset) + Send,
    {
        let _guard = self.write_lock.lock().await;
        let mut catalog = self.read_catalog().await?;
        let entry = catalog
            .datasets
            .get(dataset_id)
            .ok_or_else(|| unknown_dataset(dataset_id))?;
        let mut dataset = StoredDataset::new(entry.fields.clone(), self.read_rows(&entry.file).await?);
        change(&mut dataset);
        self.write_dataset(&mut catalog, dataset_id, &dataset).await
    }
}

#[async_trait]
impl DocumentStore for FileStore {
    async fn load(&self, dataset_id: &str) -> BackendResult<Option<StoredDataset>> {
        let catalog = self.read_catalog().await?;
        let Some(entry) = catalog.datasets.get(dataset_id) else {
            return Ok(None);
        };
        let documents = self.read_rows(&entry.file).await?;
        debug!(dataset = dataset_id, rows = documents.len(), "Loaded from file store");
        Ok(Some(StoredDataset::new(entry.fields.clone(), documents)))
    }

    async fn save(&self, dataset_id: &str, dataset: &StoredDataset) -> BackendResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut catalog = self.read_catalog().await?;
        self.write_dataset(&mut catalog, dataset_id, dataset).await?;
        info!(
            dataset = dataset_id,
            rows = dataset.documents.len(),
            dir = %self.dir.display(),
            "Saved dataset to file store"
        );
        Ok(())
    }

    async fn put_document(&self, dataset_id: &str, document: &Value) -> BackendResult<()> {
        let document = document.clone();
        self.modify(dataset_id, move |dataset| dataset.upsert(document))
            .await
    }

    async fn delete_document(&self, dataset_id: &str, document_id: &str) -> BackendResult<()> {
        self.modify(dataset_id, |dataset| {
            dataset.remove(document_id);
        })
        .await
    }

    async fn remove(&self, dataset_id: &str) -> BackendResult<bool> {
        let _guard = self.write_lock.lock().await;
        let mut catalog = self.read_catalog().await?;
        let Some(entry) = catalog.datasets.remove(dataset_id) else {
            return Ok(false);
        };
        match tokio::fs::remove_file(self.dir.join(&entry.file)).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        self.write_catalog(&catalog).await?;
        Ok(true)
    }

    async fn list(&self) -> BackendResult<Vec<String>> {
        Ok(self.read_catalog().await?.datasets.into_keys().collect())
    }
}

/// Process-local store
#[derive(Debug, Default)]
pub struct MemoryStore {
    datasets: Mutex<HashMap<String, StoredDataset>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn datasets(&self) -> MutexGuard<'_, HashMap<String, StoredDataset>> {
        self.datasets.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn modify(&self, dataset_id: &str, change: impl FnOnce(&mut StoredDataset)) -> BackendResult<()> {
        let mut datasets = self.datasets();
        let dataset = datasets
            .get_mut(dataset_id)
            .ok_or_else(|| unknown_dataset(dataset_id))?;
        change(dataset);
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn load(&self, dataset_id: &str) -> BackendResult<Option<StoredDataset>> {
        Ok(self.datasets().get(dataset_id).cloned())
    }

    async fn save(&self, dataset_id: &str, dataset: &StoredDataset) -> BackendResult<()> {
        self.datasets()
            .insert(dataset_id.to_string(), dataset.clone());
        Ok(())
    }

    async fn put_document(&self, dataset_id: &str, document: &Value) -> BackendResult<()> {
        self.modify(dataset_id, |dataset| dataset.upsert(document.clone()))
    }

    async fn delete_document(&self, dataset_id: &str, document_id: &str) -> BackendResult<()> {
        self.modify(dataset_id, |dataset| {
            dataset.remove(document_id);
        })
    }

    async fn remove(&self, dataset_id: &str) -> BackendResult<bool> {
        Ok(self.datasets().remove(dataset_id).is_some())
    }

    async fn list(&self) -> BackendResult<Vec<String>> {
        let mut ids: Vec<String> = self.datasets().keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}

use async_trait::async_trait;
use data_explorer::backend::local_index::LocalIndexBackend;
use data_explorer::backend::store::{DocumentStore, FileStore, MemoryStore, StoredDataset};
use data_explorer::backend::{Backend, BackendError, BackendRegistry, BackendResult, DatasetRef};
use data_explorer::config::backend_config::BackendConfig;
use data_explorer::config::config::Config;
use data_explorer::data::dataset::Dataset;
use data_explorer::data::document::{Document, Field};
use data_explorer::data::query::{QueryState, SortDirection};
use data_explorer::data::query_engine::QueryEngine;
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;

fn registry(dir: &TempDir) -> BackendRegistry {
    let store = FileStore::new(dir.path()).unwrap();
    BackendRegistry::with_store(&Config::default(), Arc::new(store))
}

async fn seed(registry: &BackendRegistry) {
    registry
        .local_index()
        .unwrap()
        .add_dataset(
            "trades",
            vec![Field::new("book"), Field::new("qty")],
            vec![
                json!({"book": "fx", "qty": 5}),
                json!({"book": "rates", "qty": 12}),
                json!({"book": "fx", "qty": 1}),
                json!({"book": "equity", "qty": 8}),
            ],
        )
        .await
        .unwrap();
}

fn books(dataset: &Dataset) -> Vec<String> {
    dataset
        .current_documents()
        .iter()
        .map(|d| d.get("book").and_then(|v| v.as_str()).unwrap_or_default().to_string())
        .collect()
}

#[tokio::test]
async fn test_query_top_rows_from_index() {
    let dir = TempDir::new().unwrap();
    let registry = registry(&dir);
    seed(&registry).await;

    let mut dataset = Dataset::new("trades", BackendConfig::localindex(), &registry).unwrap();
    dataset.fetch().await.unwrap();
    assert_eq!(dataset.doc_count(), Some(4));

    let response = dataset
        .query(QueryState::new().sort_by("qty", SortDirection::Desc).with_size(2))
        .await
        .unwrap();
    assert_eq!(response.total, 4);
    assert_eq!(books(&dataset), vec!["rates", "equity"]);

    let response = dataset
        .query(
            QueryState::new()
                .filter_term("book", "fx")
                .sort_by("qty", SortDirection::Asc)
                .facet("books", "book"),
        )
        .await
        .unwrap();
    assert_eq!(response.total, 2);
    let qtys: Vec<_> = response.documents.iter().map(|d| d.get("qty").cloned()).collect();
    assert_eq!(qtys, vec![Some(json!(1)), Some(json!(5))]);
    assert_eq!(response.facets.unwrap()["books"].count_for("fx"), Some(2));
}

#[tokio::test]
async fn test_writes_persist_across_restart() {
    let dir = TempDir::new().unwrap();
    {
        let registry = registry(&dir);
        seed(&registry).await;
        let mut dataset = Dataset::new("trades", BackendConfig::localindex(), &registry).unwrap();
        dataset.fetch().await.unwrap();
        dataset
            .query(QueryState::new().sort_by("qty", SortDirection::Desc))
            .await
            .unwrap();

        let mut top = dataset.current_documents()[0].clone();
        top.set("qty", json!(0));
        dataset.save(&top).await.unwrap();

        let equity = dataset.current_documents()[1].clone();
        dataset.destroy(&equity).await.unwrap();

        // sorted view reflects the write, not a stale dimension
        dataset.requery().await.unwrap();
        assert_eq!(books(&dataset), vec!["fx", "fx", "rates"]);
    }

    let registry = registry(&dir);
    let mut dataset = Dataset::new("trades", BackendConfig::localindex(), &registry).unwrap();
    dataset.fetch().await.unwrap();
    assert_eq!(dataset.doc_count(), Some(3));
    dataset
        .query(QueryState::new().sort_by("qty", SortDirection::Asc))
        .await
        .unwrap();
    assert_eq!(books(&dataset), vec!["rates", "fx", "fx"]);

    let store = FileStore::new(dir.path()).unwrap();
    assert_eq!(store.list().await.unwrap(), vec!["trades".to_string()]);
}

#[tokio::test]
async fn test_unknown_dataset_fails_with_storage_error() {
    let dir = TempDir::new().unwrap();
    let registry = registry(&dir);
    let mut dataset = Dataset::new("missing", BackendConfig::localindex(), &registry).unwrap();
    let err = dataset.fetch().await.unwrap_err();
    assert!(matches!(err, BackendError::Storage(_)));
}

/// Accepts whole-dataset saves but rejects single-row writes
struct ReadOnlyRowsStore {
    inner: MemoryStore,
}

#[async_trait]
impl DocumentStore for ReadOnlyRowsStore {
    async fn load(&self, dataset_id: &str) -> BackendResult<Option<StoredDataset>> {
        self.inner.load(dataset_id).await
    }

    async fn save(&self, dataset_id: &str, dataset: &StoredDataset) -> BackendResult<()> {
        self.inner.save(dataset_id, dataset).await
    }

    async fn put_document(&self, _dataset_id: &str, _document: &Value) -> BackendResult<()> {
        Err(BackendError::Storage("disk full".to_string()))
    }

    async fn delete_document(&self, _dataset_id: &str, _document_id: &str) -> BackendResult<()> {
        Err(BackendError::Storage("disk full".to_string()))
    }

    async fn remove(&self, dataset_id: &str) -> BackendResult<bool> {
        self.inner.remove(dataset_id).await
    }

    async fn list(&self) -> BackendResult<Vec<String>> {
        self.inner.list().await
    }
}

#[tokio::test]
async fn test_failed_write_through_leaves_index_unchanged() {
    let store = Arc::new(ReadOnlyRowsStore {
        inner: MemoryStore::new(),
    });
    let backend = LocalIndexBackend::new(store.clone(), QueryEngine::new());
    backend
        .add_dataset(
            "points",
            vec![Field::new("x")],
            vec![json!({"x": 1}), json!({"x": 2})],
        )
        .await
        .unwrap();

    let config = BackendConfig::localindex();
    let ds = DatasetRef {
        id: "points",
        config: &config,
        fields: &[],
    };
    let query = QueryState::new().sort_by("x", SortDirection::Asc);
    let before = backend.query(&ds, &query).await.unwrap();

    let edited = Document::from_row(json!({"id": 0, "x": 99}), String::new);
    let err = backend.update(&ds, &edited).await.unwrap_err();
    assert!(matches!(err, BackendError::Storage(_)));
    let removed = Document::from_row(json!({"id": 1, "x": 2}), String::new);
    let err = backend.delete(&ds, &removed).await.unwrap_err();
    assert!(matches!(err, BackendError::Storage(_)));

    let after = backend.query(&ds, &query).await.unwrap();
    assert_eq!(after, before);
    assert_eq!(after.rows, vec![json!({"id": 0, "x": 1}), json!({"id": 1, "x": 2})]);

    let stored = store.load("points").await.unwrap().unwrap();
    assert_eq!(stored.documents, after.rows);
}

//! In-memory adapter
//!
//! Rows live in a table per dataset id, seeded from the dataset's
//! `{data: {headers, rows}}` config. Reading the schema reseeds the table,
//! so a reused id always serves the definition it was last created with.
//! Updates and deletes mutate that table, so later queries see them.

use crate::backend::{
    config_mismatch, expect_kind, Backend, BackendError, BackendKind, BackendResult, DatasetRef, Schema,
};
use crate::config::backend_config::BackendConfig;
use crate::data::document::{infer_field_types, row_id, Document, Field};
use crate::data::query::{QueryResult, QueryState};
use crate::data::query_engine::QueryEngine;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

#[derive(Debug, Clone)]
struct MemoryTable {
    fields: Vec<Field>,
    rows: Vec<Value>,
}

#[derive(Debug, Default)]
pub struct MemoryBackend {
    tables: Mutex<HashMap<String, MemoryTable>>,
    engine: QueryEngine,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_engine(engine: QueryEngine) -> Self {
        Self {
            tables: Mutex::new(HashMap::new()),
            engine,
        }
    }

    fn tables(&self) -> MutexGuard<'_, HashMap<String, MemoryTable>> {
        self.tables.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn seed(dataset: &DatasetRef<'_>) -> BackendResult<MemoryTable> {
        let BackendConfig::Memory { data } = dataset.config else {
            return Err(config_mismatch(dataset, BackendKind::Memory));
        };
        let mut fields = data.fields();
        infer_field_types(&mut fields, &data.rows);
        info!(dataset = dataset.id, rows = data.rows.len(), "Loaded memory dataset");
        Ok(MemoryTable {
            fields,
            rows: data.rows.clone(),
        })
    }

    /// Run `f` on the dataset's table, seeding it from config if needed
    fn with_table<R>(
        &self,
        dataset: &DatasetRef<'_>,
        f: impl FnOnce(&mut MemoryTable) -> R,
    ) -> BackendResult<R> {
        expect_kind(dataset, BackendKind::Memory)?;
        let mut tables = self.tables();
        if !tables.contains_key(dataset.id) {
            let table = Self::seed(dataset)?;
            tables.insert(dataset.id.to_string(), table);
        }
        match tables.get_mut(dataset.id) {
            Some(table) => Ok(f(table)),
            None => Err(BackendError::Storage(format!(
                "memory table for '{}' disappeared",
                dataset.id
            ))),
        }
    }

    pub fn row_count(&self, dataset_id: &str) -> Option<usize> {
        self.tables().get(dataset_id).map(|t| t.rows.len())
    }

    /// Forget a dataset's table; returns whether one was held
    pub fn drop_dataset(&self, dataset_id: &str) -> bool {
        let dropped = self.tables().remove(dataset_id).is_some();
        if dropped {
            debug!(dataset = dataset_id, "Dropped memory table");
        }
        dropped
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Memory
    }

    /// Replaces any table held under the dataset's id with its config rows
    async fn read_schema(&self, dataset: &DatasetRef<'_>) -> BackendResult<Schema> {
        expect_kind(dataset, BackendKind::Memory)?;
        let table = Self::seed(dataset)?;
        let schema = Schema::new(table.fields.clone(), Some(table.rows.len()));
        self.tables().insert(dataset.id.to_string(), table);
        Ok(schema)
    }

    async fn query(&self, dataset: &DatasetRef<'_>, query: &QueryState) -> BackendResult<QueryResult> {
        self.with_table(dataset, |table| {
            self.engine.execute(&table.rows, &table.fields, query)
        })
    }

    async fn update(&self, dataset: &DatasetRef<'_>, document: &Document) -> BackendResult<Document> {
        let id = document.id();
        let replaced = self.with_table(dataset, |table| {
            match table
                .rows
                .iter_mut()
                .find(|row| row_id(row).as_deref() == Some(id))
            {
                Some(row) => {
                    *row = document.to_json();
                    true
                }
                None => false,
            }
        })?;
        if !replaced {
            return Err(BackendError::not_found(id));
        }
        debug!(dataset = dataset.id, id, "Updated row");
        Ok(document.clone())
    }

    async fn delete(&self, dataset: &DatasetRef<'_>, document: &Document) -> BackendResult<()> {
        let id = document.id();
        let removed = self.with_table(dataset, |table| {
            let before = table.rows.len();
            table.rows.retain(|row| row_id(row).as_deref() != Some(id));
            before - table.rows.len()
        })?;
        debug!(dataset = dataset.id, id, removed, "Deleted row");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::query::SortDirection;
    use serde_json::json;

    fn config() -> BackendConfig {
        BackendConfig::memory(
            &["x", "y"],
            vec![
                json!({"id": 0, "x": 1, "y": 2}),
                json!({"id": 1, "x": 2, "y": 4}),
                json!({"id": 2, "x": 3, "y": 6}),
            ],
        )
    }

    fn dataset(config: &BackendConfig) -> DatasetRef<'_> {
        DatasetRef {
            id: "test",
            config,
            fields: &[],
        }
    }

    #[tokio::test]
    async fn test_schema_infers_types() {
        let config = config();
        let backend = MemoryBackend::new();
        let schema = backend.read_schema(&dataset(&config)).await.unwrap();
        assert_eq!(schema.doc_count, Some(3));
        assert!(schema.fields.iter().all(|f| f.is_numeric()));
    }

    #[tokio::test]
    async fn test_update_then_query_sees_change() {
        let config = config();
        let backend = MemoryBackend::new();
        let ds = dataset(&config);
        let doc = Document::from_row(json!({"id": 1, "x": 99, "y": 4}), || unreachable!());
        backend.update(&ds, &doc).await.unwrap();

        let query = QueryState::new().sort_by("x", SortDirection::Desc).with_size(1);
        let result = backend.query(&ds, &query).await.unwrap();
        assert_eq!(result.rows, vec![json!({"id": 1, "x": 99, "y": 4})]);
    }

    #[tokio::test]
    async fn test_update_missing_id_is_not_found() {
        let config = config();
        let backend = MemoryBackend::new();
        let doc = Document::from_row(json!({"id": 42}), || unreachable!());
        let err = backend.update(&dataset(&config), &doc).await.unwrap_err();
        assert!(matches!(err, BackendError::NotFound { id } if id == "42"));
    }

    #[tokio::test]
    async fn test_wrong_config_is_rejected() {
        let config = BackendConfig::webstore("http://x");
        let backend = MemoryBackend::new();
        let err = backend.read_schema(&dataset(&config)).await.unwrap_err();
        assert!(matches!(err, BackendError::ConfigMismatch { .. }));
    }

    #[tokio::test]
    async fn test_schema_reseeds_reused_id() {
        let backend = MemoryBackend::new();
        let first = config();
        backend.read_schema(&dataset(&first)).await.unwrap();
        assert_eq!(backend.row_count("test"), Some(3));

        let second = BackendConfig::memory(&["name"], vec![json!({"id": 0, "name": "solo"})]);
        let schema = backend.read_schema(&dataset(&second)).await.unwrap();
        assert_eq!(schema.doc_count, Some(1));
        assert_eq!(schema.fields[0].id, "name");

        let result = backend.query(&dataset(&second), &QueryState::new()).await.unwrap();
        assert_eq!(result.rows, vec![json!({"id": 0, "name": "solo"})]);
    }

    #[tokio::test]
    async fn test_drop_dataset() {
        let config = config();
        let backend = MemoryBackend::new();
        backend.read_schema(&dataset(&config)).await.unwrap();
        assert!(backend.drop_dataset("test"));
        assert_eq!(backend.row_count("test"), None);
        assert!(!backend.drop_dataset("test"));
    }
}

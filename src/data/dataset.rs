//! The Dataset façade
//!
//! A [`Dataset`] owns one backend config, the adapter resolved for it at
//! construction, the schema read by [`Dataset::fetch`] and the page of
//! documents materialized by the last [`Dataset::query`].

use crate::backend::{Backend, BackendKind, BackendRegistry, BackendResult, DatasetRef};
use crate::config::backend_config::{BackendConfig, MemoryData};
use crate::data::csv_parser::{parse_csv_documents, CsvOptions};
use crate::data::document::{assign_index_ids, fields_from_headers, infer_fields, row_id, Document, Field};
use crate::data::query::{FacetResult, QueryResponse, QueryState};
use chrono::Local;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

static NEXT_DATASET: AtomicU64 = AtomicU64::new(1);

/// A process-unique dataset id
pub fn generate_dataset_id() -> String {
    format!(
        "dataset-{}-{}",
        Local::now().format("%Y%m%d%H%M%S"),
        NEXT_DATASET.fetch_add(1, Ordering::Relaxed)
    )
}

pub struct Dataset {
    id: String,
    config: BackendConfig,
    backend: Arc<dyn Backend>,
    fields: Vec<Field>,
    doc_count: Option<usize>,
    current_documents: Vec<Document>,
    facets: Option<BTreeMap<String, FacetResult>>,
    last_total: usize,
    last_query: QueryState,
}

impl std::fmt::Debug for Dataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dataset")
            .field("id", &self.id)
            .field("backend", &self.backend.kind())
            .field("fields", &self.fields.len())
            .field("doc_count", &self.doc_count)
            .field("current_documents", &self.current_documents.len())
            .finish()
    }
}

impl Dataset {
    /// Resolve the adapter for `config` from `registry`
    pub fn new(id: impl Into<String>, config: BackendConfig, registry: &BackendRegistry) -> BackendResult<Self> {
        let backend = registry.get(config.kind())?;
        Ok(Self::with_backend(id, config, backend))
    }

    pub fn with_backend(id: impl Into<String>, config: BackendConfig, backend: Arc<dyn Backend>) -> Self {
        Self {
            id: id.into(),
            config,
            backend,
            fields: Vec::new(),
            doc_count: None,
            current_documents: Vec::new(),
            facets: None,
            last_total: 0,
            last_query: QueryState::default(),
        }
    }

    /// Build an in-memory dataset from rows and read its schema.
    ///
    /// Fields default to the first row's keys and the id to a generated
    /// one. Rows without an `id` get their index as id.
    pub async fn create(
        mut rows: Vec<Value>,
        fields: Option<Vec<Field>>,
        id: Option<String>,
        registry: &BackendRegistry,
    ) -> BackendResult<Self> {
        let fields = fields.unwrap_or_else(|| infer_fields(&rows));
        assign_index_ids(&mut rows);
        let config = BackendConfig::Memory {
            data: MemoryData::from_fields(&fields, rows),
        };
        let mut dataset = Self::new(id.unwrap_or_else(generate_dataset_id), config, registry)?;
        dataset.fetch().await?;
        Ok(dataset)
    }

    /// Parse CSV text with a header row into an in-memory dataset
    pub async fn from_csv(
        text: &str,
        options: &CsvOptions,
        id: Option<String>,
        registry: &BackendRegistry,
    ) -> BackendResult<Self> {
        let parsed = parse_csv_documents(text, options);
        debug!(columns = parsed.headers.len(), rows = parsed.rows.len(), "Parsed CSV");
        Self::create(parsed.rows, Some(fields_from_headers(&parsed.headers)), id, registry).await
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Total rows known to the backend, if it reported one
    pub fn doc_count(&self) -> Option<usize> {
        self.doc_count
    }

    pub fn current_documents(&self) -> &[Document] {
        &self.current_documents
    }

    pub fn facets(&self) -> Option<&BTreeMap<String, FacetResult>> {
        self.facets.as_ref()
    }

    pub fn last_query(&self) -> &QueryState {
        &self.last_query
    }

    fn dataset_ref(&self) -> DatasetRef<'_> {
        DatasetRef {
            id: &self.id,
            config: &self.config,
            fields: &self.fields,
        }
    }

    /// Read fields and document count from the backend
    pub async fn fetch(&mut self) -> BackendResult<&[Field]> {
        let schema = self.backend.read_schema(&self.dataset_ref()).await?;
        info!(
            dataset = %self.id,
            backend = %self.backend.kind(),
            fields = schema.fields.len(),
            doc_count = ?schema.doc_count,
            "Fetched schema"
        );
        self.fields = schema.fields;
        self.doc_count = schema.doc_count;
        Ok(&self.fields)
    }

    /// Run `query` and replace the current page with its result
    pub async fn query(&mut self, query: QueryState) -> BackendResult<QueryResponse> {
        crate::trace_query!(self.id, query);
        let result = self.backend.query(&self.dataset_ref(), &query).await?;

        let mut rows = result.rows;
        rows.truncate(query.size);
        let documents = materialize(rows, query.offset);

        if let Some(count) = self.doc_count {
            self.doc_count = Some(count.max(documents.len()));
        }
        debug!(
            dataset = %self.id,
            documents = documents.len(),
            total = result.total,
            "Query materialized"
        );

        self.current_documents = documents;
        self.facets = result.facets;
        self.last_total = result.total;
        self.last_query = query;
        Ok(self.to_response())
    }

    /// Re-run the last query
    pub async fn requery(&mut self) -> BackendResult<QueryResponse> {
        let query = self.last_query.clone();
        self.query(query).await
    }

    /// Write `document` through the backend and refresh it in the current page
    pub async fn save(&mut self, document: &Document) -> BackendResult<Document> {
        let saved = self.backend.update(&self.dataset_ref(), document).await?;
        if let Some(slot) = self
            .current_documents
            .iter_mut()
            .find(|d| d.id() == saved.id())
        {
            *slot = saved.clone();
        }
        Ok(saved)
    }

    /// Delete `document` through the backend and drop it from the current page
    pub async fn destroy(&mut self, document: &Document) -> BackendResult<()> {
        self.backend.delete(&self.dataset_ref(), document).await?;
        let before = self.current_documents.len();
        self.current_documents.retain(|d| d.id() != document.id());
        if self.current_documents.len() < before {
            self.doc_count = self.doc_count.map(|n| n.saturating_sub(1));
        }
        Ok(())
    }

    /// The current page in the shape handed to views
    pub fn to_response(&self) -> QueryResponse {
        QueryResponse {
            total: self.last_total,
            documents: self.current_documents.clone(),
            facets: self.facets.clone(),
        }
    }
}

/// Wrap raw rows as documents with ids unique within the page. A row keeps
/// its own id unless an earlier row already used it; otherwise it gets
/// `row-<position>`.
fn materialize(rows: Vec<Value>, offset: usize) -> Vec<Document> {
    let mut seen = HashSet::new();
    rows.into_iter()
        .enumerate()
        .map(|(i, row)| {
            let own = row_id(&row).filter(|id| !seen.contains(id));
            let id = match own {
                Some(id) => id,
                None => {
                    let mut id = format!("row-{}", offset + i);
                    let mut n = 1;
                    while seen.contains(&id) {
                        id = format!("row-{}-{}", offset + i, n);
                        n += 1;
                    }
                    id
                }
            };
            seen.insert(id.clone());
            let attributes = match row {
                Value::Object(map) => map,
                other => {
                    let mut map = Map::new();
                    map.insert("value".to_string(), other);
                    map
                }
            };
            Document::new(id, attributes)
        })
        .collect()
}

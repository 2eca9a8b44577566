//! Read-only adapter for a remote paginated store
//!
//! Schema: `GET {url}/schema.json` answering
//! `{"data": [{"name": "x", "type": "integer"}, ...], "count": 123}`.
//! Rows: `GET {url}.json?_limit=N&_offset=K` answering `{"data": [...]}`.
//! The server's page order is trusted as is. Pages without a `count` report
//! the schema's count as their total once the schema has been read.

use crate::backend::remote::RemoteClient;
use crate::backend::{config_mismatch, Backend, BackendKind, BackendResult, DatasetRef, Schema};
use crate::config::backend_config::BackendConfig;
use crate::data::document::{Field, FieldType};
use crate::data::query::{QueryResult, QueryState};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

#[derive(Debug, Deserialize)]
struct ColumnInfo {
    name: String,
    #[serde(default, rename = "type")]
    column_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SchemaResponse {
    #[serde(default)]
    data: Vec<ColumnInfo>,
    #[serde(default)]
    count: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct PageResponse {
    #[serde(default)]
    data: Vec<Value>,
    #[serde(default)]
    count: Option<usize>,
}

fn map_column_type(name: &str) -> Option<FieldType> {
    match name.to_ascii_lowercase().as_str() {
        "integer" | "int" | "bigint" => Some(FieldType::Integer),
        "float" | "real" | "double" | "numeric" | "number" => Some(FieldType::Number),
        "date" | "datetime" | "timestamp" => Some(FieldType::Date),
        "boolean" | "bool" => Some(FieldType::Boolean),
        "text" | "string" | "varchar" => Some(FieldType::String),
        _ => None,
    }
}

#[derive(Debug, Default)]
pub struct WebstoreBackend {
    client: RemoteClient,
    /// Schema `count` per base url
    counts: Mutex<HashMap<String, usize>>,
}

impl WebstoreBackend {
    pub fn new(client: RemoteClient) -> Self {
        Self {
            client,
            counts: Mutex::new(HashMap::new()),
        }
    }

    fn counts(&self) -> MutexGuard<'_, HashMap<String, usize>> {
        self.counts.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn base_url<'a>(&self, dataset: &'a DatasetRef<'_>) -> BackendResult<&'a str> {
        match dataset.config {
            BackendConfig::Webstore { url } => Ok(url.trim_end_matches('/')),
            _ => Err(config_mismatch(dataset, BackendKind::Webstore)),
        }
    }
}

#[async_trait]
impl Backend for WebstoreBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Webstore
    }

    async fn read_schema(&self, dataset: &DatasetRef<'_>) -> BackendResult<Schema> {
        let base = self.base_url(dataset)?;
        let schema: SchemaResponse = self
            .client
            .get_json(&format!("{}/schema.json", base), &[])
            .await?;
        let fields = schema
            .data
            .into_iter()
            .map(|column| {
                let field = Field::new(column.name);
                match column.column_type.as_deref().and_then(map_column_type) {
                    Some(t) => field.with_type(t),
                    None => field,
                }
            })
            .collect();
        match schema.count {
            Some(count) => self.counts().insert(base.to_string(), count),
            None => self.counts().remove(base),
        };
        Ok(Schema::new(fields, schema.count))
    }

    async fn query(&self, dataset: &DatasetRef<'_>, query: &QueryState) -> BackendResult<QueryResult> {
        let base = self.base_url(dataset)?;
        let params = [
            ("_limit", query.size.to_string()),
            ("_offset", query.offset.to_string()),
        ];
        let mut page: PageResponse = self
            .client
            .get_json(&format!("{}.json", base), &params)
            .await?;
        page.data.truncate(query.size);
        let total = page
            .count
            .or_else(|| self.counts().get(base).copied())
            .unwrap_or(query.offset + page.data.len());
        debug!(dataset = dataset.id, rows = page.data.len(), total, "Webstore page");
        Ok(QueryResult::new(page.data, total))
    }
}

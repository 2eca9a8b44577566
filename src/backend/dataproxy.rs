//! Read-only adapter for a DataProxy service
//!
//! The proxy converts a remote CSV/XLS file to JSON:
//! `GET {proxy}?url={source}&max-results=N&type=csv` answers
//! `{"fields": ["a", "b"], "data": [[1, 2], ...]}`. It has no offset
//! parameter, so a page is fetched as the first `offset + size` rows and
//! the leading `offset` rows are dropped here.

use crate::backend::remote::RemoteClient;
use crate::backend::{config_mismatch, Backend, BackendKind, BackendResult, DatasetRef, Schema};
use crate::config::backend_config::BackendConfig;
use crate::config::config::DEFAULT_DATAPROXY_URL;
use crate::data::document::fields_from_headers;
use crate::data::query::{QueryResult, QueryState};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

#[derive(Debug, Deserialize)]
struct ProxyResponse {
    #[serde(default)]
    fields: Vec<String>,
    #[serde(default)]
    data: Vec<Vec<Value>>,
}

/// Zip header names with each row of cells
fn zip_rows(fields: &[String], rows: impl IntoIterator<Item = Vec<Value>>) -> Vec<Value> {
    rows.into_iter()
        .map(|cells| {
            let object: Map<String, Value> = fields.iter().cloned().zip(cells).collect();
            Value::Object(object)
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct DataProxyBackend {
    client: RemoteClient,
    proxy_url: String,
}

impl Default for DataProxyBackend {
    fn default() -> Self {
        Self::new(RemoteClient::default(), DEFAULT_DATAPROXY_URL)
    }
}

impl DataProxyBackend {
    pub fn new(client: RemoteClient, proxy_url: impl Into<String>) -> Self {
        Self {
            client,
            proxy_url: proxy_url.into(),
        }
    }

    async fn fetch(&self, dataset: &DatasetRef<'_>, max_results: usize) -> BackendResult<ProxyResponse> {
        let (url, format) = match dataset.config {
            BackendConfig::Dataproxy { url, format } => (url.as_str(), *format),
            _ => return Err(config_mismatch(dataset, BackendKind::Dataproxy)),
        };
        let params = [
            ("url", url.to_string()),
            ("max-results", max_results.to_string()),
            ("type", format.as_str().to_string()),
        ];
        self.client.get_json(&self.proxy_url, &params).await
    }
}

#[async_trait]
impl Backend for DataProxyBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Dataproxy
    }

    async fn read_schema(&self, dataset: &DatasetRef<'_>) -> BackendResult<Schema> {
        let response = self.fetch(dataset, 1).await?;
        Ok(Schema::new(fields_from_headers(&response.fields), None))
    }

    async fn query(&self, dataset: &DatasetRef<'_>, query: &QueryState) -> BackendResult<QueryResult> {
        let wanted = query.offset.saturating_add(query.size);
        let response = self.fetch(dataset, wanted).await?;
        let fetched = response.data.len();
        let page = response
            .data
            .into_iter()
            .skip(query.offset)
            .take(query.size);
        let rows = zip_rows(&response.fields, page);
        debug!(dataset = dataset.id, fetched, rows = rows.len(), "DataProxy page");
        Ok(QueryResult::new(rows, fetched))
    }
}

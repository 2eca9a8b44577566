//! Read-only spreadsheet adapter
//!
//! Reads a whole spreadsheet list feed in one request:
//!
//! ```json
//! {"feed": {"entry": [{"gsx$name": {"$t": "Ann"}, "gsx$share": {"$t": "22.5%"}}]}}
//! ```
//!
//! The feed becomes a header list plus rows of cells, cached per dataset.
//! Paging, sorting and filtering then run locally on the cached grid.

use crate::backend::remote::RemoteClient;
use crate::backend::{
    config_mismatch, Backend, BackendError, BackendKind, BackendResult, DatasetRef, Schema,
};
use crate::config::backend_config::BackendConfig;
use crate::data::document::{fields_from_headers, infer_field_types, Field};
use crate::data::query::{QueryResult, QueryState};
use crate::data::query_engine::QueryEngine;
use async_trait::async_trait;
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};
use tracing::info;

const COLUMN_PREFIX: &str = "gsx$";

/// Header names plus one row of cells per feed entry
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Grid {
    pub header: Vec<String>,
    pub data: Vec<Vec<Value>>,
}

impl Grid {
    /// Rows as objects keyed by header name
    pub fn to_rows(&self) -> Vec<Value> {
        self.data
            .iter()
            .map(|cells| {
                let object: Map<String, Value> =
                    self.header.iter().cloned().zip(cells.iter().cloned()).collect();
                Value::Object(object)
            })
            .collect()
    }
}

static PERCENT_PATTERN: OnceLock<Regex> = OnceLock::new();

fn percent_pattern() -> &'static Regex {
    PERCENT_PATTERN.get_or_init(|| Regex::new(r"^([\d.\-]+)%$").unwrap())
}

/// "22.5%" -> 0.225; anything else is left alone
fn convert_percent(value: Value) -> Value {
    let Value::String(text) = &value else {
        return value;
    };
    let parsed = percent_pattern()
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .and_then(|n| serde_json::Number::from_f64(n / 100.0));
    match parsed {
        Some(number) => Value::Number(number),
        None => value,
    }
}

/// Convert a spreadsheet list feed into a [`Grid`].
///
/// Columns are `columns_to_use` when given, otherwise the first entry's
/// `gsx$` keys with the prefix removed. Columns typed `percent` in
/// `col_types` have their `NN%` strings turned into fractions.
pub fn gdocs_to_grid(
    feed: &Value,
    columns_to_use: Option<&[String]>,
    col_types: &BTreeMap<String, String>,
) -> Grid {
    let entries: &[Value] = feed
        .pointer("/feed/entry")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[]);

    let header: Vec<String> = match columns_to_use {
        Some(columns) => columns.to_vec(),
        None => entries
            .first()
            .and_then(Value::as_object)
            .map(|entry| {
                entry
                    .keys()
                    .filter_map(|k| k.strip_prefix(COLUMN_PREFIX))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default(),
    };

    let data = entries
        .iter()
        .map(|entry| {
            header
                .iter()
                .map(|column| {
                    let cell = entry
                        .get(format!("{}{}", COLUMN_PREFIX, column))
                        .and_then(|c| c.get("$t"))
                        .cloned()
                        .unwrap_or(Value::Null);
                    if col_types.get(column).map(String::as_str) == Some("percent") {
                        convert_percent(cell)
                    } else {
                        cell
                    }
                })
                .collect()
        })
        .collect();

    Grid { header, data }
}

#[derive(Debug)]
struct CachedSheet {
    fields: Vec<Field>,
    rows: Vec<Value>,
}

#[derive(Debug, Default)]
pub struct GdocsBackend {
    client: RemoteClient,
    engine: QueryEngine,
    sheets: Mutex<HashMap<String, Arc<CachedSheet>>>,
}

impl GdocsBackend {
    pub fn new(client: RemoteClient, engine: QueryEngine) -> Self {
        Self {
            client,
            engine,
            sheets: Mutex::new(HashMap::new()),
        }
    }

    fn sheets(&self) -> MutexGuard<'_, HashMap<String, Arc<CachedSheet>>> {
        self.sheets.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn load(&self, dataset: &DatasetRef<'_>) -> BackendResult<Arc<CachedSheet>> {
        let BackendConfig::Gdocs {
            url,
            columns_to_use,
            col_types,
        } = dataset.config
        else {
            return Err(config_mismatch(dataset, BackendKind::Gdocs));
        };

        let feed: Value = self.client.get_json(url, &[]).await?;
        if feed.pointer("/feed").is_none() {
            return Err(BackendError::Decode("spreadsheet response has no feed".into()));
        }
        let grid = gdocs_to_grid(&feed, columns_to_use.as_deref(), col_types);
        let rows = grid.to_rows();
        let mut fields = fields_from_headers(&grid.header);
        infer_field_types(&mut fields, &rows);
        info!(dataset = dataset.id, rows = rows.len(), columns = fields.len(), "Loaded spreadsheet");

        let sheet = Arc::new(CachedSheet { fields, rows });
        self.sheets()
            .insert(dataset.id.to_string(), Arc::clone(&sheet));
        Ok(sheet)
    }

    fn cached(&self, dataset_id: &str) -> Option<Arc<CachedSheet>> {
        self.sheets().get(dataset_id).cloned()
    }
}

#[async_trait]
impl Backend for GdocsBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Gdocs
    }

    /// Always refetches and replaces the cached grid
    async fn read_schema(&self, dataset: &DatasetRef<'_>) -> BackendResult<Schema> {
        let sheet = self.load(dataset).await?;
        Ok(Schema::new(sheet.fields.clone(), Some(sheet.rows.len())))
    }

    async fn query(&self, dataset: &DatasetRef<'_>, query: &QueryState) -> BackendResult<QueryResult> {
        let sheet = match self.cached(dataset.id) {
            Some(sheet) => sheet,
            None => self.load(dataset).await?,
        };
        Ok(self.engine.execute(&sheet.rows, &sheet.fields, query))
    }
}

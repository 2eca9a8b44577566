use crate::backend::BackendRegistry;
use crate::data::csv_parser::CsvOptions;
use crate::data::dataset::Dataset;
use anyhow::{Context, Result};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

/// Loads local CSV and JSON files into in-memory datasets
pub struct DataLoaderService {
    registry: Arc<BackendRegistry>,
    csv_options: CsvOptions,
}

impl DataLoaderService {
    pub fn new(registry: Arc<BackendRegistry>) -> Self {
        Self {
            registry,
            csv_options: CsvOptions::default(),
        }
    }

    pub fn with_csv_options(mut self, csv_options: CsvOptions) -> Self {
        self.csv_options = csv_options;
        self
    }

    /// Load a `.csv` (header row first) or `.json` (array of objects) file.
    /// The dataset id is the file stem.
    pub async fn load_file(&self, file_path: impl AsRef<Path>) -> Result<DataLoadResult> {
        let path = file_path.as_ref();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| anyhow::anyhow!("File has no extension: {}", path.display()))?;
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("data")
            .to_string();

        let start = Instant::now();
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;

        let dataset = match extension.to_lowercase().as_str() {
            "csv" => {
                info!("Loading CSV file: {}", path.display());
                Dataset::from_csv(&text, &self.csv_options, Some(name.clone()), &self.registry).await?
            }
            "json" => {
                info!("Loading JSON file: {}", path.display());
                let rows = parse_json_rows(&text)
                    .with_context(|| format!("Failed to parse {}", path.display()))?;
                Dataset::create(rows, None, Some(name.clone()), &self.registry).await?
            }
            _ => {
                return Err(anyhow::anyhow!(
                    "Unsupported file type: {}. Use .csv or .json files.",
                    extension
                ))
            }
        };

        Ok(DataLoadResult {
            row_count: dataset.doc_count().unwrap_or(0),
            column_count: dataset.fields().len(),
            dataset,
            source_path: path.display().to_string(),
            name,
            load_time: start.elapsed(),
        })
    }
}

/// A JSON document that must be an array of objects
fn parse_json_rows(text: &str) -> Result<Vec<Value>> {
    let value: Value = serde_json::from_str(text)?;
    let Value::Array(rows) = value else {
        anyhow::bail!("Expected a JSON array of objects");
    };
    if let Some(position) = rows.iter().position(|row| !row.is_object()) {
        anyhow::bail!("Element {} is not an object", position);
    }
    Ok(rows)
}

/// Result of loading a file
#[derive(Debug)]
pub struct DataLoadResult {
    /// The loaded dataset, schema already fetched
    pub dataset: Dataset,

    pub source_path: String,

    /// Dataset id (the file stem)
    pub name: String,

    pub row_count: usize,
    pub column_count: usize,
    pub load_time: Duration,
}

impl DataLoadResult {
    /// Generate a status message for the load operation
    pub fn status_message(&self) -> String {
        format!(
            "Loaded {} ({} rows, {} columns) in {} ms",
            self.source_path,
            self.row_count,
            self.column_count,
            self.load_time.as_millis()
        )
    }
}

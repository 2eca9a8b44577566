use crate::data::document::{Document, Field};
use crate::data::value_compare::display_value;
use anyhow::{anyhow, Result};
use chrono::Local;
use serde_json::Value;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            other => Err(anyhow!("Unknown export format: {}", other)),
        }
    }
}

/// Handles exporting a page of documents to CSV or JSON
pub struct DataExporter;

impl DataExporter {
    /// CSV text with a header row of field labels, one line per document
    pub fn to_csv(fields: &[Field], documents: &[Document]) -> Result<String> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(fields.iter().map(|f| f.label()))?;
        for doc in documents {
            writer.write_record(
                fields
                    .iter()
                    .map(|f| doc.get(&f.id).map(display_value).unwrap_or_default()),
            )?;
        }
        let bytes = writer.into_inner().map_err(|e| anyhow!(e.to_string()))?;
        Ok(String::from_utf8(bytes)?)
    }

    /// Pretty JSON array of the raw documents
    pub fn to_json(documents: &[Document]) -> Result<String> {
        let rows: Vec<Value> = documents.iter().map(Document::to_json).collect();
        Ok(serde_json::to_string_pretty(&rows)?)
    }

    pub fn render(format: ExportFormat, fields: &[Field], documents: &[Document]) -> Result<String> {
        match format {
            ExportFormat::Csv => Self::to_csv(fields, documents),
            ExportFormat::Json => Self::to_json(documents),
        }
    }

    /// Write to `dir` under a timestamped name and return the path
    pub fn export_to_file(
        format: ExportFormat,
        fields: &[Field],
        documents: &[Document],
        dir: &Path,
    ) -> Result<PathBuf> {
        if documents.is_empty() {
            return Err(anyhow!("No data to export"));
        }
        let timestamp = Local::now().format("%Y%m%d_%H%M%S");
        let path = dir.join(format!("export_{}.{}", timestamp, format.extension()));
        let content = Self::render(format, fields, documents)?;
        let mut file = File::create(&path)?;
        file.write_all(content.as_bytes())?;
        Ok(path)
    }
}

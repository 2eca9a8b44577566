//! Per-dataset backend configuration
//!
//! Serialized as `{"type": "<kind>", ...}` with the adapter's own fields.

use crate::backend::BackendKind;
use crate::data::document::{fields_from_headers, infer_fields, Field};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// A header entry in memory data: a bare field id or a full field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HeaderSpec {
    Name(String),
    Field(Field),
}

impl HeaderSpec {
    pub fn to_field(&self) -> Field {
        match self {
            HeaderSpec::Name(name) => Field::new(name.as_str()),
            HeaderSpec::Field(field) => field.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryData {
    #[serde(default)]
    pub headers: Vec<HeaderSpec>,
    #[serde(default)]
    pub rows: Vec<Value>,
}

impl MemoryData {
    pub fn new(headers: Vec<HeaderSpec>, rows: Vec<Value>) -> Self {
        Self { headers, rows }
    }

    pub fn from_fields(fields: &[Field], rows: Vec<Value>) -> Self {
        let headers = fields.iter().cloned().map(HeaderSpec::Field).collect();
        Self { headers, rows }
    }

    /// Declared headers, or the first row's keys when none are declared
    pub fn fields(&self) -> Vec<Field> {
        if self.headers.is_empty() {
            infer_fields(&self.rows)
        } else {
            self.headers.iter().map(HeaderSpec::to_field).collect()
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataProxyFormat {
    #[default]
    Csv,
    Xls,
}

impl DataProxyFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataProxyFormat::Csv => "csv",
            DataProxyFormat::Xls => "xls",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BackendConfig {
    Memory {
        #[serde(default)]
        data: MemoryData,
    },
    Webstore {
        url: String,
    },
    Dataproxy {
        url: String,
        #[serde(default)]
        format: DataProxyFormat,
    },
    Gdocs {
        url: String,
        #[serde(
            default,
            rename = "columnsToUse",
            skip_serializing_if = "Option::is_none"
        )]
        columns_to_use: Option<Vec<String>>,
        #[serde(default, rename = "colTypes", skip_serializing_if = "BTreeMap::is_empty")]
        col_types: BTreeMap<String, String>,
    },
    Localindex {},
}

impl BackendConfig {
    pub fn kind(&self) -> BackendKind {
        match self {
            BackendConfig::Memory { .. } => BackendKind::Memory,
            BackendConfig::Webstore { .. } => BackendKind::Webstore,
            BackendConfig::Dataproxy { .. } => BackendKind::Dataproxy,
            BackendConfig::Gdocs { .. } => BackendKind::Gdocs,
            BackendConfig::Localindex {} => BackendKind::Localindex,
        }
    }

    pub fn memory(headers: &[&str], rows: Vec<Value>) -> Self {
        let headers = fields_from_headers(headers)
            .into_iter()
            .map(HeaderSpec::Field)
            .collect();
        BackendConfig::Memory {
            data: MemoryData::new(headers, rows),
        }
    }

    pub fn webstore(url: impl Into<String>) -> Self {
        BackendConfig::Webstore { url: url.into() }
    }

    pub fn dataproxy(url: impl Into<String>, format: DataProxyFormat) -> Self {
        BackendConfig::Dataproxy {
            url: url.into(),
            format,
        }
    }

    pub fn gdocs(url: impl Into<String>) -> Self {
        BackendConfig::Gdocs {
            url: url.into(),
            columns_to_use: None,
            col_types: BTreeMap::new(),
        }
    }

    pub fn localindex() -> Self {
        BackendConfig::Localindex {}
    }
}

//! Backend adapters
//!
//! Every data source implements [`Backend`]. A [`BackendRegistry`] built at
//! startup maps each [`BackendKind`] to one adapter instance; datasets
//! resolve their adapter from it once, at construction.

use crate::config::backend_config::BackendConfig;
use crate::data::document::{Document, Field};
use crate::data::query::{QueryResult, QueryState};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub mod dataproxy;
pub mod error;
pub mod gdocs;
pub mod local_index;
pub mod memory;
pub mod registry;
pub mod remote;
pub mod store;
pub mod timeout;
pub mod webstore;

pub use error::{BackendError, BackendResult};
pub use registry::BackendRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Memory,
    Webstore,
    Dataproxy,
    Gdocs,
    Localindex,
}

impl BackendKind {
    pub const ALL: [BackendKind; 5] = [
        BackendKind::Memory,
        BackendKind::Webstore,
        BackendKind::Dataproxy,
        BackendKind::Gdocs,
        BackendKind::Localindex,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Memory => "memory",
            BackendKind::Webstore => "webstore",
            BackendKind::Dataproxy => "dataproxy",
            BackendKind::Gdocs => "gdocs",
            BackendKind::Localindex => "localindex",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BackendKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("Unknown backend type: {}", s))
    }
}

/// What an adapter may see of the dataset it serves
#[derive(Debug, Clone, Copy)]
pub struct DatasetRef<'a> {
    pub id: &'a str,
    pub config: &'a BackendConfig,
    pub fields: &'a [Field],
}

/// Result of reading a dataset's schema
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    pub fields: Vec<Field>,
    pub doc_count: Option<usize>,
}

impl Schema {
    pub fn new(fields: Vec<Field>, doc_count: Option<usize>) -> Self {
        Self { fields, doc_count }
    }
}

/// The adapter protocol. Read paths are required; writes default to
/// [`BackendError::Unsupported`].
#[async_trait]
pub trait Backend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Fields and total row count of the dataset
    async fn read_schema(&self, dataset: &DatasetRef<'_>) -> BackendResult<Schema>;

    /// One page of rows. Filters and sort apply to the whole eligible set
    /// before `offset`/`size` are taken.
    async fn query(&self, dataset: &DatasetRef<'_>, query: &QueryState) -> BackendResult<QueryResult>;

    /// Overwrite the row with the document's id; `NotFound` if there is none
    async fn update(&self, dataset: &DatasetRef<'_>, document: &Document) -> BackendResult<Document> {
        let _ = (dataset, document);
        Err(BackendError::unsupported(self.kind(), "update"))
    }

    /// Remove the row with the document's id. Deleting a missing id succeeds.
    async fn delete(&self, dataset: &DatasetRef<'_>, document: &Document) -> BackendResult<()> {
        let _ = (dataset, document);
        Err(BackendError::unsupported(self.kind(), "delete"))
    }
}

pub(crate) fn config_mismatch(dataset: &DatasetRef<'_>, expected: BackendKind) -> BackendError {
    BackendError::ConfigMismatch {
        expected,
        dataset: dataset.id.to_string(),
    }
}

/// Fail unless `dataset` is configured for `expected`
pub(crate) fn expect_kind(dataset: &DatasetRef<'_>, expected: BackendKind) -> BackendResult<()> {
    if dataset.config.kind() == expected {
        Ok(())
    } else {
        Err(config_mismatch(dataset, expected))
    }
}

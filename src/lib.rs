pub mod backend;
pub mod config;
pub mod data;
pub mod services;
pub mod utils;

pub use backend::{Backend, BackendError, BackendKind, BackendRegistry};
pub use config::backend_config::BackendConfig;
pub use config::config::Config;
pub use data::dataset::Dataset;
pub use data::document::{Document, Field, FieldType};
pub use data::query::{FacetResult, QueryResponse, QueryResult, QueryState};

pub mod bulk_edit_service;
pub mod data_loader_service;

pub use bulk_edit_service::{BulkEditReport, BulkEditService};
pub use data_loader_service::{DataLoadResult, DataLoaderService};

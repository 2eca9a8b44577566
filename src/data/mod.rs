//! Data layer: documents, the query pipeline and the Dataset façade
//!
//! Leaf modules first: parsing and value handling, then the query engine
//! and its dimensional index, then [`dataset::Dataset`] on top.

pub mod csv_parser;
pub mod data_exporter;
pub mod dataset;
pub mod dimension;
pub mod document;
pub mod facets;
pub mod query;
pub mod query_engine;
pub mod transform;
pub mod value_compare;

//! Configuration module
//!
//! Application settings (`config.toml`) and per-dataset backend configuration.

pub mod backend_config;
#[allow(clippy::module_inception)]
pub mod config;

use anyhow::{anyhow, Result};
use std::fs;
use std::path::PathBuf;

pub struct AppPaths;

impl AppPaths {
    pub fn data_dir() -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow!("Cannot determine data directory"))?
            .join("data-explorer");

        fs::create_dir_all(&data_dir)?;
        Ok(data_dir)
    }

    /// Default home of the local document store
    pub fn store_dir() -> Result<PathBuf> {
        let store_dir = Self::data_dir()?.join("store");
        fs::create_dir_all(&store_dir)?;
        Ok(store_dir)
    }

    pub fn export_dir() -> Result<PathBuf> {
        let export_dir = Self::data_dir()?.join("exports");
        fs::create_dir_all(&export_dir)?;
        Ok(export_dir)
    }
}

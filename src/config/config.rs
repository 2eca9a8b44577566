use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_DATAPROXY_URL: &str = "http://jsonpdataproxy.appspot.com";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub backend: BackendSettings,
    pub query: QuerySettings,
    pub storage: StorageSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendSettings {
    /// Seconds to wait for a remote backend before failing with a timeout
    pub request_timeout_secs: u64,

    /// Base URL of the DataProxy service
    pub dataproxy_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuerySettings {
    /// Page size used when a query does not set one
    pub default_page_size: usize,

    /// Terms kept per facet
    pub facet_size: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Directory of the local document store
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Filter used when RUST_LOG is not set
    pub level: String,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            request_timeout_secs: 5,
            dataproxy_url: DEFAULT_DATAPROXY_URL.to_string(),
        }
    }
}

impl Default for QuerySettings {
    fn default() -> Self {
        Self {
            default_page_size: 100,
            facet_size: 10,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl BackendSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Config {
    /// Load config from the default location
    pub fn load() -> Result<Self> {
        let config_path = Self::get_config_path()?;

        if !config_path.exists() {
            // Create default config if it doesn't exist
            let default_config = Self::default();
            default_config.save()?;
            return Ok(default_config);
        }

        Self::load_from(&config_path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save config to the default location
    pub fn save(&self) -> Result<()> {
        let config_path = Self::get_config_path()?;

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        fs::write(&config_path, contents)?;

        Ok(())
    }

    /// Get the default config file path
    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("data-explorer").join("config.toml"))
    }

    /// Directory of the local document store, configured or default
    pub fn store_dir(&self) -> Result<PathBuf> {
        match &self.storage.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => crate::utils::app_paths::AppPaths::store_dir(),
        }
    }

    /// Create a default config file with comments
    pub fn create_default_with_comments() -> String {
        r#"# Data Explorer Configuration File
# Location: ~/.config/data-explorer/config.toml (Linux)
#           ~/Library/Application Support/data-explorer/config.toml (macOS)
#           %APPDATA%\data-explorer\config.toml (Windows)

[backend]
# Seconds to wait for webstore/dataproxy/gdocs before giving up
request_timeout_secs = 5

# DataProxy service used by the dataproxy backend
dataproxy_url = "http://jsonpdataproxy.appspot.com"

[query]
# Rows per page when a query does not say
default_page_size = 100

# Terms kept per facet
facet_size = 10

[storage]
# Local document store (leave commented to use the default data directory)
# data_dir = "/path/to/store"

[logging]
# Log filter, e.g. "info" or "data_explorer=debug". RUST_LOG takes precedence.
level = "info"
"#
        .to_string()
    }
}

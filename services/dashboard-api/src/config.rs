//! Service configuration loaded from `config.yml`.
//!
//! Every section is optional; missing keys take their defaults. CLI flags
//! override the `server` and `logging` sections after loading.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use dashboard::{ControllerConfig, NotifyConfig, RefreshConfig, DEFAULT_QUEUE_CAPACITY};
use storage::{BlobCatalog, ObjectStorage, ObjectStorageConfig};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub storage: ObjectStorageConfig,
    pub catalog: CatalogConfig,
    pub dashboard: DashboardSection,
    pub notify: NotifyConfig,
    pub basemap: BasemapConfig,
}

impl Config {
    /// Load the configuration file. Returns `None` if it does not exist.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config = Self::from_yaml(&text)
            .with_context(|| format!("invalid configuration in {}", path.display()))?;
        Ok(Some(config))
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        // an empty file is a valid, all-default configuration
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }

    /// Dataset catalog listing `catalog.prefix` inside the configured container.
    pub fn dataset_catalog(&self, storage: Arc<ObjectStorage>) -> BlobCatalog {
        BlobCatalog::new(storage, self.catalog.prefix.clone())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:8080".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive, e.g. `info` or `dashboard=debug,info`
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Prefix listed for dataset stores, relative to the container root
    pub prefix: String,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        // runs sit at the root of the `global-v1` container
        Self {
            prefix: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardSection {
    #[serde(flatten)]
    pub controller: ControllerConfig,
    pub refresh: RefreshConfig,
    /// Capacity of the UI event queue
    pub queue_capacity: usize,
}

impl Default for DashboardSection {
    fn default() -> Self {
        Self {
            controller: ControllerConfig::default(),
            refresh: RefreshConfig::default(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BasemapConfig {
    /// XYZ tile URL template
    pub url: String,
}

impl Default for BasemapConfig {
    fn default() -> Self {
        Self {
            url: "https://tile.openstreetmap.org/{Z}/{X}/{Y}.png".to_string(),
        }
    }
}

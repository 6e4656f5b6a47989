//! Object storage interface for dataset stores (Azure Blob, S3, local disk).

use bytes::Bytes;
use object_store::{
    aws::AmazonS3Builder, azure::MicrosoftAzureBuilder, local::LocalFileSystem, path::Path,
    ObjectStore,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::error::{StorageError, StorageResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    Azure,
    S3,
    Local,
}

/// Configuration for object storage connection.
///
/// Credentials are never part of the config: Azure uses the environment, then
/// the Azure CLI, then managed identity; S3 reads the usual `AWS_*` variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectStorageConfig {
    pub backend: StorageBackend,
    /// Azure storage account name
    pub account: String,
    /// Azure container or S3 bucket
    pub container: String,
    /// Custom S3 endpoint (MinIO, Azurite gateway, ...)
    pub endpoint: Option<String>,
    pub region: String,
    pub allow_http: bool,
    /// Fall back to `az login` credentials
    pub use_azure_cli: bool,
    /// Root directory for the local backend
    pub root: PathBuf,
}

impl Default for ObjectStorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Azure,
            account: "seareport".to_string(),
            container: "global-v1".to_string(),
            endpoint: None,
            region: "us-east-1".to_string(),
            allow_http: false,
            use_azure_cli: true,
            root: PathBuf::from("./data"),
        }
    }
}

/// Object storage client for dataset stores.
pub struct ObjectStorage {
    store: Arc<dyn ObjectStore>,
    label: String,
}

impl std::fmt::Debug for ObjectStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStorage").field("label", &self.label).finish()
    }
}

impl ObjectStorage {
    /// Create a new object storage client from config.
    pub fn new(config: &ObjectStorageConfig) -> StorageResult<Self> {
        let (store, label): (Arc<dyn ObjectStore>, String) = match config.backend {
            StorageBackend::Azure => {
                let store = MicrosoftAzureBuilder::from_env()
                    .with_account(&config.account)
                    .with_container_name(&config.container)
                    .with_use_azure_cli(config.use_azure_cli)
                    .build()
                    .map_err(|e| StorageError::Config(format!("Failed to create Azure client: {}", e)))?;
                (
                    Arc::new(store),
                    format!("az://{}/{}", config.account, config.container),
                )
            }
            StorageBackend::S3 => {
                let mut builder = AmazonS3Builder::from_env()
                    .with_bucket_name(&config.container)
                    .with_region(&config.region);

                if let Some(endpoint) = &config.endpoint {
                    builder = builder.with_endpoint(endpoint);
                }
                if config.allow_http {
                    builder = builder.with_allow_http(true);
                }

                let store = builder
                    .build()
                    .map_err(|e| StorageError::Config(format!("Failed to create S3 client: {}", e)))?;
                (Arc::new(store), format!("s3://{}", config.container))
            }
            StorageBackend::Local => {
                let store = LocalFileSystem::new_with_prefix(&config.root).map_err(|e| {
                    StorageError::Config(format!(
                        "Failed to open local store {}: {}",
                        config.root.display(),
                        e
                    ))
                })?;
                (Arc::new(store), format!("file://{}", config.root.display()))
            }
        };

        Ok(Self { store, label })
    }

    /// Wrap an existing store, e.g. `object_store::memory::InMemory` in tests.
    pub fn from_store(store: Arc<dyn ObjectStore>, label: impl Into<String>) -> Self {
        Self {
            store,
            label: label.into(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// The underlying store, for readers that speak `object_store` directly.
    pub fn store(&self) -> Arc<dyn ObjectStore> {
        Arc::clone(&self.store)
    }

    /// Write bytes to a path.
    #[instrument(skip(self, data), fields(store = %self.label, path = %path))]
    pub async fn put(&self, path: &str, data: Bytes) -> StorageResult<()> {
        let location = Path::from(path);
        debug!(size = data.len(), "Writing object");

        self.store.put(&location, data.into()).await?;
        Ok(())
    }

    /// Read bytes from a path.
    #[instrument(skip(self), fields(store = %self.label, path = %path))]
    pub async fn get(&self, path: &str) -> StorageResult<Bytes> {
        let location = Path::from(path);

        let result = self.store.get(&location).await?;
        let bytes = result.bytes().await?;

        debug!(size = bytes.len(), "Read object");
        Ok(bytes)
    }

    /// Check if an object exists.
    pub async fn exists(&self, path: &str) -> StorageResult<bool> {
        let location = Path::from(path);

        match self.store.head(&location).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// List the immediate "directories" under a prefix.
    ///
    /// Zarr stores are directories, so this is what a dataset listing needs.
    #[instrument(skip(self), fields(store = %self.label))]
    pub async fn list_dirs(&self, prefix: &str) -> StorageResult<Vec<String>> {
        let trimmed = prefix.trim_matches('/');
        let prefix_path = (!trimmed.is_empty()).then(|| Path::from(trimmed));

        let listing = self.store.list_with_delimiter(prefix_path.as_ref()).await?;
        let dirs: Vec<String> = listing
            .common_prefixes
            .into_iter()
            .map(|p| p.to_string())
            .collect();

        debug!(count = dirs.len(), prefix = %prefix, "Listed directories");
        Ok(dirs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use object_store::memory::InMemory;

    fn memory_storage() -> ObjectStorage {
        ObjectStorage::from_store(Arc::new(InMemory::new()), "memory://test")
    }

    #[test]
    fn test_default_config_targets_seareport_account() {
        let config = ObjectStorageConfig::default();
        assert_eq!(config.backend, StorageBackend::Azure);
        assert_eq!(config.account, "seareport");
        assert!(config.use_azure_cli);
    }

    #[test]
    fn test_config_deserializes_partial_yaml() {
        let config: ObjectStorageConfig = serde_json::from_str(r#"{"backend": "local", "root": "/tmp/data"}"#).unwrap();
        assert_eq!(config.backend, StorageBackend::Local);
        assert_eq!(config.root, PathBuf::from("/tmp/data"));
        assert_eq!(config.container, "global-v1");
    }

    #[tokio::test]
    async fn test_put_get_exists() {
        let storage = memory_storage();
        storage.put("a/b.json", Bytes::from_static(b"{}")).await.unwrap();

        assert_eq!(storage.get("a/b.json").await.unwrap(), Bytes::from_static(b"{}"));
        assert!(storage.exists("a/b.json").await.unwrap());
        assert!(!storage.exists("a/c.json").await.unwrap());
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let storage = memory_storage();
        let err = storage.get("nope").await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_list_dirs_returns_immediate_children() {
        let storage = memory_storage();
        for path in ["runs/a.zarr/.zmetadata", "runs/b.zarr/.zmetadata", "runs/b.zarr/time/0"] {
            storage.put(path, Bytes::from_static(b"x")).await.unwrap();
        }

        let mut dirs = storage.list_dirs("runs/").await.unwrap();
        dirs.sort();
        assert_eq!(dirs, vec!["runs/a.zarr", "runs/b.zarr"]);
    }
}

//! Storage adapters for the seareport dashboard.
//!
//! Provides:
//! - Object storage access (Azure Blob, S3, local filesystem)
//! - The dataset catalog listing available model runs
//! - A dataset source normalizing consolidated Zarr stores

pub mod catalog;
pub mod cf_time;
pub mod error;
pub mod object_store;
pub mod zarr;

pub use self::object_store::{ObjectStorage, ObjectStorageConfig, StorageBackend};
pub use catalog::{most_recent_first, BlobCatalog};
pub use error::{StorageError, StorageResult};
pub use zarr::ZarrDatasetSource;

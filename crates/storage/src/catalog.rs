//! Dataset catalog backed by a blob-store listing.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, instrument};

use seareport_common::{CatalogError, DatasetCatalog};

use crate::object_store::ObjectStorage;

/// Lists the Zarr stores under a prefix, most recent first.
pub struct BlobCatalog {
    storage: Arc<ObjectStorage>,
    prefix: String,
}

impl BlobCatalog {
    pub fn new(storage: Arc<ObjectStorage>, prefix: impl Into<String>) -> Self {
        Self {
            storage,
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

/// Order store names most recent first and drop the newest one.
///
/// Stores are named by run date, so a reverse lexical sort is a reverse
/// chronological one. The newest store is usually still being written by the
/// producer and is skipped.
pub fn most_recent_first(mut entries: Vec<String>) -> Vec<String> {
    entries.sort();
    entries.into_iter().rev().skip(1).collect()
}

#[async_trait]
impl DatasetCatalog for BlobCatalog {
    #[instrument(skip(self), fields(prefix = %self.prefix))]
    async fn list_dataset_identifiers(&self) -> Result<Vec<String>, CatalogError> {
        let entries = self
            .storage
            .list_dirs(&self.prefix)
            .await
            .map_err(|e| CatalogError::Listing {
                prefix: self.prefix.clone(),
                message: e.to_string(),
            })?;

        let identifiers = most_recent_first(entries);
        debug!(count = identifiers.len(), "Listed datasets");
        Ok(identifiers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_most_recent_first_drops_newest() {
        let listed = names(&["g/20240102.zarr", "g/20240101.zarr", "g/20240103.zarr"]);
        assert_eq!(
            most_recent_first(listed),
            names(&["g/20240102.zarr", "g/20240101.zarr"])
        );
    }

    #[test]
    fn test_most_recent_first_empty_and_single() {
        assert!(most_recent_first(Vec::new()).is_empty());
        assert!(most_recent_first(names(&["g/a.zarr"])).is_empty());
    }
}

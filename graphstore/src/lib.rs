pub mod bridge;
pub mod bulk;
pub mod codec;
pub mod config;
pub mod errors;
pub mod fetch;
pub mod lineage;
pub mod models;
pub mod resolve;
pub mod schemas;
pub mod sync;
pub mod utils;

use crate::bridge::{with_store, GraphStore};
use crate::bulk::BulkReader;
use crate::config::StorageConfig;
use crate::errors::{Result, StorageError};
use crate::models::BulkManifest;
use crate::sync::GraphSynchronizer;
use std::path::PathBuf;

/// The main entry point for the `graphstore` library.
///
/// `GraphStorage` ties the storage side of the app graph together:
/// - a pipeline synchronizer (`GraphSynchronizer`) that resolves references,
///   derives fork lineage and publishes a bulk-import file set;
/// - a reader for the published file set;
/// - the persistence bridge that loads the file set into the external store
///   and snapshots it.
///
/// # Example
///
/// ```rust,no_run
/// use graphstore::{GraphStorage, config::StorageConfig, fetch::GraphData, sync::DataSynchronizer};
/// use tempfile::tempdir;
///
/// #[tokio::main]
/// async fn main() {
///     let dir = tempdir().unwrap();
///     let storage = GraphStorage::new(StorageConfig::new(dir.path())).await.unwrap();
///     let outcome = storage
///         .synchronizer
///         .process_graph_data(GraphData::new())
///         .await
///         .unwrap();
///     println!("{} files", outcome.manifest.tables.len());
/// }
/// ```
pub struct GraphStorage {
    pub config: StorageConfig,
    pub synchronizer: GraphSynchronizer,
}

impl GraphStorage {
    /// Creates the storage layout under the configured base directory.
    pub async fn new(config: StorageConfig) -> Result<Self> {
        if let Some(parent) = config.output_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let synchronizer = GraphSynchronizer::new(config.clone());
        Ok(Self {
            config,
            synchronizer,
        })
    }

    pub fn reader(&self) -> BulkReader {
        BulkReader::new(&self.config.output_path)
    }

    /// Manifest of the currently published file set.
    pub fn manifest(&self) -> Result<BulkManifest> {
        self.reader().read_manifest()
    }

    pub fn snapshot_exists(&self) -> bool {
        self.config.store.snapshot_path.exists()
    }

    /// Loads the published file set into the store in one bulk operation and
    /// snapshots the result. The store is stopped on every exit path.
    pub async fn load_into_store(&self, manifest: BulkManifest) -> Result<PathBuf> {
        if manifest.tables.is_empty() {
            return Err(StorageError::InvalidArg(
                "refusing to import an empty file set".into(),
            ));
        }
        let import_dir = self.config.output_path.clone();
        with_store(self.config.store.clone(), move |store| {
            Box::pin(async move {
                store.bulk_import(&manifest, &import_dir).await?;
                store.snapshot().await
            })
        })
        .await
    }

    /// Restores the configured snapshot into the store.
    pub async fn restore_snapshot(&self) -> Result<()> {
        let snapshot = self.config.store.snapshot_path.clone();
        if !snapshot.exists() {
            return Err(StorageError::NotFound(format!(
                "snapshot {}",
                snapshot.display()
            )));
        }
        with_store(self.config.store.clone(), move |store| {
            Box::pin(async move { store.restore(&snapshot).await })
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_graph_storage_initialization() {
        let dir = tempdir().unwrap();
        let config = StorageConfig::new(dir.path().join("nested"));

        let storage = GraphStorage::new(config.clone()).await;
        assert!(storage.is_ok());
        assert!(dir.path().join("nested").exists());
        assert!(!config.output_path.exists());
    }

    #[tokio::test]
    async fn missing_snapshot_is_reported_before_starting_the_store() {
        let dir = tempdir().unwrap();
        let storage = GraphStorage::new(StorageConfig::new(dir.path())).await.unwrap();
        assert!(!storage.snapshot_exists());
        assert!(matches!(
            storage.restore_snapshot().await,
            Err(StorageError::NotFound(_))
        ));
    }
}

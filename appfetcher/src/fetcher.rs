use async_trait::async_trait;
use graphstore::{
    errors::{Result as StorageResult, StorageError},
    fetch::{Fetcher, GraphData},
};

use crate::{error::FetchError, loader::RecordLoader, mapper, params::LoaderParams};

/// Reads the play details, the repository list and the repository details
/// of one batch run and assembles them into a `GraphData`.
#[derive(Debug, Default, Clone, Copy)]
pub struct AppRecordFetcher;

impl AppRecordFetcher {
    pub const NAME: &'static str = "appfetcher";

    pub fn new() -> Self {
        Self
    }

    /// Loads and normalizes on the calling thread.
    pub fn fetch_blocking(params: LoaderParams) -> Result<GraphData, FetchError> {
        params.validate()?;
        let records = RecordLoader::new(params).load()?;
        Ok(mapper::build_graph(records))
    }
}

#[async_trait]
impl Fetcher for AppRecordFetcher {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn fetch(&self, params: serde_json::Value) -> StorageResult<GraphData> {
        let params = LoaderParams::from_value(params)?;
        log::info!(
            "fetching app records from {} and {}",
            params.play_details_dir.display(),
            params.repository_list.display()
        );
        let graph = tokio::task::spawn_blocking(move || Self::fetch_blocking(params))
            .await
            .map_err(|err| StorageError::Other(anyhow::anyhow!("loader task failed: {err}")))??;
        Ok(graph)
    }
}

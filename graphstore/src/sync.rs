use crate::bulk::BulkEmitter;
use crate::config::StorageConfig;
use crate::errors::{Result, StorageError};
use crate::fetch::{AnyFetchable, Fetcher, GraphData};
use crate::lineage::{derive_fork_edges, RepositoryIndex};
use crate::models::{PipelineReport, SyncOutcome};
use crate::resolve::{resolve_references, NodeIndex};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Defines the core interface for turning source records into a bulk-import file set.
#[async_trait]
pub trait DataSynchronizer {
    /// Registers a concrete fetcher implementation with the synchronizer.
    fn register_fetcher(&mut self, fetcher: Arc<dyn Fetcher>);

    /// Runs a named fetcher and pushes its output through the pipeline.
    async fn sync(&self, fetcher_name: &str, params: serde_json::Value) -> Result<SyncOutcome>;

    /// Resolves, derives and emits one complete `GraphData` batch.
    async fn process_graph_data(&self, graph_data: GraphData) -> Result<SyncOutcome>;
}

pub struct GraphSynchronizer {
    config: StorageConfig,
    fetchers: HashMap<&'static str, Arc<dyn Fetcher>>,
}

impl GraphSynchronizer {
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            fetchers: HashMap::new(),
        }
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    pub fn fetcher_names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.fetchers.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

/// Index, resolve and derive; returns every table in emission order.
fn build_tables(graph: GraphData) -> (Vec<Box<dyn AnyFetchable>>, PipelineReport) {
    let mut report = PipelineReport {
        dropped_records: graph.dropped_records,
        ..PipelineReport::default()
    };

    // Phase 1: local. Every explicit reference is checked on its own against
    // the read-only identity index.
    let index = NodeIndex::build(&graph);
    let mut resolution = resolve_references(&graph.references, &index);
    report.dangling_references = resolution.dangling.len();

    // Phase 2: global. Starts only once the repository table is complete.
    let repositories = graph.repositories.as_slice();
    let repo_index = RepositoryIndex::build(repositories);
    let lineage = derive_fork_edges(repositories, &repo_index);
    report.dangling_references += lineage.dangling.len();
    report.self_references = lineage.self_references.len();
    resolution.relations.forks = lineage.edges;

    for (label, count) in resolution.relations.counts() {
        report.relations.insert(label.to_string(), count);
    }

    let mut tables = graph.into_node_tables();
    for table in &tables {
        report
            .nodes
            .insert(table.entity_type_any().to_string(), table.row_count_any());
    }
    let relations = resolution.relations;
    tables.push(Box::new(relations.general));
    tables.push(Box::new(relations.contribute));
    tables.push(Box::new(relations.implemented));
    tables.push(Box::new(relations.forks));

    (tables, report)
}

fn retired_path(output: &Path) -> PathBuf {
    let mut name = output.file_name().unwrap_or_default().to_os_string();
    name.push(".retired");
    output.with_file_name(name)
}

/// Swaps `staging` into `output`. The previous output is moved aside first and
/// put back if the swap fails, so a published file set is always in place.
fn replace_dir(staging: &Path, output: &Path) -> Result<()> {
    let retired = retired_path(output);
    if retired.exists() {
        std::fs::remove_dir_all(&retired)?;
    }
    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let had_output = output.exists();
    if had_output {
        std::fs::rename(output, &retired)?;
    }
    if let Err(err) = std::fs::rename(staging, output) {
        if had_output {
            if let Err(restore) = std::fs::rename(&retired, output) {
                log::error!(
                    "Could not restore {} from {}: {}",
                    output.display(),
                    retired.display(),
                    restore
                );
            }
        }
        return Err(err.into());
    }

    if had_output {
        if let Err(err) = std::fs::remove_dir_all(&retired) {
            log::warn!("Could not remove {}: {}", retired.display(), err);
        }
    }
    Ok(())
}

#[async_trait]
impl DataSynchronizer for GraphSynchronizer {
    fn register_fetcher(&mut self, fetcher: Arc<dyn Fetcher>) {
        self.fetchers.insert(fetcher.name(), fetcher);
    }

    async fn sync(&self, fetcher_name: &str, params: serde_json::Value) -> Result<SyncOutcome> {
        let fetcher = self.fetchers.get(fetcher_name).ok_or_else(|| {
            StorageError::Config(format!("Fetcher '{}' not registered.", fetcher_name))
        })?;

        let graph_data = fetcher.fetch(params).await?;
        log::info!(
            "Fetcher '{}' produced {} nodes and {} references",
            fetcher_name,
            graph_data.node_count(),
            graph_data.references.len()
        );
        self.process_graph_data(graph_data).await
    }

    async fn process_graph_data(&self, graph_data: GraphData) -> Result<SyncOutcome> {
        let staging = self.config.staging_path.clone();
        let output = self.config.output_path.clone();
        let emit = self.config.emit.clone();

        tokio::task::spawn_blocking(move || -> Result<SyncOutcome> {
            if staging.exists() {
                std::fs::remove_dir_all(&staging)?;
            }

            let (tables, report) = build_tables(graph_data);
            let emitted = BulkEmitter::new(&staging, emit).emit(&tables);
            let manifest = match emitted {
                Ok(manifest) => manifest,
                Err(err) => {
                    // nothing of a failed run may be picked up by an import
                    if let Err(cleanup) = std::fs::remove_dir_all(&staging) {
                        log::warn!("Could not remove {}: {}", staging.display(), cleanup);
                    }
                    return Err(err);
                }
            };

            replace_dir(&staging, &output)?;
            log::info!(
                "Published {} nodes and {} relationships to {}",
                report.node_total(),
                report.relation_total(),
                output.display()
            );
            Ok(SyncOutcome {
                output_dir: output,
                manifest,
                report,
            })
        })
        .await
        .map_err(|e| StorageError::Other(anyhow::anyhow!("pipeline task failed: {e}")))?
    }
}

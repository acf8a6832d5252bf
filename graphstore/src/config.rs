use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::errors::{Result, StorageError};

#[derive(Deserialize, Debug, Clone)]
pub struct StorageConfig {
    /// Directory the bulk-import file set is published to.
    pub output_path: PathBuf,
    /// Scratch directory a run writes into before it is renamed into place.
    pub staging_path: PathBuf,
    #[serde(default)]
    pub emit: EmitOptions,
    #[serde(default)]
    pub store: StoreConfig,
}

impl StorageConfig {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        let base_path = base_path.into();
        Self {
            output_path: base_path.join("import"),
            staging_path: base_path.join(".staging"),
            emit: EmitOptions::default(),
            store: StoreConfig::default(),
        }
    }

    pub fn with_store(mut self, store: StoreConfig) -> Self {
        self.store = store;
        self
    }

    pub fn with_emit(mut self, emit: EmitOptions) -> Self {
        self.emit = emit;
        self
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Default)]
#[serde(default)]
pub struct EmitOptions {
    /// Row limit per file for tables that may be split (commits). `None` keeps one file.
    pub max_rows_per_file: Option<usize>,
}

/// Settings for the external graph store driven by the persistence bridge.
///
/// Command templates are argument vectors. Supported placeholders:
/// `{database}`, `{import_dir}`, `{snapshot}`, and `{nodes}` / `{relationships}`,
/// which repeat the argument once per emitted file.
#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default)]
pub struct StoreConfig {
    pub database: String,
    pub host: String,
    pub port: u16,
    pub ready_timeout_secs: u64,
    pub poll_interval_ms: u64,
    pub start_command: Vec<String>,
    pub stop_command: Vec<String>,
    pub import_command: Vec<String>,
    pub dump_command: Vec<String>,
    pub load_command: Vec<String>,
    pub snapshot_path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database: "graph.db".to_string(),
            host: "127.0.0.1".to_string(),
            port: 7687,
            ready_timeout_secs: 60,
            poll_interval_ms: 500,
            start_command: vec!["neo4j".into(), "console".into()],
            stop_command: vec!["neo4j".into(), "stop".into()],
            import_command: vec![
                "neo4j-admin".into(),
                "import".into(),
                "--database={database}".into(),
                "--nodes={nodes}".into(),
                "--relationships={relationships}".into(),
                "--multiline-fields=true".into(),
            ],
            dump_command: vec![
                "neo4j-admin".into(),
                "dump".into(),
                "--database={database}".into(),
                "--to={snapshot}".into(),
            ],
            load_command: vec![
                "neo4j-admin".into(),
                "load".into(),
                "--database={database}".into(),
                "--from={snapshot}".into(),
                "--force".into(),
            ],
            snapshot_path: PathBuf::from("snapshots/graph.dump"),
        }
    }
}

impl StoreConfig {
    /// Loads a JSON settings file; missing keys fall back to the defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: StoreConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.start_command.is_empty() {
            return Err(StorageError::Config("start_command must not be empty".into()));
        }
        if self.ready_timeout_secs == 0 {
            return Err(StorageError::Config(
                "ready_timeout_secs must be greater than zero".into(),
            ));
        }
        if self.poll_interval_ms == 0 {
            return Err(StorageError::Config(
                "poll_interval_ms must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    /// Anchors a relative `snapshot_path` under `base`.
    pub fn anchored_at(mut self, base: &Path) -> Self {
        if self.snapshot_path.is_relative() {
            self.snapshot_path = base.join(&self.snapshot_path);
        }
        self
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn ready_timeout(&self) -> Duration {
        Duration::from_secs(self.ready_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

//! Persistence bridge: drives an external graph store through its process
//! lifecycle (start, wait for readiness, bulk import, snapshot, stop).
//!
//! The store process is spawned with `kill_on_drop`, so it is torn down on
//! every exit path, including early returns and panics inside [`with_store`].

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio::process::{Child, Command};

use crate::config::StoreConfig;
use crate::errors::{Result, StorageError};
use crate::models::BulkManifest;

/// Operations the pipeline needs from a graph store.
#[async_trait]
pub trait GraphStore: Send {
    /// Polls the readiness probe until it answers or the timeout expires.
    async fn wait_ready(&mut self) -> Result<()>;
    /// Loads an emitted file set in one bulk operation.
    async fn bulk_import(&mut self, manifest: &BulkManifest, import_dir: &Path) -> Result<()>;
    /// Writes a consistent snapshot and returns its location.
    async fn snapshot(&mut self) -> Result<PathBuf>;
    async fn restore(&mut self, snapshot: &Path) -> Result<()>;
    /// Stops the store. Safe to call more than once.
    async fn shutdown(&mut self) -> Result<()>;
}

/// A store managed through command-line tools.
pub struct CommandStore {
    config: StoreConfig,
    child: Option<Child>,
}

impl CommandStore {
    pub async fn start(config: StoreConfig) -> Result<Self> {
        config.validate()?;
        let args = expand_template(&config.start_command, &TemplateContext::new(&config));
        let (program, rest) = split_command(&args)?;

        log::info!("Starting graph store: {}", args.join(" "));
        let child = Command::new(program)
            .args(rest)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| StorageError::StoreCommand {
                command: args.join(" "),
                detail: format!("failed to spawn: {e}"),
            })?;

        Ok(Self {
            config,
            child: Some(child),
        })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.child.is_some()
    }
}

#[async_trait]
impl GraphStore for CommandStore {
    async fn wait_ready(&mut self) -> Result<()> {
        let address = self.config.address();
        let timeout = self.config.ready_timeout();
        let interval = self.config.poll_interval();
        let child = self.child.as_mut();
        probe_ready(&address, timeout, interval, child).await?;
        log::info!("Graph store ready at {}", address);
        Ok(())
    }

    async fn bulk_import(&mut self, manifest: &BulkManifest, import_dir: &Path) -> Result<()> {
        let ctx = TemplateContext::new(&self.config).with_import(manifest, import_dir);
        log::info!(
            "Importing {} tables ({} rows) from {}",
            manifest.tables.len(),
            manifest.total_rows(),
            import_dir.display()
        );
        run_command(&expand_template(&self.config.import_command, &ctx)).await
    }

    async fn snapshot(&mut self) -> Result<PathBuf> {
        let snapshot = self.config.snapshot_path.clone();
        if let Some(parent) = snapshot.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let ctx = TemplateContext::new(&self.config);
        run_command(&expand_template(&self.config.dump_command, &ctx)).await?;
        log::info!("Snapshot of '{}' written to {}", self.config.database, snapshot.display());
        Ok(snapshot)
    }

    async fn restore(&mut self, snapshot: &Path) -> Result<()> {
        if !snapshot.exists() {
            return Err(StorageError::NotFound(format!(
                "snapshot {}",
                snapshot.display()
            )));
        }
        let ctx = TemplateContext::new(&self.config).with_snapshot(snapshot);
        run_command(&expand_template(&self.config.load_command, &ctx)).await?;
        log::info!("Restored '{}' from {}", self.config.database, snapshot.display());
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<()> {
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };

        let mut stop_result = Ok(());
        let mut exited = false;
        if !self.config.stop_command.is_empty() {
            let ctx = TemplateContext::new(&self.config);
            stop_result = run_command(&expand_template(&self.config.stop_command, &ctx)).await;
            match &stop_result {
                Ok(()) => {
                    exited = tokio::time::timeout(self.config.ready_timeout(), child.wait())
                        .await
                        .is_ok();
                }
                Err(err) => log::warn!("Stop command failed, killing store process: {}", err),
            }
        }
        if !exited && child.try_wait()?.is_none() {
            child.kill().await?;
        }
        log::info!("Graph store stopped");
        stop_result
    }
}

/// Future returned by the closure passed to [`with_store`].
pub type StoreFuture<'s, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 's>>;

/// Starts the store, waits for readiness, runs `f` and always shuts the store
/// down afterwards. An error from `f` takes precedence over a teardown error.
pub async fn with_store<T, F>(config: StoreConfig, f: F) -> Result<T>
where
    F: for<'s> FnOnce(&'s mut CommandStore) -> StoreFuture<'s, T>,
{
    let mut store = CommandStore::start(config).await?;
    let result = match store.wait_ready().await {
        Ok(()) => f(&mut store).await,
        Err(err) => Err(err),
    };
    let teardown = store.shutdown().await;

    match (result, teardown) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(err)) => Err(err),
        (Err(err), Err(teardown_err)) => {
            log::error!("Store teardown also failed: {}", teardown_err);
            Err(err)
        }
        (Err(err), Ok(())) => Err(err),
    }
}

/// Connects to `address` every `interval` until it succeeds. Fails with
/// [`StorageError::StoreUnavailable`] once `timeout` has elapsed or the store
/// process has exited.
pub async fn probe_ready(
    address: &str,
    timeout: std::time::Duration,
    interval: std::time::Duration,
    mut child: Option<&mut Child>,
) -> Result<()> {
    let mut last_error = String::from("no connection attempt completed");

    let outcome = tokio::time::timeout(timeout, async {
        loop {
            if let Some(child) = child.as_deref_mut() {
                if let Some(status) = child.try_wait().map_err(|e| e.to_string())? {
                    return Err(format!("store process exited with {status}"));
                }
            }
            match TcpStream::connect(address).await {
                Ok(_) => return Ok(()),
                Err(err) => {
                    log::debug!("Store at {} not ready: {}", address, err);
                    last_error = err.to_string();
                }
            }
            tokio::time::sleep(interval).await;
        }
    })
    .await;

    let reason = match outcome {
        Ok(Ok(())) => return Ok(()),
        Ok(Err(reason)) => reason,
        Err(_) => format!("timed out, last error: {last_error}"),
    };
    Err(StorageError::StoreUnavailable {
        address: address.to_string(),
        timeout,
        reason,
    })
}

async fn run_command(args: &[String]) -> Result<()> {
    let (program, rest) = split_command(args)?;
    let command = args.join(" ");
    log::debug!("Running store command: {}", command);

    let output = Command::new(program)
        .args(rest)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| StorageError::StoreCommand {
            command: command.clone(),
            detail: format!("failed to spawn: {e}"),
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(StorageError::StoreCommand {
            command,
            detail: format!("exited with {}: {}", output.status, stderr.trim()),
        });
    }
    Ok(())
}

fn split_command(args: &[String]) -> Result<(&String, &[String])> {
    args.split_first()
        .ok_or_else(|| StorageError::Config("store command template is empty".into()))
}

/// Values substituted into command templates.
#[derive(Debug, Default)]
struct TemplateContext {
    database: String,
    snapshot: String,
    import_dir: String,
    nodes: Vec<String>,
    relationships: Vec<String>,
}

impl TemplateContext {
    fn new(config: &StoreConfig) -> Self {
        Self {
            database: config.database.clone(),
            snapshot: config.snapshot_path.display().to_string(),
            ..Self::default()
        }
    }

    fn with_snapshot(mut self, snapshot: &Path) -> Self {
        self.snapshot = snapshot.display().to_string();
        self
    }

    fn with_import(mut self, manifest: &BulkManifest, import_dir: &Path) -> Self {
        self.import_dir = import_dir.display().to_string();
        for table in manifest.node_tables() {
            let label = table.label.as_deref().unwrap_or(table.name.as_str());
            for file in &table.files {
                self.nodes
                    .push(format!("{}={}", label, import_dir.join(&file.path).display()));
            }
        }
        for table in manifest.edge_tables() {
            for file in &table.files {
                self.relationships
                    .push(import_dir.join(&file.path).display().to_string());
            }
        }
        self
    }
}

/// Expands placeholders. An argument holding `{nodes}` or `{relationships}`
/// is repeated once per file and dropped when there are none.
fn expand_template(template: &[String], ctx: &TemplateContext) -> Vec<String> {
    let mut args = Vec::with_capacity(template.len());
    for arg in template {
        let (key, values) = if arg.contains("{nodes}") {
            ("{nodes}", &ctx.nodes)
        } else if arg.contains("{relationships}") {
            ("{relationships}", &ctx.relationships)
        } else {
            args.push(
                arg.replace("{database}", &ctx.database)
                    .replace("{snapshot}", &ctx.snapshot)
                    .replace("{import_dir}", &ctx.import_dir),
            );
            continue;
        };
        args.extend(values.iter().map(|value| arg.replace(key, value)));
    }
    args
}

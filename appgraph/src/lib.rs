use std::{
    fmt::Write as _,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{bail, Context};
use appfetcher::{AppRecordFetcher, LoaderParams};
use clap::{ArgAction, Args, Parser, Subcommand};
use graphstore::{
    bulk::BulkReader,
    config::{EmitOptions, StorageConfig, StoreConfig},
    fetch::EntityCategory,
    models::{PipelineReport, SyncOutcome},
    sync::DataSynchronizer,
    GraphStorage,
};
use serde::Serialize;
use serde_json::{json, Value as JsonValue};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

/// Runs the command line interface of the app graph builder.
pub async fn run_cli() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);
    execute(cli.command).await
}

#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Log more; repeat for more detail
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,
    /// Log less; repeat to silence warnings
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub quiet: u8,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Builds the bulk-import file set from the source records
    Build(BuildArgs),
    /// Builds the file set and loads it into the graph store, or restores an existing snapshot
    Load(LoadArgs),
    /// Restores the snapshot into the graph store
    Restore(RestoreArgs),
    /// Reads back a published file set
    Inspect(InspectArgs),
}

#[derive(Args, Debug, Clone)]
pub struct SourceArgs {
    /// Directory of Google Play `<package>.json` details
    #[arg(long, env = "APPGRAPH_PLAY_DETAILS_DIR")]
    pub play_details_dir: PathBuf,
    /// Directory of per-repository CSV details
    #[arg(long, env = "APPGRAPH_REPO_DETAILS_DIR")]
    pub repo_details_dir: PathBuf,
    /// CSV file listing the repositories and their packages
    #[arg(long, env = "APPGRAPH_REPOSITORY_LIST")]
    pub repository_list: PathBuf,
}

impl From<&SourceArgs> for LoaderParams {
    fn from(args: &SourceArgs) -> Self {
        LoaderParams {
            play_details_dir: args.play_details_dir.clone(),
            repo_details_dir: args.repo_details_dir.clone(),
            repository_list: args.repository_list.clone(),
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct BuildArgs {
    #[command(flatten)]
    pub sources: SourceArgs,
    /// Base directory; files are published under `<base>/import`
    #[arg(long, env = "APPGRAPH_BASE_PATH")]
    pub base_path: PathBuf,
    /// Split the commits table into files of at most this many rows
    #[arg(long)]
    pub commit_chunk_rows: Option<usize>,
}

impl BuildArgs {
    fn emit_options(&self) -> EmitOptions {
        EmitOptions {
            max_rows_per_file: self.commit_chunk_rows,
        }
    }
}

#[derive(Args, Debug, Clone, Default)]
pub struct StoreArgs {
    /// JSON file with graph store settings
    #[arg(long, env = "APPGRAPH_STORE_CONFIG")]
    pub store_config: Option<PathBuf>,
    #[arg(long)]
    pub host: Option<String>,
    #[arg(long)]
    pub port: Option<u16>,
    #[arg(long)]
    pub database: Option<String>,
}

impl StoreArgs {
    /// Settings file (or defaults) with the command line overrides applied.
    pub fn resolve(&self, base_path: &Path) -> anyhow::Result<StoreConfig> {
        let mut config = match &self.store_config {
            Some(path) => StoreConfig::from_file(path)
                .with_context(|| format!("failed to read store config {}", path.display()))?,
            None => StoreConfig::default(),
        };
        if let Some(host) = &self.host {
            config.host = host.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(database) = &self.database {
            config.database = database.clone();
        }
        config.validate().context("invalid store config")?;
        Ok(config.anchored_at(base_path))
    }
}

#[derive(Args, Debug, Clone)]
pub struct LoadArgs {
    #[command(flatten)]
    pub build: BuildArgs,
    #[command(flatten)]
    pub store: StoreArgs,
    /// Rebuild and reload even if a snapshot exists
    #[arg(long, default_value_t = false)]
    pub fresh: bool,
}

#[derive(Args, Debug, Clone)]
pub struct RestoreArgs {
    #[arg(long, env = "APPGRAPH_BASE_PATH")]
    pub base_path: PathBuf,
    #[command(flatten)]
    pub store: StoreArgs,
}

#[derive(Args, Debug, Clone)]
pub struct InspectArgs {
    #[arg(long, env = "APPGRAPH_BASE_PATH")]
    pub base_path: PathBuf,
    /// Table to print; lists all tables when omitted
    #[arg(long)]
    pub table: Option<String>,
    /// Maximum number of rows to print
    #[arg(long, default_value_t = 20)]
    pub limit: usize,
    /// Print JSON instead of tab-separated text
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

/// What `load` ended up doing.
#[derive(Debug)]
pub enum LoadOutcome {
    Restored(PathBuf),
    Loaded {
        report: PipelineReport,
        snapshot: PathBuf,
    },
}

pub async fn execute(command: Command) -> anyhow::Result<()> {
    match command {
        Command::Build(args) => {
            let outcome = run_build(&args).await?;
            print!("{}", render_report(&outcome.report));
            println!("files written to {}", outcome.output_dir.display());
        }
        Command::Load(args) => match run_load(&args).await? {
            LoadOutcome::Restored(snapshot) => {
                println!("restored snapshot {}", snapshot.display());
            }
            LoadOutcome::Loaded { report, snapshot } => {
                print!("{}", render_report(&report));
                println!("snapshot written to {}", snapshot.display());
            }
        },
        Command::Restore(args) => {
            let snapshot = run_restore(&args).await?;
            println!("restored snapshot {}", snapshot.display());
        }
        Command::Inspect(args) => print!("{}", run_inspect(&args)?),
    }
    Ok(())
}

/// Maps `-v`/`-q` counts onto a level, starting from `warn`.
pub fn level_filter(verbose: u8, quiet: u8) -> &'static str {
    const LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];
    let idx = (1 + i32::from(verbose) - i32::from(quiet)).clamp(0, 4);
    LEVELS[idx as usize]
}

fn init_tracing(verbose: u8, quiet: u8) {
    let _ = fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(level_filter(verbose, quiet))),
        )
        .try_init();
}

async fn open_storage(base_path: &Path, config: StorageConfig) -> anyhow::Result<GraphStorage> {
    let mut storage = GraphStorage::new(config)
        .await
        .with_context(|| format!("failed to prepare {}", base_path.display()))?;
    storage
        .synchronizer
        .register_fetcher(Arc::new(AppRecordFetcher::new()));
    Ok(storage)
}

async fn build_with(storage: &GraphStorage, sources: &SourceArgs) -> anyhow::Result<SyncOutcome> {
    let params = LoaderParams::from(sources).to_value()?;
    let outcome = storage
        .synchronizer
        .sync(AppRecordFetcher::NAME, params)
        .await
        .context("building the graph files failed")?;
    info!(
        "published {} nodes and {} relationships to {}",
        outcome.report.node_total(),
        outcome.report.relation_total(),
        outcome.output_dir.display()
    );
    Ok(outcome)
}

pub async fn run_build(args: &BuildArgs) -> anyhow::Result<SyncOutcome> {
    let config = StorageConfig::new(&args.base_path).with_emit(args.emit_options());
    let storage = open_storage(&args.base_path, config).await?;
    build_with(&storage, &args.sources).await
}

pub async fn run_load(args: &LoadArgs) -> anyhow::Result<LoadOutcome> {
    let base_path = &args.build.base_path;
    let store = args.store.resolve(base_path)?;
    let config = StorageConfig::new(base_path)
        .with_emit(args.build.emit_options())
        .with_store(store);
    let storage = open_storage(base_path, config).await?;

    if storage.snapshot_exists() && !args.fresh {
        let snapshot = storage.config.store.snapshot_path.clone();
        info!("snapshot {} exists, restoring it", snapshot.display());
        storage
            .restore_snapshot()
            .await
            .context("restoring the snapshot failed")?;
        return Ok(LoadOutcome::Restored(snapshot));
    }

    let outcome = build_with(&storage, &args.build.sources).await?;
    let snapshot = storage
        .load_into_store(outcome.manifest)
        .await
        .context("loading into the graph store failed")?;
    Ok(LoadOutcome::Loaded {
        report: outcome.report,
        snapshot,
    })
}

pub async fn run_restore(args: &RestoreArgs) -> anyhow::Result<PathBuf> {
    let store = args.store.resolve(&args.base_path)?;
    let config = StorageConfig::new(&args.base_path).with_store(store);
    let storage = open_storage(&args.base_path, config).await?;
    storage
        .restore_snapshot()
        .await
        .context("restoring the snapshot failed")?;
    Ok(storage.config.store.snapshot_path.clone())
}

#[derive(Serialize)]
struct TableSummary<'a> {
    name: &'a str,
    category: EntityCategory,
    label: Option<&'a str>,
    rows: usize,
    files: usize,
}

/// Renders the manifest or one table of the file set under `--base-path`.
pub fn run_inspect(args: &InspectArgs) -> anyhow::Result<String> {
    let reader = BulkReader::new(StorageConfig::new(&args.base_path).output_path);
    let manifest = reader
        .read_manifest()
        .with_context(|| format!("no file set under {}", args.base_path.display()))?;

    let Some(name) = &args.table else {
        let summaries: Vec<TableSummary<'_>> = manifest
            .tables
            .iter()
            .map(|table| TableSummary {
                name: &table.name,
                category: table.category,
                label: table.label.as_deref(),
                rows: table.rows(),
                files: table.files.len(),
            })
            .collect();
        if args.json {
            return Ok(format!("{}\n", serde_json::to_string_pretty(&summaries)?));
        }
        let mut out = String::new();
        for summary in summaries {
            writeln!(
                out,
                "{}\t{:?}\t{}\t{} rows\t{} files",
                summary.name,
                summary.category,
                summary.label.unwrap_or("-"),
                summary.rows,
                summary.files
            )?;
        }
        return Ok(out);
    };

    let Some(table) = manifest.table(name) else {
        bail!("unknown table '{name}'");
    };
    let rows = reader.read_table(table)?;
    if rows.len() > args.limit {
        warn!("showing {} of {} rows of {name}", args.limit, rows.len());
    }
    let rows = rows.into_iter().take(args.limit);

    if args.json {
        let objects: Vec<JsonValue> = rows
            .map(|row| {
                let fields: serde_json::Map<String, JsonValue> = table
                    .columns
                    .iter()
                    .zip(row.iter())
                    .map(|(column, value)| (column.name.clone(), value.to_json()))
                    .collect();
                JsonValue::Object(fields)
            })
            .collect();
        return Ok(format!(
            "{}\n",
            serde_json::to_string_pretty(&json!({ "table": name, "rows": objects }))?
        ));
    }

    let mut out = table.headers().join("\t");
    out.push('\n');
    for row in rows {
        let cells: Vec<String> = row.iter().map(|value| value.to_json().to_string()).collect();
        out.push_str(&cells.join("\t"));
        out.push('\n');
    }
    Ok(out)
}

pub fn render_report(report: &PipelineReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "nodes: {}", report.node_total());
    for (table, count) in &report.nodes {
        let _ = writeln!(out, "  {table}: {count}");
    }
    let _ = writeln!(out, "relationships: {}", report.relation_total());
    for (label, count) in &report.relations {
        let _ = writeln!(out, "  {label}: {count}");
    }
    let _ = writeln!(out, "dropped malformed records: {}", report.dropped_records);
    let _ = writeln!(out, "dropped dangling references: {}", report.dangling_references);
    let _ = writeln!(out, "dropped self-forks: {}", report.self_references);
    out
}

#![cfg(unix)]

use std::path::PathBuf;
use std::time::{Duration, Instant};

use graphstore::{
    bridge::{probe_ready, with_store, CommandStore, GraphStore},
    config::StoreConfig,
    errors::StorageError,
    models::BulkManifest,
};
use tokio::net::TcpListener;

mod common;

fn sh(script: &str) -> Vec<String> {
    vec!["sh".into(), "-c".into(), script.into()]
}

fn store_config(port: u16, snapshot_path: PathBuf) -> StoreConfig {
    StoreConfig {
        port,
        ready_timeout_secs: 2,
        poll_interval_ms: 20,
        start_command: vec!["sleep".into(), "30".into()],
        stop_command: vec![],
        import_command: sh("exit 0"),
        dump_command: sh("touch \"$0\"").into_iter().chain(["{snapshot}".to_string()]).collect(),
        load_command: sh("test -f \"$0\"").into_iter().chain(["{snapshot}".to_string()]).collect(),
        snapshot_path,
        ..StoreConfig::default()
    }
}

async fn closed_port() -> anyhow::Result<u16> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let port = listener.local_addr()?.port();
    drop(listener);
    Ok(port)
}

#[tokio::test]
async fn readiness_succeeds_against_a_listening_port() -> anyhow::Result<()> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let address = listener.local_addr()?.to_string();
    probe_ready(
        &address,
        Duration::from_secs(2),
        Duration::from_millis(20),
        None,
    )
    .await?;
    Ok(())
}

#[tokio::test]
async fn readiness_times_out_against_a_closed_port() -> anyhow::Result<()> {
    let port = closed_port().await?;
    let started = Instant::now();
    let err = probe_ready(
        &format!("127.0.0.1:{port}"),
        Duration::from_millis(300),
        Duration::from_millis(20),
        None,
    )
    .await
    .unwrap_err();

    assert!(matches!(err, StorageError::StoreUnavailable { .. }));
    assert!(started.elapsed() < Duration::from_secs(5));
    Ok(())
}

#[tokio::test]
async fn early_store_exit_is_unavailable() -> anyhow::Result<()> {
    let ctx = common::init_test_context().await?;
    let port = closed_port().await?;
    let config = StoreConfig {
        start_command: vec!["true".into()],
        ..store_config(port, ctx.temp_dir.path().join("graph.dump"))
    };

    let mut store = CommandStore::start(config).await?;
    let err = store.wait_ready().await.unwrap_err();
    match err {
        StorageError::StoreUnavailable { reason, .. } => assert!(reason.contains("exited")),
        other => panic!("expected StoreUnavailable, got {other:?}"),
    }
    store.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn with_store_imports_snapshots_and_stops() -> anyhow::Result<()> {
    let ctx = common::init_test_context().await?;
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let port = listener.local_addr()?.port();
    let snapshot_path = ctx.temp_dir.path().join("snapshots/graph.dump");
    let config = store_config(port, snapshot_path.clone());

    let manifest = BulkManifest::default();
    let import_dir = ctx.config.output_path.clone();
    let written = with_store(config.clone(), move |store| {
        Box::pin(async move {
            assert!(store.is_running());
            store.bulk_import(&manifest, &import_dir).await?;
            store.snapshot().await
        })
    })
    .await?;

    assert_eq!(written, snapshot_path);
    assert!(snapshot_path.exists());

    let restore_from = snapshot_path.clone();
    with_store(config, move |store| {
        Box::pin(async move { store.restore(&restore_from).await })
    })
    .await?;
    Ok(())
}

#[tokio::test]
async fn failing_admin_command_still_tears_down() -> anyhow::Result<()> {
    let ctx = common::init_test_context().await?;
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let port = listener.local_addr()?.port();
    let config = StoreConfig {
        import_command: sh("echo boom >&2; exit 3"),
        ..store_config(port, ctx.temp_dir.path().join("graph.dump"))
    };

    let manifest = BulkManifest::default();
    let import_dir = ctx.config.output_path.clone();
    let err = with_store(config, move |store| {
        Box::pin(async move { store.bulk_import(&manifest, &import_dir).await })
    })
    .await
    .unwrap_err();

    match err {
        StorageError::StoreCommand { detail, .. } => assert!(detail.contains("boom")),
        other => panic!("expected StoreCommand, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn unavailable_store_never_runs_the_body() -> anyhow::Result<()> {
    let ctx = common::init_test_context().await?;
    let port = closed_port().await?;
    let mut config = store_config(port, ctx.temp_dir.path().join("graph.dump"));
    config.ready_timeout_secs = 1;

    let result = with_store(config, |_store| {
        Box::pin(async move { Err::<(), _>(StorageError::InvalidArg("body ran".into())) })
    })
    .await;
    assert!(matches!(result, Err(StorageError::StoreUnavailable { .. })));
    Ok(())
}

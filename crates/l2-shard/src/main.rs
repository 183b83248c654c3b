//! L2 shard node entry point.

use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::oneshot;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use l2_shard::config::ShardConfig;
use l2_shard::l1client::L1Client;
use l2_shard::registry::RegistryCache;
use l2_shard::server::{build_router, AppState};
use l2_shard::store::SessionStore;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("===========================================");
    info!("  L2 Shard Node - Starting Up");
    info!("===========================================");

    let config = ShardConfig::from_env().context("configuration validation failed")?;
    info!(
        shard_id = %config.shard_id,
        client_group = %config.client_group,
        l2_node_id = %config.l2_node_id,
        http_port = config.http_port,
        l1_endpoint = %config.l1_endpoint,
        db_path = %config.db_path,
        "configuration loaded"
    );

    if let Some(parent) = std::path::Path::new(&config.db_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
    }
    let store = SessionStore::open(&config.db_path).context("failed to open session store")?;
    store.seed().context("failed to seed session store")?;

    let l1 = Arc::new(L1Client::new(
        &config.l1_endpoint,
        &config.shard_id,
        &config.l2_node_id,
    )?);

    if let Err(e) = l1.health_check().await {
        warn!(error = %e, "L1 health check failed; commits will fail until L1 is available");
    } else {
        info!("L1 connection verified");
    }

    let registry = Arc::new(RegistryCache::new());
    match l1.load_shards().await {
        Ok(shards) => registry.prime(shards),
        Err(e) => warn!(error = %e, "failed to load shard registry; forwarding degrades to local handling"),
    }

    let state = AppState::new(config.clone(), store, registry, l1)?;
    let router = build_router(state);

    let addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    info!(
        shard_id = %config.shard_id,
        client_group = %config.client_group,
        addr = %addr,
        "L2 shard node ready"
    );

    let (draining_tx, draining_rx) = oneshot::channel();
    let server = axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            let _ = draining_tx.send(());
        })
        .into_future();

    tokio::select! {
        result = server => {
            result.context("HTTP server error")?;
        }
        _ = drain_deadline(draining_rx) => {}
    }

    info!("L2 shard node stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        return;
    }
    info!("shutdown signal received, draining connections");
}

/// Bound the post-signal drain: once shutdown starts, in-flight
/// connections get `SHUTDOWN_GRACE` to finish before the server is
/// dropped.
async fn drain_deadline(draining: oneshot::Receiver<()>) {
    if draining.await.is_err() {
        // The server ended on its own; nothing to bound.
        std::future::pending::<()>().await;
    }
    tokio::time::sleep(SHUTDOWN_GRACE).await;
    warn!(
        grace_secs = SHUTDOWN_GRACE.as_secs(),
        "drain grace elapsed, aborting open connections"
    );
}

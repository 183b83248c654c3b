//! L1 ledger node entry point.

use std::future::IntoFuture;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::oneshot;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use l1_node::abci::LedgerApp;
use l1_node::commit::CommitPipeline;
use l1_node::consensus::{ConsensusAdapter, LocalEngine};
use l1_node::index::IndexStore;
use l1_node::ledger::{LedgerConfig, LedgerStore};
use l1_node::server::{build_router, AppState};

const BROADCAST_DEADLINE: Duration = Duration::from_secs(30);
const SHUTDOWN_GRACE: Duration = Duration::from_secs(15);

/// L1 Byzantine Fault Tolerant ledger node.
#[derive(Parser, Debug)]
#[command(name = "l1-node")]
#[command(about = "L1 BFT ledger replica for sharded L2 commits")]
struct Args {
    /// Node data directory (ledger store lives under <home>/ledger).
    #[arg(long, default_value = "./node-config/l1-node")]
    home: PathBuf,

    /// HTTP web server port.
    #[arg(long, default_value_t = 5000)]
    http_port: u16,

    /// SQLite path for the relational index (defaults to <home>/index.db).
    #[arg(long)]
    index_db: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();

    info!("=== Starting Layer 1 - Byzantine Fault Tolerant Consensus Node ===");
    info!(home = %args.home.display(), http_port = args.http_port, "configuration");

    let node_id = args
        .home
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| "l1-node".to_string());

    std::fs::create_dir_all(&args.home)
        .with_context(|| format!("failed to create home directory {}", args.home.display()))?;

    let ledger = Arc::new(
        LedgerStore::open(LedgerConfig::new(args.home.join("ledger")))
            .context("failed to open ledger store")?,
    );

    let index_path = args.index_db.unwrap_or_else(|| args.home.join("index.db"));
    let index = IndexStore::open(&index_path.to_string_lossy())
        .context("failed to open index store")?;
    index.seed().context("failed to seed shard registry")?;

    let app = Arc::new(LedgerApp::new(Arc::clone(&ledger)));
    let engine = Arc::new(LocalEngine::new(Arc::clone(&app)));
    let adapter = ConsensusAdapter::new(engine, BROADCAST_DEADLINE);
    let pipeline = Arc::new(CommitPipeline::new(index.clone(), adapter));

    let state = AppState::new(pipeline, index, app, &node_id);
    let router = build_router(state);

    let addr = format!("0.0.0.0:{}", args.http_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    info!(node_id = %node_id, addr = %addr, "L1 node successfully started");
    info!("  POST /l1/commit - receive commits from L2 shards");
    info!("  GET  /l1/sessions/group/:group - query sessions by client group");
    info!("  GET  /l1/sessions/shard/:shard - query sessions by shard");
    info!("  GET  /l1/transaction/:hash - get transaction details");
    info!("  GET  /l1/status - L1 status");
    info!("  GET  /l1/shards - registered shards");
    info!("  GET  /debug - replica diagnostics");

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

    info!("L1 node gracefully stopped");
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

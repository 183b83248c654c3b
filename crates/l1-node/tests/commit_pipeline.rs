//! End-to-end tests for the L1 commit pipeline through the HTTP surface.

use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::Utc;
use tempfile::TempDir;
use tower::ServiceExt;

use l1_node::abci::LedgerApp;
use l1_node::commit::CommitPipeline;
use l1_node::consensus::{ConsensusAdapter, LocalEngine};
use l1_node::index::IndexStore;
use l1_node::ledger::{keys, LedgerConfig, LedgerStore};
use l1_node::server::{build_router, AppState};

struct Fixture {
    _home: TempDir,
    router: Router,
    ledger: Arc<LedgerStore>,
    index: IndexStore,
}

fn fixture() -> Fixture {
    let home = TempDir::new().unwrap();
    let ledger = Arc::new(LedgerStore::open(LedgerConfig::for_testing(home.path())).unwrap());
    let app = Arc::new(LedgerApp::new(Arc::clone(&ledger)));
    let engine = Arc::new(LocalEngine::new(Arc::clone(&app)));
    let adapter = ConsensusAdapter::new(engine, Duration::from_secs(5));

    let index = IndexStore::open_in_memory().unwrap();
    index.seed().unwrap();

    let pipeline = Arc::new(CommitPipeline::new(index.clone(), adapter));
    let state = AppState::new(pipeline, index.clone(), app, "l1-node0");

    Fixture {
        _home: home,
        router: build_router(state),
        ledger,
        index,
    }
}

fn commit_body(session_id: &str, shard_id: &str, client_group: &str) -> String {
    serde_json::json!({
        "shard_id": shard_id,
        "client_group": client_group,
        "session_id": session_id,
        "operator_id": "OPR-001",
        "session_data": {"session_id": session_id, "status": "completed"},
        "l2_node_id": "l2-node-a",
        "timestamp": Utc::now(),
    })
    .to_string()
}

async fn post_commit(router: &Router, body: String) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("POST")
        .uri("/l1/commit")
        .header("content-type", "application/json")
        .body(Body::from(body))
        .unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

async fn get_json(router: &Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_commit_happy_path_surfaces_tx_hash_and_height() {
    let fx = fixture();

    let (status, body) = post_commit(&fx.router, commit_body("SES-100", "shard-a", "group-a")).await;
    assert_eq!(status, StatusCode::ACCEPTED);

    assert_eq!(body["data"]["message"], "Shard commit processed successfully");
    assert_eq!(body["data"]["session_id"], "SES-100");
    assert_eq!(body["data"]["shard_id"], "shard-a");
    let height = body["data"]["block_height"].as_i64().unwrap();
    assert!(height >= 1);

    let tx_hash = body["data"]["tx_hash"].as_str().unwrap();
    assert_eq!(tx_hash.len(), 64);
    assert_eq!(body["meta"]["status"], "confirmed");
    assert_eq!(body["meta"]["tx_id"], tx_hash);
    assert_eq!(body["meta"]["block_height"].as_i64().unwrap(), height);
    assert_eq!(body["meta"]["shard_info"]["client_group"], "group-a");
    assert_eq!(body["node_id"], "l1-node0");

    // The deterministic ledger key holds the raw commit.
    let tx_id = shared_types::hashing::tx_id("SES-100", "shard-a");
    assert!(fx.ledger.get(&keys::tx(&tx_id)).unwrap().is_some());
    assert_eq!(
        fx.ledger.get(&keys::status(&tx_id)).unwrap(),
        Some(b"accepted".to_vec())
    );
}

#[tokio::test]
async fn test_committed_session_is_queryable_by_shard_group_and_hash() {
    let fx = fixture();

    let (_, body) = post_commit(&fx.router, commit_body("SES-200", "shard-a", "group-a")).await;
    let tx_hash = body["data"]["tx_hash"].as_str().unwrap().to_string();

    let (status, by_shard) = get_json(&fx.router, "/l1/sessions/shard/shard-a").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(by_shard["meta"]["status"], "processed");
    let sessions = by_shard["data"].as_array().unwrap();
    assert!(sessions.iter().any(|s| s["session_id"] == "SES-200"));

    let (status, by_group) = get_json(&fx.router, "/l1/sessions/group/group-a").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(by_group["data"].as_array().unwrap().len(), 1);

    let (status, tx) = get_json(&fx.router, &format!("/l1/transaction/{tx_hash}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(tx["data"]["session_id"], "SES-200");
    assert_eq!(tx["data"]["status"], "confirmed");

    let (status, missing) = get_json(&fx.router, "/l1/transaction/ffffffff").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(missing["data"]["error"].is_string());
}

#[tokio::test]
async fn test_duplicate_commit_conflicts_and_writes_one_ledger_key() {
    let fx = fixture();

    let (first, _) = post_commit(&fx.router, commit_body("dup-1", "shard-a", "group-a")).await;
    let (second, body) = post_commit(&fx.router, commit_body("dup-1", "shard-a", "group-a")).await;

    assert_eq!(first, StatusCode::ACCEPTED);
    assert_eq!(second, StatusCode::CONFLICT);
    assert!(body["data"]["error"]
        .as_str()
        .unwrap()
        .contains("already committed"));

    let tx_id = shared_types::hashing::tx_id("dup-1", "shard-a");
    let stored = fx.ledger.prefix_scan(b"tx:").unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].0, keys::tx(&tx_id));
}

#[tokio::test]
async fn test_missing_fields_and_unknown_shard_reject_without_writes() {
    let fx = fixture();

    let (status, body) = post_commit(&fx.router, commit_body("", "shard-a", "group-a")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["data"]["error"].is_string());

    let (status, body) = post_commit(&fx.router, commit_body("SES-1", "shard-z", "group-z")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["data"]["error"].as_str().unwrap().contains("shard-z"));

    let (status, _) = post_commit(&fx.router, "not json".to_string()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert!(fx.ledger.prefix_scan(b"tx:").unwrap().is_empty());
    assert!(fx.index.sessions_by_shard("shard-a").unwrap().is_empty());
}

#[tokio::test]
async fn test_status_shards_and_debug_endpoints() {
    let fx = fixture();

    let (status, body) = get_json(&fx.router, "/l1/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "active");
    assert_eq!(body["data"]["layer"], "L1");
    assert_eq!(body["data"]["type"], "Byzantine Fault Tolerant");
    assert!(body["data"]["time"].is_string());

    let (status, body) = get_json(&fx.router, "/l1/shards").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["count"], 2);
    let shards = body["data"]["shards"].as_array().unwrap();
    assert!(shards.iter().any(|s| s["shard_id"] == "shard-a"));

    let (status, body) = get_json(&fx.router, "/debug").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["node_id"], "l1-node0");
    assert_eq!(body["data"]["last_block_height"], 0);

    let (status, body) = get_json(&fx.router, "/l1/unknown").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["data"]["error"].is_string());
}

#[tokio::test]
async fn test_block_height_advances_across_commits() {
    let fx = fixture();

    let (_, first) = post_commit(&fx.router, commit_body("SES-1", "shard-a", "group-a")).await;
    let (_, second) = post_commit(&fx.router, commit_body("SES-2", "shard-b", "group-b")).await;

    let h1 = first["data"]["block_height"].as_i64().unwrap();
    let h2 = second["data"]["block_height"].as_i64().unwrap();
    assert!(h2 > h1);

    let (_, debug) = get_json(&fx.router, "/debug").await;
    assert_eq!(debug["data"]["last_block_height"].as_i64().unwrap(), h2);
    assert_eq!(
        debug["data"]["last_block_app_hash"].as_str().unwrap().len(),
        64
    );
}

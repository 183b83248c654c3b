//! # L1 HTTP Surface
//!
//! Routes `/l1/commit`, the cross-shard query endpoints, and the system
//! endpoints. Every response body is wrapped in the uniform
//! `{data, meta, node_id}` envelope; only the commit path fills in the
//! consensus fields of `meta`.

use std::sync::Arc;
use std::time::Instant;

use axum::body::Bytes;
use axum::extract::{Path, Request, State};
use axum::http::{Method, StatusCode, Uri};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde_json::json;
use shared_types::{
    CommitAck, L1Envelope, ShardCommitRequest, ShardDirectory, ShardInfoMeta, TxStatusMeta,
};
use tracing::info;

use crate::abci::LedgerApp;
use crate::commit::CommitPipeline;
use crate::error::L1Error;
use crate::index::IndexStore;

/// Shared state for all L1 handlers.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<CommitPipeline>,
    pub index: IndexStore,
    pub app: Arc<LedgerApp>,
    pub node_id: String,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(
        pipeline: Arc<CommitPipeline>,
        index: IndexStore,
        app: Arc<LedgerApp>,
        node_id: impl Into<String>,
    ) -> Self {
        Self {
            pipeline,
            index,
            app,
            node_id: node_id.into(),
            started_at: Instant::now(),
        }
    }

    /// Wrap a non-consensus payload in the response envelope.
    fn processed(&self, status: StatusCode, data: serde_json::Value) -> Response {
        let envelope = L1Envelope {
            data,
            meta: TxStatusMeta::processed(),
            node_id: self.node_id.clone(),
        };
        (status, Json(envelope)).into_response()
    }

    /// Wrap an error in the response envelope.
    fn failed(&self, error: &L1Error) -> Response {
        self.processed(error.status(), json!({ "error": error.to_string() }))
    }
}

/// Build the L1 router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/l1/commit", post(receive_shard_commit))
        .route("/l1/sessions/group/:group", get(sessions_by_group))
        .route("/l1/sessions/shard/:shard", get(sessions_by_shard))
        .route("/l1/transaction/:hash", get(transaction_by_hash))
        .route("/l1/status", get(l1_status))
        .route("/l1/shards", get(all_shards))
        .route("/debug", get(debug_info))
        .fallback(not_found)
        .layer(middleware::from_fn(request_trace))
        .with_state(state)
}

/// Tag each request with a correlation id and log its outcome.
async fn request_trace(req: Request, next: Next) -> Response {
    let request_id = shared_types::ids::request_id();
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let response = next.run(req).await;
    info!(
        request_id = %request_id,
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        "request processed"
    );
    response
}

async fn not_found(State(state): State<AppState>, method: Method, uri: Uri) -> Response {
    state.processed(
        StatusCode::NOT_FOUND,
        json!({ "error": format!("Service not found for {method} {}", uri.path()) }),
    )
}

/// `POST /l1/commit` - admit a shard commit and run it through consensus.
async fn receive_shard_commit(State(state): State<AppState>, bytes: Bytes) -> Response {
    let request: ShardCommitRequest = match serde_json::from_slice(&bytes) {
        Ok(request) => request,
        Err(e) => {
            let err = L1Error::BadRequest(format!("Invalid request format: {e}"));
            return state.failed(&err);
        }
    };

    match state.pipeline.receive(&request).await {
        Ok(row) => {
            let ack = CommitAck {
                message: "Shard commit processed successfully".to_string(),
                tx_hash: row.tx_hash.clone(),
                session_id: row.session_id.clone(),
                shard_id: row.shard_id.clone(),
                block_height: row.block_height,
            };
            let envelope = L1Envelope {
                data: ack,
                meta: TxStatusMeta::confirmed(
                    row.tx_hash,
                    row.block_height,
                    ShardInfoMeta {
                        shard_id: request.shard_id,
                        client_group: request.client_group,
                        l2_node_id: request.l2_node_id,
                    },
                ),
                node_id: state.node_id.clone(),
            };
            (StatusCode::ACCEPTED, Json(envelope)).into_response()
        }
        Err(e) => {
            info!(
                session_id = %request.session_id,
                shard_id = %request.shard_id,
                code = e.code(),
                "shard commit rejected"
            );
            state.failed(&e)
        }
    }
}

/// `GET /l1/sessions/group/:group`
async fn sessions_by_group(State(state): State<AppState>, Path(group): Path<String>) -> Response {
    match state.index.sessions_by_group(&group) {
        Ok(sessions) => state.processed(StatusCode::OK, json!(sessions)),
        Err(e) => state.failed(&e),
    }
}

/// `GET /l1/sessions/shard/:shard`
async fn sessions_by_shard(State(state): State<AppState>, Path(shard): Path<String>) -> Response {
    match state.index.sessions_by_shard(&shard) {
        Ok(sessions) => state.processed(StatusCode::OK, json!(sessions)),
        Err(e) => state.failed(&e),
    }
}

/// `GET /l1/transaction/:hash`
async fn transaction_by_hash(State(state): State<AppState>, Path(hash): Path<String>) -> Response {
    match state.index.transaction_by_hash(&hash) {
        Ok(view) => state.processed(StatusCode::OK, json!(view)),
        Err(e) => state.failed(&e),
    }
}

/// `GET /l1/status`
async fn l1_status(State(state): State<AppState>) -> Response {
    state.processed(
        StatusCode::OK,
        json!({
            "status": "active",
            "layer": "L1",
            "type": "Byzantine Fault Tolerant",
            "time": Utc::now(),
        }),
    )
}

/// `GET /l1/shards`
async fn all_shards(State(state): State<AppState>) -> Response {
    match state.index.all_shards() {
        Ok(shards) => state.processed(StatusCode::OK, json!(ShardDirectory::new(shards))),
        Err(e) => state.failed(&e),
    }
}

/// `GET /debug` - replica diagnostics.
async fn debug_info(State(state): State<AppState>) -> Response {
    let info = state.app.info().unwrap_or_default();
    state.processed(
        StatusCode::OK,
        json!({
            "layer": "L1",
            "type": "Byzantine Fault Tolerant",
            "node_id": state.node_id,
            "architecture": "Sharded L2 + Unified L1",
            "uptime_secs": state.started_at.elapsed().as_secs(),
            "last_block_height": info.last_block_height,
            "last_block_app_hash": hex::encode(&info.last_block_app_hash),
        }),
    )
}

//! # L2 HTTP Surface
//!
//! Session workflow endpoints plus the cross-shard preflight: requests
//! carrying an `X-Client-Group` header for a foreign group are forwarded
//! (not redirected) to the owning shard, preserving method, path, body and
//! headers. Exact match on the local group is terminal, so a forwarded
//! request is always handled where it lands.

use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body, Bytes};
use axum::extract::{Path, Request, State};
use axum::http::{header, HeaderValue, Method, StatusCode, Uri};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use shared_types::ShardRecord;
use tracing::{error, info, warn};

use crate::config::ShardConfig;
use crate::error::ShardError;
use crate::l1client::L1Client;
use crate::registry::RegistryCache;
use crate::store::models::SessionStatus;
use crate::store::SessionStore;

const FORWARD_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Header used by clients (and forwarding shards) to address a client group.
pub const CLIENT_GROUP_HEADER: &str = "x-client-group";

/// Shared state for all L2 handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: ShardConfig,
    pub store: SessionStore,
    pub registry: Arc<RegistryCache>,
    pub l1: Arc<L1Client>,
    forward: reqwest::Client,
}

impl AppState {
    pub fn new(
        config: ShardConfig,
        store: SessionStore,
        registry: Arc<RegistryCache>,
        l1: Arc<L1Client>,
    ) -> Result<Self, ShardError> {
        let forward = reqwest::Client::builder()
            .timeout(FORWARD_TIMEOUT)
            .build()
            .map_err(|e| ShardError::Upstream(format!("failed to build forward client: {e}")))?;
        Ok(Self {
            config,
            store,
            registry,
            l1,
            forward,
        })
    }
}

/// Build the shard router with the group preflight layered in front.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/info", get(shard_info))
        .route("/session/start", post(start_session))
        .route("/session/:id/scan", post(scan_package))
        .route("/session/:id/validate", post(validate_package))
        .route("/session/:id/qc", post(quality_check))
        .route("/session/:id/label", post(label_package))
        .route("/session/:id/commit", post(commit_session))
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(state.clone(), group_preflight))
        .layer(middleware::from_fn(request_trace))
        .with_state(state)
}

/// Tag each request with a correlation id and log its outcome. Outermost
/// layer, so forwarded requests are logged on both shards.
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

async fn not_found(method: Method, uri: Uri) -> Response {
    let body = json!({ "error": format!("Service not found for {method} {}", uri.path()) });
    (StatusCode::NOT_FOUND, Json(body)).into_response()
}

/// Route requests addressed to a foreign client group to the owning shard.
///
/// Exact match on the local group terminates here; an unknown group falls
/// through to local handling, which fails downstream with a natural error.
async fn group_preflight(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let group = req
        .headers()
        .get(CLIENT_GROUP_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let Some(group) = group else {
        return next.run(req).await;
    };
    if group == state.config.client_group {
        return next.run(req).await;
    }

    match state.registry.lookup(&group) {
        Some(route) if route.shard_id != state.config.shard_id => {
            forward_request(&state, &route, req).await
        }
        _ => {
            warn!(client_group = %group, "no route for client group, handling locally");
            next.run(req).await
        }
    }
}

/// Open an outgoing call to the owning shard and relay its response.
async fn forward_request(state: &AppState, route: &ShardRecord, req: Request) -> Response {
    let (parts, body) = req.into_parts();
    let bytes = match to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(e) => {
            let body = json!({ "error": format!("Failed to read request body: {e}") });
            return (StatusCode::BAD_REQUEST, Json(body)).into_response();
        }
    };

    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let url = format!("{}{}", route.l2_endpoint.trim_end_matches('/'), path_and_query);

    let mut headers = parts.headers.clone();
    headers.remove(header::HOST);
    headers.remove(header::CONTENT_LENGTH);

    info!(
        shard_id = %route.shard_id,
        url = %url,
        method = %parts.method,
        "forwarding request to owning shard"
    );

    let outcome = state
        .forward
        .request(parts.method.clone(), &url)
        .headers(headers)
        .body(bytes.to_vec())
        .send()
        .await;

    match outcome {
        Ok(upstream) => {
            let status = StatusCode::from_u16(upstream.status().as_u16())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            let body = upstream.bytes().await.unwrap_or_default();
            let mut response = Response::new(Body::from(body));
            *response.status_mut() = status;
            response
                .headers_mut()
                .insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
            response
        }
        Err(e) => {
            error!(shard_id = %route.shard_id, error = %e, "forward failed");
            let body = json!({
                "error": format!("Failed to forward to shard {}: {e}", route.shard_id)
            });
            (StatusCode::BAD_GATEWAY, Json(body)).into_response()
        }
    }
}

fn parse_body<T: DeserializeOwned>(bytes: &Bytes) -> Result<T, ShardError> {
    serde_json::from_slice(bytes)
        .map_err(|e| ShardError::BadRequest(format!("Invalid request body: {e}")))
}

async fn shard_info(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "shard_id": state.config.shard_id,
        "client_group": state.config.client_group,
        "type": "L2 Shard Node",
        "status": "active",
    }))
}

#[derive(Debug, Deserialize)]
struct StartSessionBody {
    #[serde(default)]
    operator_id: String,
}

async fn start_session(
    State(state): State<AppState>,
    bytes: Bytes,
) -> Result<Response, ShardError> {
    let body: StartSessionBody = parse_body(&bytes)?;
    if body.operator_id.is_empty() {
        return Err(ShardError::BadRequest("operator_id is required".into()));
    }

    let session = state.store.create_session(&body.operator_id)?;
    info!(session_id = %session.session_id, operator_id = %session.operator_id, "session created");

    let body = json!({
        "message": "Session created successfully",
        "session_id": session.session_id,
        "operator_id": session.operator_id,
        "status": session.status,
        "shard_id": state.config.shard_id,
    });
    Ok((StatusCode::CREATED, Json(body)).into_response())
}

#[derive(Debug, Deserialize)]
struct ScanBody {
    #[serde(default)]
    package_id: String,
}

async fn scan_package(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    bytes: Bytes,
) -> Result<Response, ShardError> {
    let body: ScanBody = parse_body(&bytes)?;
    if body.package_id.is_empty() {
        return Err(ShardError::BadRequest("package_id is required".into()));
    }

    let detail = state.store.scan_package(&session_id, &body.package_id)?;
    let supplier = detail
        .supplier
        .as_ref()
        .map(|s| s.name.clone())
        .unwrap_or_else(|| "Unknown".to_string());

    let body = json!({
        "message": "Package scanned successfully",
        "package_id": detail.package.package_id,
        "supplier": supplier,
        "expected_contents": detail.items,
        "supplier_signature": detail.package.signature,
        "status": detail.package.status,
        "next_step": "validate",
    });
    Ok(Json(body).into_response())
}

#[derive(Debug, Deserialize)]
struct ValidateBody {
    #[serde(default)]
    signature: String,
    #[serde(default)]
    package_id: String,
}

async fn validate_package(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    bytes: Bytes,
) -> Result<Response, ShardError> {
    let body: ValidateBody = parse_body(&bytes)?;
    if body.signature.is_empty() || body.package_id.is_empty() {
        return Err(ShardError::BadRequest(
            "signature and package_id are required".into(),
        ));
    }

    let detail = state
        .store
        .validate_package(&session_id, &body.package_id, &body.signature)?;
    let supplier = detail
        .supplier
        .as_ref()
        .map(|s| s.name.clone())
        .unwrap_or_else(|| "Unknown".to_string());

    let body = json!({
        "message": "Package validated successfully",
        "package_id": detail.package.package_id,
        "supplier": supplier,
        "is_trusted": detail.package.is_trusted,
        "status": detail.package.status,
        "next_step": "qc",
    });
    Ok(Json(body).into_response())
}

#[derive(Debug, Deserialize)]
struct QcBody {
    #[serde(default)]
    passed: bool,
    #[serde(default)]
    issues: Vec<String>,
}

async fn quality_check(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    bytes: Bytes,
) -> Result<Response, ShardError> {
    let body: QcBody = parse_body(&bytes)?;

    let (detail, record) = state
        .store
        .quality_check(&session_id, body.passed, &body.issues)?;

    let body = json!({
        "message": "Quality check completed",
        "qc_id": record.qc_id,
        "passed": record.passed,
        "package_id": detail.package.package_id,
        "status": detail.package.status,
        "next_step": "label",
    });
    Ok(Json(body).into_response())
}

#[derive(Debug, Deserialize)]
struct LabelBody {
    #[serde(default)]
    courier_id: String,
}

async fn label_package(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    bytes: Bytes,
) -> Result<Response, ShardError> {
    let body: LabelBody = parse_body(&bytes)?;
    if body.courier_id.is_empty() {
        return Err(ShardError::BadRequest("courier_id is required".into()));
    }

    let detail = state.store.label_package(&session_id, &body.courier_id)?;
    let courier = detail
        .courier
        .as_ref()
        .map(|c| c.name.clone())
        .unwrap_or_else(|| "Unknown".to_string());

    let body = json!({
        "message": "Shipping label created",
        "label_id": detail.label.label_id,
        "tracking_no": detail.label.tracking_no,
        "courier": courier,
        "session_id": session_id,
        "next_step": "commit",
    });
    Ok(Json(body).into_response())
}

async fn commit_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Response, ShardError> {
    let aggregate = state.store.session_aggregate(&session_id)?;

    if aggregate.session.is_committed {
        let body = json!({
            "error": "Session already committed",
            "tx_hash": aggregate.session.l1_tx_hash,
        });
        return Ok((StatusCode::CONFLICT, Json(body)).into_response());
    }
    if aggregate.session.status != SessionStatus::Completed {
        let body = json!({
            "error": "Session must be completed before committing",
            "current_status": aggregate.session.status,
        });
        return Ok((StatusCode::BAD_REQUEST, Json(body)).into_response());
    }

    let response = state
        .l1
        .commit_session(&aggregate, &state.config.client_group)
        .await
        .map_err(|e| ShardError::Upstream(format!("Failed to commit to L1: {e}")))?;

    state.store.mark_committed(
        &session_id,
        &response.data.tx_hash,
        response.meta.block_height,
    )?;
    info!(
        session_id = %session_id,
        tx_hash = %response.data.tx_hash,
        block_height = response.meta.block_height,
        "session committed to L1"
    );

    let body = json!({
        "message": "Session committed to L1 successfully",
        "session_id": session_id,
        "tx_hash": response.data.tx_hash,
        "block_height": response.meta.block_height,
        "shard_id": state.config.shard_id,
        "status": "committed",
    });
    Ok(Json(body).into_response())
}

//! # L2 → L1 Client
//!
//! Builds the canonical session payload and submits it to any L1 replica.
//! Commit responses must be 200 or 202; anything else leaves the session
//! uncommitted on this side (the caller may re-issue, nothing retries
//! automatically).

use std::time::Duration;

use chrono::Utc;
use reqwest::Client;
use serde_json::json;
use shared_types::{CommitAck, L1Envelope, ShardCommitRequest, ShardDirectory, ShardRecord};
use tracing::info;

use crate::error::ShardError;
use crate::store::models::SessionAggregate;

const COMMIT_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client against the L1 commit and registry endpoints.
pub struct L1Client {
    endpoint: String,
    shard_id: String,
    node_id: String,
    http: Client,
}

impl L1Client {
    pub fn new(
        endpoint: impl Into<String>,
        shard_id: impl Into<String>,
        node_id: impl Into<String>,
    ) -> Result<Self, ShardError> {
        let http = Client::builder()
            .timeout(COMMIT_TIMEOUT)
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| ShardError::Upstream(format!("failed to build L1 client: {e}")))?;

        Ok(Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            shard_id: shard_id.into(),
            node_id: node_id.into(),
            http,
        })
    }

    /// Commit a completed session to L1 and return the parsed result.
    pub async fn commit_session(
        &self,
        aggregate: &SessionAggregate,
        client_group: &str,
    ) -> Result<L1Envelope<CommitAck>, ShardError> {
        let request = ShardCommitRequest {
            shard_id: self.shard_id.clone(),
            client_group: client_group.to_string(),
            session_id: aggregate.session.session_id.clone(),
            operator_id: aggregate.session.operator_id.clone(),
            session_data: build_session_data(aggregate),
            l2_node_id: self.node_id.clone(),
            timestamp: Utc::now(),
        };

        let url = format!("{}/l1/commit", self.endpoint);
        let response = self
            .http
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| ShardError::Upstream(format!("failed to send request to L1: {e}")))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| ShardError::Upstream(format!("failed to read L1 response: {e}")))?;

        if status != reqwest::StatusCode::OK && status != reqwest::StatusCode::ACCEPTED {
            return Err(ShardError::Upstream(format!(
                "L1 returned error status {}: {}",
                status.as_u16(),
                String::from_utf8_lossy(&body)
            )));
        }

        serde_json::from_slice(&body)
            .map_err(|e| ShardError::Upstream(format!("failed to parse L1 response: {e}")))
    }

    /// Fetch the shard registry to prime the local routing cache.
    pub async fn load_shards(&self) -> Result<Vec<ShardRecord>, ShardError> {
        let url = format!("{}/l1/shards", self.endpoint);
        let envelope: L1Envelope<ShardDirectory> = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| ShardError::Upstream(format!("failed to load shards from L1: {e}")))?
            .json()
            .await
            .map_err(|e| ShardError::Upstream(format!("failed to parse shard registry: {e}")))?;

        info!(count = envelope.data.count, "loaded shard registry from L1");
        Ok(envelope.data.shards)
    }

    /// Probe `GET /l1/status`. Used once at startup; failure is non-fatal.
    pub async fn health_check(&self) -> Result<(), ShardError> {
        let url = format!("{}/l1/status", self.endpoint);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| ShardError::Upstream(format!("L1 is unreachable: {e}")))?;

        if !response.status().is_success() {
            return Err(ShardError::Upstream(format!(
                "L1 health check failed with status {}",
                response.status().as_u16()
            )));
        }
        Ok(())
    }
}

/// Freeze the session aggregate into the canonical `session_data` blob.
///
/// Optional sections (`package`, `qc_record`, `label`) are present iff the
/// corresponding stage ran; the L1 stores the value opaquely.
fn build_session_data(aggregate: &SessionAggregate) -> serde_json::Value {
    let session = &aggregate.session;
    let mut data = json!({
        "session_id": session.session_id,
        "operator_id": session.operator_id,
        "status": session.status,
        "created_at": session.created_at,
        "updated_at": session.updated_at,
    });

    if let Some(detail) = &aggregate.package {
        let items: Vec<serde_json::Value> = detail
            .items
            .iter()
            .map(|item| {
                json!({
                    "item_id": item.item_id,
                    "description": item.description,
                    "quantity": item.quantity,
                })
            })
            .collect();

        let mut package = json!({
            "package_id": detail.package.package_id,
            "signature": detail.package.signature,
            "items": items,
        });
        if let Some(supplier) = &detail.supplier {
            package["supplier"] = json!({
                "supplier_id": supplier.supplier_id,
                "name": supplier.name,
                "country": supplier.country,
            });
        }
        data["package"] = package;
    }

    if let Some(qc) = &aggregate.qc_record {
        data["qc_record"] = json!({
            "qc_id": qc.qc_id,
            "passed": qc.passed,
            "issues": qc.issues,
            "created_at": qc.created_at,
        });
    }

    if let Some(detail) = &aggregate.label {
        let mut label = json!({
            "label_id": detail.label.label_id,
            "tracking_no": detail.label.tracking_no,
            "created_at": detail.label.created_at,
        });
        if let Some(courier) = &detail.courier {
            label["courier"] = json!({
                "courier_id": courier.courier_id,
                "name": courier.name,
            });
        }
        data["label"] = label;
    }

    data
}

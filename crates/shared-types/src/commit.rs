//! # Shard Commit Payload
//!
//! The canonical record an L2 shard submits to the L1 ledger on session
//! commit. The same struct is serialized by the L2 client, validated by the
//! L1 HTTP surface, and carried as raw bytes through consensus, so its
//! field set is the wire contract between the two tiers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A commit forwarded from an L2 shard to the L1 ledger.
///
/// `session_data` is an opaque JSON blob frozen at commit time; the L1
/// stores it verbatim and never mutates it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShardCommitRequest {
    /// Originating shard.
    pub shard_id: String,
    /// Client group the shard owns.
    pub client_group: String,
    /// Globally unique session identifier.
    pub session_id: String,
    /// Operator who drove the session.
    pub operator_id: String,
    /// Frozen session aggregate (package, QC record, label, ...).
    #[serde(default)]
    pub session_data: serde_json::Value,
    /// L2 node that produced this commit.
    pub l2_node_id: String,
    /// Submission timestamp on the L2 side.
    pub timestamp: DateTime<Utc>,
}

impl ShardCommitRequest {
    /// Check the fields that must be present before any ledger or index
    /// write happens. Returns the name of the first missing field.
    pub fn missing_field(&self) -> Option<&'static str> {
        if self.shard_id.is_empty() {
            return Some("shard_id");
        }
        if self.session_id.is_empty() {
            return Some("session_id");
        }
        if self.client_group.is_empty() {
            return Some("client_group");
        }
        None
    }
}

/// The `data` payload of a successful `/l1/commit` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitAck {
    pub message: String,
    pub tx_hash: String,
    pub session_id: String,
    pub shard_id: String,
    pub block_height: i64,
}

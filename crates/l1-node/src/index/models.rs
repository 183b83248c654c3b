//! Rows of the relational index.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared_types::ShardRecord;

/// A committed session as indexed at L1. `session_data` is the opaque
/// aggregate frozen by the owning shard at commit time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionIndexRow {
    pub session_id: String,
    pub shard_id: String,
    pub client_group: String,
    pub operator_id: String,
    pub status: String,
    pub is_committed: bool,
    pub tx_hash: Option<String>,
    pub session_data: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A finalized L1 transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRow {
    pub tx_hash: String,
    pub session_id: String,
    pub shard_id: String,
    pub client_group: String,
    pub block_height: i64,
    pub timestamp: DateTime<Utc>,
    pub status: String,
}

/// An operator registered for cross-shard queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperatorRow {
    pub operator_id: String,
    pub name: String,
    pub role: String,
    pub access_level: String,
    pub shard_id: String,
}

/// Session row with its shard and transaction relations attached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionIndexView {
    #[serde(flatten)]
    pub session: SessionIndexRow,
    pub shard: Option<ShardRecord>,
    pub transaction: Option<TransactionRow>,
}

/// Transaction row with its session and shard relations attached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionView {
    #[serde(flatten)]
    pub transaction: TransactionRow,
    pub session: Option<SessionIndexRow>,
    pub shard: Option<ShardRecord>,
}

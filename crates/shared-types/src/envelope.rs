//! # L1 Response Envelope
//!
//! Every L1 HTTP response is wrapped in the same `{data, meta, node_id}`
//! envelope. Commit responses carry the consensus result in `meta`; all
//! other endpoints report `status = "processed"` with the consensus-specific
//! fields left empty.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Uniform wrapper applied by the L1 HTTP layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct L1Envelope<T> {
    pub data: T,
    pub meta: TxStatusMeta,
    pub node_id: String,
}

/// Consensus status attached to an L1 response.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TxStatusMeta {
    pub tx_id: String,
    pub status: String,
    pub block_height: i64,
    pub confirm_time: Option<DateTime<Utc>>,
    pub shard_info: ShardInfoMeta,
}

/// Originating-shard fields of the commit response meta.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ShardInfoMeta {
    pub shard_id: String,
    pub client_group: String,
    pub l2_node_id: String,
}

impl TxStatusMeta {
    /// Meta for endpoints that did not run consensus.
    pub fn processed() -> Self {
        Self {
            status: "processed".to_string(),
            ..Self::default()
        }
    }

    /// Meta for a commit that was finalized in a block.
    pub fn confirmed(tx_id: impl Into<String>, block_height: i64, shard_info: ShardInfoMeta) -> Self {
        Self {
            tx_id: tx_id.into(),
            status: "confirmed".to_string(),
            block_height,
            confirm_time: Some(Utc::now()),
            shard_info,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_processed_meta_leaves_consensus_fields_empty() {
        let meta = TxStatusMeta::processed();
        assert_eq!(meta.status, "processed");
        assert!(meta.tx_id.is_empty());
        assert_eq!(meta.block_height, 0);
        assert!(meta.confirm_time.is_none());
    }

    #[test]
    fn test_confirmed_meta_carries_consensus_result() {
        let meta = TxStatusMeta::confirmed(
            "abc123",
            7,
            ShardInfoMeta {
                shard_id: "shard-a".into(),
                client_group: "group-a".into(),
                l2_node_id: "l2-node-a".into(),
            },
        );
        assert_eq!(meta.status, "confirmed");
        assert_eq!(meta.block_height, 7);
        assert!(meta.confirm_time.is_some());
    }

    #[test]
    fn test_envelope_round_trips_typed_data() {
        let envelope = L1Envelope {
            data: serde_json::json!({"shards": [], "count": 0}),
            meta: TxStatusMeta::processed(),
            node_id: "l1-node0".into(),
        };
        let json = serde_json::to_string(&envelope).unwrap();
        let back: L1Envelope<serde_json::Value> = serde_json::from_str(&json).unwrap();
        assert_eq!(back.node_id, "l1-node0");
        assert_eq!(back.data["count"], 0);
    }
}

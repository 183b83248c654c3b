//! Shard registry entries.
//!
//! The L1 index store is the authoritative registry; L2 shards hold a
//! read-mostly cached copy primed at startup from `GET /l1/shards`.

use serde::{Deserialize, Serialize};

/// Whether a shard currently owns its client group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShardStatus {
    Active,
    Inactive,
}

impl ShardStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShardStatus::Active => "active",
            ShardStatus::Inactive => "inactive",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "inactive" => ShardStatus::Inactive,
            _ => ShardStatus::Active,
        }
    }
}

/// One row of the shard registry: `client_group -> shard -> l2_endpoint`.
///
/// Invariant: among active shards, each `client_group` maps to at most one
/// shard at any moment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShardRecord {
    pub shard_id: String,
    pub client_group: String,
    pub l2_node_id: String,
    pub l2_endpoint: String,
    pub status: ShardStatus,
}

impl ShardRecord {
    pub fn is_active(&self) -> bool {
        self.status == ShardStatus::Active
    }
}

/// Body of `GET /l1/shards`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShardDirectory {
    pub shards: Vec<ShardRecord>,
    pub count: usize,
}

impl ShardDirectory {
    pub fn new(shards: Vec<ShardRecord>) -> Self {
        let count = shards.len();
        Self { shards, count }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        assert_eq!(ShardStatus::parse("active"), ShardStatus::Active);
        assert_eq!(ShardStatus::parse("inactive"), ShardStatus::Inactive);
        assert_eq!(ShardStatus::Active.as_str(), "active");
    }

    #[test]
    fn test_directory_counts_entries() {
        let dir = ShardDirectory::new(vec![ShardRecord {
            shard_id: "shard-a".into(),
            client_group: "group-a".into(),
            l2_node_id: "l2-node-a".into(),
            l2_endpoint: "http://l2-node-a:6000".into(),
            status: ShardStatus::Active,
        }]);
        assert_eq!(dir.count, 1);
    }
}

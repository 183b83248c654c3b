//! Shard configuration from environment variables.

use std::env;

use crate::error::ShardError;

/// Runtime configuration for one L2 shard node.
#[derive(Debug, Clone)]
pub struct ShardConfig {
    /// Shard identity, e.g. `shard-a`.
    pub shard_id: String,
    /// Client group this shard owns, e.g. `group-a`.
    pub client_group: String,
    /// Node identity reported in commit payloads.
    pub l2_node_id: String,
    /// HTTP listen port.
    pub http_port: u16,
    /// SQLite database path for the session store.
    pub db_path: String,
    /// Base URL of any L1 replica, e.g. `http://localhost:5000`.
    pub l1_endpoint: String,
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).ok().filter(|v| !v.is_empty()).unwrap_or_else(|| default.to_string())
}

impl ShardConfig {
    /// Load configuration from the environment with shard-a defaults.
    pub fn from_env() -> Result<Self, ShardError> {
        let http_port = env_or("HTTP_PORT", "6000")
            .parse::<u16>()
            .map_err(|e| ShardError::BadRequest(format!("invalid HTTP_PORT: {e}")))?;

        let config = Self {
            shard_id: env_or("SHARD_ID", "shard-a"),
            client_group: env_or("CLIENT_GROUP", "group-a"),
            l2_node_id: env_or("L2_NODE_ID", "l2-node-a"),
            http_port,
            db_path: env_or("DB_PATH", "./data/l2-shard.db"),
            l1_endpoint: env_or("L1_ENDPOINT", "http://localhost:5000"),
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that cannot identify the shard or reach L1.
    pub fn validate(&self) -> Result<(), ShardError> {
        if self.shard_id.is_empty() {
            return Err(ShardError::BadRequest("SHARD_ID is required".into()));
        }
        if self.client_group.is_empty() {
            return Err(ShardError::BadRequest("CLIENT_GROUP is required".into()));
        }
        if self.l2_node_id.is_empty() {
            return Err(ShardError::BadRequest("L2_NODE_ID is required".into()));
        }
        if self.l1_endpoint.is_empty() {
            return Err(ShardError::BadRequest("L1_ENDPOINT is required".into()));
        }
        Ok(())
    }

    /// Config for tests: in-memory store, caller-provided identity.
    pub fn for_testing(shard_id: &str, client_group: &str) -> Self {
        Self {
            shard_id: shard_id.to_string(),
            client_group: client_group.to_string(),
            l2_node_id: format!("l2-node-{shard_id}"),
            http_port: 0,
            db_path: ":memory:".to_string(),
            l1_endpoint: "http://127.0.0.1:1".to_string(),
        }
    }
}

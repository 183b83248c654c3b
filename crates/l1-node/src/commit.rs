//! # Commit Pipeline
//!
//! The path from a validated commit request to a finalized ledger record:
//! registry check, index pre-insert (the exactly-once admission latch),
//! blocking consensus broadcast, then tx-hash surfacing and the
//! transaction row. A consensus failure rolls the pre-inserted index row
//! back so the session id can be re-admitted.

use chrono::Utc;
use shared_types::ShardCommitRequest;
use tracing::{error, info};

use crate::consensus::ConsensusAdapter;
use crate::error::L1Error;
use crate::index::models::TransactionRow;
use crate::index::IndexStore;

/// Orchestrates `/l1/commit` from admission through finalization.
pub struct CommitPipeline {
    index: IndexStore,
    consensus: ConsensusAdapter,
}

impl CommitPipeline {
    pub fn new(index: IndexStore, consensus: ConsensusAdapter) -> Self {
        Self { index, consensus }
    }

    /// Process one shard commit, returning the finalized transaction row.
    pub async fn receive(&self, request: &ShardCommitRequest) -> Result<TransactionRow, L1Error> {
        if let Some(field) = request.missing_field() {
            return Err(L1Error::BadRequest(format!(
                "Missing required fields: shard_id, session_id, client_group ({field} is empty)"
            )));
        }

        self.index
            .get_shard(&request.shard_id)?
            .ok_or_else(|| {
                L1Error::ShardNotFound(format!(
                    "Shard {} not registered in L1",
                    request.shard_id
                ))
            })?;

        // Admission latch: insert before consensus so at most one
        // submission per session id is ever in flight ledger-wide.
        self.index.admit_session(request)?;

        let result = match self.consensus.submit(request).await {
            Ok(result) => result,
            Err(e) => {
                if let Err(evict_err) = self.index.evict_session(&request.session_id) {
                    error!(
                        session_id = %request.session_id,
                        error = %evict_err,
                        "failed to roll back admitted session after consensus failure"
                    );
                }
                return Err(e);
            }
        };

        self.index.confirm_session(&request.session_id, &result.tx_hash)?;

        let row = TransactionRow {
            tx_hash: result.tx_hash,
            session_id: request.session_id.clone(),
            shard_id: request.shard_id.clone(),
            client_group: request.client_group.clone(),
            block_height: result.block_height,
            timestamp: Utc::now(),
            status: "confirmed".to_string(),
        };
        self.index.record_transaction(&row)?;

        info!(
            session_id = %row.session_id,
            shard_id = %row.shard_id,
            tx_hash = %row.tx_hash,
            block_height = row.block_height,
            "shard commit finalized"
        );
        Ok(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abci::LedgerApp;
    use crate::consensus::{
        BroadcastOutcome, ConsensusEngine, EngineError, LocalEngine,
    };
    use crate::ledger::{LedgerConfig, LedgerStore};
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;

    fn pipeline() -> (TempDir, IndexStore, CommitPipeline) {
        let dir = TempDir::new().unwrap();
        let ledger =
            Arc::new(LedgerStore::open(LedgerConfig::for_testing(dir.path())).unwrap());
        let app = Arc::new(LedgerApp::new(ledger));
        let engine = Arc::new(LocalEngine::new(app));
        let adapter = ConsensusAdapter::new(engine, Duration::from_secs(5));
        let index = IndexStore::open_in_memory().unwrap();
        index.seed().unwrap();
        let pipeline = CommitPipeline::new(index.clone(), adapter);
        (dir, index, pipeline)
    }

    fn request(session_id: &str, shard_id: &str) -> ShardCommitRequest {
        ShardCommitRequest {
            shard_id: shard_id.into(),
            client_group: "group-a".into(),
            session_id: session_id.into(),
            operator_id: "OPR-001".into(),
            session_data: serde_json::json!({"status": "completed"}),
            l2_node_id: "l2-node-a".into(),
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_happy_path_produces_confirmed_row() {
        let (_dir, index, pipeline) = pipeline();

        let row = pipeline.receive(&request("SES-1", "shard-a")).await.unwrap();
        assert_eq!(row.status, "confirmed");
        assert!(row.block_height >= 1);
        assert_eq!(row.tx_hash.len(), 64);

        let sessions = index.sessions_by_shard("shard-a").unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].session.tx_hash.as_deref(), Some(row.tx_hash.as_str()));
    }

    #[tokio::test]
    async fn test_unknown_shard_is_rejected_without_admission() {
        let (_dir, index, pipeline) = pipeline();
        let err = pipeline.receive(&request("SES-1", "shard-z")).await.unwrap_err();
        assert!(matches!(err, L1Error::ShardNotFound(_)));
        assert!(index.sessions_by_group("group-a").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_fields_are_rejected_before_any_write() {
        let (_dir, index, pipeline) = pipeline();
        let err = pipeline.receive(&request("", "shard-a")).await.unwrap_err();
        assert!(matches!(err, L1Error::BadRequest(_)));
        assert!(index.sessions_by_shard("shard-a").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_session_conflicts() {
        let (_dir, _index, pipeline) = pipeline();
        pipeline.receive(&request("dup-1", "shard-a")).await.unwrap();
        let err = pipeline.receive(&request("dup-1", "shard-a")).await.unwrap_err();
        assert!(matches!(err, L1Error::SessionExists(_)));
    }

    #[tokio::test]
    async fn test_concurrent_duplicates_admit_exactly_one() {
        let (_dir, index, pipeline) = pipeline();

        let req1 = request("dup-1", "shard-a");
        let req2 = request("dup-1", "shard-a");
        let first = pipeline.receive(&req1);
        let second = pipeline.receive(&req2);
        let (a, b) = tokio::join!(first, second);

        assert!(a.is_ok() != b.is_ok(), "exactly one submission must win");
        let err = a.err().or(b.err()).unwrap();
        assert!(matches!(err, L1Error::SessionExists(_)));
        assert_eq!(index.sessions_by_shard("shard-a").unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_consensus_failure_rolls_back_admission() {
        struct FailingEngine;

        #[async_trait]
        impl ConsensusEngine for FailingEngine {
            async fn broadcast_tx_commit(
                &self,
                _tx: Vec<u8>,
            ) -> Result<BroadcastOutcome, EngineError> {
                Err(EngineError::Unavailable("engine down".to_string()))
            }
        }

        let index = IndexStore::open_in_memory().unwrap();
        index.seed().unwrap();
        let adapter = ConsensusAdapter::new(Arc::new(FailingEngine), Duration::from_secs(1));
        let pipeline = CommitPipeline::new(index.clone(), adapter);

        let err = pipeline.receive(&request("SES-1", "shard-a")).await.unwrap_err();
        assert!(matches!(err, L1Error::Consensus(_)));
        // The admission row was rolled back: no session is indexed and a
        // retry can be admitted again.
        assert!(index.sessions_by_shard("shard-a").unwrap().is_empty());
        index.admit_session(&request("SES-1", "shard-a")).unwrap();
    }

    #[tokio::test]
    async fn test_consensus_timeout_rolls_back_admission() {
        struct StalledEngine;

        #[async_trait]
        impl ConsensusEngine for StalledEngine {
            async fn broadcast_tx_commit(
                &self,
                _tx: Vec<u8>,
            ) -> Result<BroadcastOutcome, EngineError> {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Err(EngineError::Unavailable("unreachable".to_string()))
            }
        }

        let index = IndexStore::open_in_memory().unwrap();
        index.seed().unwrap();
        let adapter = ConsensusAdapter::new(Arc::new(StalledEngine), Duration::from_millis(50));
        let pipeline = CommitPipeline::new(index.clone(), adapter);

        let err = pipeline.receive(&request("SES-1", "shard-a")).await.unwrap_err();
        assert!(matches!(err, L1Error::ConsensusTimeout));
        assert!(index.sessions_by_shard("shard-a").unwrap().is_empty());
    }
}

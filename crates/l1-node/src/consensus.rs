//! # Consensus Boundary
//!
//! The engine below the ABCI boundary is an external collaborator; this
//! module defines its contract, the blocking broadcast adapter used by the
//! commit pipeline, and a single-replica local engine that drives the
//! application directly.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use shared_types::{hashing, ShardCommitRequest};
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{error, info};

use crate::abci::types::{FinalizeBlockRequest, ProposalStatus};
use crate::abci::LedgerApp;
use crate::error::L1Error;

/// Errors from the consensus engine itself.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The proposal containing the transaction was rejected.
    #[error("proposal rejected by the application")]
    RejectedProposal,

    /// The transaction failed during block execution.
    #[error("transaction failed in block: {0}")]
    ExecFailed(String),

    /// The engine could not serve the request.
    #[error("engine unavailable: {0}")]
    Unavailable(String),
}

/// Result of a broadcast-and-wait call: the transaction was committed in a
/// block (or rejected by `CheckTx`, reported through `check_tx_code`).
#[derive(Debug, Clone)]
pub struct BroadcastOutcome {
    pub hash: Vec<u8>,
    pub height: i64,
    pub check_tx_code: u32,
    pub log: String,
}

/// Broadcast-and-wait primitive provided by the consensus engine.
#[async_trait]
pub trait ConsensusEngine: Send + Sync {
    async fn broadcast_tx_commit(&self, tx: Vec<u8>) -> Result<BroadcastOutcome, EngineError>;
}

/// Finalized consensus result surfaced to the commit pipeline.
#[derive(Debug, Clone)]
pub struct ConsensusResult {
    pub tx_hash: String,
    pub block_height: i64,
    pub code: u32,
}

/// Submits a serialized commit and blocks until finalization.
///
/// The broadcast runs on a background task; the caller waits on a
/// single-shot completion channel under a deadline, so an engine stall
/// surfaces as `CONSENSUS_TIMEOUT` instead of wedging the request thread.
pub struct ConsensusAdapter {
    engine: Arc<dyn ConsensusEngine>,
    deadline: Duration,
}

impl ConsensusAdapter {
    pub fn new(engine: Arc<dyn ConsensusEngine>, deadline: Duration) -> Self {
        Self { engine, deadline }
    }

    /// Serialize and submit a shard commit, waiting for finalization.
    pub async fn submit(&self, payload: &ShardCommitRequest) -> Result<ConsensusResult, L1Error> {
        let tx = serde_json::to_vec(payload)
            .map_err(|e| L1Error::BadRequest(format!("failed to serialize commit: {e}")))?;
        self.submit_bytes(tx).await
    }

    /// Submit raw transaction bytes, waiting for finalization.
    pub async fn submit_bytes(&self, tx: Vec<u8>) -> Result<ConsensusResult, L1Error> {
        let (done_tx, done_rx) = oneshot::channel();
        let engine = Arc::clone(&self.engine);

        tokio::spawn(async move {
            let outcome = engine.broadcast_tx_commit(tx).await;
            let _ = done_tx.send(outcome);
        });

        let outcome = match tokio::time::timeout(self.deadline, done_rx).await {
            Err(_) => return Err(L1Error::ConsensusTimeout),
            Ok(Err(_)) => {
                return Err(L1Error::Consensus("broadcast task aborted".to_string()))
            }
            Ok(Ok(Err(e))) => {
                return Err(L1Error::Consensus(format!("failed to commit to ledger: {e}")))
            }
            Ok(Ok(Ok(outcome))) => outcome,
        };

        if outcome.check_tx_code != 0 {
            return Err(L1Error::Consensus(format!(
                "ledger rejected transaction: CheckTx code {}",
                outcome.check_tx_code
            )));
        }

        Ok(ConsensusResult {
            tx_hash: hex::encode(&outcome.hash),
            block_height: outcome.height,
            code: outcome.check_tx_code,
        })
    }
}

/// Single-replica engine that drives the ABCI application in-process.
///
/// Block production is serialized so heights are strictly increasing; each
/// broadcast becomes its own one-transaction block. The real multi-replica
/// engine with P2P and validator sets sits below this boundary and is out
/// of scope.
pub struct LocalEngine {
    app: Arc<LedgerApp>,
    block_production: tokio::sync::Mutex<()>,
}

impl LocalEngine {
    pub fn new(app: Arc<LedgerApp>) -> Self {
        Self {
            app,
            block_production: tokio::sync::Mutex::new(()),
        }
    }
}

#[async_trait]
impl ConsensusEngine for LocalEngine {
    async fn broadcast_tx_commit(&self, tx: Vec<u8>) -> Result<BroadcastOutcome, EngineError> {
        let check = self.app.check_tx(&tx);
        if check.code != 0 {
            return Ok(BroadcastOutcome {
                hash: hashing::tx_hash(&tx),
                height: 0,
                check_tx_code: check.code,
                log: check.log,
            });
        }

        let _producing = self.block_production.lock().await;

        let info = self
            .app
            .info()
            .map_err(|e| EngineError::Unavailable(e.to_string()))?;
        let height = info.last_block_height + 1;

        if self.app.process_proposal(std::slice::from_ref(&tx)) == ProposalStatus::Reject {
            return Err(EngineError::RejectedProposal);
        }

        let response = self.app.finalize_block(FinalizeBlockRequest {
            height,
            txs: vec![tx.clone()],
        });
        self.app
            .commit()
            .map_err(|e| EngineError::Unavailable(e.to_string()))?;

        let result = response
            .tx_results
            .first()
            .ok_or_else(|| EngineError::Unavailable("empty block result".to_string()))?;
        if result.code != 0 {
            error!(height, code = result.code, log = %result.log, "transaction failed in block");
            return Err(EngineError::ExecFailed(result.log.clone()));
        }

        info!(height, "block committed");
        Ok(BroadcastOutcome {
            hash: hashing::tx_hash(&tx),
            height,
            check_tx_code: check.code,
            log: result.log.clone(),
        })
    }
}

//! # ABCI Application
//!
//! The application state machine driven by the consensus engine. Validates
//! shard commits in `CheckTx`/`ProcessProposal`, executes them against the
//! ledger store in `FinalizeBlock`, and applies the block's writes
//! atomically in `Commit`.

pub mod types;

use std::sync::Arc;

use parking_lot::Mutex;
use rocksdb::WriteBatch;
use serde_json::json;
use shared_types::{hashing, ShardCommitRequest};
use tracing::{error, info};

use crate::error::L1Error;
use crate::ledger::{encode_height, keys, LedgerStore};
use types::{
    ApplySnapshotChunkResult, CheckTxResponse, Event, EventAttribute, ExecTxResult,
    FinalizeBlockRequest, FinalizeBlockResponse, InfoResponse, ListSnapshotsResponse,
    LoadSnapshotChunkResponse, OfferSnapshotResponse, ProposalStatus, QueryResponse,
};

const EVENT_SHARD_COMMIT: &str = "l1_shard_commit";
const STATUS_ACCEPTED: &str = "accepted";

/// ABCI application over the ledger store.
///
/// Holds at most one in-progress block batch, built in `FinalizeBlock` and
/// consumed by `Commit`. Tx iteration follows the order given by the
/// engine; every derived value (tx id, app hash, event attribute order) is
/// byte-identical across replicas.
pub struct LedgerApp {
    ledger: Arc<LedgerStore>,
    ongoing_block: Mutex<Option<WriteBatch>>,
}

impl LedgerApp {
    pub fn new(ledger: Arc<LedgerStore>) -> Self {
        Self {
            ledger,
            ongoing_block: Mutex::new(None),
        }
    }

    /// Last finalized height and app hash from the ledger store.
    pub fn info(&self) -> Result<InfoResponse, L1Error> {
        Ok(InfoResponse {
            last_block_height: self.ledger.last_block_height()?,
            last_block_app_hash: self.ledger.last_app_hash()?.unwrap_or_default(),
        })
    }

    /// Admission check for a single transaction. Pure: no writes.
    pub fn check_tx(&self, tx: &[u8]) -> CheckTxResponse {
        let commit: ShardCommitRequest = match serde_json::from_slice(tx) {
            Ok(commit) => commit,
            Err(e) => return CheckTxResponse::reject(format!("malformed shard commit: {e}")),
        };
        if let Some(field) = commit.missing_field() {
            return CheckTxResponse::reject(format!("missing required field: {field}"));
        }
        CheckTxResponse::ok()
    }

    /// Deterministic validation of a proposed block: reject the proposal
    /// if any tx is malformed or lacks `shard_id`/`session_id`.
    pub fn process_proposal(&self, txs: &[Vec<u8>]) -> ProposalStatus {
        for (i, tx) in txs.iter().enumerate() {
            let commit: ShardCommitRequest = match serde_json::from_slice(tx) {
                Ok(commit) => commit,
                Err(e) => {
                    error!(index = i, error = %e, "invalid transaction format in proposal");
                    return ProposalStatus::Reject;
                }
            };
            if commit.shard_id.is_empty() || commit.session_id.is_empty() {
                error!(
                    index = i,
                    shard_id = %commit.shard_id,
                    session_id = %commit.session_id,
                    "invalid shard commit in proposal"
                );
                return ProposalStatus::Reject;
            }
        }
        ProposalStatus::Accept
    }

    /// Execute a block: write every commit into one batch and stage it for
    /// `Commit`.
    pub fn finalize_block(&self, request: FinalizeBlockRequest) -> FinalizeBlockResponse {
        let mut batch = WriteBatch::default();
        let mut tx_results = Vec::with_capacity(request.txs.len());

        for tx in &request.txs {
            tx_results.push(self.execute_tx(&mut batch, tx));
        }

        let app_hash =
            hashing::app_hash(tx_results.iter().map(|result| result.data.as_slice())).to_vec();

        batch.put(keys::LAST_BLOCK_HEIGHT, encode_height(request.height));
        batch.put(keys::LAST_BLOCK_APP_HASH, &app_hash);

        *self.ongoing_block.lock() = Some(batch);

        info!(
            height = request.height,
            txs = request.txs.len(),
            app_hash = %hex::encode(&app_hash),
            "block finalized"
        );

        FinalizeBlockResponse {
            tx_results,
            app_hash,
        }
    }

    fn execute_tx(&self, batch: &mut WriteBatch, tx: &[u8]) -> ExecTxResult {
        let commit: ShardCommitRequest = match serde_json::from_slice(tx) {
            Ok(commit) => commit,
            Err(_) => {
                return ExecTxResult {
                    code: 1,
                    data: Vec::new(),
                    log: "Invalid shard commit format".to_string(),
                    events: Vec::new(),
                }
            }
        };

        let tx_id = hashing::tx_id(&commit.session_id, &commit.shard_id);

        batch.put(keys::tx(&tx_id), tx);
        batch.put(keys::shard_session(&commit.shard_id, &commit.session_id), tx);
        batch.put(keys::status(&tx_id), STATUS_ACCEPTED.as_bytes());

        let indexed = |key: &str, value: &str| EventAttribute {
            key: key.to_string(),
            value: value.to_string(),
            index: true,
        };
        let events = vec![Event {
            kind: EVENT_SHARD_COMMIT.to_string(),
            attributes: vec![
                indexed("session_id", &commit.session_id),
                indexed("shard_id", &commit.shard_id),
                indexed("client_group", &commit.client_group),
                indexed("tx_id", &tx_id),
                indexed("status", STATUS_ACCEPTED),
            ],
        }];

        ExecTxResult {
            code: 0,
            data: tx_id.into_bytes(),
            log: STATUS_ACCEPTED.to_string(),
            events,
        }
    }

    /// Apply the staged block atomically. On error the writes are
    /// discarded and the ledger keeps the prior app hash.
    pub fn commit(&self) -> Result<(), L1Error> {
        let batch = self
            .ongoing_block
            .lock()
            .take()
            .ok_or_else(|| L1Error::Ledger("no block in progress".to_string()))?;
        self.ledger.commit_block(batch)
    }

    /// Cross-shard queries against the ledger store.
    ///
    /// - `verify:<tx_id>` - raw tx bytes plus execution status
    /// - `shard:<shard_id>` - every commit stored for the shard
    /// - anything else - plain key lookup
    pub fn query(&self, data: &[u8]) -> QueryResponse {
        if data.is_empty() {
            return QueryResponse {
                code: 1,
                log: "Empty query data".to_string(),
                value: Vec::new(),
            };
        }

        if let Some(tx_id) = data.strip_prefix(b"verify:") {
            return self.verify_transaction(&String::from_utf8_lossy(tx_id));
        }
        if let Some(shard_id) = data.strip_prefix(b"shard:") {
            return self.query_shard(&String::from_utf8_lossy(shard_id));
        }

        match self.ledger.get(data) {
            Ok(Some(value)) => QueryResponse {
                code: 0,
                log: "exists".to_string(),
                value,
            },
            Ok(None) => QueryResponse {
                code: 0,
                log: "key doesn't exist".to_string(),
                value: Vec::new(),
            },
            Err(e) => QueryResponse {
                code: 2,
                log: format!("Database error: {e}"),
                value: Vec::new(),
            },
        }
    }

    fn verify_transaction(&self, tx_id: &str) -> QueryResponse {
        let raw = match self.ledger.get(&keys::tx(tx_id)) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                return QueryResponse {
                    code: 1,
                    log: "Transaction not found".to_string(),
                    value: Vec::new(),
                }
            }
            Err(e) => {
                return QueryResponse {
                    code: 2,
                    log: format!("Database error: {e}"),
                    value: Vec::new(),
                }
            }
        };

        let status = self
            .ledger
            .get(&keys::status(tx_id))
            .ok()
            .flatten()
            .map(|raw| String::from_utf8_lossy(&raw).into_owned())
            .unwrap_or_else(|| "confirmed".to_string());

        QueryResponse {
            code: 0,
            log: status,
            value: raw,
        }
    }

    fn query_shard(&self, shard_id: &str) -> QueryResponse {
        let prefix = format!("shard:{shard_id}:");
        match self.ledger.prefix_scan(prefix.as_bytes()) {
            Ok(rows) if rows.is_empty() => QueryResponse {
                code: 1,
                log: "Shard not found".to_string(),
                value: Vec::new(),
            },
            Ok(rows) => {
                let commits: Vec<serde_json::Value> = rows
                    .iter()
                    .map(|(_, value)| {
                        serde_json::from_slice(value)
                            .unwrap_or_else(|_| json!(String::from_utf8_lossy(value)))
                    })
                    .collect();
                QueryResponse {
                    code: 0,
                    log: "found".to_string(),
                    value: serde_json::to_vec(&commits).unwrap_or_default(),
                }
            }
            Err(e) => QueryResponse {
                code: 2,
                log: format!("Database error: {e}"),
                value: Vec::new(),
            },
        }
    }

    // Snapshot stubs: state sync is out of scope.

    pub fn list_snapshots(&self) -> ListSnapshotsResponse {
        ListSnapshotsResponse::default()
    }

    pub fn offer_snapshot(&self) -> OfferSnapshotResponse {
        OfferSnapshotResponse::default()
    }

    pub fn load_snapshot_chunk(&self) -> LoadSnapshotChunkResponse {
        LoadSnapshotChunkResponse::default()
    }

    pub fn apply_snapshot_chunk(&self) -> ApplySnapshotChunkResult {
        ApplySnapshotChunkResult::Accept
    }
}

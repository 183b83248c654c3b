//! ABCI-shaped request and response types.
//!
//! The consensus engine below the ABCI boundary is an external
//! collaborator; these are the shapes it exchanges with the application.

/// Response to `Info`: where the application left off.
#[derive(Debug, Clone, Default)]
pub struct InfoResponse {
    pub last_block_height: i64,
    pub last_block_app_hash: Vec<u8>,
}

/// Response to `CheckTx`. Nonzero code rejects the transaction before it
/// enters a block.
#[derive(Debug, Clone)]
pub struct CheckTxResponse {
    pub code: u32,
    pub log: String,
}

impl CheckTxResponse {
    pub fn ok() -> Self {
        Self {
            code: 0,
            log: String::new(),
        }
    }

    pub fn reject(log: impl Into<String>) -> Self {
        Self {
            code: 1,
            log: log.into(),
        }
    }
}

/// Verdict on a proposed block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProposalStatus {
    Accept,
    Reject,
}

/// A block handed to `FinalizeBlock`, txs in consensus order.
#[derive(Debug, Clone)]
pub struct FinalizeBlockRequest {
    pub height: i64,
    pub txs: Vec<Vec<u8>>,
}

/// Per-transaction execution result.
#[derive(Debug, Clone)]
pub struct ExecTxResult {
    pub code: u32,
    pub data: Vec<u8>,
    pub log: String,
    pub events: Vec<Event>,
}

/// A typed event emitted during block execution.
#[derive(Debug, Clone)]
pub struct Event {
    pub kind: String,
    pub attributes: Vec<EventAttribute>,
}

/// One indexed attribute of an event. Attribute order is part of the
/// deterministic output and must match across replicas.
#[derive(Debug, Clone)]
pub struct EventAttribute {
    pub key: String,
    pub value: String,
    pub index: bool,
}

/// Response to `FinalizeBlock`.
#[derive(Debug, Clone)]
pub struct FinalizeBlockResponse {
    pub tx_results: Vec<ExecTxResult>,
    pub app_hash: Vec<u8>,
}

/// Response to `Query`.
#[derive(Debug, Clone, Default)]
pub struct QueryResponse {
    pub code: u32,
    pub log: String,
    pub value: Vec<u8>,
}

/// Snapshot stubs: state sync is out of scope, the engine only needs the
/// calls to answer.
#[derive(Debug, Clone, Default)]
pub struct ListSnapshotsResponse {}

#[derive(Debug, Clone, Default)]
pub struct OfferSnapshotResponse {}

#[derive(Debug, Clone, Default)]
pub struct LoadSnapshotChunkResponse {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplySnapshotChunkResult {
    Accept,
}

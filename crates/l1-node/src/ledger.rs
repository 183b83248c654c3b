//! # Ledger Store
//!
//! RocksDB-backed keyed storage for finalized shard commits. A block's
//! writes are collected into a single `WriteBatch` during `FinalizeBlock`
//! and applied atomically in `Commit`; readers always see a consistent
//! pre- or post-block view.
//!
//! ## Key layout
//!
//! - `last_block_height` - big-endian i64 of the last finalized height
//! - `last_block_app_hash` - 32-byte app hash of the last finalized block
//! - `tx:<tx_id>` - raw commit bytes keyed by deterministic tx id
//! - `shard:<shard_id>:session:<session_id>` - raw commit bytes by shard
//! - `status:<tx_id>` - execution status string

use std::path::Path;

use rocksdb::{IteratorMode, Options, WriteBatch, WriteOptions, DB};

use crate::error::L1Error;

/// Well-known ledger keys.
pub mod keys {
    pub const LAST_BLOCK_HEIGHT: &[u8] = b"last_block_height";
    pub const LAST_BLOCK_APP_HASH: &[u8] = b"last_block_app_hash";

    pub fn tx(tx_id: &str) -> Vec<u8> {
        format!("tx:{tx_id}").into_bytes()
    }

    pub fn shard_session(shard_id: &str, session_id: &str) -> Vec<u8> {
        format!("shard:{shard_id}:session:{session_id}").into_bytes()
    }

    pub fn status(tx_id: &str) -> Vec<u8> {
        format!("status:{tx_id}").into_bytes()
    }
}

/// Ledger store configuration.
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// Database directory.
    pub path: String,
    /// fsync each block commit.
    pub sync_writes: bool,
}

impl LedgerConfig {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_string_lossy().to_string(),
            sync_writes: true,
        }
    }

    /// Config for tests: no fsync.
    pub fn for_testing(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_string_lossy().to_string(),
            sync_writes: false,
        }
    }
}

/// RocksDB-backed ledger store.
pub struct LedgerStore {
    db: DB,
    sync_writes: bool,
}

impl LedgerStore {
    /// Open or create the ledger database.
    pub fn open(config: LedgerConfig) -> Result<Self, L1Error> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_compression_type(rocksdb::DBCompressionType::Snappy);

        let db = DB::open(&opts, &config.path)
            .map_err(|e| L1Error::Ledger(format!("failed to open ledger db: {e}")))?;

        Ok(Self {
            db,
            sync_writes: config.sync_writes,
        })
    }

    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, L1Error> {
        self.db
            .get(key)
            .map_err(|e| L1Error::Ledger(format!("ledger get failed: {e}")))
    }

    /// Last finalized block height, 0 before the first block.
    pub fn last_block_height(&self) -> Result<i64, L1Error> {
        Ok(self
            .get(keys::LAST_BLOCK_HEIGHT)?
            .map(|raw| decode_height(&raw))
            .unwrap_or(0))
    }

    /// App hash of the last finalized block, if any.
    pub fn last_app_hash(&self) -> Result<Option<Vec<u8>>, L1Error> {
        self.get(keys::LAST_BLOCK_APP_HASH)
    }

    /// Apply one block's writes atomically.
    pub fn commit_block(&self, batch: WriteBatch) -> Result<(), L1Error> {
        let mut write_opts = WriteOptions::default();
        write_opts.set_sync(self.sync_writes);
        self.db
            .write_opt(batch, &write_opts)
            .map_err(|e| L1Error::Ledger(format!("block commit failed: {e}")))
    }

    /// All key/value pairs under a prefix, in key order.
    pub fn prefix_scan(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, L1Error> {
        let mut results = Vec::new();
        let iter = self
            .db
            .iterator(IteratorMode::From(prefix, rocksdb::Direction::Forward));

        for item in iter {
            let (key, value) =
                item.map_err(|e| L1Error::Ledger(format!("ledger scan failed: {e}")))?;
            if !key.starts_with(prefix) {
                break;
            }
            results.push((key.to_vec(), value.to_vec()));
        }
        Ok(results)
    }
}

/// Big-endian encoding of a block height.
pub fn encode_height(height: i64) -> [u8; 8] {
    height.to_be_bytes()
}

/// Decode a big-endian block height; short buffers decode to 0.
pub fn decode_height(raw: &[u8]) -> i64 {
    match raw.try_into() {
        Ok(bytes) => i64::from_be_bytes(bytes),
        Err(_) => 0,
    }
}

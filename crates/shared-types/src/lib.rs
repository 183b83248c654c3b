//! # Shared Types Crate
//!
//! Types shared between the L1 ledger node and the L2 shard nodes.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: the canonical shard-commit payload and the
//!   L1 response envelope are defined here and nowhere else.
//! - **Opaque session data**: the L1 never interprets the `session_data`
//!   blob beyond storing it; it stays a [`serde_json::Value`] end to end.
//! - **Deterministic derivation**: tx-id and app-hash helpers live here so
//!   every replica computes byte-identical values.

pub mod commit;
pub mod envelope;
pub mod hashing;
pub mod ids;
pub mod registry;

pub use commit::{CommitAck, ShardCommitRequest};
pub use envelope::{L1Envelope, ShardInfoMeta, TxStatusMeta};
pub use registry::{ShardDirectory, ShardRecord, ShardStatus};

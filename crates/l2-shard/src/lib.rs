//! # L2 Shard Node
//!
//! A self-contained L2 shard owning one client group's session workflow.
//! Sessions progress through a linear pipeline (create → scan → validate →
//! quality-check → label) backed by transactional storage, then commit to
//! the replicated L1 ledger.
//!
//! ## Modules
//!
//! - `config` - environment-driven shard configuration
//! - `store` - session workflow storage with atomic stage transitions
//! - `registry` - cached copy of the L1 shard registry
//! - `l1client` - outbound commit/registry client against L1
//! - `server` - HTTP surface with cross-shard forwarding preflight

pub mod config;
pub mod error;
pub mod l1client;
pub mod registry;
pub mod server;
pub mod store;

pub use config::ShardConfig;
pub use error::ShardError;

//! # Index Store
//!
//! Relational index over committed sessions: the authoritative shard
//! registry plus queryable session and transaction rows. Lives in its own
//! SQLite database and is never mixed into the ledger's block write
//! transaction.
//!
//! The `PRIMARY KEY` on `sessions.session_id` is the exactly-once
//! admission latch: for any session id at most one commit can pre-insert
//! its row and reach consensus; every other attempt fails the unique
//! constraint until (and unless) that row is rolled back.

pub mod models;

use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};
use shared_types::{ShardCommitRequest, ShardRecord, ShardStatus};
use tracing::info;

use crate::error::{is_unique_violation, L1Error};
use models::{SessionIndexRow, SessionIndexView, TransactionRow, TransactionView};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS shards (
    shard_id     TEXT PRIMARY KEY,
    client_group TEXT NOT NULL,
    l2_node_id   TEXT NOT NULL,
    l2_endpoint  TEXT NOT NULL,
    status       TEXT NOT NULL DEFAULT 'active',
    created_at   TEXT NOT NULL,
    updated_at   TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS operators (
    operator_id  TEXT PRIMARY KEY,
    name         TEXT NOT NULL,
    role         TEXT NOT NULL DEFAULT '',
    access_level TEXT NOT NULL DEFAULT 'Basic',
    shard_id     TEXT REFERENCES shards(shard_id)
);
CREATE TABLE IF NOT EXISTS sessions (
    session_id   TEXT PRIMARY KEY,
    shard_id     TEXT NOT NULL REFERENCES shards(shard_id),
    client_group TEXT NOT NULL,
    operator_id  TEXT NOT NULL DEFAULT '',
    status       TEXT NOT NULL,
    is_committed INTEGER NOT NULL DEFAULT 0,
    tx_hash      TEXT,
    session_data TEXT NOT NULL,
    created_at   TEXT NOT NULL,
    updated_at   TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_sessions_shard ON sessions(shard_id);
CREATE INDEX IF NOT EXISTS idx_sessions_group ON sessions(client_group);
CREATE TABLE IF NOT EXISTS transactions (
    session_id   TEXT PRIMARY KEY REFERENCES sessions(session_id),
    tx_hash      TEXT NOT NULL,
    shard_id     TEXT NOT NULL,
    client_group TEXT NOT NULL,
    block_height INTEGER NOT NULL,
    timestamp    TEXT NOT NULL,
    status       TEXT NOT NULL DEFAULT 'confirmed'
);
CREATE INDEX IF NOT EXISTS idx_transactions_hash ON transactions(tx_hash);
";

/// SQLite-backed registry and session/transaction index.
#[derive(Clone)]
pub struct IndexStore {
    conn: Arc<Mutex<Connection>>,
}

impl IndexStore {
    /// Open (or create) the index at `path` and apply the schema.
    pub fn open(path: &str) -> Result<Self, L1Error> {
        let conn = if path == ":memory:" {
            Connection::open_in_memory()?
        } else {
            Connection::open(path)?
        };
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// In-memory index for tests.
    pub fn open_in_memory() -> Result<Self, L1Error> {
        Self::open(":memory:")
    }

    /// Seed the shard registry and cross-shard operators. Skipped when
    /// shards already exist.
    pub fn seed(&self) -> Result<(), L1Error> {
        let conn = self.conn.lock();

        let shards: i64 = conn.query_row("SELECT COUNT(*) FROM shards", [], |row| row.get(0))?;
        if shards > 0 {
            info!("shard registry already seeded, skipping");
            return Ok(());
        }

        let now = Utc::now();
        let seed_shards = [
            ("shard-a", "group-a", "l2-node-a", "http://l2-node-a:6000"),
            ("shard-b", "group-b", "l2-node-b", "http://l2-node-b:6000"),
        ];
        for (shard_id, client_group, l2_node_id, l2_endpoint) in seed_shards {
            conn.execute(
                "INSERT INTO shards (shard_id, client_group, l2_node_id, l2_endpoint, status, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, 'active', ?5, ?5)",
                params![shard_id, client_group, l2_node_id, l2_endpoint, now],
            )?;
        }

        let seed_operators = [
            ("OPR-001", "John Smith", "Warehouse Manager", "Admin", "shard-a"),
            ("OPR-002", "Sarah Lee", "Quality Control", "Standard", "shard-a"),
            ("OPR-003", "Raj Patel", "Logistics Coordinator", "Standard", "shard-b"),
            ("OPR-004", "Maria Garcia", "Inventory Clerk", "Basic", "shard-b"),
        ];
        for (operator_id, name, role, access_level, shard_id) in seed_operators {
            conn.execute(
                "INSERT INTO operators (operator_id, name, role, access_level, shard_id)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![operator_id, name, role, access_level, shard_id],
            )?;
        }

        info!("shard registry seeding completed");
        Ok(())
    }

    /// Register a shard, replacing any previous row with the same id.
    pub fn register_shard(&self, record: &ShardRecord) -> Result<(), L1Error> {
        let conn = self.conn.lock();
        let now = Utc::now();
        conn.execute(
            "INSERT OR REPLACE INTO shards (shard_id, client_group, l2_node_id, l2_endpoint, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
            params![
                record.shard_id,
                record.client_group,
                record.l2_node_id,
                record.l2_endpoint,
                record.status.as_str(),
                now
            ],
        )?;
        Ok(())
    }

    pub fn get_shard(&self, shard_id: &str) -> Result<Option<ShardRecord>, L1Error> {
        let conn = self.conn.lock();
        Ok(conn
            .query_row(
                "SELECT shard_id, client_group, l2_node_id, l2_endpoint, status
                 FROM shards WHERE shard_id = ?1",
                params![shard_id],
                map_shard,
            )
            .optional()?)
    }

    pub fn all_shards(&self) -> Result<Vec<ShardRecord>, L1Error> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT shard_id, client_group, l2_node_id, l2_endpoint, status
             FROM shards ORDER BY shard_id",
        )?;
        let shards = stmt
            .query_map([], map_shard)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(shards)
    }

    /// Pre-insert the session index row as the at-most-once admission
    /// latch. A duplicate session id fails the primary key and maps to
    /// `SESSION_EXISTS`.
    pub fn admit_session(&self, request: &ShardCommitRequest) -> Result<(), L1Error> {
        let session_data = serde_json::to_string(&request.session_data)
            .map_err(|e| L1Error::Database(format!("failed to serialize session data: {e}")))?;
        let now = Utc::now();

        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO sessions (session_id, shard_id, client_group, operator_id, status,
                                   is_committed, session_data, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, 'committed', 1, ?5, ?6, ?6)",
            params![
                request.session_id,
                request.shard_id,
                request.client_group,
                request.operator_id,
                session_data,
                now
            ],
        )
        .map_err(|e| {
            if is_unique_violation(&e) {
                L1Error::SessionExists(format!(
                    "Session {} already committed",
                    request.session_id
                ))
            } else {
                e.into()
            }
        })?;
        Ok(())
    }

    /// Roll back a pre-inserted index row after a consensus failure.
    pub fn evict_session(&self, session_id: &str) -> Result<(), L1Error> {
        let conn = self.conn.lock();
        conn.execute("DELETE FROM sessions WHERE session_id = ?1", params![session_id])?;
        Ok(())
    }

    /// Attach the finalized tx hash to an admitted session.
    pub fn confirm_session(&self, session_id: &str, tx_hash: &str) -> Result<(), L1Error> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE sessions SET tx_hash = ?1, updated_at = ?2 WHERE session_id = ?3",
            params![tx_hash, Utc::now(), session_id],
        )?;
        Ok(())
    }

    /// Insert the finalized transaction row.
    pub fn record_transaction(&self, row: &TransactionRow) -> Result<(), L1Error> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO transactions (session_id, tx_hash, shard_id, client_group, block_height, timestamp, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                row.session_id,
                row.tx_hash,
                row.shard_id,
                row.client_group,
                row.block_height,
                row.timestamp,
                row.status
            ],
        )?;
        Ok(())
    }

    /// Sessions of a client group, with shard and transaction attached.
    pub fn sessions_by_group(&self, client_group: &str) -> Result<Vec<SessionIndexView>, L1Error> {
        self.sessions_where("s.client_group = ?1", client_group)
    }

    /// Sessions committed by a shard, with shard and transaction attached.
    pub fn sessions_by_shard(&self, shard_id: &str) -> Result<Vec<SessionIndexView>, L1Error> {
        self.sessions_where("s.shard_id = ?1", shard_id)
    }

    fn sessions_where(&self, filter: &str, value: &str) -> Result<Vec<SessionIndexView>, L1Error> {
        let conn = self.conn.lock();
        let sql = format!(
            "SELECT s.session_id, s.shard_id, s.client_group, s.operator_id, s.status,
                    s.is_committed, s.tx_hash, s.session_data, s.created_at, s.updated_at,
                    sh.shard_id, sh.client_group, sh.l2_node_id, sh.l2_endpoint, sh.status,
                    t.session_id, t.tx_hash, t.shard_id, t.client_group, t.block_height,
                    t.timestamp, t.status
             FROM sessions s
             LEFT JOIN shards sh ON sh.shard_id = s.shard_id
             LEFT JOIN transactions t ON t.session_id = s.session_id
             WHERE {filter}
             ORDER BY s.created_at"
        );
        let mut stmt = conn.prepare(&sql)?;
        let views = stmt
            .query_map(params![value], |row| {
                Ok(SessionIndexView {
                    session: map_session(row, 0)?,
                    shard: map_shard_at(row, 10)?,
                    transaction: map_transaction_at(row, 15)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(views)
    }

    /// Transaction by hash, with session and shard attached.
    pub fn transaction_by_hash(&self, tx_hash: &str) -> Result<TransactionView, L1Error> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT t.session_id, t.tx_hash, t.shard_id, t.client_group, t.block_height,
                    t.timestamp, t.status,
                    s.session_id, s.shard_id, s.client_group, s.operator_id, s.status,
                    s.is_committed, s.tx_hash, s.session_data, s.created_at, s.updated_at,
                    sh.shard_id, sh.client_group, sh.l2_node_id, sh.l2_endpoint, sh.status
             FROM transactions t
             LEFT JOIN sessions s ON s.session_id = t.session_id
             LEFT JOIN shards sh ON sh.shard_id = t.shard_id
             WHERE t.tx_hash = ?1",
            params![tx_hash],
            |row| {
                let transaction = TransactionRow {
                    session_id: row.get(0)?,
                    tx_hash: row.get(1)?,
                    shard_id: row.get(2)?,
                    client_group: row.get(3)?,
                    block_height: row.get(4)?,
                    timestamp: row.get(5)?,
                    status: row.get(6)?,
                };
                Ok(TransactionView {
                    transaction,
                    session: {
                        let id: Option<String> = row.get(7)?;
                        match id {
                            Some(_) => Some(map_session(row, 7)?),
                            None => None,
                        }
                    },
                    shard: map_shard_at(row, 17)?,
                })
            },
        )
        .optional()?
        .ok_or_else(|| L1Error::NotFound(format!("Transaction with hash {tx_hash} not found")))
    }
}

fn map_shard(row: &Row<'_>) -> rusqlite::Result<ShardRecord> {
    Ok(ShardRecord {
        shard_id: row.get(0)?,
        client_group: row.get(1)?,
        l2_node_id: row.get(2)?,
        l2_endpoint: row.get(3)?,
        status: ShardStatus::parse(&row.get::<_, String>(4)?),
    })
}

fn map_shard_at(row: &Row<'_>, base: usize) -> rusqlite::Result<Option<ShardRecord>> {
    let shard_id: Option<String> = row.get(base)?;
    let Some(shard_id) = shard_id else {
        return Ok(None);
    };
    Ok(Some(ShardRecord {
        shard_id,
        client_group: row.get(base + 1)?,
        l2_node_id: row.get(base + 2)?,
        l2_endpoint: row.get(base + 3)?,
        status: ShardStatus::parse(&row.get::<_, String>(base + 4)?),
    }))
}

fn map_session(row: &Row<'_>, base: usize) -> rusqlite::Result<SessionIndexRow> {
    let session_data: String = row.get(base + 7)?;
    Ok(SessionIndexRow {
        session_id: row.get(base)?,
        shard_id: row.get(base + 1)?,
        client_group: row.get(base + 2)?,
        operator_id: row.get(base + 3)?,
        status: row.get(base + 4)?,
        is_committed: row.get(base + 5)?,
        tx_hash: row.get(base + 6)?,
        session_data: serde_json::from_str(&session_data)
            .unwrap_or(serde_json::Value::String(session_data)),
        created_at: row.get(base + 8)?,
        updated_at: row.get(base + 9)?,
    })
}

fn map_transaction_at(row: &Row<'_>, base: usize) -> rusqlite::Result<Option<TransactionRow>> {
    let session_id: Option<String> = row.get(base)?;
    let Some(session_id) = session_id else {
        return Ok(None);
    };
    Ok(Some(TransactionRow {
        session_id,
        tx_hash: row.get(base + 1)?,
        shard_id: row.get(base + 2)?,
        client_group: row.get(base + 3)?,
        block_height: row.get(base + 4)?,
        timestamp: row.get(base + 5)?,
        status: row.get(base + 6)?,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn store() -> IndexStore {
        let store = IndexStore::open_in_memory().unwrap();
        store.seed().unwrap();
        store
    }

    fn request(session_id: &str, shard_id: &str, group: &str) -> ShardCommitRequest {
        ShardCommitRequest {
            shard_id: shard_id.into(),
            client_group: group.into(),
            session_id: session_id.into(),
            operator_id: "OPR-001".into(),
            session_data: serde_json::json!({"status": "completed"}),
            l2_node_id: "l2-node-a".into(),
            timestamp: Utc::now(),
        }
    }

    fn transaction(session_id: &str, tx_hash: &str) -> TransactionRow {
        TransactionRow {
            tx_hash: tx_hash.into(),
            session_id: session_id.into(),
            shard_id: "shard-a".into(),
            client_group: "group-a".into(),
            block_height: 1,
            timestamp: Utc::now(),
            status: "confirmed".into(),
        }
    }

    #[test]
    fn test_seed_registers_both_shards() {
        let store = store();
        let shards = store.all_shards().unwrap();
        assert_eq!(shards.len(), 2);
        assert_eq!(store.get_shard("shard-a").unwrap().unwrap().client_group, "group-a");
        assert!(store.get_shard("shard-z").unwrap().is_none());
    }

    #[test]
    fn test_seed_is_idempotent() {
        let store = store();
        store.seed().unwrap();
        assert_eq!(store.all_shards().unwrap().len(), 2);
    }

    #[test]
    fn test_duplicate_admission_is_session_exists() {
        let store = store();
        store.admit_session(&request("SES-1", "shard-a", "group-a")).unwrap();
        let err = store
            .admit_session(&request("SES-1", "shard-a", "group-a"))
            .unwrap_err();
        assert!(matches!(err, L1Error::SessionExists(_)));
    }

    #[test]
    fn test_evicted_session_can_be_readmitted() {
        let store = store();
        let req = request("SES-1", "shard-a", "group-a");
        store.admit_session(&req).unwrap();
        store.evict_session("SES-1").unwrap();
        store.admit_session(&req).unwrap();
    }

    #[test]
    fn test_queries_attach_shard_and_transaction() {
        let store = store();
        store.admit_session(&request("SES-1", "shard-a", "group-a")).unwrap();
        store.confirm_session("SES-1", "hash-1").unwrap();
        store.record_transaction(&transaction("SES-1", "hash-1")).unwrap();

        let by_group = store.sessions_by_group("group-a").unwrap();
        assert_eq!(by_group.len(), 1);
        let view = &by_group[0];
        assert!(view.session.is_committed);
        assert_eq!(view.session.tx_hash.as_deref(), Some("hash-1"));
        assert_eq!(view.shard.as_ref().unwrap().shard_id, "shard-a");
        assert_eq!(view.transaction.as_ref().unwrap().block_height, 1);
        assert_eq!(view.session.session_data["status"], "completed");

        let by_shard = store.sessions_by_shard("shard-a").unwrap();
        assert_eq!(by_shard.len(), 1);
        assert!(store.sessions_by_shard("shard-b").unwrap().is_empty());
    }

    #[test]
    fn test_transaction_by_hash() {
        let store = store();
        store.admit_session(&request("SES-1", "shard-a", "group-a")).unwrap();
        store.record_transaction(&transaction("SES-1", "hash-1")).unwrap();

        let view = store.transaction_by_hash("hash-1").unwrap();
        assert_eq!(view.transaction.session_id, "SES-1");
        assert_eq!(view.session.as_ref().unwrap().session_id, "SES-1");
        assert_eq!(view.shard.as_ref().unwrap().shard_id, "shard-a");

        let err = store.transaction_by_hash("missing").unwrap_err();
        assert!(matches!(err, L1Error::NotFound(_)));
    }
}

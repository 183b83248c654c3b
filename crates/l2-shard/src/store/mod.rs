//! # Session Store
//!
//! Transactional storage for the per-session workflow. Every stage
//! transition runs inside a single SQLite transaction; on any error the
//! transaction rolls back and no observable state changes. Concurrent
//! transitions on the same session serialize on the store transaction, so
//! at most one of them observes the required precondition and succeeds.

pub mod models;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::info;

use crate::error::{is_unique_violation, ShardError};
use models::{
    Courier, Item, Label, LabelDetail, Package, PackageDetail, PackageStatus, QcRecord, Session,
    SessionAggregate, SessionStatus, Supplier,
};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS suppliers (
    supplier_id TEXT PRIMARY KEY,
    name        TEXT NOT NULL,
    country     TEXT NOT NULL DEFAULT ''
);
CREATE TABLE IF NOT EXISTS couriers (
    courier_id TEXT PRIMARY KEY,
    name       TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS packages (
    package_id  TEXT PRIMARY KEY,
    signature   TEXT NOT NULL,
    supplier_id TEXT NOT NULL REFERENCES suppliers(supplier_id),
    status      TEXT NOT NULL DEFAULT 'pending',
    is_trusted  INTEGER NOT NULL DEFAULT 0,
    session_id  TEXT
);
CREATE TABLE IF NOT EXISTS items (
    item_id     TEXT PRIMARY KEY,
    package_id  TEXT NOT NULL REFERENCES packages(package_id),
    description TEXT NOT NULL,
    quantity    INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS sessions (
    session_id      TEXT PRIMARY KEY,
    operator_id     TEXT NOT NULL,
    status          TEXT NOT NULL,
    is_committed    INTEGER NOT NULL DEFAULT 0,
    package_id      TEXT,
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL,
    l1_tx_hash      TEXT,
    l1_block_height INTEGER,
    l1_commit_time  TEXT
);
CREATE TABLE IF NOT EXISTS qc_records (
    qc_id      TEXT PRIMARY KEY,
    session_id TEXT NOT NULL UNIQUE REFERENCES sessions(session_id),
    passed     INTEGER NOT NULL,
    issues     TEXT NOT NULL,
    created_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS labels (
    label_id    TEXT PRIMARY KEY,
    session_id  TEXT NOT NULL UNIQUE REFERENCES sessions(session_id),
    courier_id  TEXT NOT NULL REFERENCES couriers(courier_id),
    tracking_no TEXT NOT NULL,
    created_at  TEXT NOT NULL
);
";

/// SQLite-backed store for one shard's workflow entities.
#[derive(Clone)]
pub struct SessionStore {
    conn: Arc<Mutex<Connection>>,
}

impl SessionStore {
    /// Open (or create) the store at `path` and apply the schema.
    pub fn open(path: &str) -> Result<Self, ShardError> {
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

    /// In-memory store for tests.
    pub fn open_in_memory() -> Result<Self, ShardError> {
        Self::open(":memory:")
    }

    /// Seed reference data (suppliers, couriers, sample packages and items).
    /// Skipped when suppliers already exist.
    pub fn seed(&self) -> Result<(), ShardError> {
        let conn = self.conn.lock();

        let suppliers: i64 =
            conn.query_row("SELECT COUNT(*) FROM suppliers", [], |row| row.get(0))?;
        if suppliers > 0 {
            info!("seed data already exists, skipping");
            return Ok(());
        }

        conn.execute_batch(
            "
            INSERT INTO suppliers (supplier_id, name, country) VALUES
                ('SUP-001', 'Acme Electronics', 'Japan'),
                ('SUP-002', 'Global Tech Supply', 'Taiwan'),
                ('SUP-003', 'Premium Parts Co', 'Germany');
            INSERT INTO couriers (courier_id, name) VALUES
                ('CUR-001', 'FastShip Express'),
                ('CUR-002', 'Global Logistics'),
                ('CUR-003', 'Quick Delivery Co');
            INSERT INTO packages (package_id, signature, supplier_id, status) VALUES
                ('PKG-001', 'sig_acme_electronics_001', 'SUP-001', 'pending'),
                ('PKG-002', 'sig_global_tech_002', 'SUP-002', 'pending');
            INSERT INTO items (item_id, package_id, description, quantity) VALUES
                ('ITEM-001', 'PKG-001', 'Microcontroller Unit', 100),
                ('ITEM-002', 'PKG-001', 'LED Display Module', 50),
                ('ITEM-003', 'PKG-002', 'Power Supply Unit', 25),
                ('ITEM-004', 'PKG-002', 'Circuit Board', 75);
            ",
        )?;
        info!("database seeding completed");
        Ok(())
    }

    /// Create a new session in `active` with no package.
    pub fn create_session(&self, operator_id: &str) -> Result<Session, ShardError> {
        let now = Utc::now();
        let session = Session {
            session_id: shared_types::ids::session_id(),
            operator_id: operator_id.to_string(),
            status: SessionStatus::Active,
            is_committed: false,
            package_id: None,
            created_at: now,
            updated_at: now,
            l1_tx_hash: None,
            l1_block_height: None,
            l1_commit_time: None,
        };

        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO sessions (session_id, operator_id, status, is_committed, created_at, updated_at)
             VALUES (?1, ?2, ?3, 0, ?4, ?5)",
            params![
                session.session_id,
                session.operator_id,
                session.status.as_str(),
                session.created_at,
                session.updated_at
            ],
        )?;
        Ok(session)
    }

    /// Link a package to an active session and move it to
    /// `pending_validation`.
    pub fn scan_package(
        &self,
        session_id: &str,
        package_id: &str,
    ) -> Result<PackageDetail, ShardError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        let session = get_session(&tx, session_id)?;
        if session.status != SessionStatus::Active {
            return Err(ShardError::PreconditionFailed(format!(
                "Session {session_id} is {}, expected active",
                session.status.as_str()
            )));
        }
        if session.package_id.is_some() {
            return Err(ShardError::PreconditionFailed(format!(
                "Session {session_id} already has a scanned package"
            )));
        }

        let pkg = get_package(&tx, package_id)?;
        if let Some(owner) = &pkg.session_id {
            if owner != session_id && pkg.status != PackageStatus::Labeled {
                return Err(ShardError::PreconditionFailed(format!(
                    "Package {package_id} is already linked to session {owner}"
                )));
            }
        }

        tx.execute(
            "UPDATE packages SET status = ?1, session_id = ?2 WHERE package_id = ?3",
            params![PackageStatus::PendingValidation.as_str(), session_id, package_id],
        )?;
        tx.execute(
            "UPDATE sessions SET package_id = ?1, updated_at = ?2 WHERE session_id = ?3",
            params![package_id, Utc::now(), session_id],
        )?;

        let detail = load_package_detail(&tx, package_id)?
            .ok_or_else(|| ShardError::NotFound(format!("Package {package_id} does not exist")))?;
        tx.commit()?;
        Ok(detail)
    }

    /// Accept the supplier signature for the scanned package. The signature
    /// check is permissive: any non-empty signature passes.
    pub fn validate_package(
        &self,
        session_id: &str,
        package_id: &str,
        _signature: &str,
    ) -> Result<PackageDetail, ShardError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        let session = get_session(&tx, session_id)?;
        if session.package_id.as_deref() != Some(package_id) {
            return Err(ShardError::PreconditionFailed(format!(
                "Package {package_id} is not linked to session {session_id}"
            )));
        }

        let pkg = get_package(&tx, package_id)?;
        if pkg.status != PackageStatus::PendingValidation {
            return Err(ShardError::PreconditionFailed(format!(
                "Package {package_id} is {}, expected pending_validation",
                pkg.status.as_str()
            )));
        }

        tx.execute(
            "UPDATE packages SET is_trusted = 1, status = ?1, session_id = ?2 WHERE package_id = ?3",
            params![PackageStatus::Validated.as_str(), session_id, package_id],
        )?;
        tx.execute(
            "UPDATE sessions SET updated_at = ?1 WHERE session_id = ?2",
            params![Utc::now(), session_id],
        )?;

        let detail = load_package_detail(&tx, package_id)?
            .ok_or_else(|| ShardError::NotFound(format!("Package {package_id} does not exist")))?;
        tx.commit()?;
        Ok(detail)
    }

    /// Record the quality check for the session's validated package.
    pub fn quality_check(
        &self,
        session_id: &str,
        passed: bool,
        issues: &[String],
    ) -> Result<(PackageDetail, QcRecord), ShardError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        get_session(&tx, session_id)?;
        let pkg = get_package_by_session(&tx, session_id)?;
        if pkg.status != PackageStatus::Validated {
            return Err(ShardError::PreconditionFailed(format!(
                "Package {} is {}, expected validated",
                pkg.package_id,
                pkg.status.as_str()
            )));
        }

        let record = QcRecord {
            qc_id: shared_types::ids::qc_id(),
            session_id: session_id.to_string(),
            passed,
            issues: issues.to_vec(),
            created_at: Utc::now(),
        };
        let issues_json = serde_json::to_string(&record.issues)
            .map_err(|e| ShardError::Database(e.to_string()))?;
        tx.execute(
            "INSERT INTO qc_records (qc_id, session_id, passed, issues, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![record.qc_id, record.session_id, record.passed, issues_json, record.created_at],
        )
        .map_err(|e| {
            if is_unique_violation(&e) {
                ShardError::Conflict(format!("QC record already exists for session {session_id}"))
            } else {
                e.into()
            }
        })?;

        let next = if passed { PackageStatus::QcPassed } else { PackageStatus::QcFailed };
        tx.execute(
            "UPDATE packages SET status = ?1 WHERE package_id = ?2",
            params![next.as_str(), pkg.package_id],
        )?;
        tx.execute(
            "UPDATE sessions SET updated_at = ?1 WHERE session_id = ?2",
            params![Utc::now(), session_id],
        )?;

        let detail = load_package_detail(&tx, &pkg.package_id)?.ok_or_else(|| {
            ShardError::NotFound(format!("Package {} does not exist", pkg.package_id))
        })?;
        tx.commit()?;
        Ok((detail, record))
    }

    /// Create the shipping label, move the package to `labeled`, and
    /// complete the session.
    pub fn label_package(
        &self,
        session_id: &str,
        courier_id: &str,
    ) -> Result<LabelDetail, ShardError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        let courier = tx
            .query_row(
                "SELECT courier_id, name FROM couriers WHERE courier_id = ?1",
                params![courier_id],
                |row| {
                    Ok(Courier {
                        courier_id: row.get(0)?,
                        name: row.get(1)?,
                    })
                },
            )
            .optional()?
            .ok_or_else(|| ShardError::NotFound(format!("Courier {courier_id} does not exist")))?;

        get_session(&tx, session_id)?;
        let pkg = get_package_by_session(&tx, session_id)?;
        if pkg.status != PackageStatus::QcPassed {
            return Err(ShardError::PreconditionFailed(format!(
                "Package {} is {}, expected qc_passed",
                pkg.package_id,
                pkg.status.as_str()
            )));
        }

        let label = Label {
            label_id: shared_types::ids::label_id(),
            session_id: session_id.to_string(),
            courier_id: courier_id.to_string(),
            tracking_no: shared_types::ids::tracking_no(),
            created_at: Utc::now(),
        };
        tx.execute(
            "INSERT INTO labels (label_id, session_id, courier_id, tracking_no, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![label.label_id, label.session_id, label.courier_id, label.tracking_no, label.created_at],
        )
        .map_err(|e| {
            if is_unique_violation(&e) {
                ShardError::Conflict(format!("Label already exists for session {session_id}"))
            } else {
                e.into()
            }
        })?;

        tx.execute(
            "UPDATE packages SET status = ?1 WHERE package_id = ?2",
            params![PackageStatus::Labeled.as_str(), pkg.package_id],
        )?;
        tx.execute(
            "UPDATE sessions SET status = ?1, updated_at = ?2 WHERE session_id = ?3",
            params![SessionStatus::Completed.as_str(), Utc::now(), session_id],
        )?;

        tx.commit()?;
        Ok(LabelDetail {
            label,
            courier: Some(courier),
        })
    }

    /// Load a session with package, QC record, and label attached.
    pub fn session_aggregate(&self, session_id: &str) -> Result<SessionAggregate, ShardError> {
        let conn = self.conn.lock();

        let session = get_session(&conn, session_id)?;

        let package = match &session.package_id {
            Some(package_id) => load_package_detail(&conn, package_id)?,
            None => None,
        };

        let qc_record = conn
            .query_row(
                "SELECT qc_id, session_id, passed, issues, created_at
                 FROM qc_records WHERE session_id = ?1",
                params![session_id],
                map_qc_record,
            )
            .optional()?;

        let label = conn
            .query_row(
                "SELECT l.label_id, l.session_id, l.courier_id, l.tracking_no, l.created_at,
                        c.courier_id, c.name
                 FROM labels l LEFT JOIN couriers c ON c.courier_id = l.courier_id
                 WHERE l.session_id = ?1",
                params![session_id],
                |row| {
                    let label = Label {
                        label_id: row.get(0)?,
                        session_id: row.get(1)?,
                        courier_id: row.get(2)?,
                        tracking_no: row.get(3)?,
                        created_at: row.get(4)?,
                    };
                    let courier = match row.get::<_, Option<String>>(5)? {
                        Some(courier_id) => Some(Courier {
                            courier_id,
                            name: row.get(6)?,
                        }),
                        None => None,
                    };
                    Ok(LabelDetail { label, courier })
                },
            )
            .optional()?;

        Ok(SessionAggregate {
            session,
            package,
            qc_record,
            label,
        })
    }

    /// Cache the finalized L1 result on the session and mark it committed.
    pub fn mark_committed(
        &self,
        session_id: &str,
        tx_hash: &str,
        block_height: i64,
    ) -> Result<(), ShardError> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE sessions
             SET is_committed = 1, status = ?1, l1_tx_hash = ?2, l1_block_height = ?3,
                 l1_commit_time = ?4, updated_at = ?5
             WHERE session_id = ?6",
            params![
                SessionStatus::Committed.as_str(),
                tx_hash,
                block_height,
                Utc::now(),
                Utc::now(),
                session_id
            ],
        )?;
        if changed == 0 {
            return Err(ShardError::NotFound(format!(
                "Session {session_id} does not exist"
            )));
        }
        Ok(())
    }
}

fn map_session(row: &rusqlite::Row<'_>) -> rusqlite::Result<Session> {
    Ok(Session {
        session_id: row.get(0)?,
        operator_id: row.get(1)?,
        status: SessionStatus::parse(&row.get::<_, String>(2)?),
        is_committed: row.get(3)?,
        package_id: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
        l1_tx_hash: row.get(7)?,
        l1_block_height: row.get(8)?,
        l1_commit_time: row.get::<_, Option<DateTime<Utc>>>(9)?,
    })
}

fn map_package(row: &rusqlite::Row<'_>) -> rusqlite::Result<Package> {
    Ok(Package {
        package_id: row.get(0)?,
        signature: row.get(1)?,
        supplier_id: row.get(2)?,
        status: PackageStatus::parse(&row.get::<_, String>(3)?),
        is_trusted: row.get(4)?,
        session_id: row.get(5)?,
    })
}

fn map_qc_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<QcRecord> {
    let issues_json: String = row.get(3)?;
    Ok(QcRecord {
        qc_id: row.get(0)?,
        session_id: row.get(1)?,
        passed: row.get(2)?,
        issues: serde_json::from_str(&issues_json).unwrap_or_default(),
        created_at: row.get(4)?,
    })
}

const SESSION_COLUMNS: &str = "session_id, operator_id, status, is_committed, package_id, \
                               created_at, updated_at, l1_tx_hash, l1_block_height, l1_commit_time";

const PACKAGE_COLUMNS: &str = "package_id, signature, supplier_id, status, is_trusted, session_id";

fn get_session(conn: &Connection, session_id: &str) -> Result<Session, ShardError> {
    conn.query_row(
        &format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE session_id = ?1"),
        params![session_id],
        map_session,
    )
    .optional()?
    .ok_or_else(|| ShardError::NotFound(format!("Session {session_id} does not exist")))
}

fn get_package(conn: &Connection, package_id: &str) -> Result<Package, ShardError> {
    conn.query_row(
        &format!("SELECT {PACKAGE_COLUMNS} FROM packages WHERE package_id = ?1"),
        params![package_id],
        map_package,
    )
    .optional()?
    .ok_or_else(|| ShardError::NotFound(format!("Package {package_id} does not exist")))
}

fn get_package_by_session(conn: &Connection, session_id: &str) -> Result<Package, ShardError> {
    conn.query_row(
        &format!("SELECT {PACKAGE_COLUMNS} FROM packages WHERE session_id = ?1"),
        params![session_id],
        map_package,
    )
    .optional()?
    .ok_or_else(|| ShardError::NotFound(format!("No package linked to session {session_id}")))
}

fn load_package_detail(
    conn: &Connection,
    package_id: &str,
) -> Result<Option<PackageDetail>, ShardError> {
    let package = conn
        .query_row(
            &format!("SELECT {PACKAGE_COLUMNS} FROM packages WHERE package_id = ?1"),
            params![package_id],
            map_package,
        )
        .optional()?;
    let Some(package) = package else {
        return Ok(None);
    };

    let supplier = conn
        .query_row(
            "SELECT supplier_id, name, country FROM suppliers WHERE supplier_id = ?1",
            params![package.supplier_id],
            |row| {
                Ok(Supplier {
                    supplier_id: row.get(0)?,
                    name: row.get(1)?,
                    country: row.get(2)?,
                })
            },
        )
        .optional()?;

    let mut stmt = conn.prepare(
        "SELECT item_id, package_id, description, quantity FROM items
         WHERE package_id = ?1 ORDER BY item_id",
    )?;
    let items = stmt
        .query_map(params![package_id], |row| {
            Ok(Item {
                item_id: row.get(0)?,
                package_id: row.get(1)?,
                description: row.get(2)?,
                quantity: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Some(PackageDetail {
        package,
        supplier,
        items,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SessionStore {
        let store = SessionStore::open_in_memory().unwrap();
        store.seed().unwrap();
        store
    }

    fn run_to_labeled(store: &SessionStore) -> String {
        let session = store.create_session("OPR-001").unwrap();
        store.scan_package(&session.session_id, "PKG-001").unwrap();
        store
            .validate_package(&session.session_id, "PKG-001", "sig_acme_electronics_001")
            .unwrap();
        store.quality_check(&session.session_id, true, &[]).unwrap();
        store.label_package(&session.session_id, "CUR-001").unwrap();
        session.session_id
    }

    #[test]
    fn test_create_session_starts_active() {
        let store = store();
        let session = store.create_session("OPR-001").unwrap();
        assert_eq!(session.status, SessionStatus::Active);
        assert!(!session.is_committed);
        assert!(session.package_id.is_none());
        assert!(session.session_id.starts_with("SES-"));
    }

    #[test]
    fn test_scan_links_package_and_session() {
        let store = store();
        let session = store.create_session("OPR-001").unwrap();
        let detail = store.scan_package(&session.session_id, "PKG-001").unwrap();

        assert_eq!(detail.package.status, PackageStatus::PendingValidation);
        assert_eq!(detail.package.session_id.as_deref(), Some(session.session_id.as_str()));
        assert_eq!(detail.items.len(), 2);

        let aggregate = store.session_aggregate(&session.session_id).unwrap();
        assert_eq!(aggregate.session.package_id.as_deref(), Some("PKG-001"));
    }

    #[test]
    fn test_scan_unknown_package_is_not_found_and_leaves_session_unchanged() {
        let store = store();
        let session = store.create_session("OPR-001").unwrap();
        let err = store.scan_package(&session.session_id, "PKG-404").unwrap_err();
        assert!(matches!(err, ShardError::NotFound(_)));

        let aggregate = store.session_aggregate(&session.session_id).unwrap();
        assert!(aggregate.session.package_id.is_none());
    }

    #[test]
    fn test_scan_package_linked_to_other_session_fails() {
        let store = store();
        let first = store.create_session("OPR-001").unwrap();
        store.scan_package(&first.session_id, "PKG-001").unwrap();

        let second = store.create_session("OPR-002").unwrap();
        let err = store.scan_package(&second.session_id, "PKG-001").unwrap_err();
        assert!(matches!(err, ShardError::PreconditionFailed(_)));
    }

    #[test]
    fn test_validate_requires_link() {
        let store = store();
        let session = store.create_session("OPR-001").unwrap();
        let err = store
            .validate_package(&session.session_id, "PKG-001", "sig")
            .unwrap_err();
        assert!(matches!(err, ShardError::PreconditionFailed(_)));
    }

    #[test]
    fn test_validate_marks_trusted() {
        let store = store();
        let session = store.create_session("OPR-001").unwrap();
        store.scan_package(&session.session_id, "PKG-001").unwrap();
        let detail = store
            .validate_package(&session.session_id, "PKG-001", "anything-non-empty")
            .unwrap();
        assert!(detail.package.is_trusted);
        assert_eq!(detail.package.status, PackageStatus::Validated);
    }

    #[test]
    fn test_qc_requires_validated_package() {
        let store = store();
        let session = store.create_session("OPR-001").unwrap();
        store.scan_package(&session.session_id, "PKG-001").unwrap();
        let err = store.quality_check(&session.session_id, true, &[]).unwrap_err();
        assert!(matches!(err, ShardError::PreconditionFailed(_)));
    }

    #[test]
    fn test_qc_failure_path_records_issues() {
        let store = store();
        let session = store.create_session("OPR-001").unwrap();
        store.scan_package(&session.session_id, "PKG-001").unwrap();
        store
            .validate_package(&session.session_id, "PKG-001", "sig")
            .unwrap();
        let issues = vec!["dented casing".to_string()];
        let (detail, record) = store
            .quality_check(&session.session_id, false, &issues)
            .unwrap();
        assert_eq!(detail.package.status, PackageStatus::QcFailed);
        assert!(!record.passed);
        assert_eq!(record.issues, issues);
    }

    #[test]
    fn test_second_qc_conflicts() {
        let store = store();
        let session = store.create_session("OPR-001").unwrap();
        store.scan_package(&session.session_id, "PKG-001").unwrap();
        store
            .validate_package(&session.session_id, "PKG-001", "sig")
            .unwrap();
        store.quality_check(&session.session_id, true, &[]).unwrap();
        // The package moved past `validated`, so the precondition fails
        // before the unique constraint is even reached.
        let err = store.quality_check(&session.session_id, true, &[]).unwrap_err();
        assert!(matches!(err, ShardError::PreconditionFailed(_)));
    }

    #[test]
    fn test_label_completes_session() {
        let store = store();
        let session_id = run_to_labeled(&store);
        let aggregate = store.session_aggregate(&session_id).unwrap();
        assert_eq!(aggregate.session.status, SessionStatus::Completed);
        let label = aggregate.label.unwrap();
        assert!(label.label.tracking_no.starts_with("TRK-"));
        assert_eq!(label.courier.unwrap().courier_id, "CUR-001");
        assert_eq!(aggregate.package.unwrap().package.status, PackageStatus::Labeled);
    }

    #[test]
    fn test_label_requires_qc_passed() {
        let store = store();
        let session = store.create_session("OPR-001").unwrap();
        store.scan_package(&session.session_id, "PKG-001").unwrap();
        store
            .validate_package(&session.session_id, "PKG-001", "sig")
            .unwrap();
        store.quality_check(&session.session_id, false, &[]).unwrap();
        let err = store.label_package(&session.session_id, "CUR-001").unwrap_err();
        assert!(matches!(err, ShardError::PreconditionFailed(_)));
    }

    #[test]
    fn test_label_unknown_courier_is_not_found() {
        let store = store();
        let session = store.create_session("OPR-001").unwrap();
        let err = store.label_package(&session.session_id, "CUR-404").unwrap_err();
        assert!(matches!(err, ShardError::NotFound(_)));
    }

    #[test]
    fn test_mark_committed_caches_l1_result() {
        let store = store();
        let session_id = run_to_labeled(&store);
        store.mark_committed(&session_id, "abcd1234", 7).unwrap();

        let aggregate = store.session_aggregate(&session_id).unwrap();
        assert_eq!(aggregate.session.status, SessionStatus::Committed);
        assert!(aggregate.session.is_committed);
        assert_eq!(aggregate.session.l1_tx_hash.as_deref(), Some("abcd1234"));
        assert_eq!(aggregate.session.l1_block_height, Some(7));
        assert!(aggregate.session.l1_commit_time.is_some());
    }
}

//! Workflow entities owned by the L2 shard.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Session workflow status. Progression is monotonic along
/// `active → completed → committed` with no skipping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Completed,
    Committed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Completed => "completed",
            SessionStatus::Committed => "committed",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "completed" => SessionStatus::Completed,
            "committed" => SessionStatus::Committed,
            _ => SessionStatus::Active,
        }
    }
}

/// Package status along the workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackageStatus {
    Pending,
    PendingValidation,
    Validated,
    QcPassed,
    QcFailed,
    Labeled,
}

impl PackageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PackageStatus::Pending => "pending",
            PackageStatus::PendingValidation => "pending_validation",
            PackageStatus::Validated => "validated",
            PackageStatus::QcPassed => "qc_passed",
            PackageStatus::QcFailed => "qc_failed",
            PackageStatus::Labeled => "labeled",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "pending_validation" => PackageStatus::PendingValidation,
            "validated" => PackageStatus::Validated,
            "qc_passed" => PackageStatus::QcPassed,
            "qc_failed" => PackageStatus::QcFailed,
            "labeled" => PackageStatus::Labeled,
            _ => PackageStatus::Pending,
        }
    }
}

/// A work session in this shard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    pub operator_id: String,
    pub status: SessionStatus,
    pub is_committed: bool,
    pub package_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub l1_tx_hash: Option<String>,
    pub l1_block_height: Option<i64>,
    pub l1_commit_time: Option<DateTime<Utc>>,
}

/// A supplier shipping packages into the warehouse.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Supplier {
    pub supplier_id: String,
    pub name: String,
    pub country: String,
}

/// One line item inside a package.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    pub item_id: String,
    pub package_id: String,
    pub description: String,
    pub quantity: i64,
}

/// A package being processed by a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Package {
    pub package_id: String,
    pub signature: String,
    pub supplier_id: String,
    pub status: PackageStatus,
    pub is_trusted: bool,
    pub session_id: Option<String>,
}

/// Package together with its supplier and items.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageDetail {
    #[serde(flatten)]
    pub package: Package,
    pub supplier: Option<Supplier>,
    pub items: Vec<Item>,
}

/// Result of the quality-check stage. Exactly one per session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QcRecord {
    pub qc_id: String,
    pub session_id: String,
    pub passed: bool,
    pub issues: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// A shipping courier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Courier {
    pub courier_id: String,
    pub name: String,
}

/// Shipping label created by the label stage. Exactly one per session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Label {
    pub label_id: String,
    pub session_id: String,
    pub courier_id: String,
    pub tracking_no: String,
    pub created_at: DateTime<Utc>,
}

/// Label together with its courier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelDetail {
    #[serde(flatten)]
    pub label: Label,
    pub courier: Option<Courier>,
}

/// A session with every related row loaded, as frozen into the L1 payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionAggregate {
    #[serde(flatten)]
    pub session: Session,
    pub package: Option<PackageDetail>,
    pub qc_record: Option<QcRecord>,
    pub label: Option<LabelDetail>,
}

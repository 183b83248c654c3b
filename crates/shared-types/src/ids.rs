//! Identifier generation.
//!
//! Workflow identifiers are short lowercase-hex suffixes on a fixed prefix,
//! drawn from a uniform random source: `SES-<8-hex>`, `QC-<8-hex>`,
//! `LBL-<8-hex>`, `TRK-<12-hex>`.

use uuid::Uuid;

/// First `len` hex characters of a fresh v4 UUID.
fn short_hex(len: usize) -> String {
    let mut s = Uuid::new_v4().simple().to_string();
    s.truncate(len);
    s
}

/// `SES-<8-hex>` session id.
pub fn session_id() -> String {
    format!("SES-{}", short_hex(8))
}

/// `QC-<8-hex>` quality-check id.
pub fn qc_id() -> String {
    format!("QC-{}", short_hex(8))
}

/// `LBL-<8-hex>` label id.
pub fn label_id() -> String {
    format!("LBL-{}", short_hex(8))
}

/// `TRK-<12-hex>` tracking number.
pub fn tracking_no() -> String {
    format!("TRK-{}", short_hex(12))
}

/// 32-hex request id for per-request log correlation.
pub fn request_id() -> String {
    let bytes: [u8; 16] = rand::random();
    hex::encode(bytes)
}

//! Audit event and log types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use taskcap_contracts::access::AccessRecord;

/// One entry in a domain's hash chain. Changing any field, including the
/// embedded record, breaks `this_hash` and every later `prev_hash`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Position in the chain, starting at 0.
    pub sequence: u64,

    pub domain_id: String,

    pub record: AccessRecord,

    /// Hash of the previous event, or `GENESIS_HASH` for the first.
    pub prev_hash: String,

    pub this_hash: String,
}

impl AuditEvent {
    /// The `prev_hash` of the first event in every chain.
    pub const GENESIS_HASH: &'static str =
        "0000000000000000000000000000000000000000000000000000000000000000";
}

/// An exported copy of a domain's chain.
///
/// `terminal_hash` is the last event's `this_hash`, or empty when there are
/// no events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLog {
    pub domain_id: String,
    pub events: Vec<AuditEvent>,
    pub exported_at: DateTime<Utc>,
    pub terminal_hash: String,
    pub denied: usize,
}

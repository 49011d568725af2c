//! Hash-chain primitives.
//!
//! Hash input layout (bytes, in order):
//!   1. domain id as its hyphenated UTF-8 string
//!   2. sequence as 8-byte little-endian
//!   3. prev_hash as UTF-8 bytes (64 ASCII hex chars)
//!   4. compact JSON of the access record

use sha2::{Digest, Sha256};

use taskcap_contracts::{
    access::AccessRecord,
    error::{TaskCapError, TaskCapResult},
};

use crate::event::AuditEvent;

/// Compute the SHA-256 hash of one event as a lowercase hex string.
pub fn hash_event(
    domain_id: &str,
    sequence: u64,
    record: &AccessRecord,
    prev_hash: &str,
) -> TaskCapResult<String> {
    let record_json = serde_json::to_vec(record).map_err(|e| TaskCapError::AuditWriteFailed {
        reason: format!("access record is not serializable: {}", e),
    })?;

    let mut hasher = Sha256::new();
    hasher.update(domain_id.as_bytes());
    hasher.update(sequence.to_le_bytes());
    hasher.update(prev_hash.as_bytes());
    hasher.update(&record_json);

    Ok(hex::encode(hasher.finalize()))
}

/// Check prev-hash linkage, sequence numbering and every stored hash.
/// An empty chain is valid.
pub fn verify_chain(events: &[AuditEvent]) -> bool {
    let mut expected_prev = AuditEvent::GENESIS_HASH.to_string();

    for (position, event) in events.iter().enumerate() {
        if event.sequence != position as u64 || event.prev_hash != expected_prev {
            return false;
        }

        match hash_event(&event.domain_id, event.sequence, &event.record, &event.prev_hash) {
            Ok(recomputed) if recomputed == event.this_hash => {}
            _ => return false,
        }

        expected_prev = event.this_hash.clone();
    }

    true
}

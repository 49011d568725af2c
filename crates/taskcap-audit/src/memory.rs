//! In-memory implementation of `AccessRecorder`.
//!
//! `InMemoryAccessLog` keeps every event in a `Vec` behind an
//! `Arc<Mutex<_>>`. Clones share the same chain, so a host can hand one
//! clone to a `TaskContext` and keep another for inspection.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use tracing::{debug, info};

use taskcap_contracts::{
    access::AccessRecord,
    domain::DomainId,
    error::{TaskCapError, TaskCapResult},
};
use taskcap_core::traits::AccessRecorder;

use crate::{
    chain::{hash_event, verify_chain},
    event::{AuditEvent, AuditLog},
};

// ── Internal mutable state ────────────────────────────────────────────────────

pub(crate) struct InMemoryState {
    pub(crate) events: Vec<AuditEvent>,
    pub(crate) sequence: u64,
    pub(crate) last_hash: String,
}

// ── Public log ────────────────────────────────────────────────────────────────

/// Append-only, hash-chained access log for one scheduling domain.
#[derive(Clone)]
pub struct InMemoryAccessLog {
    domain_id: String,
    pub(crate) state: Arc<Mutex<InMemoryState>>,
}

impl InMemoryAccessLog {
    pub fn new(domain_id: DomainId) -> Self {
        let state = InMemoryState {
            events: Vec::new(),
            sequence: 0,
            last_hash: AuditEvent::GENESIS_HASH.to_string(),
        };
        Self {
            domain_id: domain_id.to_string(),
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub fn domain_id(&self) -> &str {
        &self.domain_id
    }

    fn lock(&self) -> TaskCapResult<MutexGuard<'_, InMemoryState>> {
        self.state.lock().map_err(|e| TaskCapError::AuditWriteFailed {
            reason: format!("audit state lock poisoned: {}", e),
        })
    }

    pub fn len(&self) -> TaskCapResult<usize> {
        Ok(self.lock()?.events.len())
    }

    pub fn is_empty(&self) -> TaskCapResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Number of recorded denials.
    pub fn denied_count(&self) -> TaskCapResult<usize> {
        Ok(self
            .lock()?
            .events
            .iter()
            .filter(|e| e.record.verdict.is_denied())
            .count())
    }

    /// Copy out every event written so far.
    pub fn export_log(&self) -> TaskCapResult<AuditLog> {
        let state = self.lock()?;
        let terminal_hash = state
            .events
            .last()
            .map(|e| e.this_hash.clone())
            .unwrap_or_default();
        let denied = state
            .events
            .iter()
            .filter(|e| e.record.verdict.is_denied())
            .count();

        info!(
            domain_id = %self.domain_id,
            event_count = state.events.len(),
            denied,
            terminal_hash = %terminal_hash,
            "access log exported"
        );

        Ok(AuditLog {
            domain_id: self.domain_id.clone(),
            events: state.events.clone(),
            exported_at: Utc::now(),
            terminal_hash,
            denied,
        })
    }

    /// Whether the in-memory chain is intact. A poisoned lock counts as
    /// tampering.
    pub fn verify_integrity(&self) -> bool {
        match self.lock() {
            Ok(state) => verify_chain(&state.events),
            Err(_) => false,
        }
    }
}

// ── AccessRecorder impl ───────────────────────────────────────────────────────

impl AccessRecorder for InMemoryAccessLog {
    /// Append one decision to the chain.
    ///
    /// A record from another domain is refused; each chain covers exactly
    /// one domain.
    fn record(&self, record: &AccessRecord) -> TaskCapResult<()> {
        let record_domain = record.request.domain_id.to_string();
        if record_domain != self.domain_id {
            return Err(TaskCapError::AuditWriteFailed {
                reason: format!(
                    "record for domain '{}' sent to log of domain '{}'",
                    record_domain, self.domain_id
                ),
            });
        }

        let mut state = self.lock()?;
        let prev_hash = state.last_hash.clone();
        let sequence = state.sequence;
        let this_hash = hash_event(&self.domain_id, sequence, record, &prev_hash)?;

        state.events.push(AuditEvent {
            sequence,
            domain_id: self.domain_id.clone(),
            record: record.clone(),
            prev_hash,
            this_hash: this_hash.clone(),
        });
        state.sequence += 1;
        state.last_hash = this_hash;

        debug!(
            domain_id = %self.domain_id,
            sequence,
            denied = record.verdict.is_denied(),
            "access decision recorded"
        );
        Ok(())
    }
}

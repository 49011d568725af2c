//! # taskcap-audit
//!
//! Append-only, SHA-256 hash-chained log of access decisions.
//!
//! ## Overview
//!
//! Every decision a `TaskContext` reaches for a restricted task is wrapped
//! in an `AuditEvent` linked to the previous event by its hash. Changing any
//! stored byte breaks the chain, which `verify_chain` detects.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use taskcap_audit::InMemoryAccessLog;
//! use taskcap_contracts::domain::DomainId;
//!
//! let domain_id = DomainId::new();
//! let log = InMemoryAccessLog::new(domain_id);
//! let ctx = config.build_context_in(domain_id, Box::new(log.clone()));
//!
//! assert!(log.verify_integrity());
//! let exported = log.export_log()?;
//! ```

pub mod chain;
pub mod event;
pub mod memory;

pub use chain::{hash_event, verify_chain};
pub use event::{AuditEvent, AuditLog};
pub use memory::InMemoryAccessLog;

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use taskcap_contracts::{
        access::{AccessKind, AccessRecord, AccessRequest, AccessVerdict},
        domain::DomainId,
        error::TaskCapError,
        Capability, CapabilityRules, TaskType, TimerKind,
    };
    use taskcap_core::traits::AccessRecorder;
    use taskcap_policy::MonitorConfig;

    use super::{AuditEvent, InMemoryAccessLog};

    // ── Helpers ───────────────────────────────────────────────────────────────

    fn make_record(domain_id: DomainId, task_id: i64, denied: bool) -> AccessRecord {
        let capability =
            Capability::from_js_string("No_Cookie_Access;", &CapabilityRules::new()).snapshot();
        AccessRecord {
            request: AccessRequest {
                domain_id,
                task_id,
                task_type: TaskType::Timer(TimerKind::Delayed),
                kind: AccessKind::Cookie,
                capability,
            },
            verdict: if denied {
                AccessVerdict::Deny {
                    reason: "cookie access is restricted".to_string(),
                }
            } else {
                AccessVerdict::Allow
            },
            timestamp: Utc::now(),
        }
    }

    fn log_with(n: i64) -> (DomainId, InMemoryAccessLog) {
        let domain_id = DomainId::new();
        let log = InMemoryAccessLog::new(domain_id);
        for task_id in 0..n {
            log.record(&make_record(domain_id, task_id, task_id % 2 == 0))
                .unwrap();
        }
        (domain_id, log)
    }

    // ── Chain ─────────────────────────────────────────────────────────────────

    #[test]
    fn test_hash_chain_integrity() {
        let (_, log) = log_with(3);
        assert!(log.verify_integrity());
    }

    #[test]
    fn test_tamper_detection() {
        let (_, log) = log_with(3);
        {
            let mut state = log.state.lock().unwrap();
            state.events[1].record.verdict = AccessVerdict::Allow;
            state.events[0].record.verdict = AccessVerdict::Allow;
        }
        assert!(!log.verify_integrity());
    }

    #[test]
    fn test_dropped_event_is_detected() {
        let (_, log) = log_with(3);
        let mut events = log.export_log().unwrap().events;
        events.remove(1);
        assert!(!super::verify_chain(&events));
    }

    #[test]
    fn test_genesis_and_sequence() {
        let (_, log) = log_with(3);
        let exported = log.export_log().unwrap();
        assert_eq!(exported.events[0].prev_hash, AuditEvent::GENESIS_HASH);
        for (idx, event) in exported.events.iter().enumerate() {
            assert_eq!(event.sequence, idx as u64);
        }
    }

    #[test]
    fn test_export_log() {
        let (domain_id, log) = log_with(3);
        let exported = log.export_log().unwrap();

        assert_eq!(exported.domain_id, domain_id.to_string());
        assert_eq!(exported.events.len(), 3);
        assert_eq!(exported.denied, 2);
        assert_eq!(
            exported.terminal_hash,
            exported.events.last().unwrap().this_hash
        );
        assert!(super::verify_chain(&exported.events));
    }

    #[test]
    fn test_verify_empty() {
        let (_, log) = log_with(0);
        assert!(log.verify_integrity());
        assert!(log.is_empty().unwrap());
        assert_eq!(log.export_log().unwrap().terminal_hash, "");
        assert!(super::verify_chain(&[]));
    }

    #[test]
    fn test_foreign_domain_is_refused() {
        let (_, log) = log_with(1);
        let err = log
            .record(&make_record(DomainId::new(), 9, true))
            .unwrap_err();
        assert!(matches!(err, TaskCapError::AuditWriteFailed { .. }));
        assert_eq!(log.len().unwrap(), 1);
    }

    #[test]
    fn test_clones_share_the_chain() {
        let (domain_id, log) = log_with(1);
        let handle = log.clone();
        handle.record(&make_record(domain_id, 5, false)).unwrap();
        assert_eq!(log.len().unwrap(), 2);
        assert_eq!(log.denied_count().unwrap(), 1);
    }

    // ── With a running context ────────────────────────────────────────────────

    #[test]
    fn test_context_decisions_are_chained() {
        let domain_id = DomainId::new();
        let log = InMemoryAccessLog::new(domain_id);
        let mut ctx = MonitorConfig::default().build_context_in(domain_id, Box::new(log.clone()));

        ctx.set_timeout_with_capability("No_Network_Access;JS_WL:fetch", 2, |ctx| {
            ctx.disallowed_to_access_network();
            ctx.disallowed_to_access_cookie();
            ctx.disallowed_to_access_object("fetch");
        });
        // Unrestricted work is never recorded.
        ctx.post_task(0, |ctx| {
            ctx.disallowed_to_access_network();
        });
        ctx.run_until_idle();

        let exported = log.export_log().unwrap();
        assert_eq!(exported.events.len(), 3);
        assert_eq!(exported.denied, 1);
        assert!(log.verify_integrity());
        assert!(exported
            .events
            .iter()
            .all(|e| e.record.request.task_type == TaskType::Timer(TimerKind::Delayed)));
    }
}

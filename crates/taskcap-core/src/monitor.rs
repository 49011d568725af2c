//! Synchronous access queries made while a task runs.
//!
//! Each query answers "is the running task disallowed from doing this?".
//! Outside task execution, or inside an unrestricted task, the answer is
//! always no and nothing is recorded. Otherwise the access policy decides
//! and the decision is recorded before it is returned.

use chrono::Utc;
use tracing::{debug, error, warn};

use taskcap_contracts::access::{AccessKind, AccessRecord, AccessRequest, AccessVerdict};

use crate::context::TaskContext;

impl TaskContext {
    pub fn disallowed_to_access_cookie(&self) -> bool {
        self.check_access(AccessKind::Cookie)
    }

    pub fn disallowed_to_access_network(&self) -> bool {
        self.check_access(AccessKind::Network)
    }

    /// `element_has_task_capability` is whether the target element carries
    /// a task-capability attribute.
    pub fn disallowed_to_access_dom(&self, element_has_task_capability: bool) -> bool {
        self.check_access(AccessKind::Dom {
            element_has_task_capability,
        })
    }

    pub fn disallowed_to_access_object(&self, name: &str) -> bool {
        self.check_access(AccessKind::Object {
            name: name.to_string(),
        })
    }

    fn check_access(&self, kind: AccessKind) -> bool {
        let Some(current) = self.tracker().current_task() else {
            return false;
        };
        if !current.capability.is_restricted() {
            return false;
        }

        let request = AccessRequest {
            domain_id: self.domain_id(),
            task_id: current.diagnostic_id,
            task_type: current.task_type,
            kind,
            capability: current.capability.snapshot(),
        };

        let verdict = match self.policy.evaluate(&request) {
            Ok(verdict) => verdict,
            Err(e) => {
                warn!(
                    domain_id = %request.domain_id,
                    task_id = request.task_id,
                    error = %e,
                    "access policy failed; denying"
                );
                AccessVerdict::Deny {
                    reason: format!("policy evaluation failed: {e}"),
                }
            }
        };

        match &verdict {
            AccessVerdict::Allow => debug!(
                domain_id = %request.domain_id,
                task_id = request.task_id,
                kind = ?request.kind,
                "access allowed"
            ),
            AccessVerdict::Deny { reason } => warn!(
                domain_id = %request.domain_id,
                task_id = request.task_id,
                task_type = %request.task_type,
                kind = ?request.kind,
                reason = %reason,
                "access denied"
            ),
        }

        let denied = verdict.is_denied();
        let record = AccessRecord {
            request,
            verdict,
            timestamp: Utc::now(),
        };
        if let Err(e) = self.recorder.record(&record) {
            error!(
                domain_id = %record.request.domain_id,
                error = %e,
                "access decision could not be recorded; denying"
            );
            return true;
        }
        denied
    }
}

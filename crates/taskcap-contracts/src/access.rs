//! Access queries answered by the security monitor.
//!
//! The host consults the monitor at exactly four points: cookie access,
//! network access, DOM element access, and access to a named object. Each
//! query becomes an `AccessRequest`; the policy answers with an
//! `AccessVerdict`; the pair is kept as an `AccessRecord`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{capability::CapabilitySnapshot, domain::DomainId, task_type::TaskType};

/// The privileged operation being attempted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AccessKind {
    Cookie,
    Network,
    Dom {
        /// The element carries a task-capability attribute.
        element_has_task_capability: bool,
    },
    Object {
        name: String,
    },
}

/// The monitor's answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessVerdict {
    Allow,
    Deny { reason: String },
}

impl AccessVerdict {
    pub fn is_denied(&self) -> bool {
        matches!(self, AccessVerdict::Deny { .. })
    }
}

/// Everything the access policy needs to decide one query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessRequest {
    pub domain_id: DomainId,
    /// Diagnostic id of the current task (negative for forked tasks).
    pub task_id: i64,
    pub task_type: TaskType,
    pub kind: AccessKind,
    pub capability: CapabilitySnapshot,
}

/// One decided query, as written to the access log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessRecord {
    pub request: AccessRequest,
    pub verdict: AccessVerdict,
    pub timestamp: DateTime<Utc>,
}

//! The default access policy.
//!
//! `CapabilityAccessPolicy` answers each query from the capability snapshot
//! carried by the request:
//!
//! 1. Cookie and network access are denied when their facet bit is set.
//! 2. DOM access is denied at level `none`. At level `protective` it is
//!    denied unless the element carries a task-capability attribute.
//! 3. Access to a named object is denied when the DOM facet is restricted
//!    and the name is not whitelisted.
//!
//! An unrestricted snapshot is always allowed, although `TaskContext` never
//! asks in that case.

use tracing::debug;

use taskcap_contracts::{
    access::{AccessKind, AccessRequest, AccessVerdict},
    error::TaskCapResult,
    rules::{denies_cookie, denies_network, DomAccess},
};
use taskcap_core::traits::AccessPolicy;

#[derive(Debug, Clone, Copy, Default)]
pub struct CapabilityAccessPolicy;

impl CapabilityAccessPolicy {
    pub fn new() -> Self {
        Self
    }

    fn decide(request: &AccessRequest) -> Option<String> {
        let cap = &request.capability;
        if !cap.restricted {
            return None;
        }

        match &request.kind {
            AccessKind::Cookie => {
                denies_cookie(cap.bitmap).then(|| "cookie access is restricted".to_string())
            }
            AccessKind::Network => {
                denies_network(cap.bitmap).then(|| "network access is restricted".to_string())
            }
            AccessKind::Dom {
                element_has_task_capability,
            } => match DomAccess::from_bitmap(cap.bitmap) {
                DomAccess::Full => None,
                DomAccess::Protective if *element_has_task_capability => None,
                DomAccess::Protective => Some(
                    "dom access is protective and the element has no task capability".to_string(),
                ),
                DomAccess::None => Some("dom access is denied".to_string()),
            },
            AccessKind::Object { name } => {
                let dom_restricted = DomAccess::from_bitmap(cap.bitmap) != DomAccess::Full;
                (dom_restricted && !cap.contains_in_whitelist(name))
                    .then(|| format!("object '{}' is not whitelisted", name))
            }
        }
    }
}

impl AccessPolicy for CapabilityAccessPolicy {
    fn evaluate(&self, request: &AccessRequest) -> TaskCapResult<AccessVerdict> {
        debug!(
            domain_id = %request.domain_id,
            task_id = request.task_id,
            bitmap = request.capability.bitmap,
            kind = ?request.kind,
            "evaluating access"
        );

        Ok(match Self::decide(request) {
            None => AccessVerdict::Allow,
            Some(reason) => AccessVerdict::Deny { reason },
        })
    }
}

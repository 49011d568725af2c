//! Scheduling domain identity.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifies one scheduling domain, e.g. one simulated renderer process.
///
/// Appears in every access record and log line so decisions from parallel
/// domains can be told apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DomainId(pub uuid::Uuid);

impl DomainId {
    /// Create a new, unique domain ID.
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for DomainId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DomainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

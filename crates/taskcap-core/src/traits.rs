//! The two trust seams of the monitor.
//!
//! - `AccessPolicy`   decides whether the running task may perform an access
//! - `AccessRecorder` keeps every decision the monitor makes
//!
//! `TaskContext` consults the policy only while a restricted task runs, and
//! records every decision it reaches that way.

use taskcap_contracts::{
    access::{AccessRecord, AccessRequest, AccessVerdict},
    error::TaskCapResult,
};

/// Decides access requests made from restricted tasks.
pub trait AccessPolicy: Send + Sync {
    /// Evaluate `request` and return a verdict.
    ///
    /// An `Err` is treated as a denial by the caller.
    fn evaluate(&self, request: &AccessRequest) -> TaskCapResult<AccessVerdict>;
}

/// Sink for access decisions.
///
/// Implementations must be append-only. A decision that cannot be recorded
/// is turned into a denial.
pub trait AccessRecorder: Send + Sync {
    fn record(&self, record: &AccessRecord) -> TaskCapResult<()>;
}

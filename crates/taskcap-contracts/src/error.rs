//! Error types for the taskcap monitor.
//!
//! Malformed capability strings are recovered where they are loaded; the
//! variants here exist so hosts and scenario runners can surface them.
//! Scheduler contract violations (querying the current task when none is
//! running) are panics in the tracker, with `NoCurrentTask` reserved for the
//! non-panicking accessors.

use thiserror::Error;

/// The unified error type for the taskcap crates.
#[derive(Debug, Error)]
pub enum TaskCapError {
    /// A JS capability string contained an unknown token or a bad whitelist.
    #[error("malformed capability '{spec}': {reason}")]
    MalformedCapability { spec: String, reason: String },

    /// An IPC capability string was not a decimal bitmap.
    #[error("malformed IPC capability '{spec}'")]
    MalformedIpcCapability { spec: String },

    /// A current-task operation was attempted outside task execution.
    #[error("no task is currently executing")]
    NoCurrentTask,

    /// A terminate or continuation task was requested with no forked records.
    #[error("fork bookkeeping underflow during {operation}")]
    ForkUnderflow { operation: String },

    /// No queued task carries the given sequence number.
    #[error("no pending task with sequence number {sequence_num}")]
    UnknownTask { sequence_num: u32 },

    /// A required configuration value is missing or invalid.
    #[error("configuration error: {reason}")]
    ConfigError { reason: String },

    /// The access recorder could not persist a decision.
    #[error("audit write failed: {reason}")]
    AuditWriteFailed { reason: String },
}

/// Convenience alias used throughout the taskcap crates.
pub type TaskCapResult<T> = Result<T, TaskCapError>;

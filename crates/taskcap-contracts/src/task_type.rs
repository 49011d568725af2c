//! Task type tags and their capability propagation rules.
//!
//! Every task declares what kind of work it is. The tracker uses the tag to
//! decide how a child's capability derives from the task that created it.
//! `TaskType::propagation` is matched exhaustively, so a new task type cannot
//! be added without choosing its rule.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Flavour of timer task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TimerKind {
    /// A plain timer with no author-declared capability.
    Plain,
    /// A capability-scoped timer requested with zero delay.
    ZeroDelay,
    /// A capability-scoped timer requested with a positive delay.
    Delayed,
}

/// Flavour of script-parsing continuation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FrameParserKind {
    /// Runs a risky script under the script's own capability.
    Restricted,
    /// Resumes parsing after a risky script, with no capability.
    Normal,
}

/// The declared kind of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskType {
    Normal,
    Ipc,
    Timer(TimerKind),
    Listener,
    RestrictedListener,
    FrameParser(FrameParserKind),
    SchedulerInternal,
}

/// How a new task's capability is derived when a restricted task creates it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Propagation {
    /// Copy the creator's capability exactly.
    Inherit,
    /// Already set from the IPC message; leave it alone.
    FromIpc,
    /// Intersect the task's own capability with the creator's.
    Narrow,
    /// Attached at construction by the forker; never routed through propagation.
    Explicit,
    /// Scheduler bookkeeping; never routed through propagation.
    Internal,
}

impl TaskType {
    pub const fn propagation(self) -> Propagation {
        match self {
            TaskType::Normal => Propagation::Inherit,
            TaskType::Ipc => Propagation::FromIpc,
            TaskType::Timer(_) => Propagation::Narrow,
            TaskType::Listener | TaskType::RestrictedListener | TaskType::FrameParser(_) => {
                Propagation::Explicit
            }
            TaskType::SchedulerInternal => Propagation::Internal,
        }
    }

    /// Whether this is a forked, capability-scoped callback task.
    pub const fn is_forked(self) -> bool {
        matches!(
            self,
            TaskType::RestrictedListener | TaskType::FrameParser(_)
        )
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskType::Normal => write!(f, "normal"),
            TaskType::Ipc => write!(f, "ipc"),
            TaskType::Timer(TimerKind::Plain) => write!(f, "timer"),
            TaskType::Timer(TimerKind::ZeroDelay) => write!(f, "timer-zero-delay"),
            TaskType::Timer(TimerKind::Delayed) => write!(f, "timer-delayed"),
            TaskType::Listener => write!(f, "listener"),
            TaskType::RestrictedListener => write!(f, "restricted-listener"),
            TaskType::FrameParser(FrameParserKind::Restricted) => write!(f, "frame-parser-restricted"),
            TaskType::FrameParser(FrameParserKind::Normal) => write!(f, "frame-parser-normal"),
            TaskType::SchedulerInternal => write!(f, "scheduler-internal"),
        }
    }
}

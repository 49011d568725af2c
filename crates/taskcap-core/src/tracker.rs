//! Tracks which task is executing and propagates its capability into the
//! tasks it creates.
//!
//! The tracker holds a copy of the running task's identity and capability.
//! The scheduler calls `update_current_task` immediately before running a
//! body and `clear_current_task` once it returns. Everything here assumes
//! a single scheduler thread.

use tracing::{debug, warn};

use taskcap_contracts::{
    error::{TaskCapError, TaskCapResult},
    Capability, CapabilityRules, Propagation, TaskType,
};

use crate::task::Task;

/// The task the scheduler is currently running.
#[derive(Debug, Clone)]
pub struct CurrentTask {
    pub sequence_num: u32,
    pub diagnostic_id: i64,
    pub task_type: TaskType,
    pub capability: Capability,
}

#[derive(Debug, Default)]
pub struct TaskCapabilityTracker {
    current: Option<CurrentTask>,
    rules: CapabilityRules,
}

impl TaskCapabilityTracker {
    pub fn new(rules: CapabilityRules) -> Self {
        Self {
            current: None,
            rules,
        }
    }

    pub fn rules(&self) -> &CapabilityRules {
        &self.rules
    }

    /// Point the tracker at `task`. No validation is performed.
    pub fn update_current_task(&mut self, task: &Task) {
        debug!(
            task_id = task.diagnostic_id(),
            task_type = %task.task_type(),
            restricted = task.is_restricted(),
            capability = %task.capability().to_js_string(&self.rules),
            "current task updated"
        );
        self.current = Some(CurrentTask {
            sequence_num: task.sequence_num(),
            diagnostic_id: task.diagnostic_id(),
            task_type: task.task_type(),
            capability: task.capability().clone(),
        });
    }

    pub fn clear_current_task(&mut self) {
        self.current = None;
    }

    pub fn current_task(&self) -> Option<&CurrentTask> {
        self.current.as_ref()
    }

    /// False when no task is running.
    pub fn is_current_restricted(&self) -> bool {
        self.current
            .as_ref()
            .is_some_and(|task| task.capability.is_restricted())
    }

    /// The running task's capability.
    ///
    /// # Panics
    ///
    /// Panics when called outside task execution.
    pub fn current_capability(&self) -> &Capability {
        match self.try_current_capability() {
            Ok(capability) => capability,
            Err(e) => panic!("current_capability: {e}"),
        }
    }

    pub fn try_current_capability(&self) -> TaskCapResult<&Capability> {
        self.current
            .as_ref()
            .map(|task| &task.capability)
            .ok_or(TaskCapError::NoCurrentTask)
    }

    /// Derive `task`'s capability from the running task's.
    ///
    /// Nothing happens when no task is running or the running task is
    /// unrestricted; `task` keeps the capability it was built with.
    ///
    /// # Panics
    ///
    /// Panics for listener, forked and scheduler-internal task types. Those
    /// carry a capability attached at construction and must not be routed
    /// through here while a restricted task runs.
    pub fn record_new_task(&self, task: &mut Task) {
        let Some(current) = self.current.as_ref() else {
            return;
        };
        if !current.capability.is_restricted() {
            return;
        }

        match task.task_type().propagation() {
            Propagation::Inherit => task.set_capability(&current.capability),
            Propagation::FromIpc => {}
            Propagation::Narrow => task.narrow_down_capability(&current.capability),
            Propagation::Explicit | Propagation::Internal => panic!(
                "record_new_task: task type {} is never propagated from a restricted task",
                task.task_type()
            ),
        }

        debug!(
            parent_id = current.diagnostic_id,
            task_type = %task.task_type(),
            capability = %task.capability().to_js_string(&self.rules),
            "capability propagated to new task"
        );
    }

    /// Replace the running task's capability with one read off an IPC
    /// message.
    ///
    /// A malformed string still leaves the capability in the state the
    /// configured malformed policy dictates; the error is returned for reporting.
    ///
    /// # Panics
    ///
    /// Panics when called outside task execution.
    pub fn record_ipc_task(&mut self, ipc_capability: &str) -> TaskCapResult<()> {
        let Some(current) = self.current.as_mut() else {
            panic!("record_ipc_task: {}", TaskCapError::NoCurrentTask);
        };
        let task_id = current.diagnostic_id;
        match current.capability.load_from_ipc_string(ipc_capability, &self.rules) {
            Ok(()) => {
                debug!(task_id, ipc = %ipc_capability, "current task capability set from ipc");
                Ok(())
            }
            Err(e) => {
                warn!(task_id, ipc = %ipc_capability, error = %e, "malformed ipc capability");
                Err(TaskCapError::MalformedIpcCapability {
                    spec: ipc_capability.to_string(),
                })
            }
        }
    }

    /// Reload the running task's capability from a JS string, as when a
    /// risky script executes inline in the current task.
    ///
    /// # Panics
    ///
    /// Panics when called outside task execution.
    pub fn update_current_task_capability(&mut self, capability_js: &str) -> TaskCapResult<()> {
        let Some(current) = self.current.as_mut() else {
            panic!("update_current_task_capability: {}", TaskCapError::NoCurrentTask);
        };
        let task_id = current.diagnostic_id;
        match current.capability.load_from_js_string(capability_js, &self.rules) {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!(task_id, spec = %capability_js, error = %e, "malformed capability string");
                Err(TaskCapError::MalformedCapability {
                    spec: capability_js.to_string(),
                    reason: e.to_string(),
                })
            }
        }
    }
}

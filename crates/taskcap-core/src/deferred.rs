//! Tasks that must run before control returns to the main queue.
//!
//! Zero-delay work requested from restricted code and forked callbacks land
//! here. Each item still runs as its own task so the tracker sees its
//! capability, but the whole buffer is drained right after the task that
//! filled it.

use std::collections::VecDeque;

use tracing::debug;

use crate::{context::TaskContext, task::Task};

#[derive(Debug, Default)]
pub struct DeferredTaskBuffer {
    tasks: VecDeque<Task>,
}

impl DeferredTaskBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append to the tail. The buffer is unbounded.
    pub fn push(&mut self, task: Task) {
        self.tasks.push_back(task);
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Discard every pending item without running it. Returns how many were
    /// dropped.
    pub fn clear(&mut self) -> usize {
        let dropped = self.tasks.len();
        self.tasks.clear();
        dropped
    }

    /// Move everything queued so far into a separate buffer, leaving this
    /// one empty for items pushed while the snapshot runs.
    pub fn take_snapshot(&mut self) -> DeferredTaskBuffer {
        DeferredTaskBuffer {
            tasks: std::mem::take(&mut self.tasks),
        }
    }

    /// Take the oldest item.
    pub fn pop_front(&mut self) -> Option<Task> {
        self.tasks.pop_front()
    }

    pub fn cancel(&mut self, sequence_num: u32) -> Option<Task> {
        let pos = self
            .tasks
            .iter()
            .position(|task| task.sequence_num() == sequence_num)?;
        self.tasks.remove(pos)
    }

    /// Run every item in push order, pointing the tracker at each one first.
    /// Returns the number of tasks run.
    pub fn run_all(self, ctx: &mut TaskContext) -> usize {
        let count = self.tasks.len();
        for task in self.tasks {
            debug!(
                task_id = task.diagnostic_id(),
                task_type = %task.task_type(),
                "running deferred task"
            );
            ctx.run_task_body(task);
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use taskcap_contracts::{Capability, CapabilityRules, TaskType};

    use crate::test_support::context;

    #[test]
    fn run_all_preserves_push_order_and_updates_tracker() {
        let mut ctx = context();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let rules = CapabilityRules::new();

        let mut buffer = DeferredTaskBuffer::new();
        for js in ["No_Cookie_Access;", "", "No_Network_Access;"] {
            let seen = Arc::clone(&seen);
            let task = Task::new(TaskType::Normal, move |ctx: &mut TaskContext| {
                let bitmap = ctx.current_capability().bitmap();
                seen.lock().unwrap().push(bitmap);
            })
            .with_capability(Capability::from_js_string(js, &rules));
            buffer.push(task);
        }

        assert_eq!(buffer.run_all(&mut ctx), 3);
        assert_eq!(*seen.lock().unwrap(), vec![0b0100, 0, 0b1000]);
    }

    #[test]
    fn snapshot_leaves_buffer_empty() {
        let mut buffer = DeferredTaskBuffer::new();
        buffer.push(Task::new(TaskType::Normal, |_| {}));
        let snapshot = buffer.take_snapshot();
        assert!(buffer.is_empty());
        assert_eq!(snapshot.len(), 1);
    }

    #[test]
    fn cancel_removes_only_the_matching_item() {
        let mut buffer = DeferredTaskBuffer::new();
        for seq in [3, 4, 5] {
            let mut task = Task::new(TaskType::Normal, |_| {});
            task.schedule(0, seq);
            buffer.push(task);
        }
        assert_eq!(buffer.cancel(4).map(|t| t.sequence_num()), Some(4));
        assert!(buffer.cancel(4).is_none());
        assert_eq!(buffer.pop_front().map(|t| t.sequence_num()), Some(3));
        assert_eq!(buffer.pop_front().map(|t| t.sequence_num()), Some(5));
        assert!(buffer.pop_front().is_none());
    }

    #[test]
    fn clear_discards_without_running() {
        let ran = Arc::new(Mutex::new(false));
        let mut buffer = DeferredTaskBuffer::new();
        let flag = Arc::clone(&ran);
        buffer.push(Task::new(TaskType::Normal, move |_| *flag.lock().unwrap() = true));

        assert_eq!(buffer.clear(), 1);
        assert!(buffer.is_empty());
        assert!(!*ran.lock().unwrap());
    }
}

//! The main task queue with a logical millisecond clock.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use crate::task::Task;

/// Priority queue of pending tasks.
///
/// Sequence numbers come from a single wrapping counter shared with the
/// deferred buffer, so every task in a domain gets a distinct one.
#[derive(Debug, Default)]
pub struct TaskQueue {
    heap: BinaryHeap<Reverse<Task>>,
    now: u64,
    next_sequence: u32,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start the sequence counter at `start`. Useful for exercising
    /// wraparound.
    pub fn with_starting_sequence(start: u32) -> Self {
        Self {
            next_sequence: start,
            ..Self::default()
        }
    }

    /// Current logical time in milliseconds.
    pub fn now(&self) -> u64 {
        self.now
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub(crate) fn allocate_sequence(&mut self) -> u32 {
        let seq = self.next_sequence;
        self.next_sequence = self.next_sequence.wrapping_add(1);
        seq
    }

    /// Schedule `task` to run `delay_ms` after the current time.
    /// Returns the assigned sequence number.
    pub fn post(&mut self, mut task: Task, delay_ms: u64) -> u32 {
        let seq = self.allocate_sequence();
        task.schedule(self.now.saturating_add(delay_ms), seq);
        self.heap.push(Reverse(task));
        seq
    }

    /// Remove the next task whose run time has arrived.
    pub fn pop_ready(&mut self) -> Option<Task> {
        match self.heap.peek() {
            Some(Reverse(task)) if task.run_time() <= self.now => {
                self.heap.pop().map(|Reverse(task)| task)
            }
            _ => None,
        }
    }

    /// Move the clock forward to the earliest pending run time, if that is
    /// in the future. Returns whether anything is pending.
    pub fn advance_to_next(&mut self) -> bool {
        match self.heap.peek() {
            Some(Reverse(task)) => {
                self.now = self.now.max(task.run_time());
                true
            }
            None => false,
        }
    }

    /// Remove a pending task by sequence number.
    pub fn cancel(&mut self, sequence_num: u32) -> Option<Task> {
        let mut cancelled = None;
        let remaining: Vec<Reverse<Task>> = std::mem::take(&mut self.heap)
            .into_vec()
            .into_iter()
            .filter_map(|Reverse(task)| {
                if cancelled.is_none() && task.sequence_num() == sequence_num {
                    cancelled = Some(task);
                    None
                } else {
                    Some(Reverse(task))
                }
            })
            .collect();
        self.heap = BinaryHeap::from(remaining);
        cancelled
    }

    /// Drop every pending task.
    pub fn clear(&mut self) {
        self.heap.clear();
    }
}

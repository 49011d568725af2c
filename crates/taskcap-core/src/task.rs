//! Schedulable units of deferred work.
//!
//! A `Task` owns its body, its declared type, and its own `Capability`
//! value. Tasks order by `run_time`, then by `sequence_num` using a
//! wrapping difference so ordering survives counter roll-over.

use std::cmp::Ordering;
use std::fmt;

use taskcap_contracts::{Capability, CapabilityParseError, CapabilityRules, TaskType};

use crate::context::TaskContext;

/// The work a task performs. It receives the scheduling domain's context.
pub type TaskBody = Box<dyn FnOnce(&mut TaskContext)>;

/// Marks tasks produced by the forker, for diagnostics only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForkTag {
    /// Invokes the forked record at this index.
    Callback(usize),
    /// Runs after the records up to and including this index.
    Terminate(usize),
    /// Resumes parsing after the risky script at this index.
    Continuation(usize),
}

pub struct Task {
    run_time: u64,
    sequence_num: u32,
    nestable: bool,
    task_type: TaskType,
    capability: Capability,
    fork_tag: Option<ForkTag>,
    body: TaskBody,
}

impl Task {
    /// A nestable task with an unrestricted capability. The scheduler fills
    /// in `run_time` and `sequence_num` when it enqueues the task.
    pub fn new(task_type: TaskType, body: impl FnOnce(&mut TaskContext) + 'static) -> Self {
        Self {
            run_time: 0,
            sequence_num: 0,
            nestable: true,
            task_type,
            capability: Capability::new(),
            fork_tag: None,
            body: Box::new(body),
        }
    }

    pub fn with_capability(mut self, capability: Capability) -> Self {
        self.capability = capability;
        self
    }

    pub fn non_nestable(mut self) -> Self {
        self.nestable = false;
        self
    }

    pub(crate) fn with_fork_tag(mut self, tag: ForkTag) -> Self {
        self.fork_tag = Some(tag);
        self
    }

    pub(crate) fn schedule(&mut self, run_time: u64, sequence_num: u32) {
        self.run_time = run_time;
        self.sequence_num = sequence_num;
    }

    pub fn run_time(&self) -> u64 {
        self.run_time
    }

    pub fn sequence_num(&self) -> u32 {
        self.sequence_num
    }

    pub fn is_nestable(&self) -> bool {
        self.nestable
    }

    pub fn task_type(&self) -> TaskType {
        self.task_type
    }

    pub fn capability(&self) -> &Capability {
        &self.capability
    }

    pub fn fork_tag(&self) -> Option<ForkTag> {
        self.fork_tag
    }

    /// Identifier used in logs. Forked tasks get negative ids derived from
    /// their record index so they stand out; it plays no part in ordering.
    pub fn diagnostic_id(&self) -> i64 {
        match self.fork_tag {
            Some(ForkTag::Callback(idx)) => -(idx as i64) - 1,
            Some(ForkTag::Terminate(last)) => -(last as i64) - 2,
            Some(ForkTag::Continuation(_)) => -100,
            None => i64::from(self.sequence_num),
        }
    }

    pub fn set_capability(&mut self, capability: &Capability) {
        self.capability.set_from(capability);
    }

    pub fn narrow_down_capability(&mut self, capability: &Capability) {
        self.capability.narrow_down_from(capability);
    }

    pub fn set_capability_from_ipc(
        &mut self,
        ipc: &str,
        rules: &CapabilityRules,
    ) -> Result<(), CapabilityParseError> {
        self.capability.load_from_ipc_string(ipc, rules)
    }

    pub fn set_capability_from_js_string(
        &mut self,
        js: &str,
        rules: &CapabilityRules,
    ) -> Result<(), CapabilityParseError> {
        self.capability.load_from_js_string(js, rules)
    }

    pub fn is_restricted(&self) -> bool {
        self.capability.is_restricted()
    }

    /// Run the body. The caller updates the tracker first.
    pub(crate) fn run(self, ctx: &mut TaskContext) {
        (self.body)(ctx)
    }

    /// Earlier `run_time` first; ties go to the earlier sequence number,
    /// compared through a wrapping difference.
    pub fn schedule_order(&self, other: &Task) -> Ordering {
        self.run_time.cmp(&other.run_time).then_with(|| {
            let delta = self.sequence_num.wrapping_sub(other.sequence_num) as i32;
            delta.cmp(&0)
        })
    }
}

impl PartialEq for Task {
    fn eq(&self, other: &Self) -> bool {
        self.schedule_order(other) == Ordering::Equal
    }
}

impl Eq for Task {}

impl PartialOrd for Task {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Task {
    fn cmp(&self, other: &Self) -> Ordering {
        self.schedule_order(other)
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("run_time", &self.run_time)
            .field("sequence_num", &self.sequence_num)
            .field("task_type", &self.task_type)
            .field("restricted", &self.capability.is_restricted())
            .field("fork_tag", &self.fork_tag)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task_at(run_time: u64, sequence_num: u32) -> Task {
        let mut task = Task::new(TaskType::Normal, |_| {});
        task.schedule(run_time, sequence_num);
        task
    }

    #[test]
    fn earlier_run_time_wins_regardless_of_sequence() {
        let early = task_at(5, 900);
        let late = task_at(10, 1);
        assert!(early < late);
        assert_eq!(early.schedule_order(&late), Ordering::Less);
    }

    #[test]
    fn equal_run_time_breaks_ties_by_sequence() {
        assert!(task_at(7, 3) < task_at(7, 4));
        assert_eq!(task_at(7, 3).schedule_order(&task_at(7, 3)), Ordering::Equal);
    }

    #[test]
    fn sequence_comparison_survives_wraparound() {
        // Enqueued just before the counter rolls over, then just after.
        let before_wrap = task_at(0, u32::MAX - 1);
        let after_wrap = task_at(0, 1);
        assert!(before_wrap < after_wrap);
        assert!(after_wrap > before_wrap);
    }

    #[test]
    fn diagnostic_ids_for_forked_tasks_are_negative() {
        let mut plain = task_at(0, 12);
        assert_eq!(plain.diagnostic_id(), 12);

        plain = plain.with_fork_tag(ForkTag::Callback(0));
        assert_eq!(plain.diagnostic_id(), -1);
        assert_eq!(task_at(0, 0).with_fork_tag(ForkTag::Callback(2)).diagnostic_id(), -3);
        assert_eq!(task_at(0, 0).with_fork_tag(ForkTag::Terminate(2)).diagnostic_id(), -4);
        assert_eq!(task_at(0, 0).with_fork_tag(ForkTag::Continuation(0)).diagnostic_id(), -100);
    }

    #[test]
    fn capability_helpers_forward_to_the_owned_capability() {
        let rules = CapabilityRules::new();
        let mut task = Task::new(TaskType::Timer(taskcap_contracts::TimerKind::Delayed), |_| {});
        assert!(!task.is_restricted());

        task.set_capability_from_js_string("No_DOM_Access;", &rules).unwrap();
        assert!(task.is_restricted());

        let parent = Capability::from_js_string("No_Cookie_Access;", &rules);
        task.narrow_down_capability(&parent);
        assert_eq!(task.capability().bitmap(), 0b0111);

        task.set_capability_from_ipc("8", &rules).unwrap();
        assert_eq!(task.capability().bitmap(), 8);

        task.set_capability(&Capability::new());
        assert!(!task.is_restricted());
    }

    #[test]
    fn new_tasks_are_nestable_until_marked() {
        let task = Task::new(TaskType::Normal, |_| {});
        assert!(task.is_nestable());
        assert!(!task.non_nestable().is_nestable());
    }
}

//! The per-domain scheduling context.
//!
//! One `TaskContext` exists per scheduling domain (a simulated renderer
//! process, a test). It owns the tracker, the main queue, the deferred
//! buffer, the forker, and the access policy and recorder. Every scheduler
//! entry point goes through it; there is no global state.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use taskcap_contracts::{
    domain::DomainId,
    error::{TaskCapError, TaskCapResult},
    Capability, CapabilityRules, TaskType, TimerKind,
};

use crate::{
    deferred::DeferredTaskBuffer,
    fork::RestrictedCallbackForker,
    queue::TaskQueue,
    task::{ForkTag, Task},
    tracker::TaskCapabilityTracker,
    traits::{AccessPolicy, AccessRecorder},
};

/// Where a zero-delay timer carrying a capability is scheduled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ZeroDelayRouting {
    /// Run before control returns to the main queue.
    #[default]
    Deferred,
    /// Post to the main queue like any other timer.
    MainQueue,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContextOptions {
    pub zero_delay: ZeroDelayRouting,
}

pub struct TaskContext {
    domain_id: DomainId,
    options: ContextOptions,
    tracker: TaskCapabilityTracker,
    queue: TaskQueue,
    deferred: DeferredTaskBuffer,
    // The batch being drained. Kept here so running tasks can cancel items
    // that have not started yet.
    draining: DeferredTaskBuffer,
    forker: RestrictedCallbackForker,
    pub(crate) policy: Box<dyn AccessPolicy>,
    pub(crate) recorder: Box<dyn AccessRecorder>,
}

impl TaskContext {
    pub fn new(
        rules: CapabilityRules,
        policy: Box<dyn AccessPolicy>,
        recorder: Box<dyn AccessRecorder>,
    ) -> Self {
        Self {
            domain_id: DomainId::new(),
            options: ContextOptions::default(),
            tracker: TaskCapabilityTracker::new(rules),
            queue: TaskQueue::new(),
            deferred: DeferredTaskBuffer::new(),
            draining: DeferredTaskBuffer::new(),
            forker: RestrictedCallbackForker::new(),
            policy,
            recorder,
        }
    }

    /// Use a domain id chosen by the host, e.g. one an access log was
    /// already created for.
    pub fn with_domain_id(mut self, domain_id: DomainId) -> Self {
        self.domain_id = domain_id;
        self
    }

    pub fn with_options(mut self, options: ContextOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_queue(mut self, queue: TaskQueue) -> Self {
        self.queue = queue;
        self
    }

    pub fn domain_id(&self) -> DomainId {
        self.domain_id
    }

    pub fn options(&self) -> ContextOptions {
        self.options
    }

    pub fn rules(&self) -> &CapabilityRules {
        self.tracker.rules()
    }

    pub fn tracker(&self) -> &TaskCapabilityTracker {
        &self.tracker
    }

    pub fn queue(&self) -> &TaskQueue {
        &self.queue
    }

    pub fn deferred(&self) -> &DeferredTaskBuffer {
        &self.deferred
    }

    /// Whether deferred work is queued or a drain is still in progress.
    pub fn has_deferred_work(&self) -> bool {
        !self.deferred.is_empty() || !self.draining.is_empty()
    }

    pub fn forker(&self) -> &RestrictedCallbackForker {
        &self.forker
    }

    pub(crate) fn forker_mut(&mut self) -> &mut RestrictedCallbackForker {
        &mut self.forker
    }

    // ── Current task ────────────────────────────────────────────────────────

    pub fn is_current_restricted(&self) -> bool {
        self.tracker.is_current_restricted()
    }

    /// # Panics
    ///
    /// Panics when called outside task execution.
    pub fn current_capability(&self) -> &Capability {
        self.tracker.current_capability()
    }

    pub fn current_task_type(&self) -> Option<TaskType> {
        self.tracker.current_task().map(|task| task.task_type)
    }

    /// Set the running task's capability from an IPC annotation.
    ///
    /// # Panics
    ///
    /// Panics when called outside task execution.
    pub fn record_ipc_task(&mut self, ipc_capability: &str) -> TaskCapResult<()> {
        self.tracker.record_ipc_task(ipc_capability)
    }

    /// Reload the running task's capability, as when a risky script runs
    /// inline.
    ///
    /// # Panics
    ///
    /// Panics when called outside task execution.
    pub fn update_current_task_capability(&mut self, capability_js: &str) -> TaskCapResult<()> {
        self.tracker.update_current_task_capability(capability_js)
    }

    /// Apply the capability of a risky script that arrived over the network
    /// to the unrestricted task processing it. Returns whether the
    /// capability was applied; restricted tasks keep their own.
    ///
    /// # Panics
    ///
    /// Panics when called outside task execution.
    pub fn apply_downloaded_script_capability(&mut self, capability_js: &str) -> TaskCapResult<bool> {
        if self.tracker.is_current_restricted() || capability_js.trim().is_empty() {
            return Ok(false);
        }
        self.tracker.update_current_task_capability(capability_js)?;
        Ok(true)
    }

    // ── Posting ─────────────────────────────────────────────────────────────

    /// Post a normal task. A restricted creator's capability is inherited.
    pub fn post_task(
        &mut self,
        delay_ms: u64,
        body: impl FnOnce(&mut TaskContext) + 'static,
    ) -> u32 {
        let mut task = Task::new(TaskType::Normal, body);
        self.tracker.record_new_task(&mut task);
        self.queue.post(task, delay_ms)
    }

    /// Post scheduler bookkeeping work. It never carries a capability and is
    /// not routed through propagation.
    pub fn post_internal_task(
        &mut self,
        delay_ms: u64,
        body: impl FnOnce(&mut TaskContext) + 'static,
    ) -> u32 {
        let task = Task::new(TaskType::SchedulerInternal, body).non_nestable();
        self.queue.post(task, delay_ms)
    }

    /// A timer with no author capability. A restricted creator narrows it.
    pub fn set_timeout(
        &mut self,
        delay_ms: u64,
        body: impl FnOnce(&mut TaskContext) + 'static,
    ) -> u32 {
        let mut task = Task::new(TaskType::Timer(TimerKind::Plain), body);
        self.tracker.record_new_task(&mut task);
        self.queue.post(task, delay_ms)
    }

    /// A timer carrying an author-declared capability, narrowed by a
    /// restricted creator. Zero-delay timers go to the deferred buffer
    /// unless configured otherwise.
    pub fn set_timeout_with_capability(
        &mut self,
        capability_js: &str,
        delay_ms: u64,
        body: impl FnOnce(&mut TaskContext) + 'static,
    ) -> u32 {
        let kind = if delay_ms == 0 {
            TimerKind::ZeroDelay
        } else {
            TimerKind::Delayed
        };
        let mut task = Task::new(TaskType::Timer(kind), body);
        if let Err(e) = task.set_capability_from_js_string(capability_js, self.tracker.rules()) {
            warn!(
                domain_id = %self.domain_id,
                spec = %capability_js,
                error = %e,
                "malformed timer capability"
            );
        }
        self.tracker.record_new_task(&mut task);

        if kind == TimerKind::ZeroDelay && self.options.zero_delay == ZeroDelayRouting::Deferred {
            self.push_deferred(task)
        } else {
            self.queue.post(task, delay_ms)
        }
    }

    /// Ingest an IPC message: the task's capability comes from the wire.
    pub fn post_ipc_task(
        &mut self,
        ipc_capability: &str,
        body: impl FnOnce(&mut TaskContext) + 'static,
    ) -> u32 {
        let mut task = Task::new(TaskType::Ipc, body);
        if let Err(e) = task.set_capability_from_ipc(ipc_capability, self.tracker.rules()) {
            warn!(
                domain_id = %self.domain_id,
                ipc = %ipc_capability,
                error = %e,
                "malformed ipc capability"
            );
        }
        self.tracker.record_new_task(&mut task);
        self.queue.post(task, 0)
    }

    /// Push onto the deferred buffer with a fresh sequence number.
    pub(crate) fn push_deferred(&mut self, mut task: Task) -> u32 {
        let seq = self.queue.allocate_sequence();
        task.schedule(self.queue.now(), seq);
        self.deferred.push(task);
        seq
    }

    /// Remove a pending task from the main queue, the deferred buffer, or
    /// the batch currently being drained. A cancelled forked callback
    /// releases its record; a cancelled terminate or continuation task
    /// releases the records whose callbacks already ran.
    pub fn cancel_task(&mut self, sequence_num: u32) -> TaskCapResult<()> {
        let task = self
            .queue
            .cancel(sequence_num)
            .or_else(|| self.draining.cancel(sequence_num))
            .or_else(|| self.deferred.cancel(sequence_num))
            .ok_or(TaskCapError::UnknownTask { sequence_num })?;

        match task.fork_tag() {
            Some(ForkTag::Callback(idx)) => self.forker.release(idx),
            Some(ForkTag::Terminate(last)) | Some(ForkTag::Continuation(last)) => {
                self.forker.abandon(last)
            }
            None => {}
        }
        debug!(
            domain_id = %self.domain_id,
            sequence_num,
            task_type = %task.task_type(),
            "task cancelled"
        );
        Ok(())
    }

    // ── Running ─────────────────────────────────────────────────────────────

    /// Point the tracker at `task` and run its body.
    pub(crate) fn run_task_body(&mut self, task: Task) {
        self.tracker.update_current_task(&task);
        task.run(self);
    }

    /// Run everything in the deferred buffer, including work pushed while
    /// draining. Each pass runs one snapshot, in push order. Returns the
    /// number of tasks run.
    pub fn drain_deferred(&mut self) -> usize {
        let mut ran = 0;
        loop {
            if self.draining.is_empty() {
                if self.deferred.is_empty() {
                    break;
                }
                self.draining = self.deferred.take_snapshot();
            }
            if let Some(task) = self.draining.pop_front() {
                debug!(
                    task_id = task.diagnostic_id(),
                    task_type = %task.task_type(),
                    "running deferred task"
                );
                self.run_task_body(task);
                ran += 1;
            }
        }
        ran
    }

    /// Run the next main-queue task, advancing the clock if nothing is ready
    /// yet, then drain the deferred buffer. Returns `false` when idle.
    pub fn run_next(&mut self) -> bool {
        let task = match self.queue.pop_ready() {
            Some(task) => task,
            None => {
                if !self.queue.advance_to_next() {
                    return false;
                }
                match self.queue.pop_ready() {
                    Some(task) => task,
                    None => return false,
                }
            }
        };

        self.run_task_body(task);
        self.drain_deferred();
        self.tracker.clear_current_task();
        true
    }

    /// Run until both queues are empty. Returns the number of main-queue
    /// tasks run.
    pub fn run_until_idle(&mut self) -> usize {
        if self.has_deferred_work() {
            self.drain_deferred();
            self.tracker.clear_current_task();
        }
        let mut ran = 0;
        while self.run_next() {
            ran += 1;
        }
        ran
    }

    /// Drop all pending work and fork records.
    pub fn shutdown(&mut self) {
        let deferred = self.deferred.clear() + self.draining.clear();
        let queued = self.queue.len();
        self.queue.clear();
        self.forker.clear();
        self.tracker.clear_current_task();
        info!(
            domain_id = %self.domain_id,
            deferred_dropped = deferred,
            queued_dropped = queued,
            "task context shut down"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use taskcap_contracts::MalformedSpecPolicy;

    use crate::fork::ListenerInvocation;
    use crate::test_support::{context, context_with};

    type Log = Arc<Mutex<Vec<String>>>;

    fn log() -> Log {
        Arc::new(Mutex::new(Vec::new()))
    }

    fn push(log: &Log, entry: impl Into<String>) {
        log.lock().unwrap().push(entry.into());
    }

    fn entries(log: &Log) -> Vec<String> {
        log.lock().unwrap().clone()
    }

    // ── Propagation through posting ─────────────────────────────────────────

    #[test]
    fn timer_from_restricted_task_is_narrowed_end_to_end() {
        let mut ctx = context();
        let seen = log();

        let outer = Arc::clone(&seen);
        ctx.set_timeout_with_capability("No_Cookie_Access;JS_WL:a,b", 10, move |ctx| {
            let inner = Arc::clone(&outer);
            ctx.set_timeout_with_capability("No_Network_Access;JS_WL:b,c", 5, move |ctx| {
                let cap = ctx.current_capability();
                push(&inner, format!("{}:{}", cap.bitmap(), cap.whitelist().collect::<Vec<_>>().join(",")));
                push(&inner, format!("cookie={}", ctx.disallowed_to_access_cookie()));
                push(&inner, format!("network={}", ctx.disallowed_to_access_network()));
                push(&inner, format!("a={}", ctx.current_capability().contains_in_whitelist("a")));
            });
        });

        ctx.run_until_idle();
        assert_eq!(
            entries(&seen),
            vec!["12:b", "cookie=true", "network=true", "a=false"]
        );
    }

    #[test]
    fn normal_task_from_restricted_task_inherits() {
        let mut ctx = context();
        let seen = log();

        let outer = Arc::clone(&seen);
        ctx.post_ipc_task("4", move |ctx| {
            let inner = Arc::clone(&outer);
            ctx.post_task(0, move |ctx| {
                push(&inner, ctx.current_capability().to_ipc_string().to_string());
            });
        });

        ctx.run_until_idle();
        assert_eq!(entries(&seen), vec!["4"]);
    }

    #[test]
    fn unrestricted_creator_does_not_restrict_children() {
        let mut ctx = context();
        let seen = log();

        let outer = Arc::clone(&seen);
        ctx.post_task(0, move |ctx| {
            let inner = Arc::clone(&outer);
            ctx.set_timeout(1, move |ctx| {
                push(&inner, format!("{}", ctx.is_current_restricted()));
            });
        });

        ctx.run_until_idle();
        assert_eq!(entries(&seen), vec!["false"]);
    }

    #[test]
    fn record_ipc_task_applies_before_children_are_created() {
        let mut ctx = context();
        let seen = log();

        let outer = Arc::clone(&seen);
        ctx.post_ipc_task("", move |ctx| {
            ctx.record_ipc_task("8").unwrap();
            let inner = Arc::clone(&outer);
            ctx.post_task(0, move |ctx| {
                push(&inner, format!("{}", ctx.disallowed_to_access_network()));
            });
        });

        ctx.run_until_idle();
        assert_eq!(entries(&seen), vec!["true"]);
    }

    // ── Deferred buffer ordering ────────────────────────────────────────────

    #[test]
    fn zero_delay_timers_run_before_next_main_queue_task() {
        let mut ctx = context();
        let order = log();

        let first = Arc::clone(&order);
        ctx.post_task(0, move |ctx| {
            push(&first, "first");
            for name in ["zero-a", "zero-b"] {
                let entry = Arc::clone(&first);
                ctx.set_timeout_with_capability("No_DOM_Access;", 0, move |_| push(&entry, name));
            }
        });
        let second = Arc::clone(&order);
        ctx.post_task(0, move |_| push(&second, "second"));

        ctx.run_until_idle();
        assert_eq!(entries(&order), vec!["first", "zero-a", "zero-b", "second"]);
    }

    #[test]
    fn work_pushed_while_draining_runs_in_a_later_pass() {
        let mut ctx = context();
        let order = log();

        let outer = Arc::clone(&order);
        ctx.post_task(0, move |ctx| {
            let a = Arc::clone(&outer);
            ctx.set_timeout_with_capability("No_DOM_Access;", 0, move |ctx| {
                push(&a, "a");
                let nested = Arc::clone(&a);
                ctx.set_timeout_with_capability("No_DOM_Access;", 0, move |_| push(&nested, "nested"));
            });
            let b = Arc::clone(&outer);
            ctx.set_timeout_with_capability("No_DOM_Access;", 0, move |_| push(&b, "b"));
        });

        ctx.run_until_idle();
        assert_eq!(entries(&order), vec!["a", "b", "nested"]);
    }

    #[test]
    fn zero_delay_can_be_routed_to_the_main_queue() {
        let mut ctx = context().with_options(ContextOptions {
            zero_delay: ZeroDelayRouting::MainQueue,
        });
        let order = log();

        let first = Arc::clone(&order);
        ctx.post_task(0, move |ctx| {
            let zero = Arc::clone(&first);
            ctx.set_timeout_with_capability("No_DOM_Access;", 0, move |_| push(&zero, "zero"));
            push(&first, "first");
        });
        let second = Arc::clone(&order);
        ctx.post_task(0, move |_| push(&second, "second"));

        ctx.run_until_idle();
        assert_eq!(entries(&order), vec!["first", "second", "zero"]);
    }

    #[test]
    fn insertion_order_survives_sequence_wraparound() {
        let mut ctx = context().with_queue(TaskQueue::with_starting_sequence(u32::MAX - 1));
        let order = log();
        for name in ["a", "b", "c"] {
            let entry = Arc::clone(&order);
            ctx.post_task(0, move |_| push(&entry, name));
        }
        ctx.run_until_idle();
        assert_eq!(entries(&order), vec!["a", "b", "c"]);
    }

    #[test]
    fn internal_tasks_bypass_propagation() {
        let mut ctx = context();
        let seen = log();
        let outer = Arc::clone(&seen);
        ctx.post_ipc_task("15", move |ctx| {
            let inner = Arc::clone(&outer);
            ctx.post_internal_task(0, move |ctx| {
                push(&inner, format!("{:?}/{}", ctx.current_task_type(), ctx.is_current_restricted()));
            });
        });
        ctx.run_until_idle();
        assert_eq!(entries(&seen), vec!["Some(SchedulerInternal)/false"]);
    }

    #[test]
    fn main_queue_respects_delays() {
        let mut ctx = context();
        let order = log();
        for (name, delay) in [("late", 30), ("early", 10), ("now", 0)] {
            let entry = Arc::clone(&order);
            ctx.set_timeout(delay, move |_| push(&entry, name));
        }
        assert_eq!(ctx.run_until_idle(), 3);
        assert_eq!(entries(&order), vec!["now", "early", "late"]);
        assert_eq!(ctx.queue().now(), 30);
    }

    // ── Cancellation ────────────────────────────────────────────────────────

    #[test]
    fn cancel_removes_queued_task() {
        let mut ctx = context();
        let order = log();
        let entry = Arc::clone(&order);
        let seq = ctx.post_task(5, move |_| push(&entry, "ran"));

        ctx.cancel_task(seq).unwrap();
        assert!(matches!(
            ctx.cancel_task(seq),
            Err(TaskCapError::UnknownTask { .. })
        ));
        ctx.run_until_idle();
        assert!(entries(&order).is_empty());
    }

    #[test]
    fn cancelling_forked_tasks_releases_their_records() {
        let mut ctx = context();
        let cap = Capability::from_js_string("No_DOM_Access;", ctx.rules());
        let listener = ctx.fork_restricted_listener(ListenerInvocation::new(
            "click",
            "handler",
            cap,
            |_| {},
        ));
        let terminate = ctx.add_terminate_task(|_| {}).unwrap();
        assert_eq!(ctx.forker().live_records(), 1);

        ctx.cancel_task(listener).unwrap();
        assert_eq!(ctx.forker().live_records(), 0);
        assert!(!ctx.has_pending_forked_work());

        ctx.cancel_task(terminate).unwrap();
        assert!(ctx.deferred().is_empty());
    }

    #[test]
    fn cancelling_terminate_keeps_unrun_listeners() {
        let mut ctx = context();
        let order = log();

        let entry = Arc::clone(&order);
        let cap = Capability::from_js_string("No_DOM_Access;", ctx.rules());
        ctx.fork_restricted_listener(ListenerInvocation::new("click", "handler", cap, move |_| {
            push(&entry, "listener")
        }));
        let done = Arc::clone(&order);
        let terminate = ctx
            .add_terminate_task(move |_| push(&done, "terminate"))
            .unwrap();

        ctx.cancel_task(terminate).unwrap();
        assert!(ctx.has_pending_forked_work());

        ctx.run_until_idle();
        assert_eq!(entries(&order), vec!["listener"]);
        assert!(!ctx.has_pending_forked_work());
    }

    #[test]
    fn cancelling_continuation_still_runs_the_forked_script() {
        let mut ctx = context();
        let order = log();

        let entry = Arc::clone(&order);
        ctx.post_task(0, move |ctx| {
            let script = Arc::clone(&entry);
            ctx.fork_risky_script("No_Cookie_Access;", move |_| push(&script, "script"));
            let resume = Arc::clone(&entry);
            let continuation = ctx
                .post_parser_continuation(move |_| push(&resume, "continuation"))
                .unwrap();
            let cancelled = ctx.cancel_task(continuation).is_ok();
            push(&entry, format!("cancelled={cancelled}"));
        });

        ctx.run_until_idle();
        assert_eq!(entries(&order), vec!["cancelled=true", "script"]);
        assert!(!ctx.has_pending_forked_work());
    }

    #[test]
    fn deferred_task_can_cancel_a_sibling_from_the_same_batch() {
        let mut ctx = context();
        let order = log();
        let victim: Arc<Mutex<Option<u32>>> = Arc::new(Mutex::new(None));

        let entry = Arc::clone(&order);
        let target = Arc::clone(&victim);
        ctx.post_task(0, move |ctx| {
            let canceller = Arc::clone(&entry);
            let slot = Arc::clone(&target);
            ctx.set_timeout_with_capability("No_DOM_Access;", 0, move |ctx| {
                let seq = slot.lock().unwrap().take();
                let cancelled = seq.is_some_and(|seq| ctx.cancel_task(seq).is_ok());
                push(&canceller, format!("cancel={cancelled}"));
            });
            let ran = Arc::clone(&entry);
            let seq = ctx.set_timeout_with_capability("No_DOM_Access;", 0, move |_| {
                push(&ran, "victim-ran")
            });
            *target.lock().unwrap() = Some(seq);
        });

        ctx.run_until_idle();
        assert_eq!(entries(&order), vec!["cancel=true"]);
        assert!(!ctx.has_deferred_work());
    }

    #[test]
    fn forked_listener_cancelled_mid_drain_releases_its_record() {
        let mut ctx = context();
        let order = log();
        let victim: Arc<Mutex<Option<u32>>> = Arc::new(Mutex::new(None));

        let entry = Arc::clone(&order);
        let target = Arc::clone(&victim);
        ctx.post_task(0, move |ctx| {
            let no_dom = Capability::from_js_string("No_DOM_Access;", ctx.rules());
            let no_network = Capability::from_js_string("No_Network_Access;", ctx.rules());

            let first = Arc::clone(&entry);
            let slot = Arc::clone(&target);
            ctx.fork_restricted_listener(ListenerInvocation::new("click", "first", no_dom, move |ctx| {
                let seq = slot.lock().unwrap().take();
                let cancelled = seq.is_some_and(|seq| ctx.cancel_task(seq).is_ok());
                push(&first, format!("cancel={cancelled}"));
                push(&first, format!("live={}", ctx.forker().live_records()));
            }));
            let second = Arc::clone(&entry);
            let seq = ctx.fork_restricted_listener(ListenerInvocation::new(
                "click",
                "second",
                no_network,
                move |_| push(&second, "second"),
            ));
            *target.lock().unwrap() = Some(seq);
            ctx.add_terminate_task(|_| {}).unwrap();
        });

        ctx.run_until_idle();
        assert_eq!(entries(&order), vec!["cancel=true", "live=1"]);
        assert!(!ctx.has_pending_forked_work());
    }

    #[test]
    fn shutdown_discards_everything() {
        let mut ctx = context();
        ctx.post_task(0, |_| {});
        ctx.fork_risky_script("No_DOM_Access;", |_| {});
        ctx.shutdown();
        assert!(ctx.queue().is_empty());
        assert!(ctx.deferred().is_empty());
        assert!(!ctx.has_pending_forked_work());
        assert_eq!(ctx.run_until_idle(), 0);
    }

    // ── Malformed capabilities ──────────────────────────────────────────────

    #[test]
    fn malformed_timer_capability_follows_configured_policy() {
        let seen = log();

        for policy in [MalformedSpecPolicy::Unrestricted, MalformedSpecPolicy::FailClosed] {
            let mut ctx = context_with(CapabilityRules::new().with_malformed_policy(policy));
            let entry = Arc::clone(&seen);
            ctx.set_timeout_with_capability("No_Such_Thing;", 1, move |ctx| {
                push(&entry, format!("{}", ctx.disallowed_to_access_cookie()));
            });
            ctx.run_until_idle();
        }

        assert_eq!(entries(&seen), vec!["false", "true"]);
    }

    #[test]
    fn downloaded_script_capability_applies_only_to_unrestricted_tasks() {
        let mut ctx = context();
        let seen = log();

        let entry = Arc::clone(&seen);
        ctx.post_ipc_task("", move |ctx| {
            let applied = ctx.apply_downloaded_script_capability("No_Network_Access;").unwrap();
            let again = ctx.apply_downloaded_script_capability("No_Cookie_Access;").unwrap();
            push(&entry, format!("{applied}/{again}/{}", ctx.current_capability().bitmap()));
        });

        ctx.run_until_idle();
        assert_eq!(entries(&seen), vec!["true/false/8"]);
    }
}

//! Forking capability-restricted callbacks out of the running task.
//!
//! When a restricted callback is about to run inside a task whose capability
//! differs from its own, the callback is not invoked inline. It is captured
//! into a record, and a fresh task carrying the callback's capability is
//! pushed to the deferred buffer. A terminate (or continuation) task follows
//! the forked callbacks and finishes the bookkeeping.
//!
//! Forking never runs user code. Bodies only run when the deferred buffer
//! is drained, with the tracker pointing at the forked task.

use std::fmt;

use tracing::{debug, info, warn};

use taskcap_contracts::{
    error::{TaskCapError, TaskCapResult},
    Capability, FrameParserKind, TaskType,
};

use crate::{
    context::TaskContext,
    task::{ForkTag, Task, TaskBody},
};

/// What kind of callback a record holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForkKind {
    EventListener,
    RiskyScript,
}

/// A captured restricted callback.
struct ForkRecord {
    kind: ForkKind,
    label: String,
    capability: Capability,
    callback: Option<TaskBody>,
    // Set when the finishing task was cancelled before this callback ran.
    orphaned: bool,
}

impl fmt::Debug for ForkRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForkRecord")
            .field("kind", &self.kind)
            .field("label", &self.label)
            .field("capability", &self.capability)
            .field("has_run", &self.callback.is_none())
            .field("orphaned", &self.orphaned)
            .finish()
    }
}

/// An event listener invocation to be forked.
pub struct ListenerInvocation {
    pub event_type: String,
    pub listener: String,
    pub capability: Capability,
    pub callback: TaskBody,
}

impl ListenerInvocation {
    pub fn new(
        event_type: impl Into<String>,
        listener: impl Into<String>,
        capability: Capability,
        callback: impl FnOnce(&mut TaskContext) + 'static,
    ) -> Self {
        Self {
            event_type: event_type.into(),
            listener: listener.into(),
            capability,
            callback: Box::new(callback),
        }
    }
}

/// Ordered list of captured callbacks. A record's index is its identity and
/// stays stable until every record up to the finishing task's index has
/// been released.
#[derive(Debug, Default)]
pub struct RestrictedCallbackForker {
    records: Vec<Option<ForkRecord>>,
    pending: bool,
}

impl RestrictedCallbackForker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set by the first record, cleared when the list is finished or cleared.
    pub fn has_pending_forked_work(&self) -> bool {
        self.pending
    }

    /// Number of records not yet released.
    pub fn live_records(&self) -> usize {
        self.records.iter().filter(|r| r.is_some()).count()
    }

    pub fn capability(&self, idx: usize) -> Option<&Capability> {
        self.records
            .get(idx)
            .and_then(|r| r.as_ref())
            .map(|r| &r.capability)
    }

    pub fn kind(&self, idx: usize) -> Option<ForkKind> {
        self.records.get(idx).and_then(|r| r.as_ref()).map(|r| r.kind)
    }

    /// Index of the most recent live record.
    pub fn last_index(&self) -> Option<usize> {
        self.records.iter().rposition(|r| r.is_some())
    }

    pub(crate) fn add_record(
        &mut self,
        kind: ForkKind,
        label: String,
        capability: Capability,
        callback: TaskBody,
    ) -> usize {
        self.records.push(Some(ForkRecord {
            kind,
            label,
            capability,
            callback: Some(callback),
            orphaned: false,
        }));
        self.pending = true;
        self.records.len() - 1
    }

    /// Take the callback out of a record. The record itself stays live so its
    /// capability remains available until the terminate task finishes it.
    pub(crate) fn take_callback(&mut self, idx: usize) -> Option<(String, TaskBody)> {
        let record = self.records.get_mut(idx)?.as_mut()?;
        let callback = record.callback.take()?;
        Some((record.label.clone(), callback))
    }

    /// Drop one record, along with any callback it still holds.
    pub(crate) fn release(&mut self, idx: usize) {
        if let Some(slot) = self.records.get_mut(idx) {
            *slot = None;
        }
        self.compact();
    }

    /// Release every record up to and including `last`.
    pub(crate) fn finish(&mut self, last: usize) {
        let end = (last + 1).min(self.records.len());
        for slot in &mut self.records[..end] {
            *slot = None;
        }
        self.compact();
    }

    /// The finishing task for records up to `last` was cancelled. Records
    /// whose callback already ran are released now; the others stay live and
    /// are released once their own callback runs or is cancelled.
    pub(crate) fn abandon(&mut self, last: usize) {
        let end = (last + 1).min(self.records.len());
        for slot in &mut self.records[..end] {
            let waiting = slot.as_ref().is_some_and(|r| r.callback.is_some());
            if !waiting {
                *slot = None;
            } else if let Some(record) = slot.as_mut() {
                record.orphaned = true;
            }
        }
        self.compact();
    }

    /// Release `idx` if its finishing task was cancelled.
    pub(crate) fn release_if_orphaned(&mut self, idx: usize) {
        let orphaned = self
            .records
            .get(idx)
            .and_then(|r| r.as_ref())
            .is_some_and(|r| r.orphaned);
        if orphaned {
            self.release(idx);
        }
    }

    /// Drop every record.
    pub fn clear(&mut self) {
        self.records.clear();
        self.pending = false;
    }

    fn compact(&mut self) {
        if self.records.iter().all(|r| r.is_none()) {
            self.clear();
        }
    }
}

impl TaskContext {
    /// Whether a callback carrying `capability` must run in its own task.
    ///
    /// Unrestricted callbacks never fork. Restricted ones fork unless the
    /// running task already has exactly the same capability.
    pub fn should_fork(&self, capability: &Capability) -> bool {
        if !capability.is_restricted() {
            return false;
        }
        match self.tracker().try_current_capability() {
            Ok(current) => current != capability,
            Err(_) => true,
        }
    }

    pub fn has_pending_forked_work(&self) -> bool {
        self.forker().has_pending_forked_work()
    }

    /// Capture a listener invocation and schedule it as a restricted
    /// listener task on the deferred buffer. Returns the task's sequence
    /// number.
    pub fn fork_restricted_listener(&mut self, invocation: ListenerInvocation) -> u32 {
        let ListenerInvocation {
            event_type,
            listener,
            capability,
            callback,
        } = invocation;

        let label = format!("{event_type}:{listener}");
        let idx = self.forker_mut().add_record(
            ForkKind::EventListener,
            label.clone(),
            capability.clone(),
            callback,
        );
        let task = Task::new(TaskType::RestrictedListener, move |ctx: &mut TaskContext| {
            ctx.run_forked_callback(idx)
        })
        .with_capability(capability)
        .with_fork_tag(ForkTag::Callback(idx));

        info!(
            domain_id = %self.domain_id(),
            record = idx,
            listener = %label,
            capability = %task.capability().to_js_string(self.rules()),
            "restricted listener forked"
        );
        self.push_deferred(task)
    }

    /// Schedule the task that runs once the forked callbacks of the current
    /// dispatch have finished. It carries the capability of the most recent
    /// record and finishes every record up to it.
    pub fn add_terminate_task(
        &mut self,
        body: impl FnOnce(&mut TaskContext) + 'static,
    ) -> TaskCapResult<u32> {
        let last = self
            .forker()
            .last_index()
            .ok_or_else(|| TaskCapError::ForkUnderflow {
                operation: "add_terminate_task".to_string(),
            })?;
        let capability = self.forker().capability(last).cloned().unwrap_or_default();

        let task = Task::new(TaskType::RestrictedListener, move |ctx: &mut TaskContext| {
            body(ctx);
            ctx.forker_mut().finish(last);
        })
        .with_capability(capability)
        .with_fork_tag(ForkTag::Terminate(last));

        debug!(domain_id = %self.domain_id(), last_record = last, "terminate task scheduled");
        Ok(self.push_deferred(task))
    }

    /// Fork a risky `<script>` into a restricted frame-parser task.
    ///
    /// Returns `false` when the caller should run the script inline instead:
    /// the running task already is a restricted frame-parser task, or the
    /// capability string is empty or yields no restriction.
    pub fn fork_risky_script(
        &mut self,
        capability_js: &str,
        body: impl FnOnce(&mut TaskContext) + 'static,
    ) -> bool {
        let in_restricted_parser = self.tracker().current_task().is_some_and(|task| {
            task.task_type == TaskType::FrameParser(FrameParserKind::Restricted)
        });
        if in_restricted_parser || capability_js.trim().is_empty() {
            return false;
        }

        let mut capability = Capability::new();
        if let Err(e) = capability.load_from_js_string(capability_js, self.rules()) {
            warn!(spec = %capability_js, error = %e, "malformed risky script capability");
        }
        if !capability.is_restricted() {
            return false;
        }

        let idx = self.forker_mut().add_record(
            ForkKind::RiskyScript,
            "risky-script".to_string(),
            capability.clone(),
            Box::new(body),
        );
        let task = Task::new(
            TaskType::FrameParser(FrameParserKind::Restricted),
            move |ctx: &mut TaskContext| ctx.run_forked_callback(idx),
        )
        .with_capability(capability)
        .with_fork_tag(ForkTag::Callback(idx));

        info!(domain_id = %self.domain_id(), record = idx, "risky script forked");
        self.push_deferred(task);
        true
    }

    /// Schedule the unrestricted task that resumes parsing after a forked
    /// risky script.
    pub fn post_parser_continuation(
        &mut self,
        body: impl FnOnce(&mut TaskContext) + 'static,
    ) -> TaskCapResult<u32> {
        let last = self
            .forker()
            .last_index()
            .ok_or_else(|| TaskCapError::ForkUnderflow {
                operation: "post_parser_continuation".to_string(),
            })?;

        let task = Task::new(
            TaskType::FrameParser(FrameParserKind::Normal),
            move |ctx: &mut TaskContext| {
                body(ctx);
                ctx.forker_mut().finish(last);
            },
        )
        .with_fork_tag(ForkTag::Continuation(last));

        debug!(domain_id = %self.domain_id(), last_record = last, "parser continuation scheduled");
        Ok(self.push_deferred(task))
    }

    pub(crate) fn run_forked_callback(&mut self, idx: usize) {
        match self.forker_mut().take_callback(idx) {
            Some((label, callback)) => {
                debug!(record = idx, callback = %label, "running forked callback");
                callback(self);
                self.forker_mut().release_if_orphaned(idx);
            }
            None => warn!(record = idx, "forked callback missing or already run"),
        }
    }
}

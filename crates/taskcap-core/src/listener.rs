//! Event listener registration and dispatch.
//!
//! A listener registered from a restricted task keeps that task's
//! capability. Setting a capability on a listener that already has one
//! narrows it. Dispatch runs unrestricted listeners inline and forks the
//! rest; once one listener has been forked, every later listener of the same
//! dispatch is forked too so listeners still run in registration order.

use std::fmt;
use std::rc::Rc;

use tracing::debug;

use taskcap_contracts::{error::TaskCapResult, Capability};

use crate::{context::TaskContext, fork::ListenerInvocation};

pub type ListenerFn = Rc<dyn Fn(&mut TaskContext)>;

#[derive(Clone)]
pub struct RegisteredListener {
    event_type: String,
    label: String,
    capability: Option<Capability>,
    callback: ListenerFn,
}

impl RegisteredListener {
    pub fn new(
        event_type: impl Into<String>,
        label: impl Into<String>,
        callback: impl Fn(&mut TaskContext) + 'static,
    ) -> Self {
        Self {
            event_type: event_type.into(),
            label: label.into(),
            capability: None,
            callback: Rc::new(callback),
        }
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn capability(&self) -> Option<&Capability> {
        self.capability.as_ref()
    }

    /// Attach a capability, narrowing any capability already attached.
    pub fn set_capability(&mut self, capability: &Capability) {
        match self.capability.as_mut() {
            Some(existing) => existing.narrow_down_from(capability),
            None => self.capability = Some(capability.clone()),
        }
    }
}

impl fmt::Debug for RegisteredListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredListener")
            .field("event_type", &self.event_type)
            .field("label", &self.label)
            .field("capability", &self.capability)
            .finish_non_exhaustive()
    }
}

impl TaskContext {
    /// Register a listener from the running task. A restricted registrant's
    /// capability is attached to the listener.
    pub fn register_listener(
        &self,
        event_type: impl Into<String>,
        label: impl Into<String>,
        callback: impl Fn(&mut TaskContext) + 'static,
    ) -> RegisteredListener {
        let mut listener = RegisteredListener::new(event_type, label, callback);
        if let Ok(current) = self.tracker().try_current_capability() {
            if current.is_restricted() {
                listener.set_capability(current);
            }
        }
        listener
    }

    /// Dispatch `event_type` to `listeners` in order, then run
    /// `default_action`. Returns how many listeners were forked.
    ///
    /// When any listener is forked, `default_action` runs in the terminate
    /// task after all of them.
    pub fn dispatch_event(
        &mut self,
        event_type: &str,
        listeners: &[RegisteredListener],
        default_action: impl FnOnce(&mut TaskContext) + 'static,
    ) -> TaskCapResult<usize> {
        let ambient = self
            .tracker()
            .try_current_capability()
            .ok()
            .cloned()
            .unwrap_or_default();

        let mut forked = 0;
        for listener in listeners.iter().filter(|l| l.event_type == event_type) {
            let capability = listener
                .capability
                .clone()
                .unwrap_or_else(|| ambient.clone());

            if forked > 0 || self.should_fork(&capability) {
                let callback = Rc::clone(&listener.callback);
                self.fork_restricted_listener(ListenerInvocation::new(
                    event_type,
                    listener.label.clone(),
                    capability,
                    move |ctx: &mut TaskContext| callback(ctx),
                ));
                forked += 1;
            } else {
                debug!(event_type, listener = %listener.label, "running listener inline");
                (listener.callback)(self);
            }
        }

        if forked > 0 {
            self.add_terminate_task(default_action)?;
        } else {
            default_action(self);
        }
        Ok(forked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use taskcap_contracts::CapabilityRules;

    use crate::test_support::context;

    fn cap(js: &str) -> Capability {
        Capability::from_js_string(js, &CapabilityRules::new())
    }

    #[test]
    fn set_capability_narrows_existing() {
        let mut listener = RegisteredListener::new("click", "h", |_| {});
        listener.set_capability(&cap("No_Cookie_Access;JS_WL:a,b"));
        listener.set_capability(&cap("No_Network_Access;JS_WL:b"));
        let attached = listener.capability().unwrap();
        assert_eq!(attached.bitmap(), 0b1100);
        assert_eq!(attached.whitelist().collect::<Vec<_>>(), vec!["b"]);
    }

    #[test]
    fn registration_from_restricted_task_captures_capability() {
        let mut ctx = context();
        let registered = Arc::new(Mutex::new(Vec::new()));

        let slot = Arc::clone(&registered);
        ctx.post_ipc_task("4", move |ctx| {
            let listener = ctx.register_listener("click", "restricted", |_| {});
            slot.lock().unwrap().push(listener.capability().map(|c| c.bitmap()));
        });
        ctx.run_until_idle();

        let outside = ctx.register_listener("click", "open", |_| {});
        assert_eq!(*registered.lock().unwrap(), vec![Some(4)]);
        assert!(outside.capability().is_none());
    }

    #[test]
    fn unrestricted_listeners_run_inline() {
        let mut ctx = context();
        let order = Arc::new(Mutex::new(Vec::new()));

        let entry = Arc::clone(&order);
        let listeners = vec![RegisteredListener::new("click", "a", move |_| {
            entry.lock().unwrap().push("a")
        })];
        let done = Arc::clone(&order);
        let forked = ctx
            .dispatch_event("click", &listeners, move |_| done.lock().unwrap().push("default"))
            .unwrap();

        assert_eq!(forked, 0);
        assert_eq!(*order.lock().unwrap(), vec!["a", "default"]);
        assert!(!ctx.has_pending_forked_work());
    }

    #[test]
    fn listeners_after_a_fork_are_forked_to_keep_order() {
        let mut ctx = context();
        let order = Arc::new(Mutex::new(Vec::new()));

        let make = |name: &'static str| {
            let entry = Arc::clone(&order);
            move |ctx: &mut TaskContext| {
                let restricted = ctx.is_current_restricted();
                entry.lock().unwrap().push(format!("{name}:{restricted}"));
            }
        };

        let open_first = RegisteredListener::new("load", "open-first", make("open-first"));
        let mut restricted = RegisteredListener::new("load", "restricted", make("restricted"));
        restricted.set_capability(&cap("No_DOM_Access;"));
        let open_last = RegisteredListener::new("load", "open-last", make("open-last"));
        let other = RegisteredListener::new("click", "ignored", make("ignored"));
        let listeners = vec![open_first, restricted, open_last, other];

        let done = Arc::clone(&order);
        let listeners_for_task = listeners.clone();
        ctx.post_task(0, move |ctx| {
            let forked = ctx
                .dispatch_event("load", &listeners_for_task, move |_| {
                    done.lock().unwrap().push("default".to_string())
                })
                .unwrap();
            assert_eq!(forked, 2);
        });
        ctx.run_until_idle();

        assert_eq!(
            *order.lock().unwrap(),
            vec!["open-first:false", "restricted:true", "open-last:false", "default"]
        );
    }
}

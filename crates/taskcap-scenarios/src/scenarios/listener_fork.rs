//! Scenario 2: Listener fork
//!
//! An analytics script runs in a timer restricted to
//! `DOM_Access_Protective;No_Cookie_Access;` and registers a `click`
//! listener, which keeps that capability. The page registers its own
//! unrestricted listener afterwards.
//!
//! When the page dispatches `click` from an unrestricted task:
//!
//! - the analytics listener is forked into a restricted listener task and
//!   is denied the cookie jar
//! - the page listener is forked too, so it still runs after the analytics
//!   listener, but keeps the dispatcher's (unrestricted) capability
//! - the default action runs last, in the terminate task

use std::cell::RefCell;
use std::rc::Rc;

use taskcap_contracts::error::TaskCapResult;
use taskcap_core::{RegisteredListener, TaskContext};
use taskcap_policy::MonitorConfig;

use super::{new_domain, print_audit, summarize, verdict, AuditSummary, Trace};

pub const ANALYTICS_CAPABILITY: &str = "DOM_Access_Protective;No_Cookie_Access;";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerForkOutcome {
    /// Execution order with each step's restriction state.
    pub order: Vec<String>,
    pub forked: usize,
    pub analytics_cookie_denied: bool,
    pub page_cookie_denied: bool,
    pub pending_after_run: bool,
    pub audit: AuditSummary,
}

pub fn run(config: &MonitorConfig) -> TaskCapResult<ListenerForkOutcome> {
    let (mut ctx, log) = new_domain(config);
    let trace = Trace::default();
    let listeners: Rc<RefCell<Vec<RegisteredListener>>> = Rc::default();
    let answers: Rc<RefCell<Vec<bool>>> = Rc::default();
    let forked = Rc::new(RefCell::new(0));

    // The analytics script registers its listener from restricted code.
    let registry = Rc::clone(&listeners);
    let t = trace.clone();
    let a = Rc::clone(&answers);
    ctx.set_timeout_with_capability(ANALYTICS_CAPABILITY, 0, move |ctx| {
        let t = t.clone();
        let a = Rc::clone(&a);
        let listener = ctx.register_listener("click", "analytics", move |ctx| {
            t.push(step("analytics", ctx));
            a.borrow_mut().push(ctx.disallowed_to_access_cookie());
        });
        registry.borrow_mut().push(listener);
    });

    // The page registers its own listener, then a click arrives.
    let registry = Rc::clone(&listeners);
    let t = trace.clone();
    let a = Rc::clone(&answers);
    let count = Rc::clone(&forked);
    ctx.post_task(5, move |ctx| {
        let page = t.clone();
        let page_answers = Rc::clone(&a);
        let listener = ctx.register_listener("click", "page", move |ctx| {
            page.push(step("page", ctx));
            page_answers.borrow_mut().push(ctx.disallowed_to_access_cookie());
        });
        registry.borrow_mut().push(listener);

        t.push(step("dispatch", ctx));
        let done = t.clone();
        let snapshot = registry.borrow().clone();
        match ctx.dispatch_event("click", &snapshot, move |ctx| {
            done.push(step("default-action", ctx))
        }) {
            Ok(n) => *count.borrow_mut() = n,
            Err(e) => t.push(format!("dispatch failed: {e}")),
        }
    });

    ctx.run_until_idle();

    let answers = answers.borrow().clone();
    let forked = *forked.borrow();
    Ok(ListenerForkOutcome {
        order: trace.entries(),
        forked,
        analytics_cookie_denied: answers.first().copied().unwrap_or(false),
        page_cookie_denied: answers.get(1).copied().unwrap_or(false),
        pending_after_run: ctx.has_pending_forked_work(),
        audit: summarize(&log)?,
    })
}

fn step(name: &str, ctx: &TaskContext) -> String {
    let state = if ctx.is_current_restricted() {
        "restricted"
    } else {
        "unrestricted"
    };
    let task_type = ctx
        .current_task_type()
        .map(|t| t.to_string())
        .unwrap_or_default();
    format!("{name} [{task_type}, {state}]")
}

/// Run Scenario 2 and print a walkthrough.
pub fn run_scenario(config: &MonitorConfig) -> TaskCapResult<()> {
    println!("=== Scenario 2: Listener Fork ===");
    println!();

    let outcome = run(config)?;

    println!("  Forked listeners: {}", outcome.forked);
    for (i, entry) in outcome.order.iter().enumerate() {
        println!("  {}. {}", i + 1, entry);
    }
    println!(
        "  Cookie access: analytics {}, page {}",
        verdict(outcome.analytics_cookie_denied),
        verdict(outcome.page_cookie_denied)
    );
    print_audit(&outcome.audit);
    println!();
    Ok(())
}

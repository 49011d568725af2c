//! Scenario 1: Timer narrowing
//!
//! A third-party timer runs with `No_Cookie_Access;No_Network_Access;`.
//! From inside it:
//!
//! - a normal task is posted, and inherits the timer's capability exactly
//! - a nested timer declaring `No_DOM_Access;` is scheduled, and ends up
//!   with the union of both restrictions
//! - a plain timer with no declared capability takes the parent's
//!
//! The nested timer then checks each facet; every check is denied.

use taskcap_contracts::error::TaskCapResult;
use taskcap_core::TaskContext;
use taskcap_policy::MonitorConfig;

use super::{new_domain, print_audit, summarize, verdict, AuditSummary, Trace};

pub const PARENT_CAPABILITY: &str = "No_Cookie_Access;No_Network_Access;";
pub const CHILD_TIMER_CAPABILITY: &str = "No_DOM_Access;";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerNarrowingOutcome {
    pub parent: String,
    pub normal_child: String,
    pub narrowed_timer: String,
    pub plain_timer: String,
    /// (cookie, network, dom) answers inside the narrowed timer.
    pub narrowed_denials: (bool, bool, bool),
    pub audit: AuditSummary,
}

pub fn run(config: &MonitorConfig) -> TaskCapResult<TimerNarrowingOutcome> {
    let (mut ctx, log) = new_domain(config);
    let trace = Trace::default();
    let checks = Trace::default();

    let t = trace.clone();
    let p = checks.clone();
    ctx.set_timeout_with_capability(PARENT_CAPABILITY, 10, move |ctx| {
        t.push(describe(ctx));

        let normal = t.clone();
        ctx.post_task(0, move |ctx| normal.push(describe(ctx)));

        let narrowed = t.clone();
        let checks = p.clone();
        ctx.set_timeout_with_capability(CHILD_TIMER_CAPABILITY, 5, move |ctx| {
            narrowed.push(describe(ctx));
            checks.push(ctx.disallowed_to_access_cookie().to_string());
            checks.push(ctx.disallowed_to_access_network().to_string());
            checks.push(ctx.disallowed_to_access_dom(true).to_string());
        });

        let plain = t.clone();
        ctx.set_timeout(20, move |ctx| plain.push(describe(ctx)));
    });
    ctx.run_until_idle();

    let entries = trace.entries();
    let checks = checks.entries();
    let observed = |i: usize| entries.get(i).cloned().unwrap_or_default();
    let denied = |i: usize| checks.get(i).is_some_and(|p| p == "true");

    Ok(TimerNarrowingOutcome {
        parent: observed(0),
        normal_child: observed(1),
        narrowed_timer: observed(2),
        plain_timer: observed(3),
        narrowed_denials: (denied(0), denied(1), denied(2)),
        audit: summarize(&log)?,
    })
}

/// The running task's capability as its IPC (bitmap) and JS forms.
fn describe(ctx: &TaskContext) -> String {
    let cap = ctx.current_capability();
    format!("{} {}", cap.to_ipc_string(), cap.to_js_string(ctx.rules()))
}

/// Run Scenario 1 and print a walkthrough.
pub fn run_scenario(config: &MonitorConfig) -> TaskCapResult<()> {
    println!("=== Scenario 1: Timer Narrowing ===");
    println!();

    let outcome = run(config)?;

    println!("  Parent timer         : {}", outcome.parent);
    println!("  Normal child         : {}  (inherited)", outcome.normal_child);
    println!("  Timer declaring DOM  : {}  (narrowed)", outcome.narrowed_timer);
    println!("  Plain timer          : {}  (inherited)", outcome.plain_timer);
    let (cookie, network, dom) = outcome.narrowed_denials;
    println!(
        "  Narrowed timer checks: cookie {}, network {}, dom {}",
        verdict(cookie),
        verdict(network),
        verdict(dom)
    );
    print_audit(&outcome.audit);
    println!();
    Ok(())
}

//! Scenario 4: IPC ingress
//!
//! Capabilities crossing a process boundary travel as a decimal bitmap.
//!
//! - A message annotated `"8"` (network restricted) spawns a normal child;
//!   the child inherits the restriction.
//! - An unannotated message is tagged later with `record_ipc_task("4")`
//!   before it spawns anything; its child is cookie restricted.
//! - A child queued for later is cancelled and never runs.
//! - A malformed annotation still marks the task restricted. Under
//!   `[capability] malformed_spec = "unrestricted"` the bitmap comes from its
//!   leading digits (none here, so no facet is denied); under `fail-closed`
//!   every facet is restricted.

use taskcap_contracts::{error::TaskCapResult, MalformedSpecPolicy};
use taskcap_policy::MonitorConfig;

use super::{new_domain, print_audit, summarize, AuditSummary, Trace};

pub const MALFORMED_IPC: &str = "eight";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpcIngressOutcome {
    pub observations: Vec<String>,
    pub cancelled_ran: bool,
    pub audit: AuditSummary,
}

pub fn run(config: &MonitorConfig) -> TaskCapResult<IpcIngressOutcome> {
    let (mut ctx, log) = new_domain(config);
    let trace = Trace::default();
    let cancelled = Trace::default();

    let t = trace.clone();
    ctx.post_ipc_task("8", move |ctx| {
        let child = t.clone();
        ctx.post_task(0, move |ctx| {
            child.push(format!(
                "annotated-child network={} bitmap={}",
                ctx.disallowed_to_access_network(),
                ctx.current_capability().to_ipc_string()
            ));
        });
    });

    let t = trace.clone();
    let c = cancelled.clone();
    ctx.post_ipc_task("", move |ctx| {
        if let Err(e) = ctx.record_ipc_task("4") {
            t.push(format!("record failed: {e}"));
        }
        let child = t.clone();
        ctx.post_task(0, move |ctx| {
            child.push(format!(
                "tagged-child cookie={} network={}",
                ctx.disallowed_to_access_cookie(),
                ctx.disallowed_to_access_network()
            ));
        });

        let ran = c.clone();
        let doomed = ctx.post_task(50, move |_| ran.push("ran"));
        match ctx.cancel_task(doomed) {
            Ok(()) => t.push("late-child cancelled"),
            Err(e) => t.push(format!("cancel failed: {e}")),
        }
    });

    ctx.run_until_idle();

    for policy in [MalformedSpecPolicy::Unrestricted, MalformedSpecPolicy::FailClosed] {
        trace.push(malformed_check(config, policy)?);
    }

    Ok(IpcIngressOutcome {
        observations: trace.entries(),
        cancelled_ran: !cancelled.entries().is_empty(),
        audit: summarize(&log)?,
    })
}

/// Deliver a malformed annotation to a domain configured with `policy`.
fn malformed_check(base: &MonitorConfig, policy: MalformedSpecPolicy) -> TaskCapResult<String> {
    let mut config = base.clone();
    config.capability.malformed_spec = policy;
    let (mut ctx, _log) = new_domain(&config);

    let out = Trace::default();
    let o = out.clone();
    ctx.post_ipc_task(MALFORMED_IPC, move |ctx| {
        o.push(format!(
            "malformed[{:?}] restricted={} cookie={}",
            policy,
            ctx.is_current_restricted(),
            ctx.disallowed_to_access_cookie()
        ));
    });
    ctx.run_until_idle();
    Ok(out.entries().concat())
}

/// Run Scenario 4 and print a walkthrough.
pub fn run_scenario(config: &MonitorConfig) -> TaskCapResult<()> {
    println!("=== Scenario 4: IPC Ingress ===");
    println!();

    let outcome = run(config)?;

    for entry in &outcome.observations {
        println!("    {}", entry);
    }
    println!(
        "  Cancelled child ran: {}",
        if outcome.cancelled_ran { "YES (unexpected)" } else { "no" }
    );
    print_audit(&outcome.audit);
    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenarios::monitor_config;

    #[test]
    fn ipc_capabilities_propagate_and_malformed_follow_policy() {
        let outcome = run(&monitor_config().unwrap()).unwrap();

        assert_eq!(
            outcome.observations,
            vec![
                "late-child cancelled",
                "annotated-child network=true bitmap=8",
                "tagged-child cookie=true network=false",
                "malformed[Unrestricted] restricted=true cookie=false",
                "malformed[FailClosed] restricted=true cookie=true",
            ]
        );
        assert!(!outcome.cancelled_ran);
        assert_eq!(outcome.audit.decisions, 3);
        assert_eq!(outcome.audit.denied, 2);
        assert!(outcome.audit.chain_intact);
    }
}

//! Scenario 3: Risky script
//!
//! The parser meets a `<script>` marked risky with capability
//! `DOM_Access_Protective;No_Network_Access;JS_WL:console`. Instead of
//! running it inline, the parser forks it into a restricted frame-parser
//! task and schedules an unrestricted continuation.
//!
//! Inside the script:
//!
//! - DOM access to an element without a task-capability attribute is denied
//! - DOM access to an element carrying the attribute is allowed
//! - `console` is whitelisted, `document` is not
//! - a nested risky script runs inline instead of forking again
//!
//! A second risky script arrives over the network and is applied to the
//! unrestricted IPC task that delivers it.

use taskcap_contracts::error::TaskCapResult;
use taskcap_core::TaskContext;
use taskcap_policy::MonitorConfig;

use super::{new_domain, print_audit, summarize, AuditSummary, Trace};

pub const SCRIPT_CAPABILITY: &str = "DOM_Access_Protective;No_Network_Access;JS_WL:console";
pub const DOWNLOADED_CAPABILITY: &str = "No_Cookie_Access;";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RiskyScriptOutcome {
    pub forked: bool,
    /// Observations in execution order, each `label=value`.
    pub observations: Vec<String>,
    pub audit: AuditSummary,
}

pub fn run(config: &MonitorConfig) -> TaskCapResult<RiskyScriptOutcome> {
    let (mut ctx, log) = new_domain(config);
    let trace = Trace::default();
    let forked = Trace::default();

    let t = trace.clone();
    let f = forked.clone();
    ctx.post_task(0, move |ctx| {
        t.push(observe("parser", ctx));

        let script = t.clone();
        let did_fork = ctx.fork_risky_script(SCRIPT_CAPABILITY, move |ctx| {
            script.push(observe("script", ctx));
            script.push(format!("dom-plain={}", ctx.disallowed_to_access_dom(false)));
            script.push(format!("dom-attributed={}", ctx.disallowed_to_access_dom(true)));
            script.push(format!("console={}", ctx.disallowed_to_access_object("console")));
            script.push(format!("document={}", ctx.disallowed_to_access_object("document")));
            script.push(format!("network={}", ctx.disallowed_to_access_network()));

            let nested = ctx.fork_risky_script("No_DOM_Access;", |_| {});
            script.push(format!("nested-forked={nested}"));
        });
        f.push(did_fork.to_string());

        if did_fork {
            let resume = t.clone();
            if let Err(e) = ctx.post_parser_continuation(move |ctx| {
                resume.push(observe("continuation", ctx));
            }) {
                t.push(format!("continuation failed: {e}"));
            }
        }
    });

    let t = trace.clone();
    ctx.post_ipc_task("", move |ctx| {
        match ctx.apply_downloaded_script_capability(DOWNLOADED_CAPABILITY) {
            Ok(applied) => t.push(format!("downloaded-applied={applied}")),
            Err(e) => t.push(format!("downloaded-failed={e}")),
        }
        t.push(format!("downloaded-cookie={}", ctx.disallowed_to_access_cookie()));
    });

    ctx.run_until_idle();

    Ok(RiskyScriptOutcome {
        forked: forked.entries().first().is_some_and(|f| f == "true"),
        observations: trace.entries(),
        audit: summarize(&log)?,
    })
}

fn observe(label: &str, ctx: &TaskContext) -> String {
    let task_type = ctx
        .current_task_type()
        .map(|t| t.to_string())
        .unwrap_or_default();
    format!("{label}={task_type}:{}", ctx.is_current_restricted())
}

/// Run Scenario 3 and print a walkthrough.
pub fn run_scenario(config: &MonitorConfig) -> TaskCapResult<()> {
    println!("=== Scenario 3: Risky Script ===");
    println!();

    let outcome = run(config)?;

    println!("  Script forked into its own task: {}", outcome.forked);
    for entry in &outcome.observations {
        println!("    {}", entry);
    }
    print_audit(&outcome.audit);
    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenarios::monitor_config;

    #[test]
    fn risky_script_runs_restricted_and_parser_resumes() {
        let outcome = run(&monitor_config().unwrap()).unwrap();

        assert!(outcome.forked);
        assert_eq!(
            outcome.observations,
            vec![
                "parser=normal:false",
                "script=frame-parser-restricted:true",
                "dom-plain=true",
                "dom-attributed=false",
                "console=false",
                "document=true",
                "network=true",
                "nested-forked=false",
                "continuation=frame-parser-normal:false",
                "downloaded-applied=true",
                "downloaded-cookie=true",
            ]
        );
        // Five checks from the script, one from the downloaded script.
        assert_eq!(outcome.audit.decisions, 6);
        assert_eq!(outcome.audit.denied, 4);
        assert!(outcome.audit.chain_intact);
    }
}

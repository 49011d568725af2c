//! Reference host scenarios.
//!
//! Each module exposes `run()`, returning a plain outcome struct, and
//! `run_scenario()`, which prints a walkthrough.

use std::cell::RefCell;
use std::rc::Rc;

use taskcap_audit::InMemoryAccessLog;
use taskcap_contracts::{domain::DomainId, error::TaskCapResult};
use taskcap_core::TaskContext;
use taskcap_policy::MonitorConfig;

pub mod ipc_ingress;
pub mod listener_fork;
pub mod risky_script;
pub mod timer_narrowing;

/// Monitor configuration shared by the scenarios.
pub const MONITOR_CONFIG: &str = include_str!("../../policies/monitor.toml");

pub fn monitor_config() -> TaskCapResult<MonitorConfig> {
    MonitorConfig::from_toml_str(MONITOR_CONFIG)
}

/// A fresh scheduling domain and the access log recording its decisions.
pub fn new_domain(config: &MonitorConfig) -> (TaskContext, InMemoryAccessLog) {
    let domain_id = DomainId::new();
    let log = InMemoryAccessLog::new(domain_id);
    let ctx = config.build_context_in(domain_id, Box::new(log.clone()));
    (ctx, log)
}

/// Shared, append-only list of observations made from inside task bodies.
#[derive(Debug, Clone, Default)]
pub struct Trace(Rc<RefCell<Vec<String>>>);

impl Trace {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.borrow_mut().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.borrow().clone()
    }
}

/// Summary of a domain's access log after a scenario.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditSummary {
    pub decisions: usize,
    pub denied: usize,
    pub chain_intact: bool,
}

pub fn summarize(log: &InMemoryAccessLog) -> TaskCapResult<AuditSummary> {
    let exported = log.export_log()?;
    Ok(AuditSummary {
        decisions: exported.events.len(),
        denied: exported.denied,
        chain_intact: log.verify_integrity(),
    })
}

pub(crate) fn print_audit(summary: &AuditSummary) {
    println!(
        "  Audit: {} decisions, {} denied, chain {}",
        summary.decisions,
        summary.denied,
        if summary.chain_intact { "VALID" } else { "BROKEN" }
    );
}

pub(crate) fn verdict(denied: bool) -> &'static str {
    if denied {
        "DENIED"
    } else {
        "allowed"
    }
}

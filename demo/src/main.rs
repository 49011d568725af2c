//! taskcap demo CLI
//!
//! Runs one or all of the reference host scenarios. Each scenario drives a
//! real `TaskContext` with the capability access policy and a hash-chained
//! access log.
//!
//! Usage:
//!   cargo run -p demo -- run-all
//!   cargo run -p demo -- timer-narrowing
//!   cargo run -p demo -- listener-fork
//!   cargo run -p demo -- risky-script
//!   cargo run -p demo -- ipc-ingress
//!   cargo run -p demo -- --config my-monitor.toml run-all

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use taskcap_contracts::error::TaskCapResult;
use taskcap_policy::MonitorConfig;
use taskcap_scenarios::scenarios::{
    ipc_ingress, listener_fork, monitor_config, risky_script, timer_narrowing,
};

// ── CLI definition ────────────────────────────────────────────────────────────

/// taskcap: task-scoped capability monitor demo.
#[derive(Parser)]
#[command(
    name = "demo",
    about = "taskcap capability monitor demo",
    long_about = "Runs reference host scenarios showing capability propagation,\n\
                  listener and script forking, access denials, and audit chain integrity."
)]
struct Cli {
    /// Monitor config to run the scenarios with. Defaults to the bundled
    /// `policies/monitor.toml`.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run all four scenarios in sequence.
    RunAll,
    /// Scenario 1: children of a restricted timer inherit or narrow.
    TimerNarrowing,
    /// Scenario 2: a listener registered by restricted code is forked.
    ListenerFork,
    /// Scenario 3: a risky script runs in a restricted parser task.
    RiskyScript,
    /// Scenario 4: capabilities arriving over IPC, malformed ones included.
    IpcIngress,
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_ref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Demo error: {}", e);
            std::process::exit(2);
        }
    };

    // RUST_LOG wins over the config file.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_filter())),
        )
        .with_target(false)
        .compact()
        .init();

    debug!(filter = %config.log_filter(), "logging initialized");

    print_banner();

    let result = match cli.command {
        Command::RunAll => run_all(&config),
        Command::TimerNarrowing => timer_narrowing::run_scenario(&config),
        Command::ListenerFork => listener_fork::run_scenario(&config),
        Command::RiskyScript => risky_script::run_scenario(&config),
        Command::IpcIngress => ipc_ingress::run_scenario(&config),
    };

    match result {
        Ok(()) => {
            println!("All selected scenarios completed successfully.");
        }
        Err(e) => {
            eprintln!("Demo error: {}", e);
            std::process::exit(1);
        }
    }
}

fn load_config(path: Option<&PathBuf>) -> TaskCapResult<MonitorConfig> {
    match path {
        Some(path) => MonitorConfig::from_file(path),
        None => monitor_config(),
    }
}

// ── Scenario dispatch ─────────────────────────────────────────────────────────

fn run_all(config: &MonitorConfig) -> TaskCapResult<()> {
    timer_narrowing::run_scenario(config)?;
    listener_fork::run_scenario(config)?;
    risky_script::run_scenario(config)?;
    ipc_ingress::run_scenario(config)?;
    Ok(())
}

// ── Banner ────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("taskcap: Task-scoped Capability Monitor");
    println!("Reference Host Demo");
    println!("========================================");
    println!();
    println!("Per task:");
    println!("  [1] A capability is attached when the task is created");
    println!("  [2] Children inherit it (normal tasks) or are narrowed by it (timers)");
    println!("  [3] Restricted callbacks are forked into tasks carrying their own capability");
    println!("  [4] Cookie, network, DOM and object accesses are checked against the running task");
    println!("  [5] Every decision for a restricted task is appended to a SHA-256 chain");
    println!();
}

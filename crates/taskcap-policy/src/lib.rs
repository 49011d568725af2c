//! # taskcap-policy
//!
//! Configuration and the default access policy for the taskcap monitor.
//!
//! ## Overview
//!
//! [`MonitorConfig`] is read from TOML and decides how malformed capability
//! strings are treated and where zero-delay timers go.
//! [`CapabilityAccessPolicy`] implements
//! [`AccessPolicy`](taskcap_core::traits::AccessPolicy) by reading the
//! running task's capability bitmap and whitelist.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use std::path::Path;
//! use taskcap_policy::MonitorConfig;
//!
//! let config = MonitorConfig::from_file(Path::new("policies/monitor.toml"))?;
//! let ctx = config.build_context(Box::new(recorder));
//! ```

pub mod config;
pub mod engine;

pub use config::{MonitorConfig, DEFAULT_LOG_FILTER};
pub use engine::CapabilityAccessPolicy;

// ── Tests ─────────────────────────────────────────────────────────────────────

//! # taskcap-contracts
//!
//! Shared types for the taskcap capability monitor.
//!
//! All crates in the workspace import from here. This crate holds the
//! capability value type, the token rule table, task type tags, access
//! request/record types and errors. Scheduling state lives in taskcap-core.

pub mod access;
pub mod capability;
pub mod domain;
pub mod error;
pub mod rules;
pub mod task_type;

pub use capability::{Capability, CapabilitySnapshot};
pub use rules::{CapabilityParseError, CapabilityRules, MalformedSpecPolicy};
pub use task_type::{FrameParserKind, Propagation, TaskType, TimerKind};

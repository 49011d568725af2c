//! # taskcap-core
//!
//! The task-scoped capability monitor runtime.
//!
//! This crate provides:
//! - `Task` and the main `TaskQueue`
//! - `TaskCapabilityTracker`, which propagates capabilities to new tasks
//! - `DeferredTaskBuffer` for work that must run before the next queued task
//! - `RestrictedCallbackForker` for running restricted callbacks in their own tasks
//! - `TaskContext`, the per-domain entry point tying them together, with the
//!   access queries answered through the `AccessPolicy` and `AccessRecorder` seams
//!
//! ## Usage
//!
//! ```rust,ignore
//! use taskcap_core::{TaskContext, traits::{AccessPolicy, AccessRecorder}};
//! ```

pub mod context;
pub mod deferred;
pub mod fork;
pub mod listener;
pub mod monitor;
pub mod queue;
pub mod task;
pub mod tracker;
pub mod traits;

pub use context::{ContextOptions, TaskContext, ZeroDelayRouting};
pub use deferred::DeferredTaskBuffer;
pub use fork::{ForkKind, ListenerInvocation, RestrictedCallbackForker};
pub use listener::RegisteredListener;
pub use queue::TaskQueue;
pub use task::{ForkTag, Task, TaskBody};
pub use tracker::{CurrentTask, TaskCapabilityTracker};

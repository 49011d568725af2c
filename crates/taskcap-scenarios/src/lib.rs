//! # taskcap-scenarios
//!
//! Reference host scenarios for the taskcap monitor.
//!
//! Each scenario plays the part of a host engine (a page with timers,
//! event listeners, a parser and IPC traffic) on top of real components:
//!
//! 1. **Timer narrowing**: children of a restricted task inherit or narrow
//!    its capability.
//! 2. **Listener fork**: a listener registered by restricted code is forked
//!    into its own task and sees only its own capability.
//! 3. **Risky script**: a `<script>` carrying a capability runs in a
//!    restricted parser task; parsing resumes unrestricted.
//! 4. **IPC ingress**: capabilities arriving on IPC messages, malformed
//!    ones included.
//!
//! Everything runs on one thread with a logical clock.

pub mod scenarios;

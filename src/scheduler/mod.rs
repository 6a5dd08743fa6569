//! Frame-based delayed action scheduling
//!
//! The host pumps one frame at a time. Work that should happen "once things
//! have settled" is registered here under a stable task tag and runs on the
//! first frame at or after its deadline:
//!
//! ```text
//! schedule(T, 10) @0 ──► deadline 10
//! schedule(T, 10) @5 ──► deadline 15   (max of both, never earlier)
//! advance() .. @15   ──► run_due() hands T to the caller exactly once
//! ```
//!
//! Tasks are identified by value (an enum tag), not by closure, so repeated
//! requests for the same work always land on the same entry.

pub mod delayed_action;

pub use delayed_action::{DelayedActionScheduler, Tick};

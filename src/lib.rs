//! Keeps a game controller's active input configuration in line with what
//! the host application is doing.
//!
//! ```text
//! host events ──► mode::ModeApplier ──► scheduler (debounce) ──► mode::ModeResolver
//!                        │                                             │
//!                        ▼                                             ▼
//!            device::DeviceConnectionMonitor ◄──────────── apply mode + notification
//! ```

pub mod config;
pub mod device;
pub mod host;
pub mod mode;
pub mod runtime;
pub mod scheduler;
pub mod session;

//! Device subsystem for controller presence and configuration switching
//!
//! Split into small pieces that the session wires together:
//!
//! 1. [`connection_monitor`] - Polls for the controller, tracks the
//!    connected/disconnected state and the per-mode configuration handles
//! 2. [`signal`] - Connect/disconnect subscriber lists
//! 3. [`attention`] - Haptic "hello" pattern played on new connections
//! 4. [`gilrs_platform`] / [`simulated`] - Platform backends
//!
//! # Architecture
//!
//! ```text
//! DevicePlatform ──► ConnectionMonitor ──► Signal (connected / disconnected)
//!  (poll, 1s)         (state, handles)      │
//!                           ▲               ▼
//!                           └── apply_mode ◄── ModeApplier
//! ```
//!
//! Everything here runs on the host frame thread; platform calls never block.

pub mod attention;
pub mod connection_monitor;
pub mod gilrs_platform;
pub mod signal;
pub mod simulated;

pub use attention::{AttentionSequence, AttentionSettings, HapticPulse};
pub use connection_monitor::{DeviceConnectionMonitor, DeviceConnectionState};
pub use gilrs_platform::GilrsPlatform;
pub use signal::Signal;
pub use simulated::{SimulatedPlatform, SimulatedPlatformHandle};

use std::fmt;

/// Upper bound of devices reported by a single poll
pub const MAX_DEVICES: usize = 16;

/// Opaque platform identifier of a connected controller
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(pub u64);

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "device#{}", self.0)
    }
}

/// Opaque platform identifier of a pre-authored device configuration.
///
/// Zero is the platform's "not found" sentinel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ConfigurationHandle(pub u64);

impl ConfigurationHandle {
    pub const NULL: ConfigurationHandle = ConfigurationHandle(0);

    pub fn is_null(&self) -> bool {
        self.0 == 0
    }
}

/// Touch pad / motor side used for haptic pulses
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PadSide {
    Left,
    Right,
}

// Device errors
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("Controller platform unavailable: {0}")]
    PlatformUnavailable(String),

    #[error("Controller platform not initialized")]
    NotInitialized,

    #[error("Haptic feedback failed: {0}")]
    HapticError(String),
}

/// Contract of the controller platform SDK.
///
/// Every call is synchronous and returns immediately. Apart from
/// [`initialize`](Self::initialize), nothing here reports failure: polling
/// yields an empty list and lookups yield [`ConfigurationHandle::NULL`].
pub trait DevicePlatform {
    /// One-time platform initialization. An error disables the whole core.
    fn initialize(&mut self) -> Result<(), DeviceError>;

    /// Lets the platform process pending driver events before a poll.
    fn run_frame(&mut self) {}

    /// Writes the connected devices into `out` and returns how many were written.
    fn connected_devices(&mut self, out: &mut [DeviceId]) -> usize;

    /// Looks up the configuration registered under `mode_id`.
    fn configuration_handle(&mut self, mode_id: &str) -> ConfigurationHandle;

    fn activate_configuration(&mut self, device: DeviceId, handle: ConfigurationHandle);

    fn trigger_haptic_pulse(&mut self, device: DeviceId, side: PadSide, intensity: u16);
}

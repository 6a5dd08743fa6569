//! In-memory controller platform.
//!
//! Backs the `simulated` platform setting and the tests. Devices are plugged
//! and unplugged through a cloneable [`SimulatedPlatformHandle`], which also
//! exposes every call the core made against the platform.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use tracing::{debug, info};

use super::{ConfigurationHandle, DeviceError, DeviceId, DevicePlatform, PadSide};
use crate::mode::Mode;

/// A call made against the simulated platform
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PlatformCall {
    Initialize,
    RunFrame,
    Activate {
        device: DeviceId,
        handle: ConfigurationHandle,
    },
    Pulse {
        device: DeviceId,
        side: PadSide,
        intensity: u16,
    },
}

#[derive(Debug, Default)]
struct SimulatedState {
    available: bool,
    initialized: bool,
    devices: Vec<DeviceId>,
    configurations: HashMap<String, ConfigurationHandle>,
    calls: Vec<PlatformCall>,
}

pub struct SimulatedPlatform {
    state: Rc<RefCell<SimulatedState>>,
}

impl SimulatedPlatform {
    pub fn new(configurations: HashMap<String, ConfigurationHandle>) -> Self {
        Self {
            state: Rc::new(RefCell::new(SimulatedState {
                available: true,
                configurations,
                ..SimulatedState::default()
            })),
        }
    }

    /// Registers one configuration per mode, numbered from 1 in mode order.
    pub fn with_default_configurations() -> Self {
        let configurations = Mode::ALL
            .iter()
            .zip(1u64..)
            .map(|(mode, id)| (mode.id().to_string(), ConfigurationHandle(id)))
            .collect();
        Self::new(configurations)
    }

    /// A platform whose initialization always fails.
    pub fn unavailable() -> Self {
        let platform = Self::with_default_configurations();
        platform.state.borrow_mut().available = false;
        platform
    }

    pub fn handle(&self) -> SimulatedPlatformHandle {
        SimulatedPlatformHandle {
            state: Rc::clone(&self.state),
        }
    }
}

impl DevicePlatform for SimulatedPlatform {
    fn initialize(&mut self) -> Result<(), DeviceError> {
        let mut state = self.state.borrow_mut();
        state.calls.push(PlatformCall::Initialize);
        if !state.available {
            return Err(DeviceError::PlatformUnavailable(
                "simulated platform disabled".to_string(),
            ));
        }
        state.initialized = true;
        info!("Simulated controller platform initialized");
        Ok(())
    }

    fn run_frame(&mut self) {
        self.state.borrow_mut().calls.push(PlatformCall::RunFrame);
    }

    fn connected_devices(&mut self, out: &mut [DeviceId]) -> usize {
        let state = self.state.borrow();
        if !state.initialized {
            return 0;
        }
        let count = state.devices.len().min(out.len());
        out[..count].copy_from_slice(&state.devices[..count]);
        count
    }

    fn configuration_handle(&mut self, mode_id: &str) -> ConfigurationHandle {
        self.state
            .borrow()
            .configurations
            .get(mode_id)
            .copied()
            .unwrap_or(ConfigurationHandle::NULL)
    }

    fn activate_configuration(&mut self, device: DeviceId, handle: ConfigurationHandle) {
        debug!("Simulated activation of {:?} on {}", handle, device);
        self.state
            .borrow_mut()
            .calls
            .push(PlatformCall::Activate { device, handle });
    }

    fn trigger_haptic_pulse(&mut self, device: DeviceId, side: PadSide, intensity: u16) {
        self.state.borrow_mut().calls.push(PlatformCall::Pulse {
            device,
            side,
            intensity,
        });
    }
}

/// Control and inspection side of a [`SimulatedPlatform`]
#[derive(Clone)]
pub struct SimulatedPlatformHandle {
    state: Rc<RefCell<SimulatedState>>,
}

impl SimulatedPlatformHandle {
    /// Appends `device` to the connected list. Plugging a device twice is a no-op.
    pub fn plug(&self, device: DeviceId) {
        let mut state = self.state.borrow_mut();
        if !state.devices.contains(&device) {
            info!("Simulated controller plugged: {}", device);
            state.devices.push(device);
        }
    }

    pub fn unplug(&self, device: DeviceId) {
        let mut state = self.state.borrow_mut();
        state.devices.retain(|d| *d != device);
        info!("Simulated controller unplugged: {}", device);
    }

    pub fn unplug_all(&self) {
        self.state.borrow_mut().devices.clear();
        info!("All simulated controllers unplugged");
    }

    pub fn devices(&self) -> Vec<DeviceId> {
        self.state.borrow().devices.clone()
    }

    pub fn set_configuration(&self, mode_id: &str, handle: ConfigurationHandle) {
        self.state
            .borrow_mut()
            .configurations
            .insert(mode_id.to_string(), handle);
    }

    pub fn remove_configuration(&self, mode_id: &str) {
        self.state.borrow_mut().configurations.remove(mode_id);
    }

    pub fn configuration_for(&self, mode_id: &str) -> ConfigurationHandle {
        self.state
            .borrow()
            .configurations
            .get(mode_id)
            .copied()
            .unwrap_or(ConfigurationHandle::NULL)
    }

    pub fn calls(&self) -> Vec<PlatformCall> {
        self.state.borrow().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.borrow_mut().calls.clear();
    }

    pub fn activations(&self) -> Vec<(DeviceId, ConfigurationHandle)> {
        self.state
            .borrow()
            .calls
            .iter()
            .filter_map(|call| match call {
                PlatformCall::Activate { device, handle } => Some((*device, *handle)),
                _ => None,
            })
            .collect()
    }

    pub fn pulses(&self) -> Vec<(DeviceId, PadSide, u16)> {
        self.state
            .borrow()
            .calls
            .iter()
            .filter_map(|call| match call {
                PlatformCall::Pulse {
                    device,
                    side,
                    intensity,
                } => Some((*device, *side, *intensity)),
                _ => None,
            })
            .collect()
    }

    /// Configuration most recently activated on `device`.
    pub fn active_configuration(&self, device: DeviceId) -> Option<ConfigurationHandle> {
        self.activations()
            .into_iter()
            .rev()
            .find(|(d, _)| *d == device)
            .map(|(_, handle)| handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_devices_hidden_until_initialized() {
        let mut platform = SimulatedPlatform::with_default_configurations();
        platform.handle().plug(DeviceId(1));
        let mut out = [DeviceId(0); 4];

        assert_eq!(platform.connected_devices(&mut out), 0);
        platform.initialize().expect("initialize");
        assert_eq!(platform.connected_devices(&mut out), 1);
        assert_eq!(out[0], DeviceId(1));
    }

    #[test]
    fn test_connected_devices_respects_buffer_size() {
        let mut platform = SimulatedPlatform::with_default_configurations();
        platform.initialize().expect("initialize");
        let handle = platform.handle();
        for id in 1..=5 {
            handle.plug(DeviceId(id));
        }
        let mut out = [DeviceId(0); 3];

        assert_eq!(platform.connected_devices(&mut out), 3);
        assert_eq!(out, [DeviceId(1), DeviceId(2), DeviceId(3)]);
    }

    #[test]
    fn test_unavailable_platform_fails_initialization() {
        let mut platform = SimulatedPlatform::unavailable();

        let result = platform.initialize();

        assert!(matches!(result, Err(DeviceError::PlatformUnavailable(_))));
    }

    #[test]
    fn test_unknown_configuration_is_null() {
        let mut platform = SimulatedPlatform::with_default_configurations();

        assert!(platform.configuration_handle("NopeControls").is_null());
        assert_eq!(
            platform.configuration_handle("MenuControls"),
            ConfigurationHandle(1)
        );
    }
}

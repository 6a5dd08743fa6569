//! Gamepad platform backed by gilrs
//!
//! Connected gamepads are reported in gilrs order. Haptic pulses use the
//! force-feedback motors: the strong motor stands in for the left pad and the
//! weak motor for the right pad. Gamepads have no native notion of stored
//! configurations, so handles come from the configured table and activation
//! records which configuration is live per gamepad.

use gilrs::ff::{BaseEffect, BaseEffectType, Effect, EffectBuilder, Replay, Ticks};
use gilrs::{GamepadId, Gilrs};
use std::collections::HashMap;
use tracing::{debug, error, info, warn};

use super::{ConfigurationHandle, DeviceError, DeviceId, DevicePlatform, PadSide};

// Length of a single haptic pulse
const PULSE_MS: u32 = 80;

pub struct GilrsPlatform {
    gilrs: Option<Gilrs>,
    configurations: HashMap<String, ConfigurationHandle>,
    active: HashMap<DeviceId, ConfigurationHandle>,
    // Effects stop when dropped; keep the latest one per side alive
    effects: HashMap<PadSide, Effect>,
}

impl GilrsPlatform {
    pub fn new(configurations: HashMap<String, ConfigurationHandle>) -> Self {
        debug!(
            "Creating gilrs platform with {} configuration(s)",
            configurations.len()
        );
        Self {
            gilrs: None,
            configurations,
            active: HashMap::new(),
            effects: HashMap::new(),
        }
    }

    /// Configuration most recently activated on `device`.
    pub fn active_configuration(&self, device: DeviceId) -> Option<ConfigurationHandle> {
        self.active.get(&device).copied()
    }

    fn gamepad_id(gilrs: &Gilrs, device: DeviceId) -> Option<GamepadId> {
        gilrs
            .gamepads()
            .map(|(id, _)| id)
            .find(|id| usize::from(*id) as u64 == device.0)
    }

    fn pulse(&mut self, device: DeviceId, side: PadSide, intensity: u16) -> Result<(), DeviceError> {
        let gilrs = self.gilrs.as_mut().ok_or(DeviceError::NotInitialized)?;
        let id = Self::gamepad_id(gilrs, device).ok_or_else(|| {
            DeviceError::HapticError(format!("{} is no longer connected", device))
        })?;

        if !gilrs.gamepad(id).is_ff_supported() {
            debug!("{} has no force feedback, skipping pulse", device);
            return Ok(());
        }

        let kind = match side {
            PadSide::Left => BaseEffectType::Strong {
                magnitude: intensity,
            },
            PadSide::Right => BaseEffectType::Weak {
                magnitude: intensity,
            },
        };
        let effect = EffectBuilder::new()
            .add_effect(BaseEffect {
                kind,
                scheduling: Replay {
                    play_for: Ticks::from_ms(PULSE_MS),
                    ..Default::default()
                },
                envelope: Default::default(),
            })
            .gamepads(&[id])
            .finish(gilrs)
            .map_err(|e| DeviceError::HapticError(e.to_string()))?;
        effect
            .play()
            .map_err(|e| DeviceError::HapticError(e.to_string()))?;

        self.effects.insert(side, effect);
        Ok(())
    }
}

impl DevicePlatform for GilrsPlatform {
    fn initialize(&mut self) -> Result<(), DeviceError> {
        info!("Initializing gilrs controller interface");
        match Gilrs::new() {
            Ok(gilrs) => {
                info!("Successfully initialized gilrs");
                for (id, gamepad) in gilrs.gamepads() {
                    info!("  ID: {}, Name: {}, UUID: {:?}", id, gamepad.name(), gamepad.uuid());
                }
                self.gilrs = Some(gilrs);
                Ok(())
            }
            Err(e) => {
                error!("Failed to initialize gilrs: {}", e);
                Err(DeviceError::PlatformUnavailable(e.to_string()))
            }
        }
    }

    fn run_frame(&mut self) {
        if let Some(gilrs) = self.gilrs.as_mut() {
            // Connection state is only updated while events are drained
            while let Some(event) = gilrs.next_event() {
                debug!("Drained gilrs event: {:?}", event.event);
            }
        }
    }

    fn connected_devices(&mut self, out: &mut [DeviceId]) -> usize {
        let Some(gilrs) = self.gilrs.as_ref() else {
            return 0;
        };
        let mut count = 0;
        for ((id, _), slot) in gilrs.gamepads().zip(out.iter_mut()) {
            *slot = DeviceId(usize::from(id) as u64);
            count += 1;
        }
        count
    }

    fn configuration_handle(&mut self, mode_id: &str) -> ConfigurationHandle {
        self.configurations
            .get(mode_id)
            .copied()
            .unwrap_or(ConfigurationHandle::NULL)
    }

    fn activate_configuration(&mut self, device: DeviceId, handle: ConfigurationHandle) {
        info!("Configuration {:?} active on {}", handle, device);
        self.active.insert(device, handle);
    }

    fn trigger_haptic_pulse(&mut self, device: DeviceId, side: PadSide, intensity: u16) {
        if let Err(e) = self.pulse(device, side, intensity) {
            warn!("Haptic pulse on {} failed: {}", device, e);
        }
    }
}

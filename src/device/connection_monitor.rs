//! Connection Monitor - Controller presence tracking
//!
//! Polls the platform for connected controllers and keeps a two-state machine
//! (connected / disconnected) for the first reported device. On each new
//! connection the per-mode configuration handles are loaded and the attention
//! sequence starts; on disconnection they are dropped again.
//!
//! | tracked | poll result        | transition                       |
//! |---------|--------------------|----------------------------------|
//! | none    | empty              | stay disconnected                |
//! | none    | `[d, ..]`          | connect `d`                      |
//! | `d`     | `[d, ..]`          | stay connected                   |
//! | `d`     | empty              | disconnect `d`                   |
//! | `d`     | `[e, ..]`, e != d  | disconnect `d`, then connect `e` |

use std::cell::RefCell;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::attention::{AttentionSequence, AttentionSettings};
use super::signal::Signal;
use super::{ConfigurationHandle, DeviceError, DeviceId, DevicePlatform, MAX_DEVICES};
use crate::mode::Mode;

/// What the monitor knows about the tracked controller.
///
/// `device` is `Some` and `mode_handles` is populated exactly while connected.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DeviceConnectionState {
    pub device: Option<DeviceId>,
    pub mode_handles: HashMap<Mode, ConfigurationHandle>,
}

impl DeviceConnectionState {
    pub fn is_connected(&self) -> bool {
        self.device.is_some()
    }
}

// Outcome of comparing the tracked device with a poll result
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Transition {
    None,
    Connect(DeviceId),
    Disconnect(DeviceId),
    Replace { old: DeviceId, new: DeviceId },
}

fn transition(tracked: Option<DeviceId>, first_reported: Option<DeviceId>) -> Transition {
    match (tracked, first_reported) {
        (None, None) => Transition::None,
        (None, Some(new)) => Transition::Connect(new),
        (Some(old), None) => Transition::Disconnect(old),
        (Some(old), Some(new)) if old == new => Transition::None,
        (Some(old), Some(new)) => Transition::Replace { old, new },
    }
}

/// Tracks the first connected controller and owns its configuration handles.
///
/// Shared through `Rc` on the frame thread. Subscribers of
/// [`on_connected`](Self::on_connected) and
/// [`on_disconnected`](Self::on_disconnected) may call back into the monitor;
/// no borrow is held while they run.
pub struct DeviceConnectionMonitor {
    platform: RefCell<Box<dyn DevicePlatform>>,
    state: RefCell<DeviceConnectionState>,
    attention: RefCell<Option<AttentionSequence>>,
    attention_settings: AttentionSettings,
    on_connected: Signal,
    on_disconnected: Signal,
}

impl DeviceConnectionMonitor {
    pub fn new(platform: Box<dyn DevicePlatform>, attention_settings: AttentionSettings) -> Self {
        debug!(
            "Creating DeviceConnectionMonitor with attention settings: {:?}",
            attention_settings
        );
        Self {
            platform: RefCell::new(platform),
            state: RefCell::new(DeviceConnectionState::default()),
            attention: RefCell::new(None),
            attention_settings,
            on_connected: Signal::new("controller.OnConnected"),
            on_disconnected: Signal::new("controller.OnDisconnected"),
        }
    }

    /// Initializes the platform. Failure means the controller subsystem is
    /// absent and the monitor must not be polled.
    pub fn initialize(&self) -> Result<(), DeviceError> {
        self.platform.borrow_mut().initialize()?;
        info!("Controller platform initialized");
        Ok(())
    }

    pub fn on_connected(&self) -> &Signal {
        &self.on_connected
    }

    pub fn on_disconnected(&self) -> &Signal {
        &self.on_disconnected
    }

    pub fn is_connected(&self) -> bool {
        self.state.borrow().is_connected()
    }

    pub fn device(&self) -> Option<DeviceId> {
        self.state.borrow().device
    }

    pub fn state(&self) -> DeviceConnectionState {
        self.state.borrow().clone()
    }

    pub fn mode_handle(&self, mode: Mode) -> Option<ConfigurationHandle> {
        self.state.borrow().mode_handles.get(&mode).copied()
    }

    pub fn is_attention_playing(&self) -> bool {
        self.attention.borrow().is_some()
    }

    /// One poll period: asks the platform for devices and applies the
    /// resulting transition. Disconnection is always processed before a
    /// (re)connection within the same poll.
    pub fn poll(&self) {
        let first_reported = {
            let mut platform = self.platform.borrow_mut();
            platform.run_frame();
            let mut devices = [DeviceId(0); MAX_DEVICES];
            let count = platform.connected_devices(&mut devices).min(MAX_DEVICES);
            devices[..count].first().copied()
        };

        let tracked = self.state.borrow().device;
        match transition(tracked, first_reported) {
            Transition::None => {}
            Transition::Connect(new) => self.handle_connected(new),
            Transition::Disconnect(old) => self.handle_disconnected(old),
            Transition::Replace { old, new } => {
                info!("Tracked controller {} replaced by {}", old, new);
                self.handle_disconnected(old);
                self.handle_connected(new);
            }
        }
    }

    /// Steps the attention sequence by the time elapsed since the last frame.
    pub fn pump(&self, elapsed: Duration) {
        let (pulses, finished) = {
            let mut attention = self.attention.borrow_mut();
            match attention.as_mut() {
                Some(sequence) => {
                    let pulses = sequence.advance(elapsed);
                    (pulses, sequence.is_finished())
                }
                None => return,
            }
        };

        if !pulses.is_empty() {
            let mut platform = self.platform.borrow_mut();
            for pulse in pulses {
                debug!("Haptic pulse {:?} on {}", pulse.side, pulse.device);
                platform.trigger_haptic_pulse(pulse.device, pulse.side, pulse.intensity);
            }
        }

        if finished {
            debug!("Attention sequence finished");
            *self.attention.borrow_mut() = None;
        }
    }

    /// Activates the configuration for `mode` on the tracked controller.
    ///
    /// Returns `false` without touching the device when nothing is connected
    /// or when the mode's handle could not be resolved at connection time.
    pub fn apply_mode(&self, mode: Mode) -> bool {
        let (device, handle) = {
            let state = self.state.borrow();
            match state.device {
                Some(device) => (
                    device,
                    state
                        .mode_handles
                        .get(&mode)
                        .copied()
                        .unwrap_or(ConfigurationHandle::NULL),
                ),
                None => {
                    debug!("No controller connected, ignoring {:?}", mode);
                    return false;
                }
            }
        };

        if handle.is_null() {
            debug!(
                "No configuration handle for {}, {} keeps its current configuration",
                mode.id(),
                device
            );
            return false;
        }

        self.platform
            .borrow_mut()
            .activate_configuration(device, handle);
        debug!("Activated {} ({:?}) on {}", mode.id(), handle, device);
        true
    }

    fn handle_connected(&self, device: DeviceId) {
        info!("Controller connected: {}", device);
        let mode_handles = self.load_mode_handles();
        {
            let mut state = self.state.borrow_mut();
            state.device = Some(device);
            state.mode_handles = mode_handles;
        }

        self.say_hello(device);
        self.on_connected.fire();
    }

    fn handle_disconnected(&self, device: DeviceId) {
        info!("Controller disconnected: {}", device);
        *self.attention.borrow_mut() = None;

        // Subscribers still see the outgoing device while they run
        self.on_disconnected.fire();

        let mut state = self.state.borrow_mut();
        state.device = None;
        state.mode_handles.clear();
    }

    fn load_mode_handles(&self) -> HashMap<Mode, ConfigurationHandle> {
        info!("Loading configuration handles");
        let mut platform = self.platform.borrow_mut();
        Mode::ALL
            .iter()
            .map(|mode| {
                let handle = platform.configuration_handle(mode.id());
                if handle.is_null() {
                    warn!(
                        "Configuration handle for {} not found, the device keeps its active configuration for this mode",
                        mode.id()
                    );
                } else {
                    debug!("- {} -> {:?}", mode.id(), handle);
                }
                (*mode, handle)
            })
            .collect()
    }

    fn say_hello(&self, device: DeviceId) {
        let sequence = AttentionSequence::new(device, &self.attention_settings);
        if sequence.is_finished() {
            return;
        }
        info!("Hello new controller {}", device);
        *self.attention.borrow_mut() = Some(sequence);
        self.pump(Duration::ZERO);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::simulated::{PlatformCall, SimulatedPlatform};
    use crate::device::PadSide;
    use std::cell::Cell;
    use std::rc::Rc;

    fn monitor_with(platform: SimulatedPlatform) -> DeviceConnectionMonitor {
        let control = platform.handle();
        let monitor = DeviceConnectionMonitor::new(Box::new(platform), AttentionSettings::default());
        monitor.initialize().expect("simulated platform initializes");
        control.clear_calls();
        monitor
    }

    fn counter(signal: &Signal, key: &str) -> Rc<Cell<u32>> {
        let count = Rc::new(Cell::new(0));
        let c = Rc::clone(&count);
        signal.subscribe(key, move || c.set(c.get() + 1));
        count
    }

    #[test]
    fn test_transition_table() {
        let a = Some(DeviceId(1));
        let b = Some(DeviceId(2));
        assert_eq!(transition(None, None), Transition::None);
        assert_eq!(transition(None, a), Transition::Connect(DeviceId(1)));
        assert_eq!(transition(a, a), Transition::None);
        assert_eq!(transition(a, None), Transition::Disconnect(DeviceId(1)));
        assert_eq!(
            transition(a, b),
            Transition::Replace {
                old: DeviceId(1),
                new: DeviceId(2)
            }
        );
    }

    #[test]
    fn test_connect_loads_all_handles_and_fires_once() {
        // Arrange
        let platform = SimulatedPlatform::with_default_configurations();
        let control = platform.handle();
        let monitor = monitor_with(platform);
        let connected = counter(monitor.on_connected(), "count");
        control.plug(DeviceId(3));

        // Act
        monitor.poll();
        monitor.poll();

        // Assert
        assert!(monitor.is_connected());
        assert_eq!(monitor.device(), Some(DeviceId(3)));
        assert_eq!(connected.get(), 1);
        for mode in Mode::ALL {
            assert!(!monitor.mode_handle(mode).unwrap_or_default().is_null());
        }
    }

    #[test]
    fn test_empty_poll_while_disconnected_is_noop() {
        let platform = SimulatedPlatform::with_default_configurations();
        let control = platform.handle();
        let monitor = monitor_with(platform);
        let connected = counter(monitor.on_connected(), "c");
        let disconnected = counter(monitor.on_disconnected(), "d");

        monitor.poll();

        assert!(!monitor.is_connected());
        assert_eq!(connected.get(), 0);
        assert_eq!(disconnected.get(), 0);
        assert!(control.activations().is_empty());
        assert!(control.pulses().is_empty());
    }

    #[test]
    fn test_disconnect_fires_before_clearing_state() {
        let platform = SimulatedPlatform::with_default_configurations();
        let control = platform.handle();
        let monitor = Rc::new(monitor_with(platform));
        control.plug(DeviceId(1));
        monitor.poll();

        let seen = Rc::new(RefCell::new(None));
        let weak = Rc::downgrade(&monitor);
        let s = Rc::clone(&seen);
        monitor.on_disconnected().subscribe("probe", move || {
            if let Some(monitor) = weak.upgrade() {
                *s.borrow_mut() = Some((monitor.device(), monitor.mode_handle(Mode::Flight)));
            }
        });

        control.unplug_all();
        monitor.poll();

        let (device, handle) = (*seen.borrow()).expect("disconnect subscriber ran");
        assert_eq!(device, Some(DeviceId(1)));
        assert!(handle.is_some());
        assert!(!monitor.is_connected());
        assert!(monitor.state().mode_handles.is_empty());
    }

    #[test]
    fn test_replaced_device_disconnects_then_connects_in_same_poll() {
        let platform = SimulatedPlatform::with_default_configurations();
        let control = platform.handle();
        let monitor = monitor_with(platform);
        let order = Rc::new(RefCell::new(Vec::new()));
        let o = Rc::clone(&order);
        monitor
            .on_connected()
            .subscribe("log", move || o.borrow_mut().push("connected"));
        let o = Rc::clone(&order);
        monitor
            .on_disconnected()
            .subscribe("log", move || o.borrow_mut().push("disconnected"));

        control.plug(DeviceId(1));
        monitor.poll();
        control.unplug_all();
        control.plug(DeviceId(2));
        monitor.poll();

        assert_eq!(*order.borrow(), vec!["connected", "disconnected", "connected"]);
        assert_eq!(monitor.device(), Some(DeviceId(2)));
    }

    #[test]
    fn test_apply_mode_when_disconnected_is_noop() {
        let platform = SimulatedPlatform::with_default_configurations();
        let control = platform.handle();
        let monitor = monitor_with(platform);

        assert!(!monitor.apply_mode(Mode::Flight));
        assert!(control.activations().is_empty());
    }

    #[test]
    fn test_apply_mode_activates_matching_handle() {
        let platform = SimulatedPlatform::with_default_configurations();
        let control = platform.handle();
        let monitor = monitor_with(platform);
        control.plug(DeviceId(9));
        monitor.poll();

        assert!(monitor.apply_mode(Mode::Docking));

        let expected = control.configuration_for(Mode::Docking.id());
        assert_eq!(control.activations(), vec![(DeviceId(9), expected)]);
    }

    #[test]
    fn test_missing_handle_degrades_to_noop() {
        let platform = SimulatedPlatform::with_default_configurations();
        let control = platform.handle();
        control.remove_configuration(Mode::Eva.id());
        let monitor = monitor_with(platform);
        control.plug(DeviceId(1));
        monitor.poll();

        assert_eq!(monitor.mode_handle(Mode::Eva), Some(ConfigurationHandle::NULL));
        assert!(!monitor.apply_mode(Mode::Eva));
        assert!(monitor.apply_mode(Mode::Map));
        assert_eq!(control.activations().len(), 1);
    }

    #[test]
    fn test_attention_sequence_plays_without_blocking_poll() {
        let platform = SimulatedPlatform::with_default_configurations();
        let control = platform.handle();
        let monitor = monitor_with(platform);
        control.plug(DeviceId(4));

        monitor.poll();
        assert_eq!(control.pulses().len(), 1);
        assert!(monitor.is_attention_playing());

        // Polling and mode application proceed while pulses are pending
        monitor.poll();
        assert!(monitor.apply_mode(Mode::Menu));

        for _ in 0..20 {
            monitor.pump(Duration::from_millis(50));
        }
        let pulses = control.pulses();
        assert_eq!(pulses.len(), 8);
        assert_eq!(pulses[0], (DeviceId(4), PadSide::Right, u16::MAX));
        assert_eq!(pulses[1], (DeviceId(4), PadSide::Left, u16::MAX));
        assert!(!monitor.is_attention_playing());
    }

    #[test]
    fn test_attention_stops_on_disconnect() {
        let platform = SimulatedPlatform::with_default_configurations();
        let control = platform.handle();
        let monitor = monitor_with(platform);
        control.plug(DeviceId(4));
        monitor.poll();

        control.unplug_all();
        monitor.poll();
        monitor.pump(Duration::from_secs(1));

        assert_eq!(control.pulses().len(), 1);
        assert!(!monitor.is_attention_playing());
    }

    #[test]
    fn test_poll_runs_platform_frame_first() {
        let platform = SimulatedPlatform::with_default_configurations();
        let control = platform.handle();
        let monitor = monitor_with(platform);

        monitor.poll();

        assert_eq!(control.calls().first(), Some(&PlatformCall::RunFrame));
    }
}

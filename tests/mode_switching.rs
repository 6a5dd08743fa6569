//! End-to-end mode switching through a running session
//!
//! Drives the session frame by frame against the simulated platform and host,
//! so every deadline can be checked on an exact tick.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use modepilot::config::SessionSettings;
use modepilot::device::simulated::PlatformCall;
use modepilot::device::{ConfigurationHandle, DeviceId, SimulatedPlatform, SimulatedPlatformHandle};
use modepilot::host::{
    FlightUiMode, HostCommand, HostEvent, NotificationSink, Scene, ScreenMessage, SimulatedHost,
};
use modepilot::mode::Mode;
use modepilot::session::{ControllerSession, Running, SessionError};

const FRAME: Duration = Duration::from_millis(16);

#[derive(Default)]
struct RecordingSink {
    texts: RefCell<Vec<String>>,
}

impl NotificationSink for RecordingSink {
    fn post(&self, message: &ScreenMessage) {
        self.texts.borrow_mut().push(message.text.clone());
    }
}

struct Harness {
    session: ControllerSession<Running>,
    host: Rc<SimulatedHost>,
    devices: SimulatedPlatformHandle,
    sink: Rc<RecordingSink>,
}

impl Harness {
    fn start() -> Self {
        let platform = SimulatedPlatform::with_default_configurations();
        let devices = platform.handle();
        let host = Rc::new(SimulatedHost::default());
        let sink = Rc::new(RecordingSink::default());
        let session = ControllerSession::create(
            &SessionSettings::default(),
            Box::new(platform),
            host.clone(),
            sink.clone(),
        )
        .start()
        .expect("simulated platform starts");
        devices.clear_calls();

        Self {
            session,
            host,
            devices,
            sink,
        }
    }

    fn host_command(&self, command: HostCommand) {
        if let Some(event) = self.host.apply(command) {
            self.session.handle_host_event(event);
        }
    }

    fn frames_until(&self, tick: u64) {
        while self.session.tick() < tick {
            self.session.on_frame(FRAME);
        }
    }

    fn activations(&self) -> Vec<(DeviceId, ConfigurationHandle)> {
        self.devices.activations()
    }

    fn handle(&self, mode: Mode) -> ConfigurationHandle {
        self.devices.configuration_for(mode.id())
    }
}

#[test]
fn test_ui_change_during_connect_window_applies_docking_once() {
    // Arrange
    let harness = Harness::start();
    harness.host.apply(HostCommand::LoadScene(Scene::Flight));
    let device = DeviceId(1);

    // Act: connect at tick 0
    harness.devices.plug(device);
    harness.session.poll_devices();
    assert!(harness.session.is_connected());

    // UI sub-mode changes at tick 3, pushing the deadline to 13
    harness.frames_until(3);
    harness.host_command(HostCommand::FlightUi(Some(FlightUiMode::Docking)));
    harness.frames_until(12);
    let before_deadline = harness.activations();
    harness.frames_until(13);

    // Assert
    assert!(before_deadline.is_empty());
    assert_eq!(harness.activations(), vec![(device, harness.handle(Mode::Docking))]);
    assert_eq!(
        *harness.sink.texts.borrow(),
        vec!["Action Set: Docking Controls.".to_string()]
    );

    harness.frames_until(40);
    assert_eq!(harness.activations().len(), 1);
    assert_eq!(harness.sink.texts.borrow().len(), 1);
}

#[test]
fn test_disconnect_cancels_pending_recompute() {
    let harness = Harness::start();
    harness.host.apply(HostCommand::LoadScene(Scene::Editor));

    harness.devices.plug(DeviceId(1));
    harness.session.poll_devices();
    harness.frames_until(5);
    harness.devices.unplug(DeviceId(1));
    harness.session.poll_devices();

    assert!(!harness.session.is_connected());
    assert!(!harness.session.is_recompute_pending());

    harness.frames_until(20);
    assert!(harness.activations().is_empty());

    // Reconnecting starts a fresh window
    harness.devices.plug(DeviceId(2));
    harness.session.poll_devices();
    harness.frames_until(29);
    assert!(harness.activations().is_empty());
    harness.frames_until(30);

    assert_eq!(
        harness.activations(),
        vec![(DeviceId(2), harness.handle(Mode::Editor))]
    );
}

#[test]
fn test_authoritative_events_bypass_debounce() {
    let harness = Harness::start();
    harness.host.apply(HostCommand::LoadScene(Scene::Flight));
    harness.devices.plug(DeviceId(4));
    harness.session.poll_devices();
    harness.frames_until(10);
    assert_eq!(harness.session.current_mode(), Some(Mode::Flight));

    harness.host_command(HostCommand::MapView(true));
    assert_eq!(harness.session.current_mode(), Some(Mode::Map));

    harness.host_command(HostCommand::Pause);
    harness.host_command(HostCommand::Pause);
    assert_eq!(harness.session.current_mode(), Some(Mode::Menu));

    // Unpause is debounced and resolves back to Map
    harness.host_command(HostCommand::Unpause);
    assert!(harness.session.is_recompute_pending());
    harness.frames_until(harness.session.tick() + 10);

    assert_eq!(harness.session.current_mode(), Some(Mode::Map));
    assert_eq!(
        *harness.sink.texts.borrow(),
        vec![
            "Action Set: Flight Controls.".to_string(),
            "Action Set: Map Controls.".to_string(),
            "Action Set: Menu Controls.".to_string(),
            "Action Set: Map Controls.".to_string(),
        ]
    );
}

#[test]
fn test_replaced_device_gets_mode_again() {
    let harness = Harness::start();
    harness.host.apply(HostCommand::LoadScene(Scene::TrackingStation));
    harness.devices.plug(DeviceId(1));
    harness.session.poll_devices();
    harness.frames_until(10);

    harness.devices.unplug(DeviceId(1));
    harness.devices.plug(DeviceId(9));
    harness.session.poll_devices();
    harness.frames_until(20);

    assert_eq!(harness.session.device(), Some(DeviceId(9)));
    assert_eq!(
        harness.activations(),
        vec![
            (DeviceId(1), harness.handle(Mode::Map)),
            (DeviceId(9), harness.handle(Mode::Map)),
        ]
    );
}

#[test]
fn test_connect_plays_attention_sequence_while_mode_applies() {
    let harness = Harness::start();
    harness.devices.plug(DeviceId(3));
    harness.session.poll_devices();

    harness.frames_until(60);

    assert_eq!(harness.devices.pulses().len(), 8);
    assert_eq!(harness.session.current_mode(), Some(Mode::Menu));
}

#[test]
fn test_unavailable_platform_keeps_core_inert() {
    let platform = SimulatedPlatform::unavailable();
    let devices = platform.handle();
    devices.plug(DeviceId(1));
    let host = Rc::new(SimulatedHost::default());

    let result = ControllerSession::create(
        &SessionSettings::default(),
        Box::new(platform),
        host,
        Rc::new(RecordingSink::default()),
    )
    .start();

    assert!(matches!(result, Err(SessionError::PlatformUnavailable(_))));
    assert_eq!(devices.calls(), vec![PlatformCall::Initialize]);
}

#[test]
fn test_host_event_before_connect_is_not_applied() {
    let harness = Harness::start();

    harness.session.handle_host_event(HostEvent::MapEntered);
    harness.frames_until(15);

    assert_eq!(harness.session.current_mode(), None);
    assert!(harness.activations().is_empty());
    assert!(harness.sink.texts.borrow().is_empty());
}

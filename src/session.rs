//! Controller session with statum typestate lifecycle
//!
//! Owns the wiring between the scheduler, the connection monitor and the
//! mode applier, and exposes the per-frame entry points the host loop calls.
//!
//! # State Machine
//!
//! ```text
//! Starting ──start()──► Running ──shutdown()──► (dropped)
//!     │
//!     └── platform unavailable ──► SessionError (core stays inert)
//! ```
//!
//! # Frame
//!
//! ```text
//! on_frame ──► scheduler.advance ──► run_due ──► applier.run_task
//!          └─► monitor.pump (attention pulses)
//! poll_devices ──► monitor.poll ──► OnConnected / OnDisconnected ──► applier
//! ```

use statum::{machine, state};
use std::rc::Rc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::SessionSettings;
use crate::device::{DeviceConnectionMonitor, DeviceError, DeviceId, DevicePlatform};
use crate::host::{HostContextSource, HostEvent, NotificationSink};
use crate::mode::{DelayedTask, Mode, ModeApplier};
use crate::scheduler::{DelayedActionScheduler, Tick};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Device platform unavailable: {0}")]
    PlatformUnavailable(#[from] DeviceError),
}

#[state]
#[derive(Debug, Clone)]
pub enum SessionState {
    Starting,
    Running,
}

#[machine]
pub struct ControllerSession<S: SessionState> {
    scheduler: Rc<DelayedActionScheduler<DelayedTask>>,
    monitor: Rc<DeviceConnectionMonitor>,
    applier: Rc<ModeApplier>,
}

impl<S: SessionState> ControllerSession<S> {
    pub fn monitor(&self) -> &DeviceConnectionMonitor {
        &self.monitor
    }

    pub fn applier(&self) -> &ModeApplier {
        &self.applier
    }
}

impl ControllerSession<Starting> {
    pub fn create(
        settings: &SessionSettings,
        platform: Box<dyn DevicePlatform>,
        context: Rc<dyn HostContextSource>,
        sink: Rc<dyn NotificationSink>,
    ) -> Self {
        info!("Creating controller session");
        let scheduler = Rc::new(DelayedActionScheduler::new());
        let monitor = Rc::new(DeviceConnectionMonitor::new(
            platform,
            settings.attention.clone(),
        ));
        let applier = Rc::new(ModeApplier::new(
            Rc::clone(&scheduler),
            Rc::clone(&monitor),
            context,
            sink,
            settings.debounce_ticks,
            settings.notification_duration,
        ));

        Self::new(scheduler, monitor, applier)
    }

    /// Initializes the device platform and hooks the applier up to the monitor.
    ///
    /// On failure the session is consumed; nothing was subscribed and no
    /// device will ever be touched.
    pub fn start(self) -> Result<ControllerSession<Running>, SessionError> {
        if let Err(e) = self.monitor.initialize() {
            warn!("Controller platform failed to initialize: {}", e);
            return Err(SessionError::PlatformUnavailable(e));
        }

        self.applier.attach();
        info!("Controller session running");
        Ok(self.transition())
    }
}

impl ControllerSession<Running> {
    /// One host frame: advance the clock, run what is due, pump haptics.
    pub fn on_frame(&self, elapsed: Duration) {
        self.scheduler.advance();
        let ran = self.scheduler.run_due(|task| self.applier.run_task(task));
        if ran > 0 {
            debug!("Ran {} delayed task(s) at tick {}", ran, self.scheduler.now());
        }
        self.monitor.pump(elapsed);
    }

    pub fn poll_devices(&self) {
        self.monitor.poll();
    }

    pub fn handle_host_event(&self, event: HostEvent) {
        self.applier.handle_host_event(event);
    }

    pub fn tick(&self) -> Tick {
        self.scheduler.now()
    }

    pub fn current_mode(&self) -> Option<Mode> {
        self.applier.current_mode()
    }

    pub fn is_connected(&self) -> bool {
        self.monitor.is_connected()
    }

    pub fn device(&self) -> Option<DeviceId> {
        self.monitor.device()
    }

    pub fn is_recompute_pending(&self) -> bool {
        self.applier.is_recompute_pending()
    }

    /// Drops all pending work and unsubscribes. The device keeps whatever
    /// configuration it last received.
    pub fn shutdown(self) {
        self.applier.detach();
        self.scheduler.cancel_all();
        info!("Controller session stopped");
    }
}

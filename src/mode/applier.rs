//! Mode Applier - keeps the controller configuration in line with the host
//!
//! Host events either request a debounced recompute (most of them) or force
//! a mode right away (pause, map entered). Both paths end in the same apply
//! routine, which skips disconnected devices and repeats of the current mode.
//!
//! ```text
//! HostEvent ──► request_mode_recompute ──► scheduler (debounce) ──┐
//!          └──► apply_mode_now ─────────────────────────────────┐ │
//!                                                               ▼ ▼
//!                     ModeResolver ──► apply ──► monitor.apply_mode + notification
//! ```

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::time::Duration;
use tracing::{debug, info};

use super::{DelayedTask, Mode, ModeResolver};
use crate::device::DeviceConnectionMonitor;
use crate::host::{HostContextSource, HostEvent, NotificationSink, ScreenMessage};
use crate::scheduler::{DelayedActionScheduler, Tick};

const SUBSCRIBER_KEY: &str = "mode_applier";

pub struct ModeApplier {
    scheduler: Rc<DelayedActionScheduler<DelayedTask>>,
    monitor: Rc<DeviceConnectionMonitor>,
    context: Rc<dyn HostContextSource>,
    sink: Rc<dyn NotificationSink>,
    message: RefCell<ScreenMessage>,
    // Last mode pushed to the connected device; None after a disconnect
    current_mode: Cell<Option<Mode>>,
    debounce_ticks: Tick,
}

impl ModeApplier {
    pub fn new(
        scheduler: Rc<DelayedActionScheduler<DelayedTask>>,
        monitor: Rc<DeviceConnectionMonitor>,
        context: Rc<dyn HostContextSource>,
        sink: Rc<dyn NotificationSink>,
        debounce_ticks: Tick,
        notification_duration: Duration,
    ) -> Self {
        debug!(
            "Creating ModeApplier (debounce {} ticks, notification {:?})",
            debounce_ticks, notification_duration
        );
        Self {
            scheduler,
            monitor,
            context,
            sink,
            message: RefCell::new(ScreenMessage::new(notification_duration)),
            current_mode: Cell::new(None),
            debounce_ticks,
        }
    }

    /// Subscribes to the monitor's connect/disconnect notifications.
    ///
    /// The subscriptions hold a weak reference, so dropping the applier is
    /// enough to make them inert; [`detach`](Self::detach) removes them.
    pub fn attach(self: &Rc<Self>) {
        let weak: Weak<Self> = Rc::downgrade(self);
        self.monitor.on_connected().subscribe(SUBSCRIBER_KEY, move || {
            if let Some(applier) = weak.upgrade() {
                applier.on_device_connected();
            }
        });

        let weak: Weak<Self> = Rc::downgrade(self);
        self.monitor.on_disconnected().subscribe(SUBSCRIBER_KEY, move || {
            if let Some(applier) = weak.upgrade() {
                applier.on_device_disconnected();
            }
        });
        debug!("ModeApplier attached to connection notifications");
    }

    pub fn detach(&self) {
        self.monitor.on_connected().unsubscribe(SUBSCRIBER_KEY);
        self.monitor.on_disconnected().unsubscribe(SUBSCRIBER_KEY);
        debug!("ModeApplier detached from connection notifications");
    }

    pub fn current_mode(&self) -> Option<Mode> {
        self.current_mode.get()
    }

    pub fn last_message(&self) -> ScreenMessage {
        self.message.borrow().clone()
    }

    pub fn is_recompute_pending(&self) -> bool {
        self.scheduler.is_pending(DelayedTask::RecomputeMode)
    }

    /// Recomputes and applies the mode once the debounce window has passed
    /// without further requests.
    pub fn request_mode_recompute(&self) {
        self.scheduler
            .schedule(DelayedTask::RecomputeMode, self.debounce_ticks);
    }

    pub fn cancel_pending_recompute(&self) {
        self.scheduler.cancel(DelayedTask::RecomputeMode);
    }

    /// Applies `mode` immediately, discarding any pending recompute.
    pub fn apply_mode_now(&self, mode: Mode) {
        self.cancel_pending_recompute();
        self.apply(mode);
    }

    /// Body of the scheduler's tasks.
    pub fn run_task(&self, task: DelayedTask) {
        match task {
            DelayedTask::RecomputeMode => {
                let mode = ModeResolver::resolve(&self.context.snapshot());
                self.apply(mode);
            }
        }
    }

    pub fn handle_host_event(&self, event: HostEvent) {
        match event {
            HostEvent::SceneLoaded(scene) => {
                info!("Scene loaded: {}", scene);
                self.request_mode_recompute();
            }
            HostEvent::Paused => {
                info!("Game paused");
                self.apply_mode_now(Mode::Menu);
            }
            HostEvent::Unpaused => {
                info!("Game unpaused");
                self.request_mode_recompute();
            }
            HostEvent::FlightUiModeChanged(mode) => {
                info!("Flight UI mode changed to {:?}", mode);
                self.request_mode_recompute();
            }
            HostEvent::MapEntered => {
                info!("Map view entered");
                self.apply_mode_now(Mode::Map);
            }
            HostEvent::ActiveSubjectChanged => {
                info!("Active vessel changed");
                self.request_mode_recompute();
            }
        }
    }

    fn on_device_connected(&self) {
        debug!("Controller connected, scheduling mode recompute");
        self.request_mode_recompute();
    }

    fn on_device_disconnected(&self) {
        debug!("Controller disconnected, dropping pending recompute");
        self.cancel_pending_recompute();
        self.current_mode.set(None);
    }

    // Returns whether anything was pushed to the device
    fn apply(&self, mode: Mode) -> bool {
        if !self.monitor.is_connected() {
            debug!("No controller connected, not applying {}", mode);
            return false;
        }
        if self.current_mode.get() == Some(mode) {
            debug!("{} already active", mode);
            return false;
        }

        info!("Applying controller mode: {}", mode);
        self.monitor.apply_mode(mode);
        self.current_mode.set(Some(mode));

        let message = {
            let mut slot = self.message.borrow_mut();
            slot.set_text(format!("Action Set: {}.", mode.label()));
            slot.clone()
        };
        // Slot is released; the sink may read it back
        self.sink.post(&message);
        true
    }
}

//! Host application contract
//!
//! The core only sees the host through three narrow seams:
//!
//! - [`HostContextSource`] - read-only snapshot of the current context
//! - [`HostEvent`] - the six triggers that can change the desired mode
//! - [`notification::NotificationSink`] - user-visible text display
//!
//! [`simulated::SimulatedHost`] implements the first two for the binary,
//! driven by text commands.

pub mod notification;
pub mod simulated;

pub use notification::{NotificationSink, ScreenMessage, TracingNotificationSink};
pub use simulated::{CommandError, HostCommand, SimulatedHost};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Scene currently loaded by the host
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scene {
    #[default]
    Loading,
    MainMenu,
    SpaceCenter,
    Flight,
    TrackingStation,
    Editor,
    MissionBuilder,
}

impl Scene {
    pub fn is_flight(&self) -> bool {
        matches!(self, Scene::Flight)
    }

    /// Craft editors, including the mission/scenario builder
    pub fn is_editor(&self) -> bool {
        matches!(self, Scene::Editor | Scene::MissionBuilder)
    }
}

impl fmt::Display for Scene {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scene::Loading => write!(f, "Loading"),
            Scene::MainMenu => write!(f, "MainMenu"),
            Scene::SpaceCenter => write!(f, "SpaceCenter"),
            Scene::Flight => write!(f, "Flight"),
            Scene::TrackingStation => write!(f, "TrackingStation"),
            Scene::Editor => write!(f, "Editor"),
            Scene::MissionBuilder => write!(f, "MissionBuilder"),
        }
    }
}

/// Sub-mode of the in-flight UI
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FlightUiMode {
    Staging,
    ManeuverEdit,
    ManeuverInfo,
    Docking,
    MapMode,
}

/// Everything the mode resolver looks at, read in one go.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HostContextSnapshot {
    pub scene: Scene,
    pub map_view_active: bool,
    /// The active subject is out of its vehicle (EVA)
    pub subject_is_eva: bool,
    pub flight_ui_mode: Option<FlightUiMode>,
}

/// Read-only, non-blocking view on the host's current context.
pub trait HostContextSource {
    fn snapshot(&self) -> HostContextSnapshot;
}

/// Host triggers the core reacts to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HostEvent {
    SceneLoaded(Scene),
    Paused,
    Unpaused,
    FlightUiModeChanged(Option<FlightUiMode>),
    MapEntered,
    ActiveSubjectChanged,
}

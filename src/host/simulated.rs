//! Text-driven stand-in for the host application.
//!
//! Each command line updates the context snapshot the way the real host
//! would, and yields the host event that host would have raised.
//!
//! ```text
//! scene <loading|menu|spacecenter|flight|tracking|editor|mission>
//! map <on|off>     eva <on|off>     ui <staging|maneuver|docking|map|none>
//! pause            unpause          vessel
//! plug <id>        unplug           status         quit
//! ```

use std::cell::Cell;
use std::str::FromStr;
use tracing::debug;

use super::{FlightUiMode, HostContextSnapshot, HostContextSource, HostEvent, Scene};
use crate::device::DeviceId;

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("Empty command")]
    Empty,

    #[error("Unknown command: {0}")]
    Unknown(String),

    #[error("Missing argument for '{0}'")]
    MissingArgument(&'static str),

    #[error("Invalid argument for '{command}': {value}")]
    InvalidArgument { command: &'static str, value: String },
}

/// One parsed command line
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HostCommand {
    LoadScene(Scene),
    MapView(bool),
    Eva(bool),
    FlightUi(Option<FlightUiMode>),
    Pause,
    Unpause,
    SwitchVessel,
    Plug(DeviceId),
    Unplug,
    Status,
    Quit,
}

fn parse_switch(command: &'static str, value: Option<&str>) -> Result<bool, CommandError> {
    match value {
        Some("on") => Ok(true),
        Some("off") => Ok(false),
        Some(other) => Err(CommandError::InvalidArgument {
            command,
            value: other.to_string(),
        }),
        None => Err(CommandError::MissingArgument(command)),
    }
}

impl FromStr for HostCommand {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let command = words.next().ok_or(CommandError::Empty)?;
        let argument = words.next().map(str::to_ascii_lowercase);
        let argument = argument.as_deref();

        match command.to_ascii_lowercase().as_str() {
            "scene" => {
                let scene = match argument {
                    Some("loading") => Scene::Loading,
                    Some("menu") => Scene::MainMenu,
                    Some("spacecenter") => Scene::SpaceCenter,
                    Some("flight") => Scene::Flight,
                    Some("tracking") => Scene::TrackingStation,
                    Some("editor") => Scene::Editor,
                    Some("mission") => Scene::MissionBuilder,
                    Some(other) => {
                        return Err(CommandError::InvalidArgument {
                            command: "scene",
                            value: other.to_string(),
                        })
                    }
                    None => return Err(CommandError::MissingArgument("scene")),
                };
                Ok(HostCommand::LoadScene(scene))
            }
            "map" => Ok(HostCommand::MapView(parse_switch("map", argument)?)),
            "eva" => Ok(HostCommand::Eva(parse_switch("eva", argument)?)),
            "ui" => {
                let mode = match argument {
                    Some("staging") => Some(FlightUiMode::Staging),
                    Some("maneuver") => Some(FlightUiMode::ManeuverInfo),
                    Some("docking") => Some(FlightUiMode::Docking),
                    Some("map") => Some(FlightUiMode::MapMode),
                    Some("none") => None,
                    Some(other) => {
                        return Err(CommandError::InvalidArgument {
                            command: "ui",
                            value: other.to_string(),
                        })
                    }
                    None => return Err(CommandError::MissingArgument("ui")),
                };
                Ok(HostCommand::FlightUi(mode))
            }
            "pause" => Ok(HostCommand::Pause),
            "unpause" => Ok(HostCommand::Unpause),
            "vessel" => Ok(HostCommand::SwitchVessel),
            "plug" => {
                let value = argument.ok_or(CommandError::MissingArgument("plug"))?;
                let id = value.parse::<u64>().map_err(|_| CommandError::InvalidArgument {
                    command: "plug",
                    value: value.to_string(),
                })?;
                Ok(HostCommand::Plug(DeviceId(id)))
            }
            "unplug" => Ok(HostCommand::Unplug),
            "status" => Ok(HostCommand::Status),
            "quit" | "exit" => Ok(HostCommand::Quit),
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }
}

/// Host context kept in memory and mutated by [`HostCommand`]s
#[derive(Debug, Default)]
pub struct SimulatedHost {
    context: Cell<HostContextSnapshot>,
}

impl SimulatedHost {
    pub fn new(initial: HostContextSnapshot) -> Self {
        Self {
            context: Cell::new(initial),
        }
    }

    pub fn set_context(&self, context: HostContextSnapshot) {
        self.context.set(context);
    }

    /// Applies a context-changing command and returns the event the host raises.
    ///
    /// Commands that do not concern the host context (`plug`, `status`, ...)
    /// leave it untouched and return `None`.
    pub fn apply(&self, command: HostCommand) -> Option<HostEvent> {
        let mut context = self.context.get();
        let event = match command {
            HostCommand::LoadScene(scene) => {
                context = HostContextSnapshot {
                    scene,
                    map_view_active: false,
                    subject_is_eva: false,
                    flight_ui_mode: scene.is_flight().then_some(FlightUiMode::Staging),
                };
                HostEvent::SceneLoaded(scene)
            }
            HostCommand::MapView(true) => {
                context.map_view_active = true;
                HostEvent::MapEntered
            }
            HostCommand::MapView(false) => {
                context.map_view_active = false;
                HostEvent::FlightUiModeChanged(context.flight_ui_mode)
            }
            HostCommand::Eva(on) => {
                context.subject_is_eva = on;
                HostEvent::ActiveSubjectChanged
            }
            HostCommand::FlightUi(mode) => {
                context.flight_ui_mode = mode;
                HostEvent::FlightUiModeChanged(mode)
            }
            HostCommand::Pause => HostEvent::Paused,
            HostCommand::Unpause => HostEvent::Unpaused,
            HostCommand::SwitchVessel => {
                context.subject_is_eva = false;
                HostEvent::ActiveSubjectChanged
            }
            HostCommand::Plug(_) | HostCommand::Unplug | HostCommand::Status | HostCommand::Quit => {
                return None
            }
        };
        debug!("Host context now {:?}", context);
        self.context.set(context);
        Some(event)
    }
}

impl HostContextSource for SimulatedHost {
    fn snapshot(&self) -> HostContextSnapshot {
        self.context.get()
    }
}

//! Controller modes and how the current one is chosen and applied.
//!
//! - [`resolver`] - pure mapping from host context to the desired [`Mode`]
//! - [`applier`] - debounced, de-duplicated application of that mode

pub mod applier;
pub mod resolver;

pub use applier::ModeApplier;
pub use resolver::ModeResolver;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Device operating configuration
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mode {
    Menu,
    Flight,
    Docking,
    Editor,
    #[serde(rename = "EVA")]
    Eva,
    Map,
}

impl Mode {
    pub const ALL: [Mode; 6] = [
        Mode::Menu,
        Mode::Flight,
        Mode::Docking,
        Mode::Editor,
        Mode::Eva,
        Mode::Map,
    ];

    /// Identifier of the device configuration for this mode
    pub fn id(&self) -> &'static str {
        match self {
            Mode::Menu => "MenuControls",
            Mode::Flight => "FlightControls",
            Mode::Docking => "DockingControls",
            Mode::Editor => "EditorControls",
            Mode::Eva => "EVAControls",
            Mode::Map => "MapControls",
        }
    }

    /// Human readable name shown to the user
    pub fn label(&self) -> &'static str {
        match self {
            Mode::Menu => "Menu Controls",
            Mode::Flight => "Flight Controls",
            Mode::Docking => "Docking Controls",
            Mode::Editor => "Editor Controls",
            Mode::Eva => "EVA Controls",
            Mode::Map => "Map Controls",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Named units of deferred work. The scheduler keys its entries on these.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DelayedTask {
    /// Resolve the mode from the current host context and apply it
    RecomputeMode,
}

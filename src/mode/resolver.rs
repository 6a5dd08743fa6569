use tracing::debug;

use super::Mode;
use crate::host::{FlightUiMode, HostContextSnapshot, Scene};

/// Maps the host context to the mode the controller should be in.
///
/// Rules are checked in priority order and the first match wins:
///
/// 1. In flight: map view → Map, EVA → EVA, then the flight UI sub-mode
///    (staging/maneuver → Flight, docking → Docking, map → Map)
/// 2. Tracking station → Map
/// 3. Any editor, mission builder included → Editor
/// 4. Everything else → Menu
///
/// Nothing is cached: the context can change between two calls.
#[derive(Clone, Copy, Debug, Default)]
pub struct ModeResolver;

impl ModeResolver {
    pub fn resolve(context: &HostContextSnapshot) -> Mode {
        debug!("Detecting controller mode from {:?}", context);

        if context.scene.is_flight() {
            if context.map_view_active {
                debug!("=> Map view is enabled");
                return Mode::Map;
            }
            if context.subject_is_eva {
                debug!("=> EVA is in progress");
                return Mode::Eva;
            }
            match context.flight_ui_mode {
                Some(FlightUiMode::Staging)
                | Some(FlightUiMode::ManeuverEdit)
                | Some(FlightUiMode::ManeuverInfo) => return Mode::Flight,
                Some(FlightUiMode::Docking) => return Mode::Docking,
                // Reported alongside the map view flag; either signal means Map
                Some(FlightUiMode::MapMode) => return Mode::Map,
                None => debug!("=> Flight without UI sub-mode"),
            }
        } else if context.scene == Scene::TrackingStation {
            debug!("=> Tracking station");
            return Mode::Map;
        } else if context.scene.is_editor() {
            debug!("=> Editor ({})", context.scene);
            return Mode::Editor;
        }

        Mode::Menu
    }
}

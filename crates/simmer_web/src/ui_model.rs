//! Naming and wiring shared between the panel DOM and tests.
//!
//! Keeping these out of the wasm-only `web` module allows us to unit-test
//! the id scheme and request URLs on the host.

use simmer::catalog::{ControlId, ParamSpec};
use simmer::control::fmt_value;
use simmer::refresh::RenderQuery;

/// Fixed container ids the shell renders and the ports bind against.
pub const SYSTEM_SELECTOR: &str = "system-selector";
pub const CONTROL_TABS: &str = "control-tabs";
pub const CONTROL_TABS_LIST: &str = "control-tabs-list";
pub const GRAPH: &str = "graph";
pub const TELEMETRY: &str = "telemetry";
pub const AUTO_REFRESH: &str = "auto-refresh";

/// The group container carries the bare component name as its id.
pub fn group_id(group: &str) -> String {
    group.to_string()
}

pub fn tab_id(group: &str) -> String {
    format!("{group}-tab")
}

pub fn box_id(id: &ControlId) -> String {
    format!("{id}-box")
}

pub fn slider_id(id: &ControlId) -> String {
    format!("{id}-slider")
}

pub fn readout_id(id: &ControlId) -> String {
    format!("{id}-value")
}

/// Header line above a slider: the title, with the unit in parentheses when
/// the parameter has one.
pub fn header_text(spec: &ParamSpec) -> String {
    if spec.unit.is_empty() {
        spec.title.clone()
    } else {
        format!("{} ({})", spec.title, spec.unit)
    }
}

pub fn config_url() -> &'static str {
    "/config"
}

pub fn render_url(query: &RenderQuery) -> String {
    format!("/graph?{query}")
}

pub fn apply_url(system: &str, id: &ControlId, value: f64) -> String {
    format!("/set?systemName={system}&{id}={}", fmt_value(value))
}

pub fn reset_url() -> &'static str {
    "/reset"
}

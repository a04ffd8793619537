//! Port traits: the seam between the panel engine and its embedder.
//!
//! The engine performs no I/O of its own. Widget mutations, network fetches,
//! and timers all go through these traits; the browser adapter implements
//! them over the DOM, and tests implement them with recording fakes.
//! Fetch completions come back as [`Panel`](crate::panel::Panel) method
//! calls, so everything stays single threaded and event driven.

use crate::catalog::ControlId;
use crate::control::ParamControl;
use crate::refresh::RenderQuery;

/// One entry in the system selector.
#[derive(Debug, Clone, PartialEq)]
pub struct SystemOption {
    pub id: String,
    /// Shown to the operator; the system's description.
    pub label: String,
    pub selected: bool,
}

/// One rendered telemetry row.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryRow {
    pub title: String,
    pub text: String,
}

/// Widget-tree effects. Control mutations arrive as a reconciliation diff;
/// only telemetry and teardown are destructive wholesale.
pub trait SurfacePort {
    /// Replaces the selectable system options.
    fn set_system_options(&mut self, options: &[SystemOption]);
    /// Creates an empty control grouping for a component, appended after
    /// the existing groupings.
    fn add_group(&mut self, component: &str);
    /// Removes a component grouping. Its controls are destroyed first.
    fn remove_group(&mut self, component: &str);
    /// Creates the affordance for one control inside its component group.
    fn create_control(&mut self, component: &str, control: &ParamControl);
    /// Removes one affordance and its listeners; the id becomes reusable.
    fn destroy_control(&mut self, id: &ControlId);
    /// Moves an existing slider without recreating it.
    fn set_slider_value(&mut self, id: &ControlId, value: f64);
    /// Updates the numeric readout beside a slider.
    fn set_readout(&mut self, id: &ControlId, text: &str);
    /// Clears and rebuilds the telemetry list.
    fn set_telemetry(&mut self, rows: &[TelemetryRow]);
    /// Promotes the most recently loaded artifact into the display.
    fn swap_artifact(&mut self);
    /// Asks the operator to confirm a destructive action.
    fn confirm(&mut self, message: &str) -> bool;
}

/// Network fetches. All fire-and-forget: the embedder reports the outcome
/// later through the matching `Panel::on_*` call.
pub trait FetchPort {
    /// Starts a configuration-document fetch.
    fn begin_config(&mut self);
    /// Starts a rendering fetch for the given query.
    fn begin_render(&mut self, query: &RenderQuery);
    /// Applies a single named value (the one-at-a-time channel).
    fn begin_apply(&mut self, id: &ControlId, value: f64);
    /// Asks the server to restore defaults.
    fn begin_reset(&mut self);
}

/// Recurring triggers for automatic refresh.
pub trait TimerPort {
    /// Schedules a repeating trigger every `secs` whole seconds.
    fn schedule_repeating(&mut self, secs: u32) -> TimerHandle;
    /// Cancels a previously scheduled trigger.
    fn cancel(&mut self, handle: TimerHandle);
}

/// Opaque handle for a scheduled trigger (an interval id in the browser).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerHandle(pub i32);

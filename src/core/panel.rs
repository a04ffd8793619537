use thiserror::Error;

use crate::binder::Binder;
use crate::catalog::{Catalog, CatalogError, ControlId};
use crate::control::StepDirection;
use crate::ports::{FetchPort, SurfacePort, TimerPort};
use crate::refresh::{RefreshCoordinator, RefreshState, RenderQuery};

// How to treat the next configuration response. Materialize is set by
// start/switch/reset and survives until a response actually lands, so a
// rendering that completes first cannot downgrade it to a value resync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConfigIntent {
    Materialize,
    Resync,
}

#[derive(Debug, Error)]
pub enum PanelError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// The panel engine: routes operator intents and fetch completions between
/// the binder, the refresh coordinator, and the embedder's ports.
///
/// One instance per page session. Every entry point is total: unknown
/// identifiers and out-of-order completions are absorbed, and the panel
/// keeps accepting input after any failure.
pub struct Panel<P> {
    ports: P,
    binder: Binder,
    refresh: RefreshCoordinator,
    catalog: Option<Catalog>,
    // Requested system identifier; empty selects the document's first.
    selected: String,
    config_intent: ConfigIntent,
}

impl<P: SurfacePort + FetchPort + TimerPort> Panel<P> {
    pub fn new(ports: P, nonce_seed: u64) -> Self {
        Panel {
            ports,
            binder: Binder::new(),
            refresh: RefreshCoordinator::new(nonce_seed),
            catalog: None,
            selected: String::new(),
            config_intent: ConfigIntent::Materialize,
        }
    }

    /// Boot: fetch the configuration document and request a first rendering.
    pub fn start(&mut self, selected: &str) {
        self.selected = selected.to_string();
        self.config_intent = ConfigIntent::Materialize;
        self.ports.begin_config();
        self.trigger_refresh();
    }

    /// A user edit from a live slider. The value is clamped, echoed to the
    /// readout, and queued for rendering.
    pub fn control_edited(&mut self, id: &ControlId, value: f64) {
        let Some(ctl) = self.binder.control_mut(id) else {
            return;
        };
        let clamped = ctl.set_value(value);
        let readout = ctl.readout();
        if clamped != value {
            self.ports.set_slider_value(id, clamped);
        }
        self.ports.set_readout(id, &readout);
        self.trigger_refresh();
    }

    /// One wheel notch over a control.
    pub fn wheel(&mut self, id: &ControlId, direction: StepDirection) {
        let Some(ctl) = self.binder.control_mut(id) else {
            return;
        };
        let value = ctl.nudge(direction);
        let readout = ctl.readout();
        self.ports.set_slider_value(id, value);
        self.ports.set_readout(id, &readout);
        self.trigger_refresh();
    }

    /// The operator picked a different system: tear everything down and
    /// rebuild from a fresh document.
    pub fn system_selected(&mut self, name: &str) {
        self.selected = name.to_string();
        self.binder.teardown(&mut self.ports);
        self.config_intent = ConfigIntent::Materialize;
        self.ports.begin_config();
    }

    /// Changes the auto-refresh interval (whole seconds, 0 disables). The
    /// existing timer is always cancelled before any new one is scheduled.
    pub fn auto_refresh_changed(&mut self, secs: u32) {
        if let Some(handle) = self.refresh.take_timer() {
            self.ports.cancel(handle);
        }
        if secs > 0 {
            let handle = self.ports.schedule_repeating(secs);
            self.refresh.store_timer(handle, secs);
        }
    }

    /// Recurring auto-refresh trigger.
    pub fn timer_fired(&mut self) {
        self.trigger_refresh();
    }

    /// Reset button. Gated behind operator confirmation; declining leaves
    /// every piece of state untouched.
    pub fn reset_requested(&mut self) {
        if !self.ports.confirm("Reset the controller to its defaults?") {
            return;
        }
        self.ports.begin_reset();
    }

    /// The server finished a reset: reinitialize as if the page were freshly
    /// loaded. Selection and the auto-refresh timer do not survive, same as
    /// a real reload.
    pub fn on_reset_done(&mut self) {
        if let Some(handle) = self.refresh.take_timer() {
            self.ports.cancel(handle);
        }
        self.binder.teardown(&mut self.ports);
        let seed = self.refresh.next_nonce();
        self.refresh = RefreshCoordinator::new(seed);
        self.catalog = None;
        self.start("");
    }

    /// Applies one value through the single-parameter channel, then asks for
    /// a rendering that reflects it.
    pub fn apply_parameter(&mut self, id: &ControlId, value: f64) {
        let Some(ctl) = self.binder.control_mut(id) else {
            return;
        };
        let clamped = ctl.set_value(value);
        let readout = ctl.readout();
        self.ports.set_slider_value(id, clamped);
        self.ports.set_readout(id, &readout);
        self.ports.begin_apply(id, clamped);
        self.trigger_refresh();
    }

    /// A configuration document arrived.
    pub fn on_config_loaded(&mut self, body: &str) -> Result<(), PanelError> {
        let catalog = Catalog::from_json(body)?;
        match self.config_intent {
            ConfigIntent::Materialize => {
                self.binder
                    .materialize(&catalog, &self.selected, &mut self.ports);
            }
            ConfigIntent::Resync => {
                self.refresh.begin_update();
                self.binder.resync(&catalog, &self.selected, &mut self.ports);
                self.refresh.end_update();
            }
        }
        self.config_intent = ConfigIntent::Resync;
        self.catalog = Some(catalog);
        Ok(())
    }

    /// A configuration fetch failed; controls keep their last-known state.
    pub fn on_config_failed(&mut self) {}

    /// A rendering arrived: swap it in, release the in-flight slot (issuing
    /// the coalesced follow-up if edits arrived meanwhile), then resync
    /// displayed values against a fresh document.
    pub fn on_render_loaded(&mut self) {
        self.ports.swap_artifact();
        if self.refresh.complete() {
            self.issue_render();
        }
        self.ports.begin_config();
    }

    /// A rendering fetch failed: a completion with no swap and no value
    /// resync. A pending edit still issues its follow-up.
    pub fn on_render_failed(&mut self) {
        if self.refresh.complete() {
            self.issue_render();
        }
    }

    pub fn selected(&self) -> &str {
        &self.selected
    }

    pub fn catalog(&self) -> Option<&Catalog> {
        self.catalog.as_ref()
    }

    pub fn control_count(&self) -> usize {
        self.binder.control_count()
    }

    pub fn refresh_state(&self) -> RefreshState {
        self.refresh.state()
    }

    pub fn auto_refresh_secs(&self) -> u32 {
        self.refresh.interval_secs()
    }

    pub fn ports(&self) -> &P {
        &self.ports
    }

    pub fn ports_mut(&mut self) -> &mut P {
        &mut self.ports
    }

    fn trigger_refresh(&mut self) {
        if self.refresh.trigger() {
            self.issue_render();
        }
    }

    fn issue_render(&mut self) {
        let system = self
            .catalog
            .as_ref()
            .and_then(|c| c.resolve_active(&self.selected))
            .map(|(id, _)| id.to_string())
            .unwrap_or_else(|| self.selected.clone());
        let query = RenderQuery {
            system,
            params: self.binder.live_values(),
            nonce: self.refresh.next_nonce(),
        };
        self.ports.begin_render(&query);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::ParamControl;
    use crate::ports::{SystemOption, TelemetryRow, TimerHandle};

    #[derive(Default)]
    struct Recording {
        options: Vec<SystemOption>,
        groups: Vec<String>,
        live: Vec<String>,
        slider_moves: Vec<(String, f64)>,
        readouts: Vec<(String, String)>,
        telemetry: Vec<TelemetryRow>,
        swaps: usize,
        confirm_answer: bool,
        confirms: usize,

        config_fetches: usize,
        renders: Vec<String>,
        applies: Vec<(String, f64)>,
        resets: usize,

        next_timer: i32,
        active_timers: Vec<i32>,
        scheduled: Vec<(i32, u32)>,
        cancelled: Vec<i32>,
    }

    impl SurfacePort for Recording {
        fn set_system_options(&mut self, options: &[SystemOption]) {
            self.options = options.to_vec();
        }
        fn add_group(&mut self, component: &str) {
            self.groups.push(component.to_string());
        }
        fn remove_group(&mut self, component: &str) {
            self.groups.retain(|g| g != component);
        }
        fn create_control(&mut self, _component: &str, control: &ParamControl) {
            self.live.push(control.id.to_string());
        }
        fn destroy_control(&mut self, id: &ControlId) {
            self.live.retain(|l| l != id.as_str());
        }
        fn set_slider_value(&mut self, id: &ControlId, value: f64) {
            self.slider_moves.push((id.to_string(), value));
        }
        fn set_readout(&mut self, id: &ControlId, text: &str) {
            self.readouts.push((id.to_string(), text.to_string()));
        }
        fn set_telemetry(&mut self, rows: &[TelemetryRow]) {
            self.telemetry = rows.to_vec();
        }
        fn swap_artifact(&mut self) {
            self.swaps += 1;
        }
        fn confirm(&mut self, _message: &str) -> bool {
            self.confirms += 1;
            self.confirm_answer
        }
    }

    impl FetchPort for Recording {
        fn begin_config(&mut self) {
            self.config_fetches += 1;
        }
        fn begin_render(&mut self, query: &RenderQuery) {
            self.renders.push(query.to_string());
        }
        fn begin_apply(&mut self, id: &ControlId, value: f64) {
            self.applies.push((id.to_string(), value));
        }
        fn begin_reset(&mut self) {
            self.resets += 1;
        }
    }

    impl TimerPort for Recording {
        fn schedule_repeating(&mut self, secs: u32) -> TimerHandle {
            self.next_timer += 1;
            self.active_timers.push(self.next_timer);
            self.scheduled.push((self.next_timer, secs));
            TimerHandle(self.next_timer)
        }
        fn cancel(&mut self, handle: TimerHandle) {
            self.active_timers.retain(|t| *t != handle.0);
            self.cancelled.push(handle.0);
        }
    }

    const DOC: &str = r#"{
        "tank": {
            "Description": "Holding tank",
            "Components": {
                "tank": [
                    {"Name": "level", "Title": "Level", "Minimum": 0,
                     "Maximum": 10, "Step": 1, "Default": 5, "Unit": "m"}
                ],
                "heater": [
                    {"Name": "power", "Title": "Power", "Minimum": 0,
                     "Maximum": 2000, "Step": 100, "Default": 400, "Unit": "W"}
                ]
            },
            "Values": {
                "sensors": [
                    {"Name": "temperature", "Title": "Temperature",
                     "Unit": "degC", "Value": 21.0}
                ]
            }
        },
        "furnace": {
            "Description": "Gas furnace",
            "Components": {
                "valve": [
                    {"Name": "flow", "Title": "Gas Flow", "Minimum": 0,
                     "Maximum": 100, "Step": 5, "Default": 50, "Unit": "%"}
                ]
            }
        }
    }"#;

    fn booted() -> Panel<Recording> {
        let mut panel = Panel::new(Recording::default(), 0);
        panel.start("");
        panel.on_config_loaded(DOC).unwrap();
        // Settle the boot rendering and the resync it causes.
        panel.on_render_loaded();
        panel.on_config_loaded(DOC).unwrap();
        panel
    }

    fn level() -> ControlId {
        ControlId::new("tank", "level")
    }

    #[test]
    fn boot_fetches_config_and_first_rendering() {
        let mut panel = Panel::new(Recording::default(), 0);
        panel.start("");
        assert_eq!(panel.ports().config_fetches, 1);
        assert_eq!(panel.ports().renders, ["systemName=&t=1"]);

        panel.on_config_loaded(DOC).unwrap();
        assert_eq!(panel.control_count(), 2);
        assert_eq!(panel.ports().live, ["tank_level", "heater_power"]);

        panel.on_render_loaded();
        assert_eq!(panel.ports().swaps, 1);
        assert_eq!(panel.ports().config_fetches, 2, "completion resyncs");
        assert_eq!(panel.refresh_state(), RefreshState::Idle);
    }

    #[test]
    fn config_arriving_after_first_rendering_still_materializes() {
        let mut panel = Panel::new(Recording::default(), 0);
        panel.start("");
        panel.on_render_loaded();
        panel.on_config_loaded(DOC).unwrap();
        assert_eq!(panel.control_count(), 2);
    }

    #[test]
    fn rapid_edits_during_flight_coalesce_to_one_follow_up() {
        let mut panel = booted();
        let before = panel.ports().renders.len();

        panel.control_edited(&level(), 6.0);
        panel.control_edited(&level(), 7.0);
        panel.control_edited(&level(), 8.0);
        assert_eq!(
            panel.ports().renders.len(),
            before + 1,
            "only the first edit issued while in flight"
        );

        panel.on_render_loaded();
        assert_eq!(panel.ports().renders.len(), before + 2);
        // The follow-up carries the newest value.
        assert!(panel.ports().renders[before + 1].contains("tank_level=8"));

        panel.on_render_loaded();
        assert_eq!(panel.ports().renders.len(), before + 2, "burst fully paid out");
        assert_eq!(panel.refresh_state(), RefreshState::Idle);
    }

    #[test]
    fn resync_never_triggers_a_rendering() {
        let mut panel = booted();
        panel.control_edited(&level(), 9.0);
        let renders = panel.ports().renders.len();

        // Completion resyncs against a document with an externally changed
        // value; the programmatic slider move must not fetch again.
        panel.on_render_loaded();
        let changed = DOC.replace("\"Value\": 21.0", "\"Value\": 25.0");
        let changed = changed.replace(
            "\"Step\": 100, \"Default\": 400",
            "\"Step\": 100, \"Default\": 400, \"Value\": 700",
        );
        panel.on_config_loaded(&changed).unwrap();

        assert!(panel
            .ports()
            .slider_moves
            .contains(&("heater_power".to_string(), 700.0)));
        assert_eq!(panel.ports().renders.len(), renders);
        assert_eq!(panel.refresh_state(), RefreshState::Idle);
    }

    #[test]
    fn edits_land_in_the_query_in_display_order() {
        let mut panel = booted();
        panel.control_edited(&level(), 7.0);
        let q = panel.ports().renders.last().unwrap().clone();
        assert!(q.starts_with("systemName=tank&tank_level=7&heater_power=400&t="));
    }

    #[test]
    fn edit_beyond_bounds_is_clamped_and_echoed() {
        let mut panel = booted();
        panel.control_edited(&level(), 999.0);
        assert_eq!(
            panel.ports().slider_moves.last(),
            Some(&("tank_level".to_string(), 10.0))
        );
        assert_eq!(
            panel.ports().readouts.last(),
            Some(&("tank_level".to_string(), "10m".to_string()))
        );
    }

    #[test]
    fn unknown_control_edit_is_ignored() {
        let mut panel = booted();
        let renders = panel.ports().renders.len();
        panel.control_edited(&ControlId::new("ghost", "dial"), 1.0);
        assert_eq!(panel.ports().renders.len(), renders);
    }

    #[test]
    fn wheel_steps_and_renders() {
        let mut panel = booted();
        panel.wheel(&level(), StepDirection::Up);
        assert_eq!(
            panel.ports().slider_moves.last(),
            Some(&("tank_level".to_string(), 6.0))
        );
        assert!(panel.ports().renders.last().unwrap().contains("tank_level=6"));
    }

    #[test]
    fn switching_systems_rebuilds_from_a_fresh_document() {
        let mut panel = booted();
        panel.system_selected("furnace");
        assert_eq!(panel.control_count(), 0, "torn down while fetching");

        panel.on_config_loaded(DOC).unwrap();
        assert_eq!(panel.control_count(), 1);
        assert_eq!(panel.ports().live, ["valve_flow"]);
        assert_eq!(panel.selected(), "furnace");
    }

    #[test]
    fn unknown_system_selection_is_not_fatal() {
        let mut panel = booted();
        panel.system_selected("missing");
        panel.on_config_loaded(DOC).unwrap();
        assert_eq!(panel.control_count(), 0);
        assert_eq!(panel.ports().options.len(), 2);

        // The panel still accepts input afterwards.
        panel.system_selected("tank");
        panel.on_config_loaded(DOC).unwrap();
        assert_eq!(panel.control_count(), 2);
    }

    #[test]
    fn auto_refresh_keeps_exactly_one_timer() {
        let mut panel = booted();
        panel.auto_refresh_changed(5);
        assert_eq!(panel.ports().active_timers.len(), 1);
        assert_eq!(panel.ports().scheduled, [(1, 5)]);
        assert_eq!(panel.auto_refresh_secs(), 5);

        panel.auto_refresh_changed(2);
        assert_eq!(panel.ports().active_timers.len(), 1);
        assert_eq!(panel.ports().cancelled, [1]);
        assert_eq!(panel.ports().scheduled, [(1, 5), (2, 2)]);

        panel.auto_refresh_changed(0);
        assert!(panel.ports().active_timers.is_empty());
        assert_eq!(panel.auto_refresh_secs(), 0);
    }

    #[test]
    fn timer_fire_renders_and_coalesces_like_an_edit() {
        let mut panel = booted();
        let renders = panel.ports().renders.len();
        panel.timer_fired();
        assert_eq!(panel.ports().renders.len(), renders + 1);
        panel.timer_fired();
        panel.timer_fired();
        assert_eq!(panel.ports().renders.len(), renders + 1);
        panel.on_render_loaded();
        assert_eq!(panel.ports().renders.len(), renders + 2);
    }

    #[test]
    fn failed_rendering_releases_the_in_flight_slot() {
        let mut panel = booted();
        panel.control_edited(&level(), 6.0);
        let renders = panel.ports().renders.len();
        let swaps = panel.ports().swaps;
        let configs = panel.ports().config_fetches;

        panel.on_render_failed();
        assert_eq!(panel.ports().swaps, swaps, "no swap on failure");
        assert_eq!(panel.ports().config_fetches, configs, "no resync on failure");
        assert_eq!(panel.refresh_state(), RefreshState::Idle);

        panel.control_edited(&level(), 7.0);
        assert_eq!(panel.ports().renders.len(), renders + 1, "not wedged");
    }

    #[test]
    fn failed_rendering_still_pays_out_a_pending_edit() {
        let mut panel = booted();
        panel.control_edited(&level(), 6.0);
        panel.control_edited(&level(), 7.0);
        let renders = panel.ports().renders.len();
        panel.on_render_failed();
        assert_eq!(panel.ports().renders.len(), renders + 1);
        assert!(panel.ports().renders.last().unwrap().contains("tank_level=7"));
    }

    #[test]
    fn declined_reset_changes_nothing() {
        let mut panel = booted();
        panel.ports_mut().confirm_answer = false;
        panel.reset_requested();
        assert_eq!(panel.ports().confirms, 1);
        assert_eq!(panel.ports().resets, 0);
        assert_eq!(panel.control_count(), 2);
    }

    #[test]
    fn confirmed_reset_reinitializes_everything() {
        let mut panel = booted();
        panel.auto_refresh_changed(5);
        panel.system_selected("furnace");
        panel.on_config_loaded(DOC).unwrap();
        panel.ports_mut().confirm_answer = true;

        panel.reset_requested();
        assert_eq!(panel.ports().resets, 1);

        let configs = panel.ports().config_fetches;
        panel.on_reset_done();
        assert!(panel.ports().active_timers.is_empty(), "timer did not survive");
        assert_eq!(panel.selected(), "");
        assert_eq!(panel.ports().config_fetches, configs + 1);
        assert_eq!(panel.auto_refresh_secs(), 0);

        panel.on_config_loaded(DOC).unwrap();
        assert_eq!(panel.ports().live, ["tank_level", "heater_power"]);
    }

    #[test]
    fn apply_parameter_uses_the_single_value_channel() {
        let mut panel = booted();
        panel.apply_parameter(&level(), 3.0);
        assert_eq!(panel.ports().applies, [("tank_level".to_string(), 3.0)]);
        assert!(panel.ports().renders.last().unwrap().contains("tank_level=3"));
    }

    #[test]
    fn malformed_document_keeps_last_known_state() {
        let mut panel = booted();
        assert!(panel.on_config_loaded("{not json").is_err());
        assert_eq!(panel.control_count(), 2, "tree untouched");

        // And a later good document still lands.
        panel.control_edited(&level(), 6.0);
        panel.on_render_loaded();
        assert!(panel.on_config_loaded(DOC).is_ok());
    }

    #[test]
    fn nonces_never_repeat_across_requests() {
        let mut panel = booted();
        panel.control_edited(&level(), 6.0);
        panel.on_render_loaded();
        panel.control_edited(&level(), 7.0);
        panel.on_render_loaded();

        let mut nonces: Vec<&str> = panel
            .ports()
            .renders
            .iter()
            .map(|q| q.rsplit("&t=").next().unwrap())
            .collect();
        let total = nonces.len();
        nonces.sort();
        nonces.dedup();
        assert_eq!(nonces.len(), total);
    }
}

use hashbrown::HashMap;

use crate::catalog::{Catalog, ControlId, System};
use crate::control::ParamControl;
use crate::ports::{SurfacePort, SystemOption, TelemetryRow};

/// Desired control tree for one system: one entry per component, controls in
/// document order. Pure; materialization diffs this against what exists.
pub fn desired_tree(system: &System) -> Vec<DesiredGroup> {
    system
        .components
        .iter()
        .map(|(component, specs)| DesiredGroup {
            component: component.clone(),
            controls: specs
                .iter()
                .map(|spec| ParamControl::new(component, spec))
                .collect(),
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct DesiredGroup {
    pub component: String,
    pub controls: Vec<ParamControl>,
}

// Display order of the live tree: components, then control ids within each.
#[derive(Debug, Clone)]
struct Group {
    component: String,
    order: Vec<ControlId>,
}

/// Keeps the widget tree equal to the active system's components.
///
/// Exactly one live control exists per active parameter spec; stale controls
/// are always destroyed before anything new is created so identifiers never
/// collide and listeners never double up.
#[derive(Debug, Default)]
pub struct Binder {
    groups: Vec<Group>,
    controls: HashMap<ControlId, ParamControl>,
}

impl Binder {
    pub fn new() -> Self {
        Binder::default()
    }

    /// Applies a freshly fetched document: registers selector options,
    /// reconciles the control tree of the active system, rebuilds telemetry.
    /// An unknown `selected` renders options but zero controls.
    pub fn materialize<S: SurfacePort>(
        &mut self,
        catalog: &Catalog,
        selected: &str,
        surface: &mut S,
    ) {
        let active = catalog.resolve_active(selected);
        let active_id = active.map(|(id, _)| id);

        let options: Vec<SystemOption> = catalog
            .systems
            .iter()
            .map(|(id, system)| SystemOption {
                id: id.clone(),
                label: system.description.clone(),
                selected: active_id == Some(id.as_str()),
            })
            .collect();
        surface.set_system_options(&options);

        let desired = match active {
            Some((_, system)) => desired_tree(system),
            None => Vec::new(),
        };
        self.reconcile(desired, surface);

        match active {
            Some((_, system)) => self.rebuild_telemetry(system, surface),
            None => surface.set_telemetry(&[]),
        }
    }

    /// Moves every existing slider to the document's current value without
    /// creating or destroying anything, then rebuilds telemetry. Idempotent;
    /// the caller holds the updating guard while this runs so the slider
    /// moves cannot re-enter the refresh path.
    pub fn resync<S: SurfacePort>(&mut self, catalog: &Catalog, selected: &str, surface: &mut S) {
        let Some((_, system)) = catalog.resolve_active(selected) else {
            return;
        };
        for group in &self.groups {
            for id in &group.order {
                let Some(ctl) = self.controls.get_mut(id) else {
                    continue;
                };
                // A parameter the new document no longer carries keeps its
                // last-known position.
                let Some(spec) = system.param(&ctl.component, &ctl.spec.name) else {
                    continue;
                };
                let target = ctl.spec.clamp(spec.effective_value());
                if ctl.value() != target {
                    ctl.set_value(target);
                    surface.set_slider_value(id, target);
                    surface.set_readout(id, &ctl.readout());
                }
            }
        }
        self.rebuild_telemetry(system, surface);
    }

    /// Destroys every live control and grouping and empties the selector.
    pub fn teardown<S: SurfacePort>(&mut self, surface: &mut S) {
        for group in &self.groups {
            for id in &group.order {
                if self.controls.remove(id).is_some() {
                    surface.destroy_control(id);
                }
            }
            surface.remove_group(&group.component);
        }
        self.groups.clear();
        self.controls.clear();
        surface.set_system_options(&[]);
    }

    pub fn control(&self, id: &ControlId) -> Option<&ParamControl> {
        self.controls.get(id)
    }

    pub fn control_mut(&mut self, id: &ControlId) -> Option<&mut ParamControl> {
        self.controls.get_mut(id)
    }

    pub fn control_count(&self) -> usize {
        self.controls.len()
    }

    /// Live values in display order, for building a rendering query.
    pub fn live_values(&self) -> Vec<(ControlId, f64)> {
        let mut out = Vec::with_capacity(self.controls.len());
        for group in &self.groups {
            for id in &group.order {
                if let Some(ctl) = self.controls.get(id) {
                    out.push((id.clone(), ctl.value()));
                }
            }
        }
        out
    }

    fn reconcile<S: SurfacePort>(&mut self, desired: Vec<DesiredGroup>, surface: &mut S) {
        let mut old_controls = std::mem::take(&mut self.controls);
        let old_groups = std::mem::take(&mut self.groups);

        // The surface appends groups; any change to the component list
        // rebuilds the whole tree so display order follows the document.
        // Stale controls go first, so every dead identifier is free before
        // anything new is created.
        let same_layout = old_groups.len() == desired.len()
            && old_groups
                .iter()
                .zip(&desired)
                .all(|(old, want)| old.component == want.component);
        if !same_layout {
            for group in &old_groups {
                for id in &group.order {
                    if old_controls.remove(id).is_some() {
                        surface.destroy_control(id);
                    }
                }
                surface.remove_group(&group.component);
            }
            for want in desired {
                surface.add_group(&want.component);
                self.populate_group(want, surface);
            }
            return;
        }

        for (old, want) in old_groups.iter().zip(desired) {
            let unchanged = old.order.len() == want.controls.len()
                && old.order.iter().zip(&want.controls).all(|(id, ctl)| {
                    id == &ctl.id
                        && old_controls
                            .get(id)
                            .is_some_and(|c| c.same_shape(&want.component, &ctl.spec))
                });
            if unchanged {
                // Keep the affordances; only move values that drifted.
                let mut order = Vec::with_capacity(want.controls.len());
                for ctl in want.controls {
                    match old_controls.remove(&ctl.id) {
                        Some(mut live) => {
                            if live.value() != ctl.value() {
                                live.set_value(ctl.value());
                                surface.set_slider_value(&live.id, live.value());
                                surface.set_readout(&live.id, &live.readout());
                            }
                            order.push(live.id.clone());
                            self.controls.insert(live.id.clone(), live);
                        }
                        None => {
                            surface.create_control(&want.component, &ctl);
                            order.push(ctl.id.clone());
                            self.controls.insert(ctl.id.clone(), ctl);
                        }
                    }
                }
                self.groups.push(Group {
                    component: want.component,
                    order,
                });
            } else {
                // Same grouping, different contents: rebuild inside it.
                for id in &old.order {
                    if old_controls.remove(id).is_some() {
                        surface.destroy_control(id);
                    }
                }
                self.populate_group(want, surface);
            }
        }
    }

    fn populate_group<S: SurfacePort>(&mut self, want: DesiredGroup, surface: &mut S) {
        let mut order = Vec::with_capacity(want.controls.len());
        for ctl in want.controls {
            surface.create_control(&want.component, &ctl);
            order.push(ctl.id.clone());
            self.controls.insert(ctl.id.clone(), ctl);
        }
        self.groups.push(Group {
            component: want.component,
            order,
        });
    }

    fn rebuild_telemetry<S: SurfacePort>(&self, system: &System, surface: &mut S) {
        let mut rows = Vec::new();
        for specs in system.values.values() {
            for spec in specs {
                let title = if spec.title.is_empty() {
                    spec.name.clone()
                } else {
                    spec.title.clone()
                };
                rows.push(TelemetryRow {
                    title,
                    text: telemetry_text(spec.effective_value(), &spec.unit),
                });
            }
        }
        surface.set_telemetry(&rows);
    }
}

fn telemetry_text(value: f64, unit: &str) -> String {
    if unit.is_empty() {
        format!("{value:.1}")
    } else {
        format!("{value:.1} {unit}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;

    #[derive(Default)]
    struct FakeSurface {
        options: Vec<SystemOption>,
        groups: Vec<String>,
        live: Vec<String>,
        created: usize,
        destroyed: usize,
        slider_moves: Vec<(String, f64)>,
        telemetry: Vec<TelemetryRow>,
    }

    impl SurfacePort for FakeSurface {
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
            assert!(
                !self.live.contains(&control.id.to_string()),
                "created twice: {}",
                control.id
            );
            self.live.push(control.id.to_string());
            self.created += 1;
        }
        fn destroy_control(&mut self, id: &ControlId) {
            let before = self.live.len();
            self.live.retain(|l| l != id.as_str());
            assert_eq!(before, self.live.len() + 1, "destroyed unknown: {id}");
            self.destroyed += 1;
        }
        fn set_slider_value(&mut self, id: &ControlId, value: f64) {
            assert!(self.live.contains(&id.to_string()), "moved unknown: {id}");
            self.slider_moves.push((id.to_string(), value));
        }
        fn set_readout(&mut self, _id: &ControlId, _text: &str) {}
        fn set_telemetry(&mut self, rows: &[TelemetryRow]) {
            self.telemetry = rows.to_vec();
        }
        fn swap_artifact(&mut self) {}
        fn confirm(&mut self, _message: &str) -> bool {
            true
        }
    }

    fn doc() -> Catalog {
        Catalog::from_json(
            r#"{
            "tank": {
                "Description": "Holding tank",
                "Components": {
                    "tank": [
                        {"Name": "level", "Title": "Level", "Minimum": 0,
                         "Maximum": 10, "Step": 1, "Default": 5, "Unit": "m"},
                        {"Name": "drain", "Title": "Drain Rate", "Minimum": 0,
                         "Maximum": 3, "Step": 0.5, "Default": 1, "Unit": "l/s"}
                    ],
                    "heater": [
                        {"Name": "power", "Title": "Power", "Minimum": 0,
                         "Maximum": 2000, "Step": 100, "Default": 400,
                         "Unit": "W"}
                    ]
                },
                "Values": {
                    "sensors": [
                        {"Name": "temperature", "Title": "Temperature",
                         "Unit": "degC", "Value": 21.37}
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
        }"#,
        )
        .unwrap()
    }

    #[test]
    fn materialize_builds_one_control_per_spec() {
        let catalog = doc();
        let mut surface = FakeSurface::default();
        let mut binder = Binder::new();
        binder.materialize(&catalog, "", &mut surface);

        assert_eq!(binder.control_count(), 3);
        assert_eq!(surface.live, ["tank_level", "tank_drain", "heater_power"]);
        assert_eq!(surface.groups, ["tank", "heater"]);

        assert_eq!(surface.options.len(), 2);
        assert_eq!(surface.options[0].label, "Holding tank");
        assert!(surface.options[0].selected);
        assert!(!surface.options[1].selected);
    }

    #[test]
    fn switching_systems_leaves_no_stale_controls() {
        let catalog = doc();
        let mut surface = FakeSurface::default();
        let mut binder = Binder::new();
        binder.materialize(&catalog, "", &mut surface);
        binder.materialize(&catalog, "furnace", &mut surface);

        assert_eq!(binder.control_count(), 1);
        assert_eq!(surface.live, ["valve_flow"]);
        assert_eq!(surface.groups, ["valve"]);
        assert_eq!(surface.destroyed, 3);
        assert!(surface.options[1].selected);
    }

    #[test]
    fn switching_systems_keeps_the_documents_component_order() {
        // Both systems carry a "pid" component with an identical spec. After
        // the switch it must sit where the brewer declares it, not keep the
        // slot it had under the mixer.
        let catalog = Catalog::from_json(
            r#"{
            "mixer": {
                "Description": "Mixer",
                "Components": {
                    "pid": [
                        {"Name": "setpoint", "Title": "Setpoint", "Minimum": 0,
                         "Maximum": 100, "Step": 1, "Default": 50, "Unit": "degC"}
                    ],
                    "motor": [
                        {"Name": "speed", "Title": "Speed", "Minimum": 0,
                         "Maximum": 3000, "Step": 10, "Default": 1200, "Unit": "rpm"}
                    ]
                }
            },
            "brewer": {
                "Description": "Brewer",
                "Components": {
                    "drum": [
                        {"Name": "load", "Title": "Load", "Minimum": 0,
                         "Maximum": 8, "Step": 1, "Default": 4, "Unit": "kg"}
                    ],
                    "pid": [
                        {"Name": "setpoint", "Title": "Setpoint", "Minimum": 0,
                         "Maximum": 100, "Step": 1, "Default": 50, "Unit": "degC"}
                    ]
                }
            }
        }"#,
        )
        .unwrap();
        let mut surface = FakeSurface::default();
        let mut binder = Binder::new();
        binder.materialize(&catalog, "mixer", &mut surface);
        assert_eq!(surface.groups, ["pid", "motor"]);

        binder.materialize(&catalog, "brewer", &mut surface);
        assert_eq!(surface.groups, ["drum", "pid"]);
        assert_eq!(surface.live, ["drum_load", "pid_setpoint"]);
        assert_eq!(surface.destroyed, 2);

        let ids: Vec<String> = binder
            .live_values()
            .iter()
            .map(|(id, _)| id.to_string())
            .collect();
        assert_eq!(ids, ["drum_load", "pid_setpoint"]);
    }

    #[test]
    fn unknown_selection_renders_options_but_no_controls() {
        let catalog = doc();
        let mut surface = FakeSurface::default();
        let mut binder = Binder::new();
        binder.materialize(&catalog, "missing", &mut surface);

        assert_eq!(binder.control_count(), 0);
        assert!(surface.live.is_empty());
        assert_eq!(surface.options.len(), 2);
        assert!(surface.options.iter().all(|o| !o.selected));
        assert!(surface.telemetry.is_empty());
    }

    #[test]
    fn rematerialize_with_same_shapes_moves_values_instead_of_rebuilding() {
        let mut catalog = doc();
        let mut surface = FakeSurface::default();
        let mut binder = Binder::new();
        binder.materialize(&catalog, "", &mut surface);
        assert_eq!(surface.created, 3);

        catalog.systems["tank"]
            .param_mut("tank", "level")
            .unwrap()
            .value = Some(8.0);
        binder.materialize(&catalog, "", &mut surface);

        assert_eq!(surface.created, 3, "no control was recreated");
        assert_eq!(surface.destroyed, 0);
        assert_eq!(surface.slider_moves, [("tank_level".to_string(), 8.0)]);
    }

    #[test]
    fn rematerialize_with_changed_bounds_rebuilds_that_group() {
        let mut catalog = doc();
        let mut surface = FakeSurface::default();
        let mut binder = Binder::new();
        binder.materialize(&catalog, "", &mut surface);

        catalog.systems["tank"]
            .param_mut("heater", "power")
            .unwrap()
            .maximum = 3000.0;
        binder.materialize(&catalog, "", &mut surface);

        assert_eq!(surface.destroyed, 1);
        assert_eq!(surface.created, 4);
        assert_eq!(binder.control_count(), 3);
        assert_eq!(
            binder
                .control(&ControlId::new("heater", "power"))
                .unwrap()
                .spec
                .maximum,
            3000.0
        );
    }

    #[test]
    fn resync_moves_sliders_without_touching_the_tree() {
        let mut catalog = doc();
        let mut surface = FakeSurface::default();
        let mut binder = Binder::new();
        binder.materialize(&catalog, "", &mut surface);
        let created = surface.created;

        catalog.systems["tank"]
            .param_mut("tank", "drain")
            .unwrap()
            .value = Some(2.5);
        binder.resync(&catalog, "", &mut surface);

        assert_eq!(surface.created, created);
        assert_eq!(surface.destroyed, 0);
        assert_eq!(surface.slider_moves, [("tank_drain".to_string(), 2.5)]);

        // Running it again against the same document is a no-op.
        binder.resync(&catalog, "", &mut surface);
        assert_eq!(surface.slider_moves.len(), 1);
    }

    #[test]
    fn resync_skips_parameters_the_document_dropped() {
        let mut catalog = doc();
        let mut surface = FakeSurface::default();
        let mut binder = Binder::new();
        binder.materialize(&catalog, "", &mut surface);

        catalog.systems["tank"].components.shift_remove("heater");
        binder.resync(&catalog, "", &mut surface);

        assert_eq!(binder.control_count(), 3, "resync never destroys");
        assert!(surface.slider_moves.is_empty());
    }

    #[test]
    fn telemetry_rows_format_value_and_unit() {
        let catalog = doc();
        let mut surface = FakeSurface::default();
        let mut binder = Binder::new();
        binder.materialize(&catalog, "", &mut surface);

        assert_eq!(surface.telemetry.len(), 1);
        assert_eq!(surface.telemetry[0].title, "Temperature");
        assert_eq!(surface.telemetry[0].text, "21.4 degC");
    }

    #[test]
    fn teardown_completeness() {
        let catalog = doc();
        let mut surface = FakeSurface::default();
        let mut binder = Binder::new();
        binder.materialize(&catalog, "", &mut surface);
        binder.teardown(&mut surface);

        assert_eq!(binder.control_count(), 0);
        assert!(surface.live.is_empty());
        assert!(surface.groups.is_empty());
        assert!(surface.options.is_empty());
        assert!(binder.live_values().is_empty());
    }

    #[test]
    fn live_values_follow_display_order() {
        let catalog = doc();
        let mut surface = FakeSurface::default();
        let mut binder = Binder::new();
        binder.materialize(&catalog, "", &mut surface);

        let ids: Vec<String> = binder
            .live_values()
            .iter()
            .map(|(id, _)| id.to_string())
            .collect();
        assert_eq!(ids, ["tank_level", "tank_drain", "heater_power"]);
    }
}

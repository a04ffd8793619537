use simmer::catalog::{Catalog, ControlId, System};
use simmer::control::{fmt_value, ParamControl, StepDirection};
use simmer::panel::Panel;
use simmer::ports::{
    FetchPort, SurfacePort, SystemOption, TelemetryRow, TimerHandle, TimerPort,
};
use simmer::refresh::RenderQuery;

fn main() {
    let args: Vec<String> = std::env::args().collect();
    if args.len() >= 2 && (args[1] == "--help" || args[1] == "-h" || args[1] == "help") {
        print_help();
        return;
    }
    if args.len() >= 2 {
        eprintln!("Unknown command: {}", args[1]);
        print_help();
        std::process::exit(2);
    }

    // Scripted session with the server played by this process:
    // - boot builds the control tree from a canned document
    // - a burst of slider edits collapses to a single follow-up fetch
    // - applied values come back through the document resync
    // - a timer tick and a reset round out the tour
    run_session();
}

fn print_help() {
    println!("simmer (control panel engine, scripted demo)");
    println!("usage:");
    println!("  cargo run");
    println!("  cargo run -- --help");
}

const DOC: &str = r#"{
    "kettle": {
        "Description": "Electric kettle",
        "Type": 0,
        "Components": {
            "kettle": [
                {"Name": "volume", "Title": "Volume", "Minimum": 0,
                 "Maximum": 20, "Step": 1, "Default": 10, "Unit": "L"},
                {"Name": "ambient", "Title": "Ambient Temperature", "Minimum": 0,
                 "Maximum": 30, "Step": 2, "Default": 25, "Unit": "degC"}
            ],
            "pid": [
                {"Name": "setpoint", "Title": "Setpoint", "Minimum": 0,
                 "Maximum": 100, "Step": 1, "Default": 80, "Unit": "degC"},
                {"Name": "kp", "Title": "Proportional Gain", "Minimum": 0,
                 "Maximum": 10000, "Step": 10, "Default": 6000, "Unit": "W/deg"}
            ]
        },
        "Values": {
            "kettle": [
                {"Name": "temperature", "Title": "Temperature",
                 "Unit": "degC", "Value": 26.5}
            ]
        }
    }
}"#;

fn run_session() {
    let mut doc = match Catalog::from_json(DOC) {
        Ok(doc) => doc,
        Err(err) => {
            eprintln!("canned document rejected: {err}");
            std::process::exit(1);
        }
    };
    let mut panel = Panel::new(TracePorts::default(), 0);

    stage("boot");
    panel.start("");
    respond_config(&mut panel, &doc);
    respond_render(&mut panel, &mut doc);
    respond_config(&mut panel, &doc);
    report(&panel);

    stage("drag the volume slider (three moves, one in-flight request)");
    let volume = ControlId::new("kettle", "volume");
    panel.control_edited(&volume, 12.0);
    panel.control_edited(&volume, 14.0);
    panel.control_edited(&volume, 16.0);
    report(&panel);
    respond_render(&mut panel, &mut doc);
    respond_config(&mut panel, &doc);
    respond_render(&mut panel, &mut doc);
    respond_config(&mut panel, &doc);
    report(&panel);

    stage("one wheel notch on the setpoint");
    panel.wheel(&ControlId::new("pid", "setpoint"), StepDirection::Up);
    respond_render(&mut panel, &mut doc);
    respond_config(&mut panel, &doc);

    stage("single-value channel");
    panel.apply_parameter(&ControlId::new("kettle", "ambient"), 27.0);
    if let Some((key, value)) = panel.ports_mut().take_pending_apply() {
        if let Some(sys) = active_system_mut(&mut doc, "") {
            apply_pair(sys, &key, value);
        }
    }
    respond_render(&mut panel, &mut doc);
    respond_config(&mut panel, &doc);

    stage("auto refresh on, one tick, then off");
    panel.auto_refresh_changed(5);
    panel.timer_fired();
    respond_render(&mut panel, &mut doc);
    respond_config(&mut panel, &doc);
    panel.auto_refresh_changed(0);

    stage("reset to defaults");
    panel.reset_requested();
    restore_defaults(&mut doc);
    panel.on_reset_done();
    respond_config(&mut panel, &doc);
    respond_render(&mut panel, &mut doc);
    respond_config(&mut panel, &doc);
    report(&panel);
}

fn stage(name: &str) {
    println!();
    println!("== {name}");
}

fn report(panel: &Panel<TracePorts>) {
    println!(
        "   [{:?}, {} live controls]",
        panel.refresh_state(),
        panel.control_count()
    );
}

/// Serves the current document if a config fetch is pending.
fn respond_config(panel: &mut Panel<TracePorts>, doc: &Catalog) {
    if !panel.ports_mut().take_pending_config() {
        return;
    }
    if let Ok(body) = serde_json::to_string(doc) {
        if let Err(err) = panel.on_config_loaded(&body) {
            eprintln!("config rejected: {err}");
        }
    }
}

/// Completes the outstanding rendering fetch if one is pending, storing the
/// query's values in the document the way the real server does.
fn respond_render(panel: &mut Panel<TracePorts>, doc: &mut Catalog) {
    let Some(query) = panel.ports_mut().take_pending_render() else {
        return;
    };
    apply_query(doc, &query);
    panel.on_render_loaded();
}

/// Server side of a rendering query: each `component_param` pair updates the
/// named system's stored value.
fn apply_query(doc: &mut Catalog, query: &str) {
    let mut system = String::new();
    let mut pairs: Vec<(&str, f64)> = Vec::new();
    for piece in query.split('&') {
        let Some((key, raw)) = piece.split_once('=') else {
            continue;
        };
        if key == "systemName" {
            system = raw.to_string();
        } else if key != "t" {
            if let Ok(v) = raw.parse::<f64>() {
                pairs.push((key, v));
            }
        }
    }
    let Some(sys) = active_system_mut(doc, &system) else {
        return;
    };
    for (key, v) in pairs {
        apply_pair(sys, key, v);
    }
}

fn active_system_mut<'a>(doc: &'a mut Catalog, selected: &str) -> Option<&'a mut System> {
    let id = doc.resolve_active(selected).map(|(id, _)| id.to_string())?;
    doc.systems.get_mut(&id)
}

fn apply_pair(sys: &mut System, key: &str, value: f64) {
    let Some((component, name)) = key.split_once('_') else {
        return;
    };
    if let Some(spec) = sys.param_mut(component, name) {
        spec.value = Some(spec.clamp(value));
    }
}

/// Server side of /reset: every stored value back to its default.
fn restore_defaults(doc: &mut Catalog) {
    for system in doc.systems.values_mut() {
        for specs in system.components.values_mut() {
            for spec in specs {
                spec.value = None;
            }
        }
    }
}

/// Stand-in for the browser: prints every effect and remembers which fetches
/// are outstanding so the script can answer them.
#[derive(Default)]
struct TracePorts {
    pending_config: bool,
    pending_render: Option<String>,
    pending_apply: Option<(String, f64)>,
    next_timer: i32,
}

impl TracePorts {
    fn take_pending_config(&mut self) -> bool {
        std::mem::take(&mut self.pending_config)
    }

    fn take_pending_render(&mut self) -> Option<String> {
        self.pending_render.take()
    }

    fn take_pending_apply(&mut self) -> Option<(String, f64)> {
        self.pending_apply.take()
    }
}

impl SurfacePort for TracePorts {
    fn set_system_options(&mut self, options: &[SystemOption]) {
        let labels: Vec<&str> = options.iter().map(|o| o.label.as_str()).collect();
        println!("selector  <- {labels:?}");
    }

    fn add_group(&mut self, component: &str) {
        println!("group     +  {component}");
    }

    fn remove_group(&mut self, component: &str) {
        println!("group     -  {component}");
    }

    fn create_control(&mut self, _component: &str, control: &ParamControl) {
        println!(
            "control   +  {} [{}..{}] starts at {}",
            control.id,
            fmt_value(control.spec.minimum),
            fmt_value(control.spec.maximum),
            control.readout()
        );
    }

    fn destroy_control(&mut self, id: &ControlId) {
        println!("control   -  {id}");
    }

    fn set_slider_value(&mut self, id: &ControlId, value: f64) {
        println!("slider    := {id} at {}", fmt_value(value));
    }

    fn set_readout(&mut self, id: &ControlId, text: &str) {
        println!("readout   := {id} \"{text}\"");
    }

    fn set_telemetry(&mut self, rows: &[TelemetryRow]) {
        for row in rows {
            println!("telemetry := {}: {}", row.title, row.text);
        }
    }

    fn swap_artifact(&mut self) {
        println!("artifact swapped in");
    }

    fn confirm(&mut self, message: &str) -> bool {
        println!("confirm?     {message} -> yes");
        true
    }
}

impl FetchPort for TracePorts {
    fn begin_config(&mut self) {
        println!("GET /config");
        self.pending_config = true;
    }

    fn begin_render(&mut self, query: &RenderQuery) {
        println!("GET /graph?{query}");
        self.pending_render = Some(query.to_string());
    }

    fn begin_apply(&mut self, id: &ControlId, value: f64) {
        println!("GET /set?{id}={}", fmt_value(value));
        self.pending_apply = Some((id.to_string(), value));
    }

    fn begin_reset(&mut self) {
        println!("GET /reset");
    }
}

impl TimerPort for TracePorts {
    fn schedule_repeating(&mut self, secs: u32) -> TimerHandle {
        self.next_timer += 1;
        println!("timer     +  every {secs}s (#{})", self.next_timer);
        TimerHandle(self.next_timer)
    }

    fn cancel(&mut self, handle: TimerHandle) {
        println!("timer     -  #{}", handle.0);
    }
}

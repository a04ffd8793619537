//! The live panel: a Leptos shell for the fixed chrome, DOM-backed ports
//! for everything the configuration document drives.

mod dom_ports;

use std::cell::RefCell;

use leptos::prelude::*;

use simmer::panel::Panel;

use crate::ui_model;
use dom_ports::DomPorts;

thread_local! {
    static PANEL: RefCell<Option<Panel<DomPorts>>> = const { RefCell::new(None) };
}

/// Runs `f` against the live panel, if one has booted.
pub(crate) fn with_panel(f: impl FnOnce(&mut Panel<DomPorts>)) {
    PANEL.with(|cell| {
        if let Some(panel) = cell.borrow_mut().as_mut() {
            f(panel);
        }
    });
}

pub fn start() {
    mount_to_body(|| view! { <App /> });
    boot();
}

fn boot() {
    let Some(ports) = DomPorts::new() else {
        web_sys::console::error_1(&"panel shell is missing its containers".into());
        return;
    };
    // Seed the request nonce off the clock so cached artifacts from an
    // earlier session never answer this one.
    let seed = js_sys::Date::now() as u64;
    PANEL.with(|cell| *cell.borrow_mut() = Some(Panel::new(ports, seed)));
    with_panel(|panel| panel.start(""));
}

#[component]
fn App() -> impl IntoView {
    view! {
        <main style="font-family: system-ui, sans-serif; max-width: 880px; margin: 0 auto; padding: 18px;">
            <h1 style="margin: 0 0 8px 0;">"Process Control Panel"</h1>
            <section style="display: flex; gap: 10px; align-items: center; margin-bottom: 14px;">
                <select id=ui_model::SYSTEM_SELECTOR on:change=move |_| on_system_change()></select>
                <label for=ui_model::AUTO_REFRESH>"Auto refresh (s)"</label>
                <input
                    id=ui_model::AUTO_REFRESH
                    type="number"
                    min="0"
                    max="3600"
                    step="1"
                    value="0"
                    style="width: 5em;"
                    on:change=move |_| on_auto_refresh_change()
                />
                <button on:click=move |_| with_panel(|panel| panel.reset_requested())>
                    "Reset"
                </button>
            </section>
            <section id=ui_model::CONTROL_TABS style="margin-bottom: 14px;">
                <ul id=ui_model::CONTROL_TABS_LIST style="display: flex; gap: 8px; list-style: none; margin: 0 0 10px 0; padding: 0;"></ul>
            </section>
            <section id=ui_model::GRAPH style="margin-bottom: 14px;"></section>
            <section id=ui_model::TELEMETRY></section>
        </main>
    }
}

fn on_system_change() {
    let Some(name) = dom_ports::selector_value() else {
        return;
    };
    with_panel(|panel| panel.system_selected(&name));
}

fn on_auto_refresh_change() {
    let secs = dom_ports::auto_refresh_secs().unwrap_or(0);
    with_panel(|panel| panel.auto_refresh_changed(secs));
}

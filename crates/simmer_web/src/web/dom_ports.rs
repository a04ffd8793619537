//! DOM-backed port implementations. The panel drives these; they drive the
//! document.

use std::cell::RefCell;

use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::{spawn_local, JsFuture};
use web_sys::{Document, Element, HtmlImageElement, HtmlInputElement, HtmlSelectElement};

use simmer::catalog::ControlId;
use simmer::control::{fmt_value, ParamControl, StepDirection};
use simmer::ports::{FetchPort, SurfacePort, SystemOption, TelemetryRow, TimerHandle, TimerPort};
use simmer::refresh::RenderQuery;

use crate::ui_model;

use super::with_panel;

/// Which group is visible. Tab clicks land here, outside the panel: which
/// component the operator is looking at is a view concern only.
struct TabState {
    names: Vec<String>,
    active: Option<String>,
}

thread_local! {
    static TABS: RefCell<TabState> = const {
        RefCell::new(TabState {
            names: Vec::new(),
            active: None,
        })
    };
}

fn document() -> Option<Document> {
    web_sys::window().and_then(|w| w.document())
}

fn apply_tab_classes(state: &TabState, document: &Document) {
    for name in &state.names {
        let active = state.active.as_deref() == Some(name.as_str());
        if let Some(tab) = document.get_element_by_id(&ui_model::tab_id(name)) {
            tab.set_class_name(if active { "control-tab active" } else { "control-tab" });
        }
        if let Some(group) = document.get_element_by_id(&ui_model::group_id(name)) {
            group.set_class_name(if active { "sliders" } else { "sliders hidden" });
        }
    }
}

fn show_group(name: &str) {
    let Some(document) = document() else { return };
    TABS.with(|tabs| {
        let mut tabs = tabs.borrow_mut();
        if tabs.names.iter().any(|n| n == name) {
            tabs.active = Some(name.to_string());
        }
        apply_tab_classes(&tabs, &document);
    });
}

pub(crate) fn selector_value() -> Option<String> {
    let select = document()?.get_element_by_id(ui_model::SYSTEM_SELECTOR)?;
    let select: HtmlSelectElement = select.dyn_into().ok()?;
    Some(select.value())
}

pub(crate) fn auto_refresh_secs() -> Option<u32> {
    let input = document()?.get_element_by_id(ui_model::AUTO_REFRESH)?;
    let input: HtmlInputElement = input.dyn_into().ok()?;
    input.value().trim().parse::<u32>().ok()
}

pub struct DomPorts {
    document: Document,
    // At most one rendering is in flight, so one slot is enough.
    pending: Option<HtmlImageElement>,
}

impl DomPorts {
    /// Binds against the fixed containers the shell renders. Fails when any
    /// of them is missing.
    pub fn new() -> Option<Self> {
        let document = document()?;
        for id in [
            ui_model::SYSTEM_SELECTOR,
            ui_model::CONTROL_TABS,
            ui_model::CONTROL_TABS_LIST,
            ui_model::GRAPH,
            ui_model::TELEMETRY,
        ] {
            document.get_element_by_id(id)?;
        }
        Some(DomPorts {
            document,
            pending: None,
        })
    }

    fn by_id(&self, id: &str) -> Option<Element> {
        self.document.get_element_by_id(id)
    }

    fn create(&self, tag: &str, class: &str) -> Option<Element> {
        let el = self.document.create_element(tag).ok()?;
        if !class.is_empty() {
            el.set_class_name(class);
        }
        Some(el)
    }
}

impl SurfacePort for DomPorts {
    fn set_system_options(&mut self, options: &[SystemOption]) {
        let Some(select) = self.by_id(ui_model::SYSTEM_SELECTOR) else { return };
        select.set_inner_html("");
        for opt in options {
            let Some(el) = self.create("option", "") else { continue };
            let _ = el.set_attribute("value", &opt.id);
            if opt.selected {
                let _ = el.set_attribute("selected", "selected");
            }
            el.set_text_content(Some(&opt.label));
            let _ = select.append_child(&el);
        }
    }

    fn add_group(&mut self, group: &str) {
        let Some(list) = self.by_id(ui_model::CONTROL_TABS_LIST) else { return };
        let Some(tabs) = self.by_id(ui_model::CONTROL_TABS) else { return };

        if let Some(tab) = self.create("li", "control-tab") {
            tab.set_id(&ui_model::tab_id(group));
            tab.set_text_content(Some(group));
            let name = group.to_string();
            let cb = Closure::wrap(Box::new(move || show_group(&name)) as Box<dyn FnMut()>);
            let _ = tab.add_event_listener_with_callback("click", cb.as_ref().unchecked_ref());
            cb.forget();
            let _ = list.append_child(&tab);
        }
        if let Some(panel) = self.create("div", "sliders hidden") {
            panel.set_id(&ui_model::group_id(group));
            let _ = tabs.append_child(&panel);
        }

        let became_first = TABS.with(|tabs| {
            let mut tabs = tabs.borrow_mut();
            tabs.names.push(group.to_string());
            tabs.active.is_none()
        });
        if became_first {
            show_group(group);
        }
    }

    fn remove_group(&mut self, group: &str) {
        if let Some(tab) = self.by_id(&ui_model::tab_id(group)) {
            tab.remove();
        }
        if let Some(panel) = self.by_id(&ui_model::group_id(group)) {
            panel.remove();
        }
        let fallback = TABS.with(|tabs| {
            let mut tabs = tabs.borrow_mut();
            tabs.names.retain(|n| n != group);
            if tabs.active.as_deref() == Some(group) {
                tabs.active = None;
                tabs.names.first().cloned()
            } else {
                None
            }
        });
        if let Some(next) = fallback {
            show_group(&next);
        }
    }

    fn create_control(&mut self, group: &str, ctl: &ParamControl) {
        let Some(container) = self.by_id(&ui_model::group_id(group)) else { return };
        let Some(boxed) = self.create("div", "slider-box") else { return };
        boxed.set_id(&ui_model::box_id(&ctl.id));

        if let Some(header) = self.create("div", "slider-header") {
            header.set_text_content(Some(&ui_model::header_text(&ctl.spec)));
            let _ = boxed.append_child(&header);
        }

        let Some(slider) = self.create("input", "slider") else { return };
        slider.set_id(&ui_model::slider_id(&ctl.id));
        let _ = slider.set_attribute("type", "range");
        let _ = slider.set_attribute("min", &fmt_value(ctl.spec.minimum));
        let _ = slider.set_attribute("max", &fmt_value(ctl.spec.maximum));
        let _ = slider.set_attribute("step", &fmt_value(ctl.spec.step));
        let _ = slider.set_attribute("value", &fmt_value(ctl.value()));
        let Ok(slider) = slider.dyn_into::<HtmlInputElement>() else { return };

        {
            let id = ctl.id.clone();
            let input = slider.clone();
            let cb = Closure::wrap(Box::new(move |_event: web_sys::Event| {
                let Ok(value) = input.value().parse::<f64>() else { return };
                with_panel(|panel| panel.control_edited(&id, value));
            }) as Box<dyn FnMut(web_sys::Event)>);
            let _ = slider.add_event_listener_with_callback("input", cb.as_ref().unchecked_ref());
            cb.forget();
        }
        {
            let id = ctl.id.clone();
            let cb = Closure::wrap(Box::new(move |event: web_sys::WheelEvent| {
                event.prevent_default();
                let direction = if event.delta_y() < 0.0 {
                    StepDirection::Up
                } else {
                    StepDirection::Down
                };
                with_panel(|panel| panel.wheel(&id, direction));
            }) as Box<dyn FnMut(web_sys::WheelEvent)>);
            let _ = slider.add_event_listener_with_callback("wheel", cb.as_ref().unchecked_ref());
            cb.forget();
        }
        let _ = boxed.append_child(&slider);

        if let Some(readout) = self.create("div", "slider-value") {
            readout.set_id(&ui_model::readout_id(&ctl.id));
            readout.set_text_content(Some(&ctl.readout()));
            let _ = boxed.append_child(&readout);
        }
        let _ = container.append_child(&boxed);
    }

    fn destroy_control(&mut self, id: &ControlId) {
        if let Some(boxed) = self.by_id(&ui_model::box_id(id)) {
            boxed.remove();
        }
    }

    fn set_slider_value(&mut self, id: &ControlId, value: f64) {
        let Some(slider) = self.by_id(&ui_model::slider_id(id)) else { return };
        let Ok(slider) = slider.dyn_into::<HtmlInputElement>() else { return };
        slider.set_value(&fmt_value(value));
    }

    fn set_readout(&mut self, id: &ControlId, text: &str) {
        if let Some(readout) = self.by_id(&ui_model::readout_id(id)) {
            readout.set_text_content(Some(text));
        }
    }

    fn set_telemetry(&mut self, rows: &[TelemetryRow]) {
        let Some(container) = self.by_id(ui_model::TELEMETRY) else { return };
        container.set_inner_html("");
        for row in rows {
            let Some(div) = self.create("div", "telemetry-row") else { continue };
            if let Some(title) = self.create("span", "telemetry-title") {
                title.set_text_content(Some(&row.title));
                let _ = div.append_child(&title);
            }
            if let Some(text) = self.create("span", "telemetry-text") {
                text.set_text_content(Some(&row.text));
                let _ = div.append_child(&text);
            }
            let _ = container.append_child(&div);
        }
    }

    fn swap_artifact(&mut self) {
        let Some(img) = self.pending.take() else { return };
        let Some(graph) = self.by_id(ui_model::GRAPH) else { return };
        if let Some(previous) = graph.first_child() {
            let _ = graph.remove_child(&previous);
        }
        let _ = graph.append_child(&img);
    }

    fn confirm(&mut self, message: &str) -> bool {
        web_sys::window()
            .and_then(|w| w.confirm_with_message(message).ok())
            .unwrap_or(false)
    }
}

impl FetchPort for DomPorts {
    fn begin_config(&mut self) {
        spawn_local(async {
            match fetch_text(ui_model::config_url().to_string()).await {
                Ok(body) => with_panel(|panel| {
                    if let Err(err) = panel.on_config_loaded(&body) {
                        web_sys::console::error_1(
                            &format!("configuration rejected: {err}").into(),
                        );
                    }
                }),
                Err(err) => {
                    web_sys::console::warn_1(&format!("configuration fetch failed: {err}").into());
                    with_panel(|panel| panel.on_config_failed());
                }
            }
        });
    }

    fn begin_render(&mut self, query: &RenderQuery) {
        let Ok(img) = HtmlImageElement::new() else { return };

        let onload = Closure::wrap(Box::new(move || {
            with_panel(|panel| panel.on_render_loaded());
        }) as Box<dyn FnMut()>);
        img.set_onload(Some(onload.as_ref().unchecked_ref()));
        onload.forget();

        let onerror = Closure::wrap(Box::new(move || {
            with_panel(|panel| panel.on_render_failed());
        }) as Box<dyn FnMut()>);
        img.set_onerror(Some(onerror.as_ref().unchecked_ref()));
        onerror.forget();

        img.set_src(&ui_model::render_url(query));
        self.pending = Some(img);
    }

    fn begin_apply(&mut self, id: &ControlId, value: f64) {
        let url = ui_model::apply_url(&selector_value().unwrap_or_default(), id, value);
        spawn_local(async move {
            if let Err(err) = fetch_text(url).await {
                web_sys::console::warn_1(&format!("apply failed: {err}").into());
            }
        });
    }

    fn begin_reset(&mut self) {
        spawn_local(async {
            match fetch_text(ui_model::reset_url().to_string()).await {
                Ok(_) => with_panel(|panel| panel.on_reset_done()),
                Err(err) => {
                    web_sys::console::warn_1(&format!("reset failed: {err}").into());
                }
            }
        });
    }
}

impl TimerPort for DomPorts {
    fn schedule_repeating(&mut self, secs: u32) -> TimerHandle {
        let Some(window) = web_sys::window() else {
            return TimerHandle(0);
        };
        let cb = Closure::wrap(Box::new(move || {
            with_panel(|panel| panel.timer_fired());
        }) as Box<dyn FnMut()>);
        let millis = secs.saturating_mul(1000).min(i32::MAX as u32) as i32;
        let id = window
            .set_interval_with_callback_and_timeout_and_arguments_0(
                cb.as_ref().unchecked_ref(),
                millis,
            )
            .unwrap_or(0);
        cb.forget();
        TimerHandle(id)
    }

    fn cancel(&mut self, handle: TimerHandle) {
        if let Some(window) = web_sys::window() {
            window.clear_interval_with_handle(handle.0);
        }
    }
}

async fn fetch_text(url: String) -> Result<String, String> {
    let window = web_sys::window().ok_or_else(|| "no window".to_string())?;
    let resp = JsFuture::from(window.fetch_with_str(&url))
        .await
        .map_err(|_| format!("request failed: {url}"))?;
    let resp: web_sys::Response = resp
        .dyn_into()
        .map_err(|_| "fetch returned a non-Response".to_string())?;
    if !resp.ok() {
        return Err(format!("status {} for {url}", resp.status()));
    }
    let body = resp.text().map_err(|_| format!("no body stream for {url}"))?;
    let text = JsFuture::from(body)
        .await
        .map_err(|_| format!("body read failed for {url}"))?;
    text.as_string()
        .ok_or_else(|| "body is not text".to_string())
}

//! Server-side rendering of the process trace as an SVG artifact.

use std::fmt::Write as _;

use simmer::catalog::System;

const WIDTH: u32 = 640;
const HEIGHT: u32 = 400;
const MARGIN: f64 = 40.0;
const SAMPLES: usize = 120;
const SPAN_SECS: f64 = 600.0;

fn param_or_default(system: &System, component: &str, name: &str, fallback: f64) -> f64 {
    system
        .param(component, name)
        .map(|spec| spec.effective_value())
        .unwrap_or(fallback)
}

// System names come from operator-supplied catalogs and land in a text node.
// Ampersand first, so escapes are not themselves escaped.
fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

/// Simulated temperature trace over the plotted window. First-order response
/// toward the setpoint; the time constant grows with liquid volume and
/// shrinks with thermal loss.
pub fn trace(system: &System) -> Vec<(f64, f64)> {
    let start = param_or_default(system, "kettle", "temperature", 25.0);
    let setpoint = param_or_default(system, "pid", "setpoint", 80.0);
    let volume = param_or_default(system, "kettle", "volume", 10.0);
    let loss = param_or_default(system, "kettle", "thermal_loss", 13.0);

    let tau = 30.0 + volume * 12.0 + (30.0 - loss.min(30.0)) * 2.0;
    (0..SAMPLES)
        .map(|i| {
            let t = SPAN_SECS * i as f64 / (SAMPLES - 1) as f64;
            (t, setpoint + (start - setpoint) * (-t / tau).exp())
        })
        .collect()
}

/// Renders the trace for `name` as a standalone SVG document.
pub fn render(name: &str, system: &System) -> String {
    let points = trace(system);
    let setpoint = param_or_default(system, "pid", "setpoint", 80.0);

    let mut lo = f64::INFINITY;
    let mut hi = f64::NEG_INFINITY;
    for &(_, v) in &points {
        lo = lo.min(v);
        hi = hi.max(v);
    }
    lo = lo.min(setpoint);
    hi = hi.max(setpoint);
    let pad = (hi - lo).max(1.0) * 0.1;
    let lo = lo - pad;
    let hi = hi + pad;

    let plot_w = WIDTH as f64 - 2.0 * MARGIN;
    let plot_h = HEIGHT as f64 - 2.0 * MARGIN;
    let x_of = |t: f64| MARGIN + plot_w * t / SPAN_SECS;
    let y_of = |v: f64| HEIGHT as f64 - MARGIN - plot_h * (v - lo) / (hi - lo);

    let mut svg = String::new();
    let _ = write!(
        svg,
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{WIDTH}\" height=\"{HEIGHT}\" viewBox=\"0 0 {WIDTH} {HEIGHT}\">"
    );
    let _ = write!(
        svg,
        "<rect x=\"0\" y=\"0\" width=\"{WIDTH}\" height=\"{HEIGHT}\" fill=\"#ffffff\"/>"
    );
    let _ = write!(
        svg,
        "<line x1=\"{m}\" y1=\"{m}\" x2=\"{m}\" y2=\"{b}\" stroke=\"#444\" stroke-width=\"1\"/>",
        m = MARGIN,
        b = HEIGHT as f64 - MARGIN
    );
    let _ = write!(
        svg,
        "<line x1=\"{m}\" y1=\"{b}\" x2=\"{r}\" y2=\"{b}\" stroke=\"#444\" stroke-width=\"1\"/>",
        m = MARGIN,
        b = HEIGHT as f64 - MARGIN,
        r = WIDTH as f64 - MARGIN
    );

    let sp_y = y_of(setpoint);
    let _ = write!(
        svg,
        "<line x1=\"{m}\" y1=\"{sp_y:.1}\" x2=\"{r}\" y2=\"{sp_y:.1}\" stroke=\"#999\" stroke-width=\"1\" stroke-dasharray=\"6 4\"/>",
        m = MARGIN,
        r = WIDTH as f64 - MARGIN
    );

    svg.push_str("<polyline fill=\"none\" stroke=\"#1565c0\" stroke-width=\"2\" points=\"");
    for (i, &(t, v)) in points.iter().enumerate() {
        if i > 0 {
            svg.push(' ');
        }
        let _ = write!(svg, "{:.1},{:.1}", x_of(t), y_of(v));
    }
    svg.push_str("\"/>");

    let _ = write!(
        svg,
        "<text x=\"{m}\" y=\"24\" font-family=\"sans-serif\" font-size=\"16\" fill=\"#222\">{title}: temperature</text>",
        m = MARGIN,
        title = xml_escape(name)
    );
    let _ = write!(
        svg,
        "<text x=\"4\" y=\"{y:.1}\" font-family=\"sans-serif\" font-size=\"11\" fill=\"#666\">{hi:.0}</text>",
        y = MARGIN + 4.0
    );
    let _ = write!(
        svg,
        "<text x=\"4\" y=\"{y:.1}\" font-family=\"sans-serif\" font-size=\"11\" fill=\"#666\">{lo:.0}</text>",
        y = HEIGHT as f64 - MARGIN
    );
    svg.push_str("</svg>");
    svg
}

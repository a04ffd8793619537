use crate::catalog::{ControlId, ParamSpec};

/// Direction of one wheel notch over a control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepDirection {
    Up,
    Down,
}

/// Live state for one slider: the spec it was built from plus the value the
/// affordance currently shows.
#[derive(Debug, Clone)]
pub struct ParamControl {
    pub id: ControlId,
    pub component: String,
    pub spec: ParamSpec,
    value: f64,
}

impl ParamControl {
    pub fn new(component: &str, spec: &ParamSpec) -> Self {
        let value = spec.clamp(spec.effective_value());
        ParamControl {
            id: ControlId::new(component, &spec.name),
            component: component.to_string(),
            spec: spec.clone(),
            value,
        }
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    /// Sets the value, clamped to the spec bounds. Returns the value the
    /// control actually took.
    pub fn set_value(&mut self, v: f64) -> f64 {
        self.value = self.spec.clamp(v);
        self.value
    }

    /// One wheel notch: exactly one step, clamped.
    ///
    /// Stepping works on the step grid (min + k·step) rather than by adding
    /// the raw step, so repeated notches on fractional steps do not
    /// accumulate float error in the readout.
    pub fn nudge(&mut self, direction: StepDirection) -> f64 {
        let steps = ((self.value - self.spec.minimum) / self.spec.step).round();
        let steps = match direction {
            StepDirection::Up => steps + 1.0,
            StepDirection::Down => steps - 1.0,
        };
        let mut v = self.spec.minimum + steps * self.spec.step;
        if let Some(decimals) = step_decimals(self.spec.step) {
            let scale = 10f64.powi(decimals);
            v = (v * scale).round() / scale;
        }
        self.set_value(v)
    }

    /// Readout text shown beside the slider: the value immediately followed
    /// by the unit, `10L` style.
    pub fn readout(&self) -> String {
        format!("{}{}", fmt_value(self.value), self.spec.unit)
    }

    /// True when `spec` would produce an identical affordance, so an existing
    /// control can be kept across a configuration reload.
    pub fn same_shape(&self, component: &str, spec: &ParamSpec) -> bool {
        self.component == component
            && self.spec.name == spec.name
            && self.spec.title == spec.title
            && self.spec.minimum == spec.minimum
            && self.spec.maximum == spec.maximum
            && self.spec.step == spec.step
            && self.spec.unit == spec.unit
    }
}

/// Formats a value the way the affordance shows it (and the way it travels in
/// a rendering query): shortest plain decimal, no trailing zeros.
pub fn fmt_value(v: f64) -> String {
    format!("{v}")
}

// Decimal places of the step size, read off its shortest representation.
// None for steps that only print in exponent form; those stay unsnapped.
fn step_decimals(step: f64) -> Option<i32> {
    let s = fmt_value(step);
    if s.contains(['e', 'E']) {
        return None;
    }
    Some(s.split_once('.').map_or(0, |(_, frac)| frac.len() as i32))
}

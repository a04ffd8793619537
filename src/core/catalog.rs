use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The configuration document: a mapping from system identifier to
/// [`System`], in server order. The order is meaningful; an empty selection
/// activates the first system the document lists.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Catalog {
    pub systems: IndexMap<String, System>,
}

/// One server-described configurable entity.
///
/// Field names follow the wire format, which the controller produces and this
/// crate only mirrors.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct System {
    pub description: String,

    // Run-mode discriminator (0 = realtime, 1 = simulation). Carried through
    // untouched.
    #[serde(rename = "Type")]
    pub run_type: i32,

    /// Adjustable parameters, grouped by component, in document order.
    pub components: IndexMap<String, Vec<ParamSpec>>,

    /// Read-only telemetry, grouped the same way. Not validated against the
    /// slider invariants; telemetry rows routinely omit bounds and step.
    pub values: IndexMap<String, Vec<ParamSpec>>,
}

/// Server-described bounds and default for one numeric quantity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ParamSpec {
    pub name: String,
    pub title: String,
    pub minimum: f64,
    pub maximum: f64,
    pub step: f64,
    pub default: f64,
    pub unit: String,
    /// Current value; absent means "still at default".
    pub value: Option<f64>,
}

/// Identifier of one live control: `component` + `_` + `parameter`.
///
/// The server splits these on the *first* underscore, so component names must
/// not contain one; parameter names may (`thermal_loss` does).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ControlId(String);

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("malformed configuration document: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("{system}/{component}/{name}: step must be > 0, got {step}")]
    BadStep {
        system: String,
        component: String,
        name: String,
        step: f64,
    },
    #[error("{system}/{component}/{name}: value {value} outside [{minimum}, {maximum}]")]
    OutOfRange {
        system: String,
        component: String,
        name: String,
        value: f64,
        minimum: f64,
        maximum: f64,
    },
    #[error("{system}: component name {component:?} contains an underscore")]
    ComponentName { system: String, component: String },
    #[error("{system}/{component}: duplicate parameter name {name:?}")]
    DuplicateName {
        system: String,
        component: String,
        name: String,
    },
}

impl Catalog {
    /// Parses and validates a configuration document.
    pub fn from_json(body: &str) -> Result<Self, CatalogError> {
        let catalog: Catalog = serde_json::from_str(body)?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Resolves the active system: exact identifier match, or the first
    /// system in document order when `selected` is empty. An unknown
    /// identifier resolves to none.
    pub fn resolve_active(&self, selected: &str) -> Option<(&str, &System)> {
        if selected.is_empty() {
            self.systems.first().map(|(id, s)| (id.as_str(), s))
        } else {
            self.systems
                .get_key_value(selected)
                .map(|(id, s)| (id.as_str(), s))
        }
    }

    fn validate(&self) -> Result<(), CatalogError> {
        for (id, system) in &self.systems {
            for (component, specs) in &system.components {
                if component.contains('_') {
                    return Err(CatalogError::ComponentName {
                        system: id.clone(),
                        component: component.clone(),
                    });
                }
                for (i, spec) in specs.iter().enumerate() {
                    spec.validate(id, component)?;
                    if specs[..i].iter().any(|other| other.name == spec.name) {
                        return Err(CatalogError::DuplicateName {
                            system: id.clone(),
                            component: component.clone(),
                            name: spec.name.clone(),
                        });
                    }
                }
            }
        }
        Ok(())
    }
}

impl System {
    /// Total number of adjustable parameter specs across all components.
    pub fn spec_count(&self) -> usize {
        self.components.values().map(Vec::len).sum()
    }

    pub fn param(&self, component: &str, name: &str) -> Option<&ParamSpec> {
        self.components
            .get(component)?
            .iter()
            .find(|p| p.name == name)
    }

    pub fn param_mut(&mut self, component: &str, name: &str) -> Option<&mut ParamSpec> {
        self.components
            .get_mut(component)?
            .iter_mut()
            .find(|p| p.name == name)
    }
}

impl ParamSpec {
    /// Effective current value: explicit `Value`, else the default.
    pub fn effective_value(&self) -> f64 {
        self.value.unwrap_or(self.default)
    }

    pub fn clamp(&self, v: f64) -> f64 {
        v.clamp(self.minimum, self.maximum)
    }

    fn validate(&self, system: &str, component: &str) -> Result<(), CatalogError> {
        if !(self.step > 0.0) {
            return Err(CatalogError::BadStep {
                system: system.to_string(),
                component: component.to_string(),
                name: self.name.clone(),
                step: self.step,
            });
        }
        let v = self.effective_value();
        if !(self.minimum <= v && v <= self.maximum) {
            return Err(CatalogError::OutOfRange {
                system: system.to_string(),
                component: component.to_string(),
                name: self.name.clone(),
                value: v,
                minimum: self.minimum,
                maximum: self.maximum,
            });
        }
        Ok(())
    }
}

impl ControlId {
    pub fn new(component: &str, param: &str) -> Self {
        ControlId(format!("{component}_{param}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Splits back into (component, parameter) at the first underscore.
    pub fn split(&self) -> Option<(&str, &str)> {
        self.0.split_once('_')
    }
}

impl fmt::Display for ControlId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

//! Built-in configuration document, used when no catalog file is given.

use simmer::catalog::{Catalog, CatalogError};

// Two systems: the kettle is the primary fixture, the boiler exists so the
// selector has something to switch to. Kettle bounds and defaults match the
// classic tuning for this process (kp 6000, ki 0.25, kd 5000, output limited
// to 100..2500 W).
const CATALOG: &str = r#"{
    "kettle": {
        "Description": "Kettle (PID controlled)",
        "Type": 1,
        "Components": {
            "kettle": [
                {"Name": "volume", "Title": "Liquid Volume", "Minimum": 0,
                 "Maximum": 20, "Step": 1, "Default": 10, "Unit": "L"},
                {"Name": "ambient", "Title": "Ambient Temperature", "Minimum": 0,
                 "Maximum": 30, "Step": 2, "Default": 25, "Unit": "degC"},
                {"Name": "temperature", "Title": "Initial Temperature", "Minimum": 0,
                 "Maximum": 100, "Step": 1, "Default": 25, "Unit": "degC"},
                {"Name": "thermal_loss", "Title": "Thermal Loss", "Minimum": 0,
                 "Maximum": 30, "Step": 1, "Default": 13, "Unit": "W/deg"}
            ],
            "burner": [
                {"Name": "fluctuation", "Title": "Power Fluctuation", "Minimum": 0,
                 "Maximum": 1, "Step": 0.01, "Default": 0.05, "Unit": "%"},
                {"Name": "inertia", "Title": "Thermal Inertia", "Minimum": 0,
                 "Maximum": 5000, "Step": 10, "Default": 5000, "Unit": "W/s"}
            ],
            "pid": [
                {"Name": "setpoint", "Title": "Setpoint", "Minimum": 0,
                 "Maximum": 100, "Step": 1, "Default": 80, "Unit": "degC"},
                {"Name": "kp", "Title": "Proportional Gain", "Minimum": 0,
                 "Maximum": 10000, "Step": 10, "Default": 6000, "Unit": ""},
                {"Name": "ki", "Title": "Integral Gain", "Minimum": 0,
                 "Maximum": 1, "Step": 0.01, "Default": 0.25, "Unit": ""},
                {"Name": "kd", "Title": "Derivative Gain", "Minimum": 0,
                 "Maximum": 10000, "Step": 10, "Default": 5000, "Unit": ""},
                {"Name": "limit_low", "Title": "Output Floor", "Minimum": 0,
                 "Maximum": 500, "Step": 10, "Default": 100, "Unit": "W"},
                {"Name": "limit_high", "Title": "Output Ceiling", "Minimum": 0,
                 "Maximum": 3000, "Step": 10, "Default": 2500, "Unit": "W"}
            ]
        },
        "Values": {
            "kettle": [
                {"Name": "temperature", "Title": "Temperature",
                 "Unit": "degC", "Value": 25.0}
            ],
            "pid": [
                {"Name": "output", "Title": "Drive Output",
                 "Unit": "W", "Value": 0.0}
            ]
        }
    },
    "boiler": {
        "Description": "Hot water boiler",
        "Type": 1,
        "Components": {
            "boiler": [
                {"Name": "capacity", "Title": "Capacity", "Minimum": 50,
                 "Maximum": 500, "Step": 10, "Default": 200, "Unit": "L"},
                {"Name": "insulation", "Title": "Insulation", "Minimum": 0,
                 "Maximum": 10, "Step": 1, "Default": 6, "Unit": ""}
            ],
            "pid": [
                {"Name": "setpoint", "Title": "Setpoint", "Minimum": 20,
                 "Maximum": 90, "Step": 1, "Default": 60, "Unit": "degC"},
                {"Name": "kp", "Title": "Proportional Gain", "Minimum": 0,
                 "Maximum": 10000, "Step": 10, "Default": 4000, "Unit": ""}
            ]
        },
        "Values": {
            "boiler": [
                {"Name": "temperature", "Title": "Temperature",
                 "Unit": "degC", "Value": 45.0}
            ]
        }
    }
}"#;

pub fn default_catalog() -> Result<Catalog, CatalogError> {
    Catalog::from_json(CATALOG)
}

#[path = "core/catalog.rs"]
pub mod catalog;

#[path = "core/control.rs"]
pub mod control;

#[path = "core/refresh.rs"]
pub mod refresh;

#[path = "core/binder.rs"]
pub mod binder;

#[path = "core/panel.rs"]
pub mod panel;

pub mod ports;

//! Lagoon Viewer - winit window with an egui control panel
//!
//! Drives either the water demo or the deferred-lights demo once per redraw
//! and exposes their runtime parameters as sliders, checkboxes and buttons.

pub mod app;
mod egui_layer;
pub mod panels;

pub use app::{run, DemoKind};

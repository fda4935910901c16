//! egui panels for the viewer

mod controls;
mod render_stats;

pub use controls::{ControlAction, ControlPanel, DemoSnapshot};
pub use render_stats::RenderStats;

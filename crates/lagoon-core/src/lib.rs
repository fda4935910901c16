//! Lagoon Core - Foundational types for the Lagoon terrain/water/lights demos
//!
//! This crate provides the types that every other Lagoon crate depends on:
//! - `Vec3` and column-major 4x4 matrix helpers
//! - `DemoConfig` - the `lagoon.toml` configuration tree
//! - Error types and Result alias

mod config;
mod error;
pub mod matrix;
mod types;

pub use config::{
    DebugConfig, DemoConfig, LightsConfig, NormalStrategyName, SkyConfig, TerrainSettings,
    WaterConfig, WindowConfig, MAX_SHADER_LIGHTS,
};
pub use error::{LagoonError, Result};
pub use matrix::Mat4;
pub use types::Vec3;

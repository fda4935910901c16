//! Lagoon Terrain - Height-field terrain geometry
//!
//! Provides height field loading, grid mesh generation and the two normal
//! estimation strategies. Does not depend on lagoon-render: outputs raw
//! vertex data (grid coordinates, normals, indices) for the renderer.

pub mod grid;
pub mod heightfield;
pub mod normals;
pub mod terrain;

pub use grid::{grid_to_world, GridMesh};
pub use heightfield::HeightField;
pub use normals::{
    accumulate_normals, analytic_normal, analytic_normals, estimate_normals, lift_positions,
    NormalStrategy, SLOPE_SCALE,
};
pub use terrain::{TerrainMesh, TerrainParams};

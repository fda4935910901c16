//! Terrain orchestration: grid + height field + per-vertex normals

use crate::grid::GridMesh;
use crate::heightfield::HeightField;
use crate::normals::{estimate_normals, NormalStrategy, SLOPE_SCALE};
use lagoon_core::{Result, TerrainSettings, Vec3};

/// Parameters for terrain generation, usually taken from `[terrain]` in lagoon.toml
#[derive(Clone, Debug, PartialEq)]
pub struct TerrainParams {
    pub grid_width: u32,
    pub grid_height: u32,
    /// World-space Y for a height of 1.0
    pub height_scale: f32,
    pub slope_scale: f32,
    pub strategy: NormalStrategy,
}

impl Default for TerrainParams {
    fn default() -> Self {
        Self {
            grid_width: 100,
            grid_height: 100,
            height_scale: 0.5,
            slope_scale: SLOPE_SCALE,
            strategy: NormalStrategy::Analytic,
        }
    }
}

impl From<&TerrainSettings> for TerrainParams {
    fn from(settings: &TerrainSettings) -> Self {
        Self {
            grid_width: settings.grid_width,
            grid_height: settings.grid_height,
            height_scale: settings.height_scale,
            slope_scale: settings.slope_scale,
            strategy: settings.normal_strategy.into(),
        }
    }
}

/// CPU-side terrain geometry ready for upload.
///
/// The height field is always resampled to the grid resolution, so the
/// normal sampling offset (1/(W-1), 1/(H-1)) matches the mesh spacing.
pub struct TerrainMesh {
    pub params: TerrainParams,
    pub grid: GridMesh,
    pub field: HeightField,
    /// One normal per grid vertex, from `params.strategy`
    pub normals: Vec<Vec3>,
}

impl TerrainMesh {
    /// Build terrain over a flat field (used until a heightmap arrives)
    pub fn flat(params: TerrainParams) -> Result<Self> {
        let field = HeightField::flat(params.grid_width, params.grid_height, 0.0)?;
        Self::generate(&field, params)
    }

    pub fn generate(source: &HeightField, params: TerrainParams) -> Result<Self> {
        let grid = GridMesh::build(params.grid_width, params.grid_height)?;
        let field = source.resample(params.grid_width, params.grid_height)?;
        let normals = estimate_normals(
            params.strategy,
            &grid,
            &field,
            params.height_scale,
            params.slope_scale,
        );
        Ok(Self {
            params,
            grid,
            field,
            normals,
        })
    }

    /// Rebuild the grid at a new resolution, keeping the source heights
    pub fn rebuild(&mut self, source: &HeightField, grid_width: u32, grid_height: u32) -> Result<()> {
        let params = TerrainParams {
            grid_width,
            grid_height,
            ..self.params.clone()
        };
        *self = Self::generate(source, params)?;
        Ok(())
    }

    /// Recompute normals after a strategy or scale change
    pub fn set_strategy(&mut self, strategy: NormalStrategy) {
        self.params.strategy = strategy;
        self.normals = estimate_normals(
            strategy,
            &self.grid,
            &self.field,
            self.params.height_scale,
            self.params.slope_scale,
        );
    }

    /// Interleaved per-vertex data: parametric (u, v) and the CPU normal
    pub fn vertex_data(&self) -> Vec<([f32; 2], [f32; 3])> {
        self.grid
            .points()
            .iter()
            .zip(&self.normals)
            .map(|(&uv, n)| (uv, n.to_array()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_terrain_matches_grid_resolution() {
        let params = TerrainParams {
            grid_width: 4,
            grid_height: 6,
            ..Default::default()
        };
        let terrain = TerrainMesh::flat(params).unwrap();
        assert_eq!(terrain.grid.vertex_count(), 24);
        assert_eq!(terrain.normals.len(), 24);
        assert_eq!((terrain.field.width(), terrain.field.height()), (4, 6));
    }

    #[test]
    fn rebuild_changes_resolution() {
        let source = HeightField::flat(8, 8, 0.5).unwrap();
        let mut terrain = TerrainMesh::generate(&source, TerrainParams::default()).unwrap();
        terrain.rebuild(&source, 3, 3).unwrap();
        assert_eq!(terrain.grid.vertex_count(), 9);
        assert_eq!(terrain.grid.index_count(), 24);
        assert_eq!(terrain.vertex_data().len(), 9);
    }

    #[test]
    fn rebuild_to_degenerate_grid_fails_and_keeps_mesh() {
        let source = HeightField::flat(4, 4, 0.0).unwrap();
        let mut terrain = TerrainMesh::generate(
            &source,
            TerrainParams {
                grid_width: 4,
                grid_height: 4,
                ..Default::default()
            },
        )
        .unwrap();
        assert!(terrain.rebuild(&source, 1, 4).is_err());
        assert_eq!(terrain.grid.vertex_count(), 16);
    }

    #[test]
    fn switching_strategy_keeps_normals_up_on_flat_ground() {
        let mut terrain = TerrainMesh::flat(TerrainParams {
            grid_width: 5,
            grid_height: 5,
            ..Default::default()
        })
        .unwrap();
        terrain.set_strategy(NormalStrategy::Accumulated);
        assert!(terrain.normals.iter().all(|n| n.max_abs_diff(&Vec3::UP) < 1e-5));
    }
}

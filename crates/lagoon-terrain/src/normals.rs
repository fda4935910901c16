//! Surface normal estimation for grid terrain
//!
//! Two interchangeable strategies, both producing upward-facing unit normals
//! on the same grid topology:
//! - analytic: central differences over the height field, the same formula
//!   the terrain vertex shader evaluates
//! - accumulated: unnormalized face normals summed per vertex, then normalized

use crate::grid::{grid_to_world, GridMesh};
use crate::heightfield::HeightField;
use lagoon_core::{NormalStrategyName, Vec3};

/// Vertical term of the finite-difference normal. Empirical: larger values
/// flatten the shading, smaller ones exaggerate relief.
pub const SLOPE_SCALE: f32 = 2.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum NormalStrategy {
    #[default]
    Analytic,
    Accumulated,
}

impl NormalStrategy {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Analytic => "Analytic",
            Self::Accumulated => "Accumulated",
        }
    }

    /// Value of the `normal_mode` uniform in the terrain shader
    pub fn shader_mode(&self) -> u32 {
        match self {
            Self::Analytic => 0,
            Self::Accumulated => 1,
        }
    }

    pub fn toggled(&self) -> Self {
        match self {
            Self::Analytic => Self::Accumulated,
            Self::Accumulated => Self::Analytic,
        }
    }
}

impl From<NormalStrategyName> for NormalStrategy {
    fn from(name: NormalStrategyName) -> Self {
        match name {
            NormalStrategyName::Analytic => Self::Analytic,
            NormalStrategyName::Accumulated => Self::Accumulated,
        }
    }
}

/// `normalize(hLeft - hRight, slope_scale, hDown - hUp)` at (u, v), with
/// neighbours one sample apart. "Up" is the previous image row (v - dv).
pub fn analytic_normal(field: &HeightField, u: f32, v: f32, slope_scale: f32) -> Vec3 {
    let (du, dv) = field.sample_offsets();
    let h_left = field.sample(u - du, v);
    let h_right = field.sample(u + du, v);
    let h_up = field.sample(u, v - dv);
    let h_down = field.sample(u, v + dv);
    Vec3::new(h_left - h_right, slope_scale, h_down - h_up).normalized()
}

/// Analytic normal at every grid point
pub fn analytic_normals(grid: &GridMesh, field: &HeightField, slope_scale: f32) -> Vec<Vec3> {
    grid.points()
        .iter()
        .map(|&[u, v]| analytic_normal(field, u, v, slope_scale))
        .collect()
}

/// World-space positions of the grid lifted by the height field
pub fn lift_positions(grid: &GridMesh, field: &HeightField, height_scale: f32) -> Vec<Vec3> {
    grid.points()
        .iter()
        .map(|&[u, v]| grid_to_world(u, v, field.sample(u, v), height_scale))
        .collect()
}

/// Sum `cross(v1 - v0, v2 - v0)` of every triangle into its three vertices,
/// then normalize. Vertices with a zero-length sum (no incident triangle, or
/// only degenerate ones) come out as the zero vector instead of NaN.
pub fn accumulate_normals(positions: &[Vec3], indices: &[u32]) -> Vec<Vec3> {
    let mut sums = vec![Vec3::ZERO; positions.len()];

    for tri in indices.chunks_exact(3) {
        let [a, b, c] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
        let (Some(&p0), Some(&p1), Some(&p2)) = (positions.get(a), positions.get(b), positions.get(c))
        else {
            log::warn!("Skipping triangle {:?}: index out of range", tri);
            continue;
        };
        let face = (p1 - p0).cross(&(p2 - p0));
        sums[a] += face;
        sums[b] += face;
        sums[c] += face;
    }

    sums.into_iter()
        .map(|n| {
            let len = n.length();
            let divisor = if len > 0.0 { len } else { 1.0 };
            n * (1.0 / divisor)
        })
        .collect()
}

/// Normals for every grid vertex using the chosen strategy
pub fn estimate_normals(
    strategy: NormalStrategy,
    grid: &GridMesh,
    field: &HeightField,
    height_scale: f32,
    slope_scale: f32,
) -> Vec<Vec3> {
    match strategy {
        NormalStrategy::Analytic => analytic_normals(grid, field, slope_scale),
        NormalStrategy::Accumulated => {
            let positions = lift_positions(grid, field, height_scale);
            accumulate_normals(&positions, grid.indices())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp_field(size: u32) -> HeightField {
        let heights = (0..size)
            .flat_map(|j| (0..size).map(move |i| (i + j) as f32 / (2 * (size - 1)) as f32))
            .collect();
        HeightField::from_raw(heights, size, size).unwrap()
    }

    #[test]
    fn flat_grid_accumulates_straight_up() {
        let grid = GridMesh::build(6, 4).unwrap();
        let field = HeightField::flat(6, 4, 0.3).unwrap();
        let normals = estimate_normals(NormalStrategy::Accumulated, &grid, &field, 1.0, SLOPE_SCALE);
        assert_eq!(normals.len(), grid.vertex_count());
        for n in normals {
            assert!(n.max_abs_diff(&Vec3::UP) < 1e-5, "got {:?}", n);
        }
    }

    #[test]
    fn flat_grid_analytic_straight_up() {
        let grid = GridMesh::build(5, 5).unwrap();
        let field = HeightField::flat(5, 5, 0.8).unwrap();
        for n in analytic_normals(&grid, &field, SLOPE_SCALE) {
            assert!(n.max_abs_diff(&Vec3::UP) < 1e-5);
        }
    }

    #[test]
    fn isolated_vertex_gets_defined_normal() {
        // Vertex 3 is referenced by no triangle
        let positions = vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 0.0, -1.0),
            Vec3::new(5.0, 5.0, 5.0),
        ];
        let normals = accumulate_normals(&positions, &[0, 1, 2]);
        assert!(normals.iter().all(Vec3::is_finite));
        assert_eq!(normals[3], Vec3::ZERO);
        assert!(normals[0].max_abs_diff(&Vec3::UP) < 1e-6);
    }

    #[test]
    fn degenerate_triangle_does_not_produce_nan() {
        let p = Vec3::new(0.2, 0.1, 0.4);
        let normals = accumulate_normals(&[p, p, p], &[0, 1, 2]);
        assert!(normals.iter().all(|n| n.is_finite() && *n == Vec3::ZERO));
    }

    #[test]
    fn strategies_agree_on_linear_ramp() {
        // With height_scale = 2/(W-1) the world slope matches the analytic
        // formula's SLOPE_SCALE = 2, so interior normals must coincide.
        let size = 9;
        let grid = GridMesh::build(size, size).unwrap();
        let field = ramp_field(size);
        let height_scale = 2.0 / (size - 1) as f32;

        let analytic = analytic_normals(&grid, &field, SLOPE_SCALE);
        let accumulated = estimate_normals(
            NormalStrategy::Accumulated,
            &grid,
            &field,
            height_scale,
            SLOPE_SCALE,
        );

        for j in 1..size - 1 {
            for i in 1..size - 1 {
                let k = grid.vertex_index(i, j) as usize;
                assert!(
                    analytic[k].max_abs_diff(&accumulated[k]) < 1e-4,
                    "vertex ({i},{j}): {:?} vs {:?}",
                    analytic[k],
                    accumulated[k]
                );
            }
        }
    }

    #[test]
    fn ramp_normals_tilt_away_from_rising_side() {
        let size = 5;
        let grid = GridMesh::build(size, size).unwrap();
        let field = ramp_field(size);
        for n in analytic_normals(&grid, &field, SLOPE_SCALE) {
            // Heights rise toward +u (world +x) and +v (world -z)
            assert!(n.y > 0.0);
            assert!(n.x <= 0.0);
            assert!(n.z >= 0.0);
        }
    }

    #[test]
    fn toggling_strategy_switches_shader_mode() {
        let s = NormalStrategy::default();
        assert_eq!(s.shader_mode(), 0);
        assert_eq!(s.toggled().shader_mode(), 1);
        assert_eq!(s.toggled().toggled(), s);
    }
}

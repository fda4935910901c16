//! Regular grid mesh generation

use lagoon_core::{LagoonError, Result, Vec3};

/// A `width` x `height` lattice of parametric points in [0,1]² with two
/// triangles per quad.
#[derive(Clone, Debug)]
pub struct GridMesh {
    width: u32,
    height: u32,
    /// Point (i, j) lives at index `i + j * width`
    points: Vec<[f32; 2]>,
    /// Triangle list; every index is `< width * height`
    indices: Vec<u32>,
}

impl GridMesh {
    /// Build the grid. Fewer than two vertices along either axis cannot form
    /// a quad and is rejected.
    pub fn build(width: u32, height: u32) -> Result<Self> {
        let vertex_count = width as u64 * height as u64;
        if width < 2 || height < 2 || vertex_count > u32::MAX as u64 {
            return Err(LagoonError::InvalidGridSize { width, height });
        }

        let du = 1.0 / (width - 1) as f32;
        let dv = 1.0 / (height - 1) as f32;

        let mut points = Vec::with_capacity(vertex_count as usize);
        for j in 0..height {
            for i in 0..width {
                points.push([i as f32 * du, j as f32 * dv]);
            }
        }

        let quads = ((width - 1) * (height - 1)) as usize;
        let mut indices = Vec::with_capacity(quads * 6);
        for j in 0..height - 1 {
            for i in 0..width - 1 {
                let here = i + j * width;
                let right = here + 1;
                let below = here + width;
                let diagonal = below + 1;

                indices.extend_from_slice(&[here, right, below]);
                indices.extend_from_slice(&[below, right, diagonal]);
            }
        }

        log::debug!(
            "Built {}x{} grid: {} vertices, {} triangles",
            width,
            height,
            points.len(),
            indices.len() / 3
        );

        Ok(Self {
            width,
            height,
            points,
            indices,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn points(&self) -> &[[f32; 2]] {
        &self.points
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn vertex_index(&self, i: u32, j: u32) -> u32 {
        i + j * self.width
    }

    pub fn vertex_count(&self) -> usize {
        self.points.len()
    }

    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    pub fn quad_count(&self) -> usize {
        ((self.width - 1) * (self.height - 1)) as usize
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn triangles(&self) -> impl Iterator<Item = [u32; 3]> + '_ {
        self.indices.chunks_exact(3).map(|t| [t[0], t[1], t[2]])
    }
}

/// World position of grid point (u, v) with normalized height `h`:
/// x = 2u - 1, z = 1 - 2v, y = h * height_scale.
pub fn grid_to_world(u: f32, v: f32, h: f32, height_scale: f32) -> Vec3 {
    Vec3::new(2.0 * u - 1.0, h * height_scale, 1.0 - 2.0 * v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn three_by_three_grid_counts() {
        let grid = GridMesh::build(3, 3).unwrap();
        assert_eq!(grid.vertex_count(), 9);
        assert_eq!(grid.index_count(), 24);
        assert_eq!(grid.quad_count(), 4);
        assert_eq!(grid.triangle_count(), 8);
    }

    #[test]
    fn counts_follow_dimensions() {
        for (w, h) in [(2, 2), (2, 7), (5, 3), (17, 11)] {
            let grid = GridMesh::build(w, h).unwrap();
            assert_eq!(grid.vertex_count(), (w * h) as usize);
            assert_eq!(grid.index_count(), (6 * (w - 1) * (h - 1)) as usize);
            assert!(grid.indices().iter().all(|&i| i < w * h));
        }
    }

    #[test]
    fn degenerate_dimensions_are_rejected() {
        for (w, h) in [(0, 5), (1, 5), (5, 1), (1, 1)] {
            let err = GridMesh::build(w, h).unwrap_err();
            assert!(matches!(err, LagoonError::InvalidGridSize { .. }));
        }
    }

    #[test]
    fn points_span_unit_square() {
        let grid = GridMesh::build(4, 3).unwrap();
        assert_eq!(grid.points()[0], [0.0, 0.0]);
        let last = grid.points()[grid.vertex_index(3, 2) as usize];
        assert!((last[0] - 1.0).abs() < 1e-6 && (last[1] - 1.0).abs() < 1e-6);
        let mid = grid.points()[grid.vertex_index(1, 1) as usize];
        assert!((mid[0] - 1.0 / 3.0).abs() < 1e-6 && (mid[1] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn first_quad_uses_expected_corners() {
        let grid = GridMesh::build(3, 2).unwrap();
        let tris: Vec<[u32; 3]> = grid.triangles().take(2).collect();
        assert_eq!(tris[0], [0, 1, 3]);
        assert_eq!(tris[1], [3, 1, 4]);
    }

    #[test]
    fn triangles_face_up_in_world_space() {
        let grid = GridMesh::build(4, 4).unwrap();
        for [a, b, c] in grid.triangles() {
            let p = |k: u32| {
                let [u, v] = grid.points()[k as usize];
                grid_to_world(u, v, 0.0, 1.0)
            };
            let n = (p(b) - p(a)).cross(&(p(c) - p(a)));
            assert!(n.y > 0.0);
        }
    }
}

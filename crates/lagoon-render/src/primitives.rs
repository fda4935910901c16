//! Vertex layouts and the small fixed meshes used by the demos

use bytemuck::{Pod, Zeroable};
use lagoon_terrain::TerrainMesh;

/// Terrain vertex: parametric grid position and the CPU (accumulated) normal
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct GridVertex {
    pub uv: [f32; 2],
    pub normal: [f32; 3],
}

impl GridVertex {
    const ATTRIBS: [wgpu::VertexAttribute; 2] = wgpu::vertex_attr_array![
        0 => Float32x2, // uv
        1 => Float32x3, // normal
    ];

    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<GridVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBS,
        }
    }

    pub fn from_terrain(terrain: &TerrainMesh) -> Vec<GridVertex> {
        terrain
            .vertex_data()
            .into_iter()
            .map(|(uv, normal)| GridVertex { uv, normal })
            .collect()
    }
}

/// Position + normal, used by the water quad and the cube field
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

impl MeshVertex {
    const ATTRIBS: [wgpu::VertexAttribute; 2] = wgpu::vertex_attr_array![
        0 => Float32x3,
        1 => Float32x3,
    ];

    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<MeshVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBS,
        }
    }
}

/// Per-instance cube center for the G-buffer pass
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct InstanceCenter {
    pub center: [f32; 3],
}

impl InstanceCenter {
    const ATTRIBS: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![2 => Float32x3];

    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<InstanceCenter>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &Self::ATTRIBS,
        }
    }
}

pub struct Mesh {
    pub vertices: Vec<MeshVertex>,
    pub indices: Vec<u32>,
}

impl Mesh {
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn index_count(&self) -> usize {
        self.indices.len()
    }
}

/// Unit quad on the XZ plane, y = 0, spanning [-1, 1]. Scaled and lifted to
/// the water height in the water shader.
pub fn create_water_quad() -> Mesh {
    let up = [0.0, 1.0, 0.0];
    let vertices = vec![
        MeshVertex { position: [-1.0, 0.0, -1.0], normal: up },
        MeshVertex { position: [-1.0, 0.0, 1.0], normal: up },
        MeshVertex { position: [1.0, 0.0, 1.0], normal: up },
        MeshVertex { position: [1.0, 0.0, -1.0], normal: up },
    ];
    Mesh {
        vertices,
        indices: vec![0, 1, 3, 1, 2, 3],
    }
}

/// Axis-aligned cube of half-size 1 with flat per-face normals (24 vertices)
pub fn create_cube_mesh() -> Mesh {
    // (normal, tangent u, tangent v) per face; u x v == normal keeps CCW winding
    let faces: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
        ([1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]),
        ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
        ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0]),
        ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
        ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ([0.0, 0.0, -1.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
    ];

    let mut vertices = Vec::with_capacity(24);
    for (n, u, v) in faces {
        for (su, sv) in [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
            let position = [
                n[0] + su * u[0] + sv * v[0],
                n[1] + su * u[1] + sv * v[1],
                n[2] + su * u[2] + sv * v[2],
            ];
            vertices.push(MeshVertex { position, normal: n });
        }
    }

    let indices = (0..6u32)
        .flat_map(|face| {
            let base = face * 4;
            [base, base + 1, base + 2, base, base + 2, base + 3]
        })
        .collect();

    Mesh { vertices, indices }
}

/// `size`³ cube centers at `(2k - size) / (size - 1)` on each axis
pub fn cube_field_centers(size: u32) -> Vec<InstanceCenter> {
    if size == 0 {
        return Vec::new();
    }
    let denom = size.saturating_sub(1).max(1) as f32;
    let coord = |k: u32| (2.0 * k as f32 - size as f32) / denom;

    let mut centers = Vec::with_capacity((size * size * size) as usize);
    for i in 0..size {
        for j in 0..size {
            for k in 0..size {
                centers.push(InstanceCenter {
                    center: [coord(i), coord(j), coord(k)],
                });
            }
        }
    }
    centers
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sub(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
        [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
    }

    fn cross(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
        [
            a[1] * b[2] - a[2] * b[1],
            a[2] * b[0] - a[0] * b[2],
            a[0] * b[1] - a[1] * b[0],
        ]
    }

    #[test]
    fn cube_faces_wind_outward() {
        let cube = create_cube_mesh();
        assert_eq!(cube.vertex_count(), 24);
        assert_eq!(cube.index_count(), 36);
        for tri in cube.indices.chunks(3) {
            let [a, b, c] = [0, 1, 2].map(|k| cube.vertices[tri[k] as usize]);
            let n = cross(sub(b.position, a.position), sub(c.position, a.position));
            let d = n[0] * a.normal[0] + n[1] * a.normal[1] + n[2] * a.normal[2];
            assert!(d > 0.0, "triangle {:?} winds inward", tri);
        }
    }

    #[test]
    fn water_quad_faces_up() {
        let quad = create_water_quad();
        for tri in quad.indices.chunks(3) {
            let [a, b, c] = [0, 1, 2].map(|k| quad.vertices[tri[k] as usize].position);
            let n = cross(sub(b, a), sub(c, a));
            assert!(n[1] > 0.0);
        }
    }

    #[test]
    fn cube_field_has_size_cubed_centers() {
        let centers = cube_field_centers(10);
        assert_eq!(centers.len(), 1000);
        assert!((centers[0].center[0] - (-10.0 / 9.0)).abs() < 1e-6);
        assert!((centers[999].center[2] - (8.0 / 9.0)).abs() < 1e-6);
        assert!(cube_field_centers(0).is_empty());
        assert_eq!(cube_field_centers(1).len(), 1);
    }

    #[test]
    fn vertex_layouts_match_struct_sizes() {
        assert_eq!(GridVertex::desc().array_stride, 20);
        assert_eq!(MeshVertex::desc().array_stride, 24);
        assert_eq!(InstanceCenter::desc().array_stride, 12);
    }
}

//! Column-major 4x4 matrix helpers (`m[col][row]`), laid out the way WGSL
//! `mat4x4<f32>` expects them in a uniform buffer.

use crate::types::Vec3;

pub type Mat4 = [[f32; 4]; 4];

pub const IDENTITY: Mat4 = [
    [1.0, 0.0, 0.0, 0.0],
    [0.0, 1.0, 0.0, 0.0],
    [0.0, 0.0, 1.0, 0.0],
    [0.0, 0.0, 0.0, 1.0],
];

/// `a * b` (apply `b` first, then `a`)
pub fn mul(a: &Mat4, b: &Mat4) -> Mat4 {
    let mut out = [[0.0; 4]; 4];
    for (col, out_col) in out.iter_mut().enumerate() {
        for (row, value) in out_col.iter_mut().enumerate() {
            *value = (0..4).map(|k| a[k][row] * b[col][k]).sum();
        }
    }
    out
}

pub fn transform_point(m: &Mat4, p: Vec3) -> Vec3 {
    let v = transform4(m, [p.x, p.y, p.z, 1.0]);
    let w = if v[3].abs() > f32::EPSILON { v[3] } else { 1.0 };
    Vec3::new(v[0] / w, v[1] / w, v[2] / w)
}

/// Transform a direction (w = 0), ignoring translation
pub fn transform_vector(m: &Mat4, d: Vec3) -> Vec3 {
    let v = transform4(m, [d.x, d.y, d.z, 0.0]);
    Vec3::new(v[0], v[1], v[2])
}

pub fn transform4(m: &Mat4, v: [f32; 4]) -> [f32; 4] {
    let mut out = [0.0; 4];
    for (row, value) in out.iter_mut().enumerate() {
        *value = (0..4).map(|col| m[col][row] * v[col]).sum();
    }
    out
}

/// Right-handed view matrix looking from `eye` along `dir`
pub fn look_to(eye: Vec3, dir: Vec3, up: Vec3) -> Mat4 {
    let f = dir.normalized();
    let s = f.cross(&up).normalized();
    let u = s.cross(&f);

    [
        [s.x, u.x, -f.x, 0.0],
        [s.y, u.y, -f.y, 0.0],
        [s.z, u.z, -f.z, 0.0],
        [-s.dot(&eye), -u.dot(&eye), f.dot(&eye), 1.0],
    ]
}

/// Right-handed perspective projection mapping depth to wgpu's [0, 1] range
pub fn perspective(fov_y_radians: f32, aspect: f32, near: f32, far: f32) -> Mat4 {
    let f = 1.0 / (fov_y_radians * 0.5).tan();
    let range = near - far;
    [
        [f / aspect, 0.0, 0.0, 0.0],
        [0.0, f, 0.0, 0.0],
        [0.0, 0.0, far / range, -1.0],
        [0.0, 0.0, near * far / range, 0.0],
    ]
}

/// Copy of `m` with its translation column cleared (used for skyboxes)
pub fn without_translation(m: &Mat4) -> Mat4 {
    let mut out = *m;
    out[3] = [0.0, 0.0, 0.0, 1.0];
    out
}

/// Inverse by Gauss-Jordan elimination with partial pivoting.
/// Singular input returns `None`.
pub fn inverse(m: &Mat4) -> Option<Mat4> {
    // Row-major working copy augmented with identity.
    let mut a = [[0.0f64; 8]; 4];
    for (row, a_row) in a.iter_mut().enumerate() {
        for col in 0..4 {
            a_row[col] = m[col][row] as f64;
        }
        a_row[4 + row] = 1.0;
    }

    for pivot in 0..4 {
        let best = (pivot..4)
            .max_by(|&x, &y| a[x][pivot].abs().total_cmp(&a[y][pivot].abs()))
            .unwrap_or(pivot);
        if a[best][pivot].abs() < 1e-12 {
            return None;
        }
        a.swap(pivot, best);

        let scale = 1.0 / a[pivot][pivot];
        for value in a[pivot].iter_mut() {
            *value *= scale;
        }
        for row in 0..4 {
            if row != pivot {
                let factor = a[row][pivot];
                if factor != 0.0 {
                    for col in 0..8 {
                        a[row][col] -= factor * a[pivot][col];
                    }
                }
            }
        }
    }

    let mut out = [[0.0f32; 4]; 4];
    for (row, a_row) in a.iter().enumerate() {
        for col in 0..4 {
            out[col][row] = a_row[4 + col] as f32;
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_mat_close(a: &Mat4, b: &Mat4, eps: f32) {
        for col in 0..4 {
            for row in 0..4 {
                assert!(
                    (a[col][row] - b[col][row]).abs() < eps,
                    "m[{col}][{row}]: {} vs {}",
                    a[col][row],
                    b[col][row]
                );
            }
        }
    }

    #[test]
    fn inverse_of_view_projection_round_trips() {
        let view = look_to(Vec3::new(1.0, 2.0, 3.0), Vec3::new(-1.0, -0.5, -1.0), Vec3::UP);
        let proj = perspective(60f32.to_radians(), 1.5, 0.05, 50.0);
        let vp = mul(&proj, &view);
        let inv = inverse(&vp).expect("view-projection must be invertible");
        assert_mat_close(&mul(&vp, &inv), &IDENTITY, 1e-4);
    }

    #[test]
    fn singular_matrix_has_no_inverse() {
        let mut m = IDENTITY;
        m[2] = [0.0; 4];
        assert!(inverse(&m).is_none());
    }

    #[test]
    fn look_to_puts_target_on_negative_z() {
        let eye = Vec3::new(0.0, 1.0, 5.0);
        let view = look_to(eye, Vec3::new(0.0, 0.0, -1.0), Vec3::UP);
        let p = transform_point(&view, Vec3::new(0.0, 1.0, 0.0));
        assert!(p.max_abs_diff(&Vec3::new(0.0, 0.0, -5.0)) < 1e-5);
    }

    #[test]
    fn perspective_maps_near_and_far_to_unit_depth_range() {
        let proj = perspective(45f32.to_radians(), 1.0, 0.1, 100.0);
        let near = transform_point(&proj, Vec3::new(0.0, 0.0, -0.1));
        let far = transform_point(&proj, Vec3::new(0.0, 0.0, -100.0));
        assert!(near.z.abs() < 1e-4);
        assert!((far.z - 1.0).abs() < 1e-4);
    }
}

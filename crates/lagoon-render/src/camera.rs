//! 3D orbit camera with a `look(eye, dir, up)` mutator and planar mirroring

use lagoon_core::matrix::{self, Mat4};
use lagoon_core::Vec3;

/// A perspective camera orbiting a target point
#[derive(Clone, Debug, PartialEq)]
pub struct Camera {
    /// Camera position
    pub position: Vec3,
    /// Point the camera looks at
    pub target: Vec3,
    /// Up vector
    pub up: Vec3,
    /// Vertical field of view in degrees
    pub fov: f32,
    pub near: f32,
    pub far: f32,
    /// Aspect ratio (width / height)
    pub aspect: f32,

    // Orbit control state
    /// Distance from target
    pub distance: f32,
    /// Horizontal angle in radians
    pub yaw: f32,
    /// Vertical angle in radians
    pub pitch: f32,
}

impl Default for Camera {
    fn default() -> Self {
        let mut camera = Self {
            position: Vec3::new(0.0, 1.0, 2.5),
            target: Vec3::ZERO,
            up: Vec3::UP,
            fov: 45.0,
            near: 0.01,
            far: 100.0,
            aspect: 16.0 / 9.0,
            distance: 2.8,
            yaw: std::f32::consts::FRAC_PI_6,
            pitch: 0.45,
        };
        camera.update_orbit();
        camera
    }
}

impl Camera {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unit view direction
    pub fn direction(&self) -> Vec3 {
        (self.target - self.position).normalized()
    }

    /// Place the camera at `eye` looking along `dir`
    pub fn look(&mut self, eye: Vec3, dir: Vec3, up: Vec3) {
        self.position = eye;
        self.target = eye + dir.normalized();
        self.up = up;
    }

    /// This camera reflected across the horizontal plane `y = height`:
    /// eye.y becomes `2h - eye.y`, the view direction's y is negated and the
    /// up vector is kept. Applying it twice gives back the original camera.
    pub fn mirrored(&self, height: f32) -> Self {
        let eye = self.position;
        let dir = self.target - self.position;

        let mut mirrored = self.clone();
        mirrored.look(
            Vec3::new(eye.x, 2.0 * height - eye.y, eye.z),
            Vec3::new(dir.x, -dir.y, dir.z),
            self.up,
        );
        // Keep the original look distance so mirroring twice round-trips the target
        mirrored.target = mirrored.position + Vec3::new(dir.x, -dir.y, dir.z);
        mirrored.pitch = -self.pitch;
        mirrored
    }

    /// Update position based on orbit parameters
    pub fn update_orbit(&mut self) {
        let x = self.distance * self.pitch.cos() * self.yaw.sin();
        let y = self.distance * self.pitch.sin();
        let z = self.distance * self.pitch.cos() * self.yaw.cos();
        self.position = self.target + Vec3::new(x, y, z);
    }

    /// Orbit horizontally (rotate around target)
    pub fn orbit_horizontal(&mut self, delta: f32) {
        self.yaw += delta;
        self.update_orbit();
    }

    /// Orbit vertically (tilt up/down)
    pub fn orbit_vertical(&mut self, delta: f32) {
        self.pitch = (self.pitch + delta).clamp(-1.55, 1.55);
        self.update_orbit();
    }

    /// Zoom in/out
    pub fn zoom(&mut self, delta: f32) {
        self.distance = (self.distance - delta).clamp(0.2, 20.0);
        self.update_orbit();
    }

    /// Move the target in the camera's screen plane
    pub fn pan(&mut self, dx: f32, dy: f32) {
        let forward = self.direction();
        let right = forward.cross(&self.up).normalized();
        let up = right.cross(&forward);

        self.target = self.target + right * dx + up * dy;
        self.update_orbit();
    }

    /// View matrix (4x4, column-major)
    pub fn view_matrix(&self) -> Mat4 {
        matrix::look_to(self.position, self.target - self.position, self.up)
    }

    /// Perspective projection with wgpu depth range
    pub fn projection_matrix(&self) -> Mat4 {
        matrix::perspective(self.fov.to_radians(), self.aspect, self.near, self.far)
    }

    pub fn view_projection_matrix(&self) -> Mat4 {
        matrix::mul(&self.projection_matrix(), &self.view_matrix())
    }

    /// Inverse of projection * rotation-only view, for unprojecting sky rays
    pub fn sky_inverse_matrix(&self) -> Mat4 {
        let rotation = matrix::without_translation(&self.view_matrix());
        let vp = matrix::mul(&self.projection_matrix(), &rotation);
        matrix::inverse(&vp).unwrap_or(matrix::IDENTITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_vec_close(a: Vec3, b: Vec3) {
        assert!(a.max_abs_diff(&b) < 1e-5, "{:?} vs {:?}", a, b);
    }

    #[test]
    fn mirroring_reflects_eye_and_pitch() {
        let mut camera = Camera::new();
        camera.look(Vec3::new(0.5, 1.0, 2.0), Vec3::new(0.0, -0.5, -1.0), Vec3::UP);
        let mirrored = camera.mirrored(0.2);
        assert_vec_close(mirrored.position, Vec3::new(0.5, -0.6, 2.0));
        let dir = mirrored.direction();
        assert!(dir.y > 0.0);
        assert_vec_close(mirrored.up, Vec3::UP);
    }

    #[test]
    fn mirroring_twice_is_identity() {
        for height in [-0.3, 0.0, 0.1, 2.5] {
            let camera = Camera::new();
            let back = camera.mirrored(height).mirrored(height);
            assert_vec_close(back.position, camera.position);
            assert_vec_close(back.target, camera.target);
            assert_vec_close(back.up, camera.up);
            assert!((back.pitch - camera.pitch).abs() < 1e-6);
        }
    }

    #[test]
    fn mirrored_view_maps_reflected_points_alike() {
        // A point and its reflection land on the same screen x, mirrored y
        let camera = Camera::new();
        let h = 0.1;
        let mirrored = camera.mirrored(h);
        let p = Vec3::new(0.2, 0.4, -0.3);
        let p_reflected = Vec3::new(p.x, 2.0 * h - p.y, p.z);

        let a = matrix::transform_point(&camera.view_projection_matrix(), p);
        let b = matrix::transform_point(&mirrored.view_projection_matrix(), p_reflected);
        assert!((a.x - b.x).abs() < 1e-4);
        assert!((a.y + b.y).abs() < 1e-4);
        assert!((a.z - b.z).abs() < 1e-4);
    }

    #[test]
    fn look_sets_unit_direction() {
        let mut camera = Camera::new();
        camera.look(Vec3::ZERO, Vec3::new(0.0, 0.0, -10.0), Vec3::UP);
        assert_vec_close(camera.direction(), Vec3::new(0.0, 0.0, -1.0));
    }

    #[test]
    fn zoom_is_clamped() {
        let mut camera = Camera::new();
        camera.zoom(1000.0);
        assert!((camera.distance - 0.2).abs() < 1e-6);
    }
}

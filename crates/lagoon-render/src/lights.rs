//! Point lights for the deferred demo
//!
//! The set holds up to `capacity` lights; only the first `active_count` are
//! uploaded as lit. Capacity can never exceed the shader-side array size.

use bytemuck::{Pod, Zeroable};
use lagoon_core::matrix::{self, Mat4};
use lagoon_core::{LagoonError, Result, Vec3, MAX_SHADER_LIGHTS};
use rand::Rng;

/// Uploaded color is `normalize(color) * intensity / LIGHT_INTENSITY_DIVISOR`
pub const LIGHT_INTENSITY_DIVISOR: f32 = 100.0;

/// Intensity slider bounds
pub const MIN_INTENSITY: f32 = 1.0;
pub const MAX_INTENSITY: f32 = 50.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointLight {
    /// World-space position
    pub position: Vec3,
    /// Linear color before intensity scaling
    pub color: Vec3,
}

impl PointLight {
    pub fn new(position: Vec3, color: Vec3) -> Self {
        Self { position, color }
    }

    /// Position uniform in [-1, 1]³, color `(0.2 + r, 0.2 + r, 0.3 + r)`
    pub fn random(rng: &mut impl Rng) -> Self {
        Self {
            position: random_position(rng),
            color: random_color(rng),
        }
    }
}

fn random_position(rng: &mut impl Rng) -> Vec3 {
    Vec3::new(
        rng.gen_range(-1.0..=1.0),
        rng.gen_range(-1.0..=1.0),
        rng.gen_range(-1.0..=1.0),
    )
}

fn random_color(rng: &mut impl Rng) -> Vec3 {
    Vec3::new(
        0.2 + rng.gen::<f32>(),
        0.2 + rng.gen::<f32>(),
        0.3 + rng.gen::<f32>(),
    )
}

/// Matches `LightUniforms` in deferred_light.wgsl
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct LightUniforms {
    pub positions: [[f32; 4]; MAX_SHADER_LIGHTS],
    pub colors: [[f32; 4]; MAX_SHADER_LIGHTS],
    pub count: [u32; 4],
}

#[derive(Clone, Debug)]
pub struct LightSet {
    lights: Vec<PointLight>,
    capacity: usize,
    active_count: usize,
    intensity: f32,
}

impl LightSet {
    /// Empty set. Fails if `capacity` exceeds the shader array.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity > MAX_SHADER_LIGHTS {
            return Err(LagoonError::LightCapacityExceeded {
                capacity: MAX_SHADER_LIGHTS,
            });
        }
        Ok(Self {
            lights: Vec::with_capacity(capacity),
            capacity,
            active_count: 0,
            intensity: 10.0,
        })
    }

    /// A full set of random lights with `active` of them lit
    pub fn random(capacity: usize, active: usize, rng: &mut impl Rng) -> Result<Self> {
        let mut set = Self::new(capacity)?;
        for _ in 0..capacity {
            set.push(PointLight::random(rng))?;
        }
        set.set_active_count(active);
        log::debug!("Generated {} lights ({} active)", capacity, set.active_count);
        Ok(set)
    }

    pub fn push(&mut self, light: PointLight) -> Result<()> {
        if self.lights.len() >= self.capacity {
            return Err(LagoonError::LightCapacityExceeded {
                capacity: self.capacity,
            });
        }
        self.lights.push(light);
        Ok(())
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.lights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lights.is_empty()
    }

    pub fn lights(&self) -> &[PointLight] {
        &self.lights
    }

    pub fn active_count(&self) -> usize {
        self.active_count
    }

    /// Clamp to the number of stored lights; returns the applied count
    pub fn set_active_count(&mut self, count: usize) -> usize {
        self.active_count = count.min(self.lights.len());
        self.active_count
    }

    pub fn active(&self) -> &[PointLight] {
        &self.lights[..self.active_count]
    }

    pub fn intensity(&self) -> f32 {
        self.intensity
    }

    pub fn set_intensity(&mut self, intensity: f32) {
        self.intensity = intensity.clamp(MIN_INTENSITY, MAX_INTENSITY);
    }

    /// "Move lights": new positions for every stored light
    pub fn regenerate_positions(&mut self, rng: &mut impl Rng) {
        for light in &mut self.lights {
            light.position = random_position(rng);
        }
    }

    /// "Change lights color": new colors for every stored light
    pub fn regenerate_colors(&mut self, rng: &mut impl Rng) {
        for light in &mut self.lights {
            light.color = random_color(rng);
        }
    }

    /// The color the shader receives for `light`
    pub fn uploaded_color(&self, light: &PointLight) -> Vec3 {
        light.color.normalized() * (self.intensity / LIGHT_INTENSITY_DIVISOR)
    }

    /// Active lights with positions moved to view space
    pub fn pack_uniforms(&self, view: &Mat4) -> LightUniforms {
        let mut uniforms = LightUniforms::zeroed();
        for (i, light) in self.active().iter().enumerate() {
            let p = matrix::transform_point(view, light.position);
            let c = self.uploaded_color(light);
            uniforms.positions[i] = [p.x, p.y, p.z, 1.0];
            uniforms.colors[i] = [c.x, c.y, c.z, 0.0];
        }
        uniforms.count[0] = self.active_count as u32;
        uniforms
    }

    /// CPU version of the lighting loop for a view-space point and normal
    pub fn shade(&self, view: &Mat4, point: Vec3, normal: Vec3) -> Vec3 {
        self.active().iter().fold(Vec3::ZERO, |sum, light| {
            let p = matrix::transform_point(view, light.position);
            sum + diffuse_contribution(p, self.uploaded_color(light), point, normal)
        })
    }
}

/// `color / d² · max(0, n·l) / π` for one light. `d²` is floored so a light
/// sitting on the surface does not blow up.
pub fn diffuse_contribution(light_pos: Vec3, color: Vec3, point: Vec3, normal: Vec3) -> Vec3 {
    let to_light = light_pos - point;
    let d2 = to_light.length_squared().max(1e-6);
    let l = to_light * (1.0 / d2.sqrt());
    let cos_theta = normal.dot(&l).max(0.0);
    color * (cos_theta / (d2 * std::f32::consts::PI))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    #[test]
    fn push_fails_when_full() {
        let mut set = LightSet::new(2).unwrap();
        set.push(PointLight::new(Vec3::ZERO, Vec3::ONE)).unwrap();
        set.push(PointLight::new(Vec3::ZERO, Vec3::ONE)).unwrap();
        let err = set.push(PointLight::new(Vec3::ZERO, Vec3::ONE)).unwrap_err();
        assert!(matches!(err, LagoonError::LightCapacityExceeded { capacity: 2 }));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn capacity_above_shader_array_is_rejected() {
        assert!(LightSet::new(MAX_SHADER_LIGHTS).is_ok());
        assert!(LightSet::new(MAX_SHADER_LIGHTS + 1).is_err());
    }

    #[test]
    fn active_count_is_clamped() {
        let mut set = LightSet::random(100, 10, &mut rng()).unwrap();
        assert_eq!(set.active_count(), 10);
        assert_eq!(set.set_active_count(1000), 100);
        assert_eq!(set.set_active_count(0), 0);
        assert!(set.active().is_empty());
    }

    #[test]
    fn random_lights_stay_in_range() {
        let set = LightSet::random(200, 200, &mut rng()).unwrap();
        for light in set.lights() {
            for c in light.position.to_array() {
                assert!((-1.0..=1.0).contains(&c));
            }
            assert!((0.2..=1.2).contains(&light.color.x));
            assert!((0.2..=1.2).contains(&light.color.y));
            assert!((0.3..=1.3).contains(&light.color.z));
        }
    }

    #[test]
    fn regenerating_positions_keeps_colors() {
        let mut rng = rng();
        let mut set = LightSet::random(20, 20, &mut rng).unwrap();
        let before = set.lights().to_vec();
        set.regenerate_positions(&mut rng);
        for (old, new) in before.iter().zip(set.lights()) {
            assert_eq!(old.color, new.color);
        }
        assert_ne!(before[0].position, set.lights()[0].position);
    }

    #[test]
    fn no_active_lights_shade_black() {
        let mut set = LightSet::random(10, 10, &mut rng()).unwrap();
        set.set_active_count(0);
        let c = set.shade(&matrix::IDENTITY, Vec3::ZERO, Vec3::UP);
        assert_eq!(c, Vec3::ZERO);
        assert_eq!(set.pack_uniforms(&matrix::IDENTITY).count[0], 0);
    }

    #[test]
    fn single_light_matches_closed_form() {
        let mut set = LightSet::new(1).unwrap();
        set.push(PointLight::new(Vec3::new(0.0, 2.0, 0.0), Vec3::new(3.0, 0.0, 4.0)))
            .unwrap();
        set.set_active_count(1);
        set.set_intensity(50.0);

        let c = set.shade(&matrix::IDENTITY, Vec3::ZERO, Vec3::UP);
        // normalize(3,0,4) * 0.5 / d² (4) * cos 1 / π
        let k = 0.5 / (4.0 * std::f32::consts::PI);
        assert!(c.max_abs_diff(&Vec3::new(0.6 * k, 0.0, 0.8 * k)) < 1e-6);
    }

    #[test]
    fn light_behind_surface_contributes_nothing() {
        let c = diffuse_contribution(Vec3::new(0.0, -1.0, 0.0), Vec3::ONE, Vec3::ZERO, Vec3::UP);
        assert_eq!(c, Vec3::ZERO);
    }

    #[test]
    fn coincident_light_stays_finite() {
        let c = diffuse_contribution(Vec3::ZERO, Vec3::ONE, Vec3::ZERO, Vec3::UP);
        assert!(c.is_finite());
    }

    #[test]
    fn packed_positions_are_in_view_space() {
        let mut set = LightSet::new(1).unwrap();
        set.push(PointLight::new(Vec3::new(1.0, 0.0, 0.0), Vec3::ONE)).unwrap();
        set.set_active_count(1);
        let view = matrix::look_to(Vec3::new(0.0, 0.0, 5.0), Vec3::new(0.0, 0.0, -1.0), Vec3::UP);
        let packed = set.pack_uniforms(&view);
        assert!((packed.positions[0][0] - 1.0).abs() < 1e-5);
        assert!((packed.positions[0][2] + 5.0).abs() < 1e-5);
        assert_eq!(packed.count[0], 1);
    }

    #[test]
    fn intensity_is_clamped_to_slider_range() {
        let mut set = LightSet::new(1).unwrap();
        set.set_intensity(500.0);
        assert_eq!(set.intensity(), MAX_INTENSITY);
        set.set_intensity(0.0);
        assert_eq!(set.intensity(), MIN_INTENSITY);
    }
}

//! Shared abstraction for everything drawn by the water compositor
//!
//! Terrain, water and sky each own their geometry, textures and one
//! uniform buffer per scene pass. A frame first `prepare`s every object for
//! every pass (queue writes), then encodes the passes; because each pass has
//! its own buffer, the mirrored camera of the reflection pass can never leak
//! into the refraction or final pass.

use crate::camera::Camera;
use bytemuck::Pod;
use wgpu::util::DeviceExt;

/// The three passes that render the 3D scene
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScenePass {
    Reflection,
    Refraction,
    Final,
}

impl ScenePass {
    pub const ALL: [ScenePass; 3] = [Self::Reflection, Self::Refraction, Self::Final];

    pub fn index(&self) -> usize {
        match self {
            Self::Reflection => 0,
            Self::Refraction => 1,
            Self::Final => 2,
        }
    }

    /// Which side of the water plane the terrain keeps in this pass
    pub fn clip_mode(&self) -> ClipMode {
        match self {
            Self::Reflection => ClipMode::DiscardBelow,
            Self::Refraction => ClipMode::DiscardAbove,
            Self::Final => ClipMode::None,
        }
    }
}

/// Terrain clipping against the water plane, uploaded as a uniform
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClipMode {
    None,
    /// Reflection: drop fragments under the water
    DiscardBelow,
    /// Refraction: drop fragments above the water
    DiscardAbove,
}

impl ClipMode {
    pub fn shader_value(&self) -> u32 {
        match self {
            Self::None => 0,
            Self::DiscardBelow => 1,
            Self::DiscardAbove => 2,
        }
    }
}

/// One value per scene pass
#[derive(Clone, Debug)]
pub struct PerPass<T>([T; 3]);

impl<T> PerPass<T> {
    pub fn from_fn(mut f: impl FnMut(ScenePass) -> T) -> Self {
        Self(ScenePass::ALL.map(&mut f))
    }

    pub fn get(&self, pass: ScenePass) -> &T {
        &self.0[pass.index()]
    }
}

/// Everything a scene object needs to fill its uniforms for one pass
#[derive(Clone, Debug)]
pub struct PassParams {
    pub pass: ScenePass,
    /// Camera for this pass (already mirrored for reflection)
    pub camera: Camera,
    pub water_height: f32,
    /// Seconds since the demo started
    pub time: f32,
    /// Direction toward the sun, world space
    pub sun_direction: [f32; 3],
}

impl PassParams {
    pub fn clip_mode(&self) -> ClipMode {
        self.pass.clip_mode()
    }
}

pub trait SceneObject {
    fn label(&self) -> &'static str;

    /// Pick up finished texture loads; called once per frame before drawing
    fn poll_resources(&mut self, _device: &wgpu::Device, _queue: &wgpu::Queue) {}

    /// False while a resource the draw cannot do without is still loading
    fn is_ready(&self) -> bool {
        true
    }

    /// Whether the object takes part in `pass` at all
    fn draws_in(&self, _pass: ScenePass) -> bool {
        true
    }

    /// Write this pass's uniforms
    fn prepare(&self, queue: &wgpu::Queue, params: &PassParams);

    /// Record draw commands; the pass is already bound to its target
    fn draw(&self, pass: ScenePass, render_pass: &mut wgpu::RenderPass<'_>);
}

pub(crate) fn uniform_buffer<T: Pod>(device: &wgpu::Device, label: &str, value: &T) -> wgpu::Buffer {
    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(label),
        contents: bytemuck::bytes_of(value),
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
    })
}

pub(crate) fn uniform_entry(binding: u32, visibility: wgpu::ShaderStages) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

pub(crate) fn texture_entry(
    binding: u32,
    visibility: wgpu::ShaderStages,
    view_dimension: wgpu::TextureViewDimension,
) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension,
            multisampled: false,
        },
        count: None,
    }
}

pub(crate) fn sampler_entry(binding: u32, visibility: wgpu::ShaderStages) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
        count: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn each_pass_has_its_own_clip_mode() {
        assert_eq!(ScenePass::Reflection.clip_mode().shader_value(), 1);
        assert_eq!(ScenePass::Refraction.clip_mode().shader_value(), 2);
        assert_eq!(ScenePass::Final.clip_mode().shader_value(), 0);
    }

    #[test]
    fn per_pass_values_are_indexed_by_pass() {
        let labels = PerPass::from_fn(|pass| format!("{:?}", pass));
        assert_eq!(labels.get(ScenePass::Refraction), "Refraction");
        assert_eq!(labels.get(ScenePass::Final), "Final");
    }
}

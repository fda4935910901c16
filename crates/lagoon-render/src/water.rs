//! Water plane: samples the reflection and refraction targets it owns

use crate::context::{validated_pipeline, RenderError, DEPTH_FORMAT};
use crate::primitives::{create_water_quad, MeshVertex};
use crate::render_target::{RenderTarget, TargetSpec};
use crate::scene_object::{
    sampler_entry, texture_entry, uniform_buffer, uniform_entry, PassParams, SceneObject, ScenePass,
};
use crate::texture::{GpuTexture, LoadRequest, SlotEvent, TextureSlot, UploadOptions};
use bytemuck::{Pod, Zeroable};
use lagoon_core::{DemoConfig, WaterConfig};
use wgpu::util::DeviceExt;

/// Default screen-space distortion strength
pub const DISTORTION_SCALE: f32 = 1.0 / 50.0;
/// Default Blinn-Phong exponent of the sun highlight
pub const SPECULAR_EXPONENT: f32 = 128.0;
/// Exponent on `dot(view, up)` when mixing reflection and refraction
pub const FRESNEL_EXPONENT: f32 = 1.0;

/// Screen-uv offset the water shader derives from one distortion texel:
/// `(rg * 2 - 1) * scale`, so each component lies in `[-scale, scale]`
pub fn distortion_offset(texel: [u8; 2], scale: f32) -> [f32; 2] {
    texel.map(|c| (c as f32 / 255.0 * 2.0 - 1.0) * scale)
}

/// Neutral distortion: (128, 128) decodes to no offset
pub const DISTORTION_PLACEHOLDER: [u8; 4] = [128, 128, 0, 255];
/// Flat normal: decodes to straight up
pub const NORMAL_PLACEHOLDER: [u8; 4] = [128, 128, 255, 255];

/// Matches `WaterUniforms` in water.wgsl
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct WaterUniforms {
    pub view_proj: [[f32; 4]; 4],
    pub camera_pos: [f32; 4],
    pub sun_dir: [f32; 4],
    pub sun_color: [f32; 4],
    /// water_height, time, distortion_scale, specular_exponent
    pub params: [f32; 4],
    /// wave_speed, tiling, fresnel exponent, unused
    pub params2: [f32; 4],
}

pub struct WaterPipeline {
    pub pipeline: wgpu::RenderPipeline,
    pub uniform_bind_group_layout: wgpu::BindGroupLayout,
    pub texture_bind_group_layout: wgpu::BindGroupLayout,
}

impl WaterPipeline {
    pub fn new(device: &wgpu::Device, format: wgpu::TextureFormat) -> Result<Self, RenderError> {
        validated_pipeline(device, "Water", || {
            let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("Water Shader"),
                source: wgpu::ShaderSource::Wgsl(include_str!("shaders/water.wgsl").into()),
            });

            let fragment = wgpu::ShaderStages::FRAGMENT;
            let d2 = wgpu::TextureViewDimension::D2;

            let uniform_bind_group_layout =
                device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some("Water Uniform Bind Group Layout"),
                    entries: &[uniform_entry(
                        0,
                        wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    )],
                });

            // reflection, refraction, distortion, normal, clamp sampler, repeat sampler
            let texture_bind_group_layout =
                device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some("Water Texture Bind Group Layout"),
                    entries: &[
                        texture_entry(0, fragment, d2),
                        texture_entry(1, fragment, d2),
                        texture_entry(2, fragment, d2),
                        texture_entry(3, fragment, d2),
                        sampler_entry(4, fragment),
                        sampler_entry(5, fragment),
                    ],
                });

            let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Water Pipeline Layout"),
                bind_group_layouts: &[&uniform_bind_group_layout, &texture_bind_group_layout],
                push_constant_ranges: &[],
            });

            let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("Water Render Pipeline"),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: Some("vs_main"),
                    buffers: &[MeshVertex::desc()],
                    compilation_options: Default::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: Some("fs_main"),
                    targets: &[Some(wgpu::ColorTargetState {
                        format,
                        blend: None,
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: Default::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    cull_mode: None,
                    ..Default::default()
                },
                depth_stencil: Some(wgpu::DepthStencilState {
                    format: DEPTH_FORMAT,
                    depth_write_enabled: true,
                    depth_compare: wgpu::CompareFunction::Less,
                    stencil: wgpu::StencilState::default(),
                    bias: wgpu::DepthBiasState::default(),
                }),
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            });

            Self {
                pipeline,
                uniform_bind_group_layout,
                texture_bind_group_layout,
            }
        })
    }
}

pub struct WaterObject {
    pipeline: WaterPipeline,
    settings: WaterConfig,
    reflection: RenderTarget,
    refraction: RenderTarget,
    distortion_map: TextureSlot,
    normal_map: TextureSlot,
    clamp_sampler: wgpu::Sampler,
    texture_bind_group: wgpu::BindGroup,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,
}

impl WaterObject {
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        format: wgpu::TextureFormat,
        config: &DemoConfig,
    ) -> Result<Self, RenderError> {
        let pipeline = WaterPipeline::new(device, format)?;
        let settings = config.water.clone();

        let reflection = RenderTarget::new(
            device,
            &TargetSpec {
                label: "Reflection Target",
                width: settings.reflection_resolution,
                height: settings.reflection_resolution,
                color_formats: &[format],
                depth: true,
            },
        )?;
        let refraction = RenderTarget::new(
            device,
            &TargetSpec {
                label: "Refraction Target",
                width: settings.refraction_resolution,
                height: settings.refraction_resolution,
                color_formats: &[format],
                depth: true,
            },
        )?;

        let mut distortion_map = TextureSlot::new(
            device,
            queue,
            "Water Distortion",
            DISTORTION_PLACEHOLDER,
            UploadOptions::data(),
        );
        distortion_map.request(config.resolve_path(&settings.distortion_map).map(LoadRequest::Single));

        let mut normal_map = TextureSlot::new(
            device,
            queue,
            "Water Normal",
            NORMAL_PLACEHOLDER,
            UploadOptions::data(),
        );
        normal_map.request(config.resolve_path(&settings.normal_map).map(LoadRequest::Single));

        let clamp_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Water Target Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let uniform_buffer = uniform_buffer(device, "Water Uniforms", &WaterUniforms::zeroed());
        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Water Uniform Bind Group"),
            layout: &pipeline.uniform_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        let quad = create_water_quad();
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Water Vertex Buffer"),
            contents: bytemuck::cast_slice(&quad.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Water Index Buffer"),
            contents: bytemuck::cast_slice(&quad.indices),
            usage: wgpu::BufferUsages::INDEX,
        });

        let texture_bind_group = create_texture_bind_group(
            device,
            &pipeline,
            &reflection,
            &refraction,
            distortion_map.texture(),
            normal_map.texture(),
            &clamp_sampler,
        )?;

        Ok(Self {
            pipeline,
            settings,
            reflection,
            refraction,
            distortion_map,
            normal_map,
            clamp_sampler,
            texture_bind_group,
            uniform_buffer,
            uniform_bind_group,
            vertex_buffer,
            index_buffer,
            index_count: quad.indices.len() as u32,
        })
    }

    pub fn reflection_target(&self) -> &RenderTarget {
        &self.reflection
    }

    pub fn refraction_target(&self) -> &RenderTarget {
        &self.refraction
    }

    /// The normal map (or its flat placeholder), shown by the debug overlay
    pub fn normal_map(&self) -> &GpuTexture {
        self.normal_map.texture()
    }

    pub fn height(&self) -> f32 {
        self.settings.height
    }

    pub fn set_height(&mut self, height: f32) {
        self.settings.height = height;
    }

    pub fn textures_pending(&self) -> bool {
        self.distortion_map.is_pending() || self.normal_map.is_pending()
    }
}

fn create_texture_bind_group(
    device: &wgpu::Device,
    pipeline: &WaterPipeline,
    reflection: &RenderTarget,
    refraction: &RenderTarget,
    distortion: &GpuTexture,
    normal: &GpuTexture,
    clamp_sampler: &wgpu::Sampler,
) -> Result<wgpu::BindGroup, RenderError> {
    let missing = |label: &str| RenderError::TargetCreation {
        label: label.to_string(),
        message: "no color attachment 0".to_string(),
    };
    let reflection_view = reflection
        .color_view(0)
        .ok_or_else(|| missing("Reflection Target"))?;
    let refraction_view = refraction
        .color_view(0)
        .ok_or_else(|| missing("Refraction Target"))?;

    Ok(device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Water Texture Bind Group"),
        layout: &pipeline.texture_bind_group_layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(reflection_view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::TextureView(refraction_view),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: wgpu::BindingResource::TextureView(&distortion.view),
            },
            wgpu::BindGroupEntry {
                binding: 3,
                resource: wgpu::BindingResource::TextureView(&normal.view),
            },
            wgpu::BindGroupEntry {
                binding: 4,
                resource: wgpu::BindingResource::Sampler(clamp_sampler),
            },
            wgpu::BindGroupEntry {
                binding: 5,
                resource: wgpu::BindingResource::Sampler(&normal.sampler),
            },
        ],
    }))
}

impl SceneObject for WaterObject {
    fn label(&self) -> &'static str {
        "water"
    }

    fn poll_resources(&mut self, device: &wgpu::Device, queue: &wgpu::Queue) {
        let distortion = self.distortion_map.poll(device, queue);
        let normal = self.normal_map.poll(device, queue);
        if matches!(distortion, SlotEvent::Unchanged) && matches!(normal, SlotEvent::Unchanged) {
            return;
        }
        match create_texture_bind_group(
            device,
            &self.pipeline,
            &self.reflection,
            &self.refraction,
            self.distortion_map.texture(),
            self.normal_map.texture(),
            &self.clamp_sampler,
        ) {
            Ok(bind_group) => self.texture_bind_group = bind_group,
            Err(e) => log::error!("Water bindings not refreshed: {}", e),
        }
    }

    /// The water samples the targets the other passes render, so it only
    /// appears in the final pass.
    fn draws_in(&self, pass: ScenePass) -> bool {
        pass == ScenePass::Final
    }

    fn prepare(&self, queue: &wgpu::Queue, params: &PassParams) {
        if params.pass != ScenePass::Final {
            return;
        }
        let eye = params.camera.position;
        let [sx, sy, sz] = params.sun_direction;
        let uniforms = WaterUniforms {
            view_proj: params.camera.view_projection_matrix(),
            camera_pos: [eye.x, eye.y, eye.z, 1.0],
            sun_dir: [sx, sy, sz, 0.0],
            sun_color: [1.0, 1.0, 1.0, 1.0],
            params: [
                params.water_height,
                params.time,
                self.settings.distortion_scale,
                self.settings.specular_exponent,
            ],
            params2: [
                self.settings.wave_speed,
                self.settings.tiling,
                FRESNEL_EXPONENT,
                0.0,
            ],
        };
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&uniforms));
    }

    fn draw(&self, _pass: ScenePass, render_pass: &mut wgpu::RenderPass<'_>) {
        render_pass.set_pipeline(&self.pipeline.pipeline);
        render_pass.set_bind_group(0, &self.uniform_bind_group, &[]);
        render_pass.set_bind_group(1, &self.texture_bind_group, &[]);
        render_pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
        render_pass.set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        render_pass.draw_indexed(0..self.index_count, 0, 0..1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_named_constants() {
        let water = WaterConfig::default();
        assert_eq!(water.distortion_scale, DISTORTION_SCALE);
        assert_eq!(water.specular_exponent, SPECULAR_EXPONENT);
    }

    #[test]
    fn placeholders_decode_to_neutral_values() {
        let decode = |c: u8| c as f32 / 255.0 * 2.0 - 1.0;
        let [dx, dy] = distortion_offset([DISTORTION_PLACEHOLDER[0], DISTORTION_PLACEHOLDER[1]], 1.0);
        assert!(dx.abs() < 0.01 && dy.abs() < 0.01);
        // normal = (r*2-1, b, g*2-1)
        assert!(decode(NORMAL_PLACEHOLDER[0]).abs() < 0.01);
        assert_eq!(NORMAL_PLACEHOLDER[2], 255);
    }

    #[test]
    fn distortion_offset_is_bounded_by_scale() {
        for texel in [[0, 0], [255, 255], [0, 255], [128, 64]] {
            for offset in distortion_offset(texel, DISTORTION_SCALE) {
                assert!(offset.abs() <= DISTORTION_SCALE + 1e-6, "{:?} -> {}", texel, offset);
            }
        }
        let [low, high] = distortion_offset([0, 255], DISTORTION_SCALE);
        assert!((low + DISTORTION_SCALE).abs() < 1e-6);
        assert!((high - DISTORTION_SCALE).abs() < 1e-6);
    }

    #[test]
    fn water_shader_samples_distortion_once() {
        let module = naga::front::wgsl::parse_str(include_str!("shaders/water.wgsl"))
            .expect("water.wgsl failed to parse");
        let (distortion, _) = module
            .global_variables
            .iter()
            .find(|(_, var)| var.name.as_deref() == Some("t_distortion"))
            .expect("t_distortion binding");
        let fs = module
            .entry_points
            .iter()
            .find(|ep| ep.name == "fs_main")
            .expect("fs_main entry point");

        let exprs = &fs.function.expressions;
        let lookups = exprs
            .iter()
            .filter(|(_, expr)| match expr {
                naga::Expression::ImageSample { image, .. } => {
                    matches!(exprs[*image], naga::Expression::GlobalVariable(h) if h == distortion)
                }
                _ => false,
            })
            .count();
        assert_eq!(lookups, 1);
    }

    #[test]
    fn uniform_block_size() {
        assert_eq!(std::mem::size_of::<WaterUniforms>(), 144);
    }
}

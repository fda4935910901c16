//! Deferred "many lights" demo: G-buffer fill, then one fullscreen
//! accumulation pass over every active light.

use crate::camera::Camera;
use crate::context::{validated_pipeline, RenderError, DEPTH_FORMAT};
use crate::frame_plan::{FramePlan, FrameReport, PassKind};
use crate::lights::{LightSet, LightUniforms};
use crate::primitives::{create_cube_mesh, cube_field_centers, InstanceCenter, MeshVertex};
use crate::render_target::{
    begin_pass, is_color_renderable, ClearMode, PassTarget, RenderTarget, TargetSpec,
};
use crate::scene_object::{uniform_buffer, uniform_entry};
use bytemuck::{Pod, Zeroable};
use lagoon_core::LightsConfig;
use rand::rngs::StdRng;
use rand::SeedableRng;
use wgpu::util::DeviceExt;

/// Half-size of each cube in the field
pub const CUBE_SCALE: f32 = 0.03;

/// Albedo in rgb, diffuse factor kd in alpha
pub const ALBEDO_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
/// View-space position, most precise first. GL-class adapters cannot render
/// to `Rgba32Float`.
pub const POSITION_FORMATS: [wgpu::TextureFormat; 2] = [
    wgpu::TextureFormat::Rgba32Float,
    wgpu::TextureFormat::Rgba16Float,
];
/// View-space normal
pub const NORMAL_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

/// albedo, position, normal attachments for this adapter. At most
/// 8 + 16 + 8 bytes per sample, inside the default budget of 32.
pub fn gbuffer_formats(
    adapter: &wgpu::Adapter,
    device: &wgpu::Device,
) -> [wgpu::TextureFormat; 3] {
    let position = POSITION_FORMATS
        .into_iter()
        .find(|&format| is_color_renderable(device, Some(adapter), format))
        .unwrap_or(wgpu::TextureFormat::Rgba16Float);
    [ALBEDO_FORMAT, position, NORMAL_FORMAT]
}

/// Matches `GBufferUniforms` in gbuffer.wgsl
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct GBufferUniforms {
    pub view: [[f32; 4]; 4],
    pub proj: [[f32; 4]; 4],
    /// cube scale, unused x3
    pub params: [f32; 4],
}

fn create_gbuffer_pipeline(
    device: &wgpu::Device,
    formats: &[wgpu::TextureFormat],
) -> Result<(wgpu::RenderPipeline, wgpu::BindGroupLayout), RenderError> {
    validated_pipeline(device, "G-Buffer", || {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("G-Buffer Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/gbuffer.wgsl").into()),
        });

        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("G-Buffer Uniform Bind Group Layout"),
            entries: &[uniform_entry(0, wgpu::ShaderStages::VERTEX)],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("G-Buffer Pipeline Layout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });

        let targets: Vec<Option<wgpu::ColorTargetState>> = formats
            .iter()
            .map(|&format| {
                Some(wgpu::ColorTargetState {
                    format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })
            })
            .collect();

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("G-Buffer Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[MeshVertex::desc(), InstanceCenter::desc()],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &targets,
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                front_face: wgpu::FrontFace::Ccw,
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

        (pipeline, layout)
    })
}

struct LightingPipeline {
    pipeline: wgpu::RenderPipeline,
    gbuffer_layout: wgpu::BindGroupLayout,
    light_layout: wgpu::BindGroupLayout,
}

fn create_lighting_pipeline(
    device: &wgpu::Device,
    format: wgpu::TextureFormat,
) -> Result<LightingPipeline, RenderError> {
    validated_pipeline(device, "Deferred Lighting", || {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Deferred Lighting Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/deferred_light.wgsl").into()),
        });

        // G-buffer textures are read with textureLoad, no sampler
        let gbuffer_entry = |binding: u32| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: false },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        };

        let gbuffer_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("G-Buffer Texture Bind Group Layout"),
            entries: &[gbuffer_entry(0), gbuffer_entry(1), gbuffer_entry(2)],
        });

        let light_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Light Uniform Bind Group Layout"),
            entries: &[uniform_entry(0, wgpu::ShaderStages::FRAGMENT)],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Deferred Lighting Pipeline Layout"),
            bind_group_layouts: &[&gbuffer_layout, &light_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Deferred Lighting Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[],
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
            primitive: wgpu::PrimitiveState::default(),
            // The framebuffer carries a depth attachment; the lighting pass ignores it
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: false,
                depth_compare: wgpu::CompareFunction::Always,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        LightingPipeline {
            pipeline,
            gbuffer_layout,
            light_layout,
        }
    })
}

pub struct LightsDemo {
    pub camera: Camera,
    lights: LightSet,
    max_lights: usize,
    rng: StdRng,
    gbuffer: RenderTarget,
    gbuffer_pipeline: wgpu::RenderPipeline,
    scene_buffer: wgpu::Buffer,
    scene_bind_group: wgpu::BindGroup,
    lighting: LightingPipeline,
    gbuffer_bind_group: wgpu::BindGroup,
    light_buffer: wgpu::Buffer,
    light_bind_group: wgpu::BindGroup,
    cube_vertices: wgpu::Buffer,
    cube_indices: wgpu::Buffer,
    cube_index_count: u32,
    instances: wgpu::Buffer,
    instance_count: u32,
}

impl LightsDemo {
    /// `adapter` decides which G-buffer formats are renderable
    pub fn init(
        adapter: &wgpu::Adapter,
        device: &wgpu::Device,
        format: wgpu::TextureFormat,
        config: &LightsConfig,
        window_size: (u32, u32),
    ) -> Result<Self, RenderError> {
        config.validate()?;

        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut lights = LightSet::random(config.max_lights, config.initial_count, &mut rng)?;
        lights.set_intensity(config.intensity);

        let formats = gbuffer_formats(adapter, device);
        let gbuffer = RenderTarget::with_adapter(
            adapter,
            device,
            &TargetSpec {
                label: "G-Buffer",
                width: config.gbuffer_resolution,
                height: config.gbuffer_resolution,
                color_formats: &formats,
                depth: true,
            },
        )?;

        let (gbuffer_pipeline, scene_layout) = create_gbuffer_pipeline(device, &formats)?;
        let lighting = create_lighting_pipeline(device, format)?;

        let scene_buffer = uniform_buffer(device, "G-Buffer Uniforms", &GBufferUniforms::zeroed());
        let scene_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("G-Buffer Uniform Bind Group"),
            layout: &scene_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: scene_buffer.as_entire_binding(),
            }],
        });

        let views: Vec<&wgpu::TextureView> = (0..formats.len())
            .filter_map(|i| gbuffer.color_view(i))
            .collect();
        let &[albedo, position, normal] = views.as_slice() else {
            return Err(RenderError::TargetCreation {
                label: "G-Buffer".to_string(),
                message: format!("expected 3 color attachments, got {}", views.len()),
            });
        };
        let gbuffer_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("G-Buffer Texture Bind Group"),
            layout: &lighting.gbuffer_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(albedo),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(position),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(normal),
                },
            ],
        });

        let light_buffer = uniform_buffer(device, "Light Uniforms", &LightUniforms::zeroed());
        let light_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Light Uniform Bind Group"),
            layout: &lighting.light_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: light_buffer.as_entire_binding(),
            }],
        });

        let cube = create_cube_mesh();
        let cube_vertices = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Cube Vertex Buffer"),
            contents: bytemuck::cast_slice(&cube.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let cube_indices = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Cube Index Buffer"),
            contents: bytemuck::cast_slice(&cube.indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        let centers = cube_field_centers(config.cube_grid);
        let instances = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Cube Instance Buffer"),
            contents: bytemuck::cast_slice(&centers),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let mut camera = Camera::new();
        camera.aspect = window_size.0 as f32 / window_size.1.max(1) as f32;

        log::info!(
            "Lights demo ready: {} cubes, {} lights ({} active), G-buffer {}x{} ({:?} positions)",
            centers.len(),
            lights.len(),
            lights.active_count(),
            config.gbuffer_resolution,
            config.gbuffer_resolution,
            formats[1]
        );

        Ok(Self {
            camera,
            lights,
            max_lights: config.max_lights,
            rng,
            gbuffer,
            gbuffer_pipeline,
            scene_buffer,
            scene_bind_group,
            lighting,
            gbuffer_bind_group,
            light_buffer,
            light_bind_group,
            cube_vertices,
            cube_indices,
            cube_index_count: cube.indices.len() as u32,
            instances,
            instance_count: centers.len() as u32,
        })
    }

    pub fn lights(&self) -> &LightSet {
        &self.lights
    }

    pub fn max_lights(&self) -> usize {
        self.max_lights
    }

    pub fn light_count(&self) -> usize {
        self.lights.active_count()
    }

    /// Clamped to the number of generated lights; returns the applied count
    pub fn set_light_count(&mut self, count: usize) -> usize {
        self.lights.set_active_count(count)
    }

    pub fn intensity(&self) -> f32 {
        self.lights.intensity()
    }

    pub fn set_intensity(&mut self, intensity: f32) {
        self.lights.set_intensity(intensity);
    }

    pub fn move_lights(&mut self) {
        self.lights.regenerate_positions(&mut self.rng);
    }

    pub fn change_light_colors(&mut self) {
        self.lights.regenerate_colors(&mut self.rng);
    }

    pub fn gbuffer(&self) -> &RenderTarget {
        &self.gbuffer
    }

    /// G-buffer fill then lighting into `target`, one encoder, one submit
    pub fn frame(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        target: &dyn PassTarget,
    ) -> Result<FrameReport, RenderError> {
        let plan = FramePlan::deferred();
        plan.validate()
            .map_err(|e| RenderError::FramePlan(e.to_string()))?;

        let view = self.camera.view_matrix();
        let scene = GBufferUniforms {
            view,
            proj: self.camera.projection_matrix(),
            params: [CUBE_SCALE, 0.0, 0.0, 0.0],
        };
        queue.write_buffer(&self.scene_buffer, 0, bytemuck::bytes_of(&scene));
        let packed = self.lights.pack_uniforms(&view);
        queue.write_buffer(&self.light_buffer, 0, bytemuck::bytes_of(&packed));

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Lights Frame Encoder"),
        });
        let mut report = FrameReport::default();

        for planned in plan.passes() {
            match planned.kind {
                PassKind::GBufferFill => {
                    let mut pass = begin_pass(
                        &mut encoder,
                        &self.gbuffer,
                        planned.kind.label(),
                        ClearMode::Clear(wgpu::Color::TRANSPARENT),
                    );
                    pass.set_pipeline(&self.gbuffer_pipeline);
                    pass.set_bind_group(0, &self.scene_bind_group, &[]);
                    pass.set_vertex_buffer(0, self.cube_vertices.slice(..));
                    pass.set_vertex_buffer(1, self.instances.slice(..));
                    pass.set_index_buffer(self.cube_indices.slice(..), wgpu::IndexFormat::Uint32);
                    pass.draw_indexed(0..self.cube_index_count, 0, 0..self.instance_count);
                }
                PassKind::Lighting => {
                    let mut pass = begin_pass(
                        &mut encoder,
                        target,
                        planned.kind.label(),
                        ClearMode::Clear(wgpu::Color::BLACK),
                    );
                    pass.set_pipeline(&self.lighting.pipeline);
                    pass.set_bind_group(0, &self.gbuffer_bind_group, &[]);
                    pass.set_bind_group(1, &self.light_bind_group, &[]);
                    pass.draw(0..3, 0..1);
                }
                other => {
                    return Err(RenderError::FramePlan(format!(
                        "{} is not part of the lights demo",
                        other.label()
                    )))
                }
            }
            report.executed.push(planned.kind);
        }

        queue.submit(std::iter::once(encoder.finish()));
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::{read_texture, test_context, HeadlessContext};
    use crate::lights::{diffuse_contribution, PointLight};
    use lagoon_core::{LagoonError, Vec3};

    fn seeded_config() -> LightsConfig {
        LightsConfig {
            seed: Some(42),
            ..Default::default()
        }
    }

    /// `None` (test skipped) when the adapter cannot render a G-buffer
    fn lights_demo(ctx: &HeadlessContext, config: &LightsConfig) -> Option<LightsDemo> {
        let size = (ctx.width, ctx.height);
        match LightsDemo::init(&ctx.adapter, &ctx.device, ctx.format, config, size) {
            Ok(demo) => Some(demo),
            Err(RenderError::UnsupportedFormat { format, .. }) => {
                eprintln!("adapter cannot render {:?}, skipping", format);
                None
            }
            Err(e) => panic!("lights demo failed to initialize: {}", e),
        }
    }

    fn floats(bytes: &[u8], format: wgpu::TextureFormat) -> Vec<f32> {
        match format {
            wgpu::TextureFormat::Rgba32Float => bytes
                .chunks_exact(4)
                .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                .collect(),
            wgpu::TextureFormat::Rgba16Float => bytes
                .chunks_exact(2)
                .map(|b| half::f16::from_le_bytes([b[0], b[1]]).to_f32())
                .collect(),
            other => panic!("unexpected G-buffer format {:?}", other),
        }
    }

    /// Linear value as stored in an sRGB 8-bit target, before rounding
    fn srgb_byte(linear: f32) -> f32 {
        let v = linear.clamp(0.0, 1.0);
        let encoded = if v <= 0.003_130_8 {
            v * 12.92
        } else {
            1.055 * v.powf(1.0 / 2.4) - 0.055
        };
        encoded * 255.0
    }

    #[test]
    fn uniform_blocks_match_shader_layout() {
        assert_eq!(std::mem::size_of::<GBufferUniforms>(), 144);
        assert_eq!(std::mem::size_of::<LightUniforms>(), 500 * 16 * 2 + 16);
    }

    #[test]
    fn full_float_positions_are_used_when_renderable() {
        let Some(ctx) = test_context(4, 4) else { return };
        let formats = gbuffer_formats(&ctx.adapter, &ctx.device);
        assert_eq!(formats[0], ALBEDO_FORMAT);
        assert_eq!(formats[2], NORMAL_FORMAT);

        let full = wgpu::TextureFormat::Rgba32Float;
        let expected = if is_color_renderable(&ctx.device, Some(&ctx.adapter), full) {
            full
        } else {
            wgpu::TextureFormat::Rgba16Float
        };
        assert_eq!(formats[1], expected);
    }

    #[test]
    fn invalid_lights_config_fails_init() {
        let Some(ctx) = test_context(16, 16) else { return };
        let config = LightsConfig {
            cube_grid: 0,
            ..seeded_config()
        };
        let result = LightsDemo::init(&ctx.adapter, &ctx.device, ctx.format, &config, (16, 16));
        assert!(matches!(
            result.err(),
            Some(RenderError::Lagoon(LagoonError::ValueOutOfRange { .. }))
        ));
    }

    #[test]
    fn zero_lights_render_black() {
        let Some(ctx) = test_context(32, 32) else { return };
        let Some(mut demo) = lights_demo(&ctx, &seeded_config()) else { return };
        demo.set_light_count(0);

        let report = demo.frame(&ctx.device, &ctx.queue, ctx.target()).unwrap();
        assert_eq!(report.executed, vec![PassKind::GBufferFill, PassKind::Lighting]);

        let pixels = pollster::block_on(ctx.read_pixels()).unwrap();
        assert!(pixels.chunks(4).all(|p| p[0] == 0 && p[1] == 0 && p[2] == 0));
    }

    #[test]
    fn lit_cubes_are_visible() {
        let Some(ctx) = test_context(64, 64) else { return };
        let Some(mut demo) = lights_demo(&ctx, &seeded_config()) else { return };
        demo.set_light_count(100);
        demo.set_intensity(50.0);

        demo.frame(&ctx.device, &ctx.queue, ctx.target()).unwrap();
        let pixels = pollster::block_on(ctx.read_pixels()).unwrap();
        assert!(pixels.chunks(4).any(|p| p[0] > 0 || p[1] > 0 || p[2] > 0));
    }

    #[test]
    fn single_light_matches_diffuse_formula_per_pixel() {
        const SIZE: u32 = 32;
        let Some(ctx) = test_context(SIZE, SIZE) else { return };
        let config = LightsConfig {
            gbuffer_resolution: SIZE,
            ..seeded_config()
        };
        let Some(mut demo) = lights_demo(&ctx, &config) else { return };

        let mut lights = LightSet::new(1).unwrap();
        let eye = demo.camera.position;
        lights.push(PointLight::new(eye * 0.5, Vec3::ONE)).unwrap();
        lights.set_active_count(1);
        lights.set_intensity(10.0);
        demo.lights = lights;

        demo.frame(&ctx.device, &ctx.queue, ctx.target()).unwrap();
        let frame = pollster::block_on(ctx.read_pixels()).unwrap();

        let gbuffer = demo.gbuffer();
        let read = |index: usize| {
            let texture = gbuffer.color_texture(index).unwrap();
            pollster::block_on(read_texture(&ctx.device, &ctx.queue, texture)).unwrap()
        };
        let albedo = read(0);
        let positions = floats(&read(1), gbuffer.color_format(1).unwrap());
        let normals = floats(&read(2), gbuffer.color_format(2).unwrap());

        let packed = demo.lights().pack_uniforms(&demo.camera.view_matrix());
        let [px, py, pz, _] = packed.positions[0];
        let [cr, cg, cb, _] = packed.colors[0];
        let light_pos = Vec3::new(px, py, pz);
        let light_color = Vec3::new(cr, cg, cb);

        let mut brightest = 0.0f32;
        for texel in 0..(SIZE * SIZE) as usize {
            let a = &albedo[texel * 4..texel * 4 + 4];
            let kd = a[3] as f32 / 255.0;
            let p = &positions[texel * 4..texel * 4 + 3];
            let n = &normals[texel * 4..texel * 4 + 3];

            let lit = diffuse_contribution(
                light_pos,
                light_color,
                Vec3::new(p[0], p[1], p[2]),
                Vec3::new(n[0], n[1], n[2]),
            );
            let expected = [lit.x, lit.y, lit.z]
                .iter()
                .zip(&a[..3])
                .map(|(l, &c)| srgb_byte(l * c as f32 / 255.0 * kd))
                .collect::<Vec<_>>();

            for (channel, want) in expected.iter().enumerate() {
                let got = frame[texel * 4 + channel] as f32;
                assert!(
                    (got - want).abs() <= 3.0,
                    "texel {} channel {}: shader {} vs formula {}",
                    texel,
                    channel,
                    got,
                    want
                );
                brightest = brightest.max(*want);
            }
        }
        assert!(brightest > 20.0, "light reached no visible surface");
    }

    #[test]
    fn light_count_is_clamped_to_generated_lights() {
        let Some(ctx) = test_context(16, 16) else { return };
        let Some(mut demo) = lights_demo(&ctx, &seeded_config()) else { return };
        assert_eq!(demo.set_light_count(10_000), demo.max_lights());
    }
}

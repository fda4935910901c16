//! Cube-map skybox drawn behind everything at the far plane

use crate::context::{validated_pipeline, RenderError, DEPTH_FORMAT};
use crate::scene_object::{
    sampler_entry, texture_entry, uniform_buffer, uniform_entry, PassParams, PerPass, SceneObject,
    ScenePass,
};
use crate::texture::{LoadRequest, SlotEvent, TextureSlot, UploadOptions};
use bytemuck::{Pod, Zeroable};
use lagoon_core::DemoConfig;

/// Flat sky shown until (or instead of) the cube map
pub const SKY_PLACEHOLDER: [u8; 4] = [135, 190, 235, 255];

/// Uniform data for the skybox: inverse view-projection (rotation only)
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct SkyboxUniforms {
    pub inv_view_proj: [[f32; 4]; 4],
}

pub struct SkyboxPipeline {
    pub pipeline: wgpu::RenderPipeline,
    pub uniform_bind_group_layout: wgpu::BindGroupLayout,
    pub texture_bind_group_layout: wgpu::BindGroupLayout,
}

impl SkyboxPipeline {
    pub fn new(device: &wgpu::Device, format: wgpu::TextureFormat) -> Result<Self, RenderError> {
        validated_pipeline(device, "Skybox", || {
            let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("Skybox Shader"),
                source: wgpu::ShaderSource::Wgsl(include_str!("shaders/skybox.wgsl").into()),
            });

            let uniform_bind_group_layout =
                device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some("Skybox Uniform Bind Group Layout"),
                    entries: &[uniform_entry(0, wgpu::ShaderStages::FRAGMENT)],
                });

            let texture_bind_group_layout =
                device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some("Skybox Texture Bind Group Layout"),
                    entries: &[
                        texture_entry(
                            0,
                            wgpu::ShaderStages::FRAGMENT,
                            wgpu::TextureViewDimension::Cube,
                        ),
                        sampler_entry(1, wgpu::ShaderStages::FRAGMENT),
                    ],
                });

            let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Skybox Pipeline Layout"),
                bind_group_layouts: &[&uniform_bind_group_layout, &texture_bind_group_layout],
                push_constant_ranges: &[],
            });

            let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("Skybox Render Pipeline"),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: Some("vs_sky"),
                    buffers: &[], // fullscreen triangle from vertex_index
                    compilation_options: Default::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: Some("fs_sky"),
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
                    depth_write_enabled: false,
                    depth_compare: wgpu::CompareFunction::LessEqual,
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

pub struct SkyboxObject {
    pipeline: SkyboxPipeline,
    cube_map: TextureSlot,
    texture_bind_group: wgpu::BindGroup,
    uniforms: PerPass<(wgpu::Buffer, wgpu::BindGroup)>,
}

impl SkyboxObject {
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        format: wgpu::TextureFormat,
        config: &DemoConfig,
    ) -> Result<Self, RenderError> {
        let pipeline = SkyboxPipeline::new(device, format)?;

        let mut cube_map =
            TextureSlot::new(device, queue, "Sky", SKY_PLACEHOLDER, UploadOptions::cube());
        cube_map.request(config.sky_face_paths().map(LoadRequest::Cube));
        let texture_bind_group = create_texture_bind_group(device, &pipeline, &cube_map);

        let uniforms = PerPass::from_fn(|pass| {
            let buffer = uniform_buffer(
                device,
                &format!("Skybox Uniforms ({:?})", pass),
                &SkyboxUniforms::zeroed(),
            );
            let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(&format!("Skybox Uniform Bind Group ({:?})", pass)),
                layout: &pipeline.uniform_bind_group_layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: buffer.as_entire_binding(),
                }],
            });
            (buffer, bind_group)
        });

        Ok(Self {
            pipeline,
            cube_map,
            texture_bind_group,
            uniforms,
        })
    }

    pub fn textures_pending(&self) -> bool {
        self.cube_map.is_pending()
    }
}

fn create_texture_bind_group(
    device: &wgpu::Device,
    pipeline: &SkyboxPipeline,
    slot: &TextureSlot,
) -> wgpu::BindGroup {
    let texture = slot.texture();
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Skybox Texture Bind Group"),
        layout: &pipeline.texture_bind_group_layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&texture.view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(&texture.sampler),
            },
        ],
    })
}

impl SceneObject for SkyboxObject {
    fn label(&self) -> &'static str {
        "sky"
    }

    fn poll_resources(&mut self, device: &wgpu::Device, queue: &wgpu::Queue) {
        if !matches!(self.cube_map.poll(device, queue), SlotEvent::Unchanged) {
            self.texture_bind_group = create_texture_bind_group(device, &self.pipeline, &self.cube_map);
        }
    }

    fn prepare(&self, queue: &wgpu::Queue, params: &PassParams) {
        let uniforms = SkyboxUniforms {
            inv_view_proj: params.camera.sky_inverse_matrix(),
        };
        let (buffer, _) = self.uniforms.get(params.pass);
        queue.write_buffer(buffer, 0, bytemuck::bytes_of(&uniforms));
    }

    fn draw(&self, pass: ScenePass, render_pass: &mut wgpu::RenderPass<'_>) {
        let (_, uniform_bind_group) = self.uniforms.get(pass);
        render_pass.set_pipeline(&self.pipeline.pipeline);
        render_pass.set_bind_group(0, uniform_bind_group, &[]);
        render_pass.set_bind_group(1, &self.texture_bind_group, &[]);
        render_pass.draw(0..3, 0..1);
    }
}

//! Terrain scene object: heightmap-displaced grid with clip-plane discard

use crate::context::{validated_pipeline, RenderError, DEPTH_FORMAT};
use crate::primitives::GridVertex;
use crate::scene_object::{
    sampler_entry, texture_entry, uniform_buffer, uniform_entry, PassParams, PerPass, SceneObject,
    ScenePass,
};
use crate::texture::{LoadRequest, SlotEvent, TextureSlot, UploadOptions};
use bytemuck::{Pod, Zeroable};
use lagoon_core::DemoConfig;
use lagoon_terrain::{HeightField, NormalStrategy, TerrainMesh, TerrainParams};
use wgpu::util::DeviceExt;

/// Matches `TerrainUniforms` in terrain.wgsl
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct TerrainUniforms {
    pub view_proj: [[f32; 4]; 4],
    pub sun_dir: [f32; 4],
    pub mesh_color: [f32; 4],
    /// height_scale, slope_scale, water_height, unused
    pub params: [f32; 4],
    /// 1/(W-1), 1/(H-1), unused, unused
    pub sample_offset: [f32; 4],
    /// clip mode, normal mode, unused, unused
    pub modes: [u32; 4],
}

pub struct TerrainPipeline {
    pub pipeline: wgpu::RenderPipeline,
    pub uniform_bind_group_layout: wgpu::BindGroupLayout,
    pub texture_bind_group_layout: wgpu::BindGroupLayout,
}

impl TerrainPipeline {
    pub fn new(device: &wgpu::Device, format: wgpu::TextureFormat) -> Result<Self, RenderError> {
        validated_pipeline(device, "Terrain", || {
            let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("Terrain Shader"),
                source: wgpu::ShaderSource::Wgsl(include_str!("shaders/terrain.wgsl").into()),
            });

            let both = wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT;
            let d2 = wgpu::TextureViewDimension::D2;

            let uniform_bind_group_layout =
                device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some("Terrain Uniform Bind Group Layout"),
                    entries: &[uniform_entry(0, both)],
                });

            // Bind group 1: heightmap (vertex + fragment), color map
            let texture_bind_group_layout =
                device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some("Terrain Texture Bind Group Layout"),
                    entries: &[
                        texture_entry(0, both, d2),
                        sampler_entry(1, both),
                        texture_entry(2, wgpu::ShaderStages::FRAGMENT, d2),
                        sampler_entry(3, wgpu::ShaderStages::FRAGMENT),
                    ],
                });

            let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Terrain Pipeline Layout"),
                bind_group_layouts: &[&uniform_bind_group_layout, &texture_bind_group_layout],
                push_constant_ranges: &[],
            });

            let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("Terrain Render Pipeline"),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: Some("vs_main"),
                    buffers: &[GridVertex::desc()],
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
                    strip_index_format: None,
                    front_face: wgpu::FrontFace::Ccw,
                    // Seen from below in the mirrored reflection pass
                    cull_mode: None,
                    polygon_mode: wgpu::PolygonMode::Fill,
                    unclipped_depth: false,
                    conservative: false,
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

struct GpuGrid {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,
}

impl GpuGrid {
    fn upload(device: &wgpu::Device, mesh: &TerrainMesh) -> Self {
        let vertices = GridVertex::from_terrain(mesh);
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Terrain Vertex Buffer"),
            contents: bytemuck::cast_slice(&vertices),
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Terrain Index Buffer"),
            contents: bytemuck::cast_slice(mesh.grid.indices()),
            usage: wgpu::BufferUsages::INDEX,
        });
        Self {
            vertex_buffer,
            index_buffer,
            index_count: mesh.grid.index_count() as u32,
        }
    }
}

/// The terrain: CPU mesh, GPU buffers, heightmap + color textures and one
/// uniform set per scene pass.
pub struct TerrainObject {
    pipeline: TerrainPipeline,
    mesh: TerrainMesh,
    /// Full-resolution heights; the mesh is resampled from this on rebuild
    source: HeightField,
    gpu: GpuGrid,
    heightmap: TextureSlot,
    color_map: TextureSlot,
    texture_bind_group: wgpu::BindGroup,
    uniforms: PerPass<(wgpu::Buffer, wgpu::BindGroup)>,
    mesh_color: [f32; 3],
}

impl TerrainObject {
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        format: wgpu::TextureFormat,
        config: &DemoConfig,
    ) -> Result<Self, RenderError> {
        let pipeline = TerrainPipeline::new(device, format)?;
        let params = TerrainParams::from(&config.terrain);
        let source = HeightField::flat(params.grid_width, params.grid_height, 0.0)?;
        let mesh = TerrainMesh::generate(&source, params)?;
        let gpu = GpuGrid::upload(device, &mesh);

        let mut heightmap = TextureSlot::new(
            device,
            queue,
            "Heightmap",
            [0, 0, 0, 255],
            UploadOptions::heightmap(),
        );
        heightmap.request(config.resolve_path(&config.terrain.heightmap).map(LoadRequest::Single));

        let mut color_map = TextureSlot::new(
            device,
            queue,
            "Terrain Color",
            [255, 255, 255, 255],
            UploadOptions::color(),
        );
        color_map.request(config.resolve_path(&config.terrain.color_map).map(LoadRequest::Single));

        let texture_bind_group = create_texture_bind_group(device, &pipeline, &heightmap, &color_map);

        let uniforms = PerPass::from_fn(|pass| {
            let buffer = uniform_buffer(
                device,
                &format!("Terrain Uniforms ({:?})", pass),
                &TerrainUniforms::zeroed(),
            );
            let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(&format!("Terrain Uniform Bind Group ({:?})", pass)),
                layout: &pipeline.uniform_bind_group_layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: buffer.as_entire_binding(),
                }],
            });
            (buffer, bind_group)
        });

        log::info!(
            "Terrain grid {}x{} ({} triangles)",
            mesh.grid.width(),
            mesh.grid.height(),
            mesh.grid.triangle_count()
        );

        Ok(Self {
            pipeline,
            mesh,
            source,
            gpu,
            heightmap,
            color_map,
            texture_bind_group,
            uniforms,
            mesh_color: config.terrain.mesh_color,
        })
    }

    pub fn mesh(&self) -> &TerrainMesh {
        &self.mesh
    }

    pub fn strategy(&self) -> NormalStrategy {
        self.mesh.params.strategy
    }

    pub fn grid_size(&self) -> (u32, u32) {
        (self.mesh.grid.width(), self.mesh.grid.height())
    }

    pub fn textures_pending(&self) -> bool {
        self.heightmap.is_pending() || self.color_map.is_pending()
    }

    /// Switch normal strategy; the accumulated normals in the vertex buffer
    /// are refreshed in place.
    pub fn set_strategy(&mut self, queue: &wgpu::Queue, strategy: NormalStrategy) {
        if strategy == self.mesh.params.strategy {
            return;
        }
        self.mesh.set_strategy(strategy);
        let vertices = GridVertex::from_terrain(&self.mesh);
        queue.write_buffer(&self.gpu.vertex_buffer, 0, bytemuck::cast_slice(&vertices));
        log::info!("Terrain normals: {}", strategy.label());
    }

    /// Regenerate the grid at a new resolution
    pub fn rebuild(
        &mut self,
        device: &wgpu::Device,
        grid_width: u32,
        grid_height: u32,
    ) -> Result<(), RenderError> {
        self.mesh.rebuild(&self.source, grid_width, grid_height)?;
        self.gpu = GpuGrid::upload(device, &self.mesh);
        log::info!("Terrain rebuilt at {}x{}", grid_width, grid_height);
        Ok(())
    }

    fn apply_heightmap(&mut self, device: &wgpu::Device, images: &[image::DynamicImage]) {
        let Some(img) = images.first() else { return };
        let regenerated = HeightField::from_image(img).and_then(|field| {
            let mesh = TerrainMesh::generate(&field, self.mesh.params.clone())?;
            Ok((field, mesh))
        });
        match regenerated {
            Ok((field, mesh)) => {
                self.source = field;
                self.mesh = mesh;
                self.gpu = GpuGrid::upload(device, &self.mesh);
            }
            // GPU displacement and the CPU mesh stay flat together
            Err(e) => self.heightmap.reject(&e.to_string()),
        }
    }
}

fn create_texture_bind_group(
    device: &wgpu::Device,
    pipeline: &TerrainPipeline,
    heightmap: &TextureSlot,
    color_map: &TextureSlot,
) -> wgpu::BindGroup {
    let height = heightmap.texture();
    let color = color_map.texture();
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Terrain Texture Bind Group"),
        layout: &pipeline.texture_bind_group_layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&height.view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(&height.sampler),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: wgpu::BindingResource::TextureView(&color.view),
            },
            wgpu::BindGroupEntry {
                binding: 3,
                resource: wgpu::BindingResource::Sampler(&color.sampler),
            },
        ],
    })
}

impl SceneObject for TerrainObject {
    fn label(&self) -> &'static str {
        "terrain"
    }

    fn poll_resources(&mut self, device: &wgpu::Device, queue: &wgpu::Queue) {
        let mut changed = false;
        match self.heightmap.poll(device, queue) {
            SlotEvent::Loaded(images) => {
                self.apply_heightmap(device, &images);
                changed = true;
            }
            SlotEvent::Failed(_) => changed = true,
            SlotEvent::Unchanged => {}
        }
        if !matches!(self.color_map.poll(device, queue), SlotEvent::Unchanged) {
            changed = true;
        }
        if changed {
            self.texture_bind_group =
                create_texture_bind_group(device, &self.pipeline, &self.heightmap, &self.color_map);
        }
    }

    /// Skipped until a configured heightmap has finished loading
    fn is_ready(&self) -> bool {
        !self.heightmap.is_pending()
    }

    fn prepare(&self, queue: &wgpu::Queue, params: &PassParams) {
        let (du, dv) = self.mesh.field.sample_offsets();
        let [r, g, b] = self.mesh_color;
        let [sx, sy, sz] = params.sun_direction;
        let uniforms = TerrainUniforms {
            view_proj: params.camera.view_projection_matrix(),
            sun_dir: [sx, sy, sz, 0.0],
            mesh_color: [r, g, b, 1.0],
            params: [
                self.mesh.params.height_scale,
                self.mesh.params.slope_scale,
                params.water_height,
                0.0,
            ],
            sample_offset: [du, dv, 0.0, 0.0],
            modes: [
                params.clip_mode().shader_value(),
                self.mesh.params.strategy.shader_mode(),
                0,
                0,
            ],
        };
        let (buffer, _) = self.uniforms.get(params.pass);
        queue.write_buffer(buffer, 0, bytemuck::bytes_of(&uniforms));
    }

    fn draw(&self, pass: ScenePass, render_pass: &mut wgpu::RenderPass<'_>) {
        let (_, uniform_bind_group) = self.uniforms.get(pass);
        render_pass.set_pipeline(&self.pipeline.pipeline);
        render_pass.set_bind_group(0, uniform_bind_group, &[]);
        render_pass.set_bind_group(1, &self.texture_bind_group, &[]);
        render_pass.set_vertex_buffer(0, self.gpu.vertex_buffer.slice(..));
        render_pass.set_index_buffer(self.gpu.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        render_pass.draw_indexed(0..self.gpu.index_count, 0, 0..1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_block_is_std140_sized() {
        assert_eq!(std::mem::size_of::<TerrainUniforms>(), 144);
    }

    #[test]
    fn unusable_heightmap_keeps_terrain_flat_on_both_sides() {
        let Some(ctx) = crate::headless::test_context(4, 4) else { return };
        let mut config = DemoConfig::default();
        config.terrain.grid_width = 8;
        config.terrain.grid_height = 8;
        let mut terrain = TerrainObject::new(&ctx.device, &ctx.queue, ctx.format, &config).unwrap();

        // One pixel wide: no height field can be built from it
        let narrow = image::DynamicImage::ImageLuma16(image::ImageBuffer::from_pixel(
            1,
            4,
            image::Luma([u16::MAX]),
        ));
        terrain.apply_heightmap(&ctx.device, &[narrow]);

        assert!(terrain.heightmap.is_failed());
        assert!(terrain.source.heights().iter().all(|&h| h == 0.0));
        assert_eq!(terrain.grid_size(), (8, 8));
    }
}

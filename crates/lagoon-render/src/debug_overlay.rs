//! Debug preview of the intermediate water textures
//!
//! Reflection, refraction and the water normal map are drawn unlit, side by
//! side, into a separate preview target. The main framebuffer is never
//! touched; the viewer displays the preview as an image.

use crate::context::{validated_pipeline, RenderError};
use crate::render_target::{begin_pass, ClearMode, PassTarget, RenderTarget, TargetSpec};
use crate::scene_object::{sampler_entry, texture_entry};

/// Preview color format (also what egui expects to display)
pub const PREVIEW_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

/// One tile per previewed texture
pub const PREVIEW_TILES: u32 = 3;

pub struct DebugOverlay {
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    preview: RenderTarget,
}

impl DebugOverlay {
    /// The preview is a third of the window in each dimension, fixed at creation
    pub fn new(device: &wgpu::Device, window_width: u32, window_height: u32) -> Result<Self, RenderError> {
        let (width, height) = preview_size(window_width, window_height);
        let preview = RenderTarget::new(
            device,
            &TargetSpec {
                label: "Debug Preview",
                width,
                height,
                color_formats: &[PREVIEW_FORMAT],
                depth: false,
            },
        )?;

        let (pipeline, bind_group_layout) = validated_pipeline(device, "Debug Overlay", || {
            let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("Debug Overlay Shader"),
                source: wgpu::ShaderSource::Wgsl(include_str!("shaders/debug_overlay.wgsl").into()),
            });

            let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Debug Overlay Bind Group Layout"),
                entries: &[
                    texture_entry(0, wgpu::ShaderStages::FRAGMENT, wgpu::TextureViewDimension::D2),
                    sampler_entry(1, wgpu::ShaderStages::FRAGMENT),
                ],
            });

            let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Debug Overlay Pipeline Layout"),
                bind_group_layouts: &[&bind_group_layout],
                push_constant_ranges: &[],
            });

            let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("Debug Overlay Pipeline"),
                layout: Some(&layout),
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
                        format: PREVIEW_FORMAT,
                        blend: None,
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: Default::default(),
                }),
                primitive: wgpu::PrimitiveState::default(),
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            });

            (pipeline, bind_group_layout)
        })?;

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Debug Overlay Sampler"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        Ok(Self {
            pipeline,
            bind_group_layout,
            sampler,
            preview,
        })
    }

    pub fn preview(&self) -> &RenderTarget {
        &self.preview
    }

    /// Draw each view into its own tile of the preview target
    pub fn encode(
        &self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        views: &[&wgpu::TextureView],
    ) {
        let bind_groups: Vec<wgpu::BindGroup> = views
            .iter()
            .map(|view| {
                device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("Debug Overlay Bind Group"),
                    layout: &self.bind_group_layout,
                    entries: &[
                        wgpu::BindGroupEntry {
                            binding: 0,
                            resource: wgpu::BindingResource::TextureView(view),
                        },
                        wgpu::BindGroupEntry {
                            binding: 1,
                            resource: wgpu::BindingResource::Sampler(&self.sampler),
                        },
                    ],
                })
            })
            .collect();

        let (width, height) = self.preview.size();
        let mut pass = begin_pass(
            encoder,
            &self.preview,
            "Debug Overlay Pass",
            ClearMode::Clear(wgpu::Color::BLACK),
        );
        pass.set_pipeline(&self.pipeline);
        for (index, bind_group) in bind_groups.iter().enumerate() {
            let (x, tile_width) = tile_span(index as u32, width);
            pass.set_viewport(x as f32, 0.0, tile_width as f32, height as f32, 0.0, 1.0);
            pass.set_bind_group(0, bind_group, &[]);
            pass.draw(0..3, 0..1);
        }
    }
}

pub fn preview_size(window_width: u32, window_height: u32) -> (u32, u32) {
    ((window_width / 3).max(PREVIEW_TILES), (window_height / 3).max(1))
}

/// Horizontal start and width of tile `index`; the last tile absorbs the remainder
pub fn tile_span(index: u32, width: u32) -> (u32, u32) {
    let tile = (width / PREVIEW_TILES).max(1);
    let x = (index * tile).min(width.saturating_sub(1));
    let w = if index + 1 >= PREVIEW_TILES { width - x } else { tile };
    (x, w.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_is_a_third_of_the_window() {
        assert_eq!(preview_size(1280, 720), (426, 240));
        assert_eq!(preview_size(2, 2), (3, 1));
    }

    #[test]
    fn tiles_cover_the_preview_without_overlap() {
        let width = 427;
        let spans: Vec<(u32, u32)> = (0..PREVIEW_TILES).map(|i| tile_span(i, width)).collect();
        assert_eq!(spans[0].0, 0);
        for pair in spans.windows(2) {
            assert_eq!(pair[0].0 + pair[0].1, pair[1].0);
        }
        let last = spans[spans.len() - 1];
        assert_eq!(last.0 + last.1, width);
    }
}

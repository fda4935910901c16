//! Offscreen render targets and scoped pass binding
//!
//! A target is created once at a fixed resolution and never follows the
//! window size. Opening a pass on a target is the only way to draw into it:
//! `begin_pass` binds the attachments and sets the viewport to the target's
//! size, and the returned `wgpu::RenderPass` unbinds everything when dropped.

use crate::context::{validated, DEPTH_FORMAT, RenderError};

/// Anything a render pass can draw into
pub trait PassTarget {
    fn label(&self) -> &str;
    fn size(&self) -> (u32, u32);
    fn color_views(&self) -> Vec<&wgpu::TextureView>;
    fn depth_view(&self) -> Option<&wgpu::TextureView>;
}

/// How a pass treats the existing contents of its attachments
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ClearMode {
    Clear(wgpu::Color),
    Load,
}

/// Description of an offscreen target
#[derive(Clone, Debug)]
pub struct TargetSpec<'a> {
    pub label: &'a str,
    pub width: u32,
    pub height: u32,
    /// One texture per entry, addressed by index in `color_view`
    pub color_formats: &'a [wgpu::TextureFormat],
    pub depth: bool,
}

struct ColorAttachment {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    format: wgpu::TextureFormat,
}

/// A fixed-size set of color attachments plus an optional depth attachment
pub struct RenderTarget {
    label: String,
    width: u32,
    height: u32,
    colors: Vec<ColorAttachment>,
    depth: Option<(wgpu::Texture, wgpu::TextureView)>,
}

impl RenderTarget {
    /// Allocate every attachment. Invalid sizes, formats that cannot be
    /// rendered to, or device validation errors are reported, never patched up.
    /// Formats are checked against what every adapter guarantees.
    pub fn new(device: &wgpu::Device, spec: &TargetSpec<'_>) -> Result<Self, RenderError> {
        Self::create(device, None, spec)
    }

    /// `new`, with formats also checked against `adapter`'s own format table.
    /// Downlevel (GL-class) adapters cannot render to every guaranteed format.
    pub fn with_adapter(
        adapter: &wgpu::Adapter,
        device: &wgpu::Device,
        spec: &TargetSpec<'_>,
    ) -> Result<Self, RenderError> {
        Self::create(device, Some(adapter), spec)
    }

    fn create(
        device: &wgpu::Device,
        adapter: Option<&wgpu::Adapter>,
        spec: &TargetSpec<'_>,
    ) -> Result<Self, RenderError> {
        check_spec(device, adapter, spec)?;

        let fail = |message: String| RenderError::TargetCreation {
            label: spec.label.to_string(),
            message,
        };

        let size = wgpu::Extent3d {
            width: spec.width,
            height: spec.height,
            depth_or_array_layers: 1,
        };

        let (colors, depth) = validated(device, || {
            let colors: Vec<ColorAttachment> = spec
                .color_formats
                .iter()
                .enumerate()
                .map(|(index, &format)| {
                    let texture = device.create_texture(&wgpu::TextureDescriptor {
                        label: Some(&format!("{} Color {}", spec.label, index)),
                        size,
                        mip_level_count: 1,
                        sample_count: 1,
                        dimension: wgpu::TextureDimension::D2,
                        format,
                        usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                            | wgpu::TextureUsages::TEXTURE_BINDING
                            | wgpu::TextureUsages::COPY_SRC,
                        view_formats: &[],
                    });
                    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
                    ColorAttachment {
                        texture,
                        view,
                        format,
                    }
                })
                .collect();

            let depth = spec.depth.then(|| {
                let texture = device.create_texture(&wgpu::TextureDescriptor {
                    label: Some(&format!("{} Depth", spec.label)),
                    size,
                    mip_level_count: 1,
                    sample_count: 1,
                    dimension: wgpu::TextureDimension::D2,
                    format: DEPTH_FORMAT,
                    usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                        | wgpu::TextureUsages::TEXTURE_BINDING,
                    view_formats: &[],
                });
                let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
                (texture, view)
            });

            (colors, depth)
        })
        .map_err(fail)?;

        log::debug!(
            "Created render target '{}' {}x{} ({} color, depth: {})",
            spec.label,
            spec.width,
            spec.height,
            colors.len(),
            depth.is_some()
        );

        Ok(Self {
            label: spec.label.to_string(),
            width: spec.width,
            height: spec.height,
            colors,
            depth,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn color_count(&self) -> usize {
        self.colors.len()
    }

    pub fn color_view(&self, index: usize) -> Option<&wgpu::TextureView> {
        self.colors.get(index).map(|c| &c.view)
    }

    pub fn color_texture(&self, index: usize) -> Option<&wgpu::Texture> {
        self.colors.get(index).map(|c| &c.texture)
    }

    pub fn color_format(&self, index: usize) -> Option<wgpu::TextureFormat> {
        self.colors.get(index).map(|c| c.format)
    }
}

impl PassTarget for RenderTarget {
    fn label(&self) -> &str {
        &self.label
    }

    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn color_views(&self) -> Vec<&wgpu::TextureView> {
        self.colors.iter().map(|c| &c.view).collect()
    }

    fn depth_view(&self) -> Option<&wgpu::TextureView> {
        self.depth.as_ref().map(|(_, view)| view)
    }
}

/// The main framebuffer (window surface or headless color texture)
pub struct SurfaceTarget<'a> {
    color: &'a wgpu::TextureView,
    depth: &'a wgpu::TextureView,
    width: u32,
    height: u32,
}

impl<'a> SurfaceTarget<'a> {
    pub fn new(
        color: &'a wgpu::TextureView,
        depth: &'a wgpu::TextureView,
        width: u32,
        height: u32,
    ) -> Self {
        Self {
            color,
            depth,
            width,
            height,
        }
    }
}

impl PassTarget for SurfaceTarget<'_> {
    fn label(&self) -> &str {
        "Main Framebuffer"
    }

    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn color_views(&self) -> Vec<&wgpu::TextureView> {
        vec![self.color]
    }

    fn depth_view(&self) -> Option<&wgpu::TextureView> {
        Some(self.depth)
    }
}

/// Bind `target` for writing. The viewport covers the whole target; the
/// binding ends when the returned pass is dropped.
pub fn begin_pass<'e>(
    encoder: &'e mut wgpu::CommandEncoder,
    target: &dyn PassTarget,
    label: &str,
    clear: ClearMode,
) -> wgpu::RenderPass<'e> {
    let (color_load, depth_load) = match clear {
        ClearMode::Clear(color) => (wgpu::LoadOp::Clear(color), wgpu::LoadOp::Clear(1.0)),
        ClearMode::Load => (wgpu::LoadOp::Load, wgpu::LoadOp::Load),
    };

    let color_attachments: Vec<Option<wgpu::RenderPassColorAttachment>> = target
        .color_views()
        .into_iter()
        .map(|view| {
            Some(wgpu::RenderPassColorAttachment {
                view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: color_load,
                    store: wgpu::StoreOp::Store,
                },
            })
        })
        .collect();

    let depth_stencil_attachment =
        target
            .depth_view()
            .map(|view| wgpu::RenderPassDepthStencilAttachment {
                view,
                depth_ops: Some(wgpu::Operations {
                    load: depth_load,
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            });

    let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some(label),
        color_attachments: &color_attachments,
        depth_stencil_attachment,
        timestamp_writes: None,
        occlusion_query_set: None,
    });

    let (width, height) = target.size();
    pass.set_viewport(0.0, 0.0, width as f32, height as f32, 0.0, 1.0);
    pass
}

/// Whether `format` can be a color attachment. Without an adapter only the
/// usages every adapter guarantees for the device's features count.
pub fn is_color_renderable(
    device: &wgpu::Device,
    adapter: Option<&wgpu::Adapter>,
    format: wgpu::TextureFormat,
) -> bool {
    if format.is_depth_stencil_format() {
        return false;
    }
    let mut usages = format
        .guaranteed_format_features(device.features())
        .allowed_usages;
    if let Some(adapter) = adapter {
        usages &= adapter.get_texture_format_features(format).allowed_usages;
    }
    usages.contains(wgpu::TextureUsages::RENDER_ATTACHMENT)
}

fn check_spec(
    device: &wgpu::Device,
    adapter: Option<&wgpu::Adapter>,
    spec: &TargetSpec<'_>,
) -> Result<(), RenderError> {
    let fail = |message: String| {
        Err(RenderError::TargetCreation {
            label: spec.label.to_string(),
            message,
        })
    };

    let max = device.limits().max_texture_dimension_2d;
    if spec.width == 0 || spec.height == 0 || spec.width > max || spec.height > max {
        return fail(format!(
            "size {}x{} outside 1..={}",
            spec.width, spec.height, max
        ));
    }
    if spec.color_formats.is_empty() && !spec.depth {
        return fail("target has no attachments".to_string());
    }
    let max_attachments = device.limits().max_color_attachments as usize;
    if spec.color_formats.len() > max_attachments {
        return fail(format!(
            "{} color attachments exceed the device limit of {}",
            spec.color_formats.len(),
            max_attachments
        ));
    }
    let mut bytes_per_sample = 0u32;
    for &format in spec.color_formats {
        if format.is_depth_stencil_format() {
            return fail(format!("{:?} is a depth format", format));
        }
        if !is_color_renderable(device, adapter, format) {
            return Err(RenderError::UnsupportedFormat {
                label: spec.label.to_string(),
                format,
            });
        }
        let cost = format.target_pixel_byte_cost().unwrap_or(0);
        let align = format.target_component_alignment().unwrap_or(1).max(1);
        bytes_per_sample = bytes_per_sample.div_ceil(align) * align + cost;
    }
    let budget = device.limits().max_color_attachment_bytes_per_sample;
    if bytes_per_sample > budget {
        return fail(format!(
            "attachments need {} bytes per sample, device allows {}",
            bytes_per_sample, budget
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::test_context;

    fn spec<'a>(formats: &'a [wgpu::TextureFormat]) -> TargetSpec<'a> {
        TargetSpec {
            label: "Test Target",
            width: 8,
            height: 8,
            color_formats: formats,
            depth: true,
        }
    }

    #[test]
    fn shared_exponent_format_is_never_a_color_target() {
        let Some(ctx) = test_context(4, 4) else { return };
        let formats = [wgpu::TextureFormat::Rgb9e5Ufloat];
        match RenderTarget::with_adapter(&ctx.adapter, &ctx.device, &spec(&formats)) {
            Err(RenderError::UnsupportedFormat { label, format }) => {
                assert_eq!(label, "Test Target");
                assert_eq!(format, wgpu::TextureFormat::Rgb9e5Ufloat);
            }
            Err(e) => panic!("unexpected error: {}", e),
            Ok(_) => panic!("Rgb9e5Ufloat accepted as a color attachment"),
        }
    }

    #[test]
    fn depth_format_in_color_list_is_rejected() {
        let Some(ctx) = test_context(4, 4) else { return };
        let formats = [crate::context::DEPTH_FORMAT];
        let err = RenderTarget::new(&ctx.device, &spec(&formats)).err();
        assert!(matches!(err, Some(RenderError::TargetCreation { .. })));
    }

    #[test]
    fn zero_sized_target_is_rejected() {
        let Some(ctx) = test_context(4, 4) else { return };
        let formats = [wgpu::TextureFormat::Rgba8Unorm];
        let mut empty = spec(&formats);
        empty.width = 0;
        let err = RenderTarget::new(&ctx.device, &empty).err();
        assert!(matches!(err, Some(RenderError::TargetCreation { .. })));
    }

    #[test]
    fn adapter_checked_target_keeps_its_size() {
        let Some(ctx) = test_context(4, 4) else { return };
        let formats = [wgpu::TextureFormat::Rgba8Unorm];
        let target = RenderTarget::with_adapter(&ctx.adapter, &ctx.device, &spec(&formats))
            .expect("Rgba8Unorm target");
        assert_eq!(target.size(), (8, 8));
        assert_eq!(target.color_count(), 1);
        assert!(target.depth_view().is_some());
    }
}

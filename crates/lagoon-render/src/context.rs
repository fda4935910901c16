//! GPU device acquisition (windowed or headless) and shared creation helpers

use lagoon_core::LagoonError;
use std::sync::Arc;
use thiserror::Error;
use winit::dpi::PhysicalSize;
use winit::window::Window;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Failed to create surface: {0}")]
    SurfaceCreation(String),
    #[error("No compatible GPU adapter")]
    AdapterNotFound,
    #[error("Failed to create device: {0}")]
    DeviceCreation(String),
    #[error("Failed to read back texture: {0}")]
    BufferReadFailed(String),
    #[error("Failed to create pipeline '{label}': {message}")]
    PipelineCreation { label: String, message: String },
    #[error("Failed to create render target '{label}': {message}")]
    TargetCreation { label: String, message: String },
    #[error("Render target '{label}' needs {format:?}, which this adapter cannot render to")]
    UnsupportedFormat {
        label: String,
        format: wgpu::TextureFormat,
    },
    #[error("Texture error: {0}")]
    Texture(String),
    #[error("Invalid frame plan: {0}")]
    FramePlan(String),
    #[error(transparent)]
    Lagoon(#[from] LagoonError),
}

/// Depth format shared by every pipeline and render target
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// A window surface with its device, queue and a depth buffer matching the
/// surface size
pub struct RenderContext {
    pub surface: wgpu::Surface<'static>,
    pub adapter: wgpu::Adapter,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
    pub size: PhysicalSize<u32>,
    pub depth_texture: wgpu::Texture,
    pub depth_view: wgpu::TextureView,
}

impl RenderContext {
    pub async fn new(window: Arc<Window>) -> Result<Self, RenderError> {
        let size = window.inner_size();
        let instance = create_instance();

        let surface = instance
            .create_surface(window)
            .map_err(|e| RenderError::SurfaceCreation(e.to_string()))?;
        let adapter = request_adapter(&instance, Some(&surface)).await?;
        let (device, queue) = request_device(&adapter, "Lagoon Device").await?;

        let caps = surface.get_capabilities(&adapter);
        let format = pick_surface_format(&caps.formats)
            .ok_or_else(|| RenderError::SurfaceCreation("surface reports no formats".into()))?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);
        log::info!("Surface {:?} at {}x{}", format, config.width, config.height);

        let (depth_texture, depth_view) =
            create_depth_texture(&device, config.width, config.height, "Surface Depth");

        Ok(Self {
            surface,
            adapter,
            device,
            queue,
            config,
            size,
            depth_texture,
            depth_view,
        })
    }

    /// Reconfigure the surface and its depth buffer. Offscreen render targets
    /// keep their own fixed size. Zero-sized (minimised) windows are ignored.
    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }
        self.size = new_size;
        self.config.width = new_size.width;
        self.config.height = new_size.height;
        self.surface.configure(&self.device, &self.config);

        let (texture, view) =
            create_depth_texture(&self.device, new_size.width, new_size.height, "Surface Depth");
        self.depth_texture = texture;
        self.depth_view = view;
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.size.width as f32 / self.size.height.max(1) as f32
    }
}

pub(crate) fn create_instance() -> wgpu::Instance {
    wgpu::Instance::new(wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        ..Default::default()
    })
}

/// Any adapter able to present to `surface`, or any adapter at all when headless
pub(crate) async fn request_adapter(
    instance: &wgpu::Instance,
    surface: Option<&wgpu::Surface<'_>>,
) -> Result<wgpu::Adapter, RenderError> {
    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::default(),
            compatible_surface: surface,
            force_fallback_adapter: false,
        })
        .await
        .ok_or(RenderError::AdapterNotFound)?;
    let info = adapter.get_info();
    log::info!("Using adapter: {} ({:?})", info.name, info.backend);
    Ok(adapter)
}

pub(crate) async fn request_device(
    adapter: &wgpu::Adapter,
    label: &str,
) -> Result<(wgpu::Device, wgpu::Queue), RenderError> {
    adapter
        .request_device(
            &wgpu::DeviceDescriptor {
                label: Some(label),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: Default::default(),
            },
            None,
        )
        .await
        .map_err(|e| RenderError::DeviceCreation(e.to_string()))
}

/// Prefer an sRGB surface so shader output is gamma-encoded on present
fn pick_surface_format(formats: &[wgpu::TextureFormat]) -> Option<wgpu::TextureFormat> {
    formats
        .iter()
        .copied()
        .find(wgpu::TextureFormat::is_srgb)
        .or_else(|| formats.first().copied())
}

pub(crate) fn create_depth_texture(
    device: &wgpu::Device,
    width: u32,
    height: u32,
    label: &str,
) -> (wgpu::Texture, wgpu::TextureView) {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    (texture, view)
}

/// Run `build` inside a validation error scope so GPU object creation
/// failures come back as `Err` instead of the device's uncaptured-error panic.
pub(crate) fn validated<T>(
    device: &wgpu::Device,
    build: impl FnOnce() -> T,
) -> Result<T, String> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let value = build();
    match pollster::block_on(device.pop_error_scope()) {
        Some(err) => Err(err.to_string()),
        None => Ok(value),
    }
}

/// `validated` for pipelines and shader modules
pub(crate) fn validated_pipeline<T>(
    device: &wgpu::Device,
    label: &str,
    build: impl FnOnce() -> T,
) -> Result<T, RenderError> {
    validated(device, build).map_err(|message| {
        log::error!("Pipeline '{}' failed validation: {}", label, message);
        RenderError::PipelineCreation {
            label: label.to_string(),
            message,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use wgpu::TextureFormat;

    #[test]
    fn srgb_surface_format_is_preferred() {
        let formats = [TextureFormat::Bgra8Unorm, TextureFormat::Bgra8UnormSrgb];
        assert_eq!(pick_surface_format(&formats), Some(TextureFormat::Bgra8UnormSrgb));
    }

    #[test]
    fn first_format_is_the_fallback() {
        let formats = [TextureFormat::Rgba16Float, TextureFormat::Bgra8Unorm];
        assert_eq!(pick_surface_format(&formats), Some(TextureFormat::Rgba16Float));
        assert_eq!(pick_surface_format(&[]), None);
    }
}

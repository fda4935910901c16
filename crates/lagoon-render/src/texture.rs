//! GPU textures, 1x1 placeholders and asynchronous image loading
//!
//! Images are decoded on a background thread. The render loop polls each
//! `TextureSlot` once per frame without blocking; until a load completes the
//! slot hands out its placeholder texture.

use crate::context::RenderError;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use wgpu::util::DeviceExt;

/// A GPU-resident texture with its view and sampler
pub struct GpuTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub sampler: wgpu::Sampler,
}

/// Format, addressing and mip settings used when uploading an image
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct UploadOptions {
    pub format: wgpu::TextureFormat,
    pub address_mode: wgpu::AddressMode,
    pub mipmaps: bool,
    pub cube: bool,
}

impl UploadOptions {
    /// sRGB color image, repeating, mipmapped
    pub fn color() -> Self {
        Self {
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            address_mode: wgpu::AddressMode::Repeat,
            mipmaps: true,
            cube: false,
        }
    }

    /// Linear data (normal, distortion maps), repeating, mipmapped
    pub fn data() -> Self {
        Self {
            format: wgpu::TextureFormat::Rgba8Unorm,
            ..Self::color()
        }
    }

    /// Heightmap: linear, clamped to edge, mipmapped with nearest mip selection
    pub fn heightmap() -> Self {
        Self {
            format: wgpu::TextureFormat::Rgba8Unorm,
            address_mode: wgpu::AddressMode::ClampToEdge,
            mipmaps: true,
            cube: false,
        }
    }

    /// Six-face sRGB cube map
    pub fn cube() -> Self {
        Self {
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            address_mode: wgpu::AddressMode::ClampToEdge,
            mipmaps: false,
            cube: true,
        }
    }
}

/// Number of mip levels down to 1x1
pub fn mip_level_count(width: u32, height: u32) -> u32 {
    32 - width.max(height).max(1).leading_zeros()
}

/// Successively halved copies of `img`, level 0 first
pub fn build_mip_chain(img: &image::RgbaImage) -> Vec<image::RgbaImage> {
    let levels = mip_level_count(img.width(), img.height());
    let mut chain = Vec::with_capacity(levels as usize);
    chain.push(img.clone());
    for _ in 1..levels {
        let Some(prev) = chain.last() else { break };
        let w = (prev.width() / 2).max(1);
        let h = (prev.height() / 2).max(1);
        let next = image::imageops::resize(prev, w, h, image::imageops::FilterType::Triangle);
        chain.push(next);
    }
    chain
}

fn create_sampler(device: &wgpu::Device, label: &str, options: &UploadOptions) -> wgpu::Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some(&format!("{} Sampler", label)),
        address_mode_u: options.address_mode,
        address_mode_v: options.address_mode,
        address_mode_w: options.address_mode,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        mipmap_filter: wgpu::FilterMode::Nearest,
        ..Default::default()
    })
}

/// A 1x1 texture (or 1x1 cube) filled with one color
pub fn create_solid(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    label: &str,
    color: [u8; 4],
    options: &UploadOptions,
) -> GpuTexture {
    let layers = if options.cube { 6 } else { 1 };
    let data: Vec<u8> = color.iter().copied().cycle().take(4 * layers).collect();

    let texture = device.create_texture_with_data(
        queue,
        &wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: 1,
                height: 1,
                depth_or_array_layers: layers as u32,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: options.format,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        },
        wgpu::util::TextureDataOrder::LayerMajor,
        &data,
    );

    let view = texture.create_view(&view_descriptor(options));
    let sampler = create_sampler(device, label, options);
    GpuTexture {
        texture,
        view,
        sampler,
    }
}

/// Upload decoded images: one image for 2D textures, six equally sized
/// square faces (+X, -X, +Y, -Y, +Z, -Z) for cube maps.
pub fn upload_images(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    label: &str,
    images: &[image::DynamicImage],
    options: &UploadOptions,
) -> Result<GpuTexture, RenderError> {
    let expected_layers = if options.cube { 6 } else { 1 };
    if images.len() != expected_layers {
        return Err(RenderError::Texture(format!(
            "'{}' needs {} image(s), got {}",
            label,
            expected_layers,
            images.len()
        )));
    }

    let layers: Vec<image::RgbaImage> = images.iter().map(|img| img.to_rgba8()).collect();
    let (width, height) = layers[0].dimensions();
    if width == 0 || height == 0 {
        return Err(RenderError::Texture(format!("'{}' is empty", label)));
    }
    if layers.iter().any(|l| l.dimensions() != (width, height)) {
        return Err(RenderError::Texture(format!(
            "'{}' faces differ in size",
            label
        )));
    }
    if options.cube && width != height {
        return Err(RenderError::Texture(format!(
            "'{}' cube faces must be square, got {}x{}",
            label, width, height
        )));
    }

    // LayerMajor: every mip of layer 0, then every mip of layer 1, ...
    let mut data = Vec::new();
    let mut mip_levels = 1;
    for layer in &layers {
        if options.mipmaps {
            let chain = build_mip_chain(layer);
            mip_levels = chain.len() as u32;
            for level in chain {
                data.extend_from_slice(level.as_raw());
            }
        } else {
            data.extend_from_slice(layer.as_raw());
        }
    }

    let texture = device.create_texture_with_data(
        queue,
        &wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: expected_layers as u32,
            },
            mip_level_count: mip_levels,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: options.format,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        },
        wgpu::util::TextureDataOrder::LayerMajor,
        &data,
    );

    let view = texture.create_view(&view_descriptor(options));
    let sampler = create_sampler(device, label, options);
    Ok(GpuTexture {
        texture,
        view,
        sampler,
    })
}

fn view_descriptor(options: &UploadOptions) -> wgpu::TextureViewDescriptor<'static> {
    wgpu::TextureViewDescriptor {
        dimension: Some(if options.cube {
            wgpu::TextureViewDimension::Cube
        } else {
            wgpu::TextureViewDimension::D2
        }),
        ..Default::default()
    }
}

/// Files to decode for one slot
#[derive(Clone, Debug, PartialEq)]
pub enum LoadRequest {
    Single(PathBuf),
    Cube([PathBuf; 6]),
}

impl LoadRequest {
    fn paths(&self) -> Vec<PathBuf> {
        match self {
            Self::Single(path) => vec![path.clone()],
            Self::Cube(faces) => faces.to_vec(),
        }
    }
}

type DecodeResult = Result<Vec<image::DynamicImage>, String>;

/// Decode the request's files on a background thread
pub fn spawn_decode(request: LoadRequest) -> Receiver<DecodeResult> {
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        let result = request
            .paths()
            .iter()
            .map(|path| {
                image::open(path)
                    .map_err(|e| format!("failed to load '{}': {}", path.display(), e))
            })
            .collect::<DecodeResult>();
        // The receiver may be gone if the slot was dropped mid-load.
        let _ = tx.send(result);
    });
    rx
}

enum SlotState {
    Placeholder,
    Pending(Receiver<DecodeResult>),
    Ready(GpuTexture),
    Failed,
}

/// What happened to a slot during `poll`
pub enum SlotEvent {
    Unchanged,
    /// The upload finished; the decoded images are handed to the caller for
    /// any CPU-side use (e.g. building a height field).
    Loaded(Vec<image::DynamicImage>),
    Failed(String),
}

/// A texture that may still be loading
pub struct TextureSlot {
    label: String,
    options: UploadOptions,
    placeholder: GpuTexture,
    state: SlotState,
}

impl TextureSlot {
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        label: &str,
        placeholder_color: [u8; 4],
        options: UploadOptions,
    ) -> Self {
        let placeholder = create_solid(
            device,
            queue,
            &format!("{} Placeholder", label),
            placeholder_color,
            &options,
        );
        Self {
            label: label.to_string(),
            options,
            placeholder,
            state: SlotState::Placeholder,
        }
    }

    /// Start loading; a request of `None` keeps the placeholder for good
    pub fn request(&mut self, request: Option<LoadRequest>) {
        match request {
            Some(request) => {
                log::info!("Loading texture '{}' from {:?}", self.label, request);
                self.state = SlotState::Pending(spawn_decode(request));
            }
            None => self.state = SlotState::Placeholder,
        }
    }

    /// Check for a finished decode and upload it. Never blocks.
    pub fn poll(&mut self, device: &wgpu::Device, queue: &wgpu::Queue) -> SlotEvent {
        let SlotState::Pending(rx) = &self.state else {
            return SlotEvent::Unchanged;
        };

        let decoded = match rx.try_recv() {
            Ok(result) => result,
            Err(TryRecvError::Empty) => return SlotEvent::Unchanged,
            Err(TryRecvError::Disconnected) => Err("decoder thread exited".to_string()),
        };

        let uploaded = decoded.and_then(|images| {
            upload_images(device, queue, &self.label, &images, &self.options)
                .map(|texture| (texture, images))
                .map_err(|e| e.to_string())
        });

        match uploaded {
            Ok((texture, images)) => {
                log::info!("Texture '{}' ready", self.label);
                self.state = SlotState::Ready(texture);
                SlotEvent::Loaded(images)
            }
            Err(message) => {
                log::warn!("Texture '{}' unavailable, keeping placeholder: {}", self.label, message);
                self.state = SlotState::Failed;
                SlotEvent::Failed(message)
            }
        }
    }

    /// Drop a loaded texture the caller cannot use; draws go back to the
    /// placeholder for good
    pub fn reject(&mut self, reason: &str) {
        log::warn!("Texture '{}' rejected, using placeholder: {}", self.label, reason);
        self.state = SlotState::Failed;
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.state, SlotState::Failed)
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, SlotState::Ready(_))
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.state, SlotState::Pending(_))
    }

    /// The loaded texture, or the placeholder while pending / after failure
    pub fn texture(&self) -> &GpuTexture {
        match &self.state {
            SlotState::Ready(texture) => texture,
            _ => &self.placeholder,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mip_count_reaches_one_texel() {
        assert_eq!(mip_level_count(1, 1), 1);
        assert_eq!(mip_level_count(2, 2), 2);
        assert_eq!(mip_level_count(256, 64), 9);
        assert_eq!(mip_level_count(300, 5), 9);
    }

    #[test]
    fn mip_chain_halves_each_level() {
        let img = image::RgbaImage::from_pixel(8, 4, image::Rgba([10, 20, 30, 255]));
        let chain = build_mip_chain(&img);
        let sizes: Vec<(u32, u32)> = chain.iter().map(|l| l.dimensions()).collect();
        assert_eq!(sizes, vec![(8, 4), (4, 2), (2, 1), (1, 1)]);
        // Uniform input stays uniform
        assert_eq!(chain[3].get_pixel(0, 0), &image::Rgba([10, 20, 30, 255]));
    }

    #[test]
    fn rejected_slot_falls_back_to_placeholder() {
        let Some(ctx) = crate::headless::test_context(4, 4) else { return };
        let options = UploadOptions::heightmap();
        let mut slot =
            TextureSlot::new(&ctx.device, &ctx.queue, "Height", [0, 0, 0, 255], options);
        slot.state = SlotState::Ready(create_solid(
            &ctx.device,
            &ctx.queue,
            "Loaded Height",
            [255, 255, 255, 255],
            &options,
        ));
        assert!(slot.is_ready());

        slot.reject("too narrow");
        assert!(slot.is_failed());
        assert!(!slot.is_ready());
        assert!(std::ptr::eq(slot.texture(), &slot.placeholder));
    }

    #[test]
    fn missing_file_reports_error_through_channel() {
        let rx = spawn_decode(LoadRequest::Single(PathBuf::from(
            "definitely/not/here/heightmap.png",
        )));
        let result = rx.recv().expect("decoder thread must answer");
        assert!(result.unwrap_err().contains("heightmap.png"));
    }
}

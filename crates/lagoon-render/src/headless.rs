//! Offscreen rendering without a window, with pixel readback

use crate::context::{create_instance, request_adapter, request_device, RenderError};
use crate::render_target::{RenderTarget, TargetSpec};

/// Color format of the headless frame
pub const HEADLESS_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

/// A device plus one color+depth frame standing in for a window surface
pub struct HeadlessContext {
    pub adapter: wgpu::Adapter,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub format: wgpu::TextureFormat,
    pub width: u32,
    pub height: u32,
    frame: RenderTarget,
}

impl HeadlessContext {
    pub async fn new(width: u32, height: u32) -> Result<Self, RenderError> {
        let instance = create_instance();
        let adapter = request_adapter(&instance, None).await?;
        let (device, queue) = request_device(&adapter, "Lagoon Headless Device").await?;

        let frame = RenderTarget::new(
            &device,
            &TargetSpec {
                label: "Headless Frame",
                width,
                height,
                color_formats: &[HEADLESS_FORMAT],
                depth: true,
            },
        )?;

        Ok(Self {
            adapter,
            device,
            queue,
            format: HEADLESS_FORMAT,
            width,
            height,
            frame,
        })
    }

    /// The frame as a pass destination
    pub fn target(&self) -> &RenderTarget {
        &self.frame
    }

    /// Tightly packed RGBA bytes of the frame, top row first
    pub async fn read_pixels(&self) -> Result<Vec<u8>, RenderError> {
        let texture = self
            .frame
            .color_texture(0)
            .ok_or_else(|| RenderError::BufferReadFailed("headless frame has no color".into()))?;
        read_texture_rgba8(&self.device, &self.queue, texture, self.width, self.height).await
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.width as f32 / self.height.max(1) as f32
    }
}

/// Headless context for GPU tests; `None` (test skipped) without an adapter
#[cfg(test)]
pub(crate) fn test_context(width: u32, height: u32) -> Option<HeadlessContext> {
    match pollster::block_on(HeadlessContext::new(width, height)) {
        Ok(ctx) => Some(ctx),
        Err(RenderError::AdapterNotFound) => {
            eprintln!("no GPU adapter, skipping");
            None
        }
        Err(e) => panic!("headless context failed: {}", e),
    }
}

/// Byte layout of one texel row in a copy buffer
#[derive(Clone, Copy, Debug, PartialEq)]
struct RowPitch {
    tight: u32,
    padded: u32,
}

impl RowPitch {
    fn new(width: u32, bytes_per_texel: u32) -> Self {
        let tight = width * bytes_per_texel;
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        Self {
            tight,
            padded: tight.div_ceil(align) * align,
        }
    }

    /// Drop the alignment padding at the end of every row
    fn unpad(&self, data: &[u8]) -> Vec<u8> {
        data.chunks_exact(self.padded as usize)
            .flat_map(|row| &row[..self.tight as usize])
            .copied()
            .collect()
    }
}

/// Copy a 4-byte-per-texel texture (created with `COPY_SRC`) into a tightly
/// packed byte vector. Blocks on the device until the copy is mapped.
pub async fn read_texture_rgba8(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    texture: &wgpu::Texture,
    width: u32,
    height: u32,
) -> Result<Vec<u8>, RenderError> {
    read_rows(device, queue, texture, width, height, 4).await
}

/// Tightly packed texels of any single-plane color texture, in its own
/// format (e.g. 16 bytes per texel for `Rgba32Float`)
pub async fn read_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    texture: &wgpu::Texture,
) -> Result<Vec<u8>, RenderError> {
    let format = texture.format();
    let bytes_per_texel = format.block_copy_size(None).ok_or_else(|| {
        RenderError::BufferReadFailed(format!("{:?} cannot be copied as a whole", format))
    })?;
    read_rows(device, queue, texture, texture.width(), texture.height(), bytes_per_texel).await
}

async fn read_rows(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    texture: &wgpu::Texture,
    width: u32,
    height: u32,
    bytes_per_texel: u32,
) -> Result<Vec<u8>, RenderError> {
    let pitch = RowPitch::new(width, bytes_per_texel);
    let staging = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Readback Staging Buffer"),
        size: u64::from(pitch.padded) * u64::from(height),
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("Readback Encoder"),
    });
    encoder.copy_texture_to_buffer(
        texture.as_image_copy(),
        wgpu::ImageCopyBuffer {
            buffer: &staging,
            layout: wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(pitch.padded),
                rows_per_image: Some(height),
            },
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );
    queue.submit(std::iter::once(encoder.finish()));

    let slice = staging.slice(..);
    let (sender, receiver) = std::sync::mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = sender.send(result);
    });
    device.poll(wgpu::Maintain::Wait);

    match receiver.recv() {
        Ok(Ok(())) => {}
        Ok(Err(e)) => return Err(RenderError::BufferReadFailed(e.to_string())),
        Err(e) => return Err(RenderError::BufferReadFailed(e.to_string())),
    }

    let pixels = pitch.unpad(&slice.get_mapped_range());
    staging.unmap();
    Ok(pixels)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_pitch_is_aligned_for_copies() {
        let pitch = RowPitch::new(10, 4);
        assert_eq!(pitch.tight, 40);
        assert_eq!(pitch.padded, wgpu::COPY_BYTES_PER_ROW_ALIGNMENT);

        let aligned = RowPitch::new(64, 4);
        assert_eq!(aligned.tight, aligned.padded);

        let float_rows = RowPitch::new(20, 16);
        assert_eq!(float_rows.tight, 320);
        assert_eq!(float_rows.padded, 512);
    }

    #[test]
    fn unpad_keeps_only_texel_bytes() {
        let pitch = RowPitch { tight: 2, padded: 4 };
        let data = [1, 2, 0, 0, 3, 4, 0, 0];
        assert_eq!(pitch.unpad(&data), vec![1, 2, 3, 4]);
    }
}

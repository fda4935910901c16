//! Height field loading and sampling
//!
//! Two addressings exist. `sample` is corner-aligned: `u = 0` and `u = 1`
//! land on the first and last samples, which is how a lattice field lines
//! up with its grid vertices. `sample_texture` reads the field the way a
//! clamp-to-edge linear GPU sampler reads the uploaded heightmap, with texel
//! centers at `(i + 0.5) / W`. `resample` uses the latter so the CPU lattice
//! holds the heights the vertex shader displaces the same grid by.

use lagoon_core::{LagoonError, Result};
use std::path::Path;

/// A grayscale height field with bilinear sampling.
///
/// Rows follow image order: row 0 is `v = 0`, the last row is `v = 1`.
#[derive(Clone, Debug, PartialEq)]
pub struct HeightField {
    /// Row-major height values normalized to [0..1]
    heights: Vec<f32>,
    width: u32,
    height: u32,
}

impl HeightField {
    /// Create a height field from row-major samples.
    pub fn from_raw(heights: Vec<f32>, width: u32, height: u32) -> Result<Self> {
        check_size(width, height)?;
        let expected = (width as usize) * (height as usize);
        if heights.len() != expected {
            return Err(LagoonError::HeightDataMismatch {
                expected,
                got: heights.len(),
            });
        }
        Ok(Self {
            heights,
            width,
            height,
        })
    }

    /// Constant-height field
    pub fn flat(width: u32, height: u32, value: f32) -> Result<Self> {
        Self::from_raw(vec![value; (width as usize) * (height as usize)], width, height)
    }

    /// Convert a decoded image to heights in [0..1] regardless of bit depth.
    pub fn from_image(img: &image::DynamicImage) -> Result<Self> {
        let gray = img.to_luma16();
        let (width, height) = gray.dimensions();
        let heights = gray.pixels().map(|p| p.0[0] as f32 / 65535.0).collect();
        Self::from_raw(heights, width, height)
    }

    /// Load a height field from a grayscale image file.
    pub fn from_png(path: &Path) -> Result<Self> {
        let img = image::open(path).map_err(|e| {
            LagoonError::ImageError(format!("failed to load heightmap '{}': {}", path.display(), e))
        })?;
        Self::from_image(&img)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn heights(&self) -> &[f32] {
        &self.heights
    }

    /// Parametric distance between neighbouring samples: (1/(W-1), 1/(H-1))
    pub fn sample_offsets(&self) -> (f32, f32) {
        (
            1.0 / (self.width - 1) as f32,
            1.0 / (self.height - 1) as f32,
        )
    }

    /// Height of sample (i, j), clamped to the field's edges
    pub fn texel(&self, i: i64, j: i64) -> f32 {
        let x = i.clamp(0, self.width as i64 - 1) as usize;
        let y = j.clamp(0, self.height as i64 - 1) as usize;
        self.heights[y * self.width as usize + x]
    }

    /// Bilinear sample at normalized coordinates, clamped to [0, 1].
    pub fn sample(&self, u: f32, v: f32) -> f32 {
        let fx = u.clamp(0.0, 1.0) * (self.width - 1) as f32;
        let fy = v.clamp(0.0, 1.0) * (self.height - 1) as f32;
        self.bilinear(fx, fy)
    }

    /// Bilinear sample with texel-centered, clamp-to-edge addressing
    pub fn sample_texture(&self, u: f32, v: f32) -> f32 {
        let fx = (u * self.width as f32 - 0.5).clamp(0.0, (self.width - 1) as f32);
        let fy = (v * self.height as f32 - 0.5).clamp(0.0, (self.height - 1) as f32);
        self.bilinear(fx, fy)
    }

    /// Interpolate at fractional sample coordinates within the field
    fn bilinear(&self, fx: f32, fy: f32) -> f32 {
        let x0 = (fx.floor() as i64).min(self.width as i64 - 2);
        let y0 = (fy.floor() as i64).min(self.height as i64 - 2);
        let tx = fx - x0 as f32;
        let ty = fy - y0 as f32;

        let top = lerp(self.texel(x0, y0), self.texel(x0 + 1, y0), tx);
        let bottom = lerp(self.texel(x0, y0 + 1), self.texel(x0 + 1, y0 + 1), tx);
        lerp(top, bottom, ty)
    }

    /// Resample onto a `width` x `height` lattice covering the same [0,1]² domain.
    ///
    /// Lattice point (i, j) sits at uv `(i/(width-1), j/(height-1))` and reads
    /// the source through `sample_texture`, even at the source's own size.
    pub fn resample(&self, width: u32, height: u32) -> Result<Self> {
        check_size(width, height)?;
        let mut heights = Vec::with_capacity((width as usize) * (height as usize));
        for j in 0..height {
            let v = j as f32 / (height - 1) as f32;
            for i in 0..width {
                let u = i as f32 / (width - 1) as f32;
                heights.push(self.sample_texture(u, v));
            }
        }
        Self::from_raw(heights, width, height)
    }
}

fn check_size(width: u32, height: u32) -> Result<()> {
    if width < 2 || height < 2 {
        return Err(LagoonError::InvalidGridSize { width, height });
    }
    Ok(())
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

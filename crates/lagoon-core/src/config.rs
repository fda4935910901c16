//! `lagoon.toml` configuration
//!
//! Every table and field is optional; missing values fall back to the
//! defaults the demos were tuned with. Relative texture paths are resolved
//! against the directory of the config file.

use crate::error::{LagoonError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Size of the light array declared in the deferred lighting shader
pub const MAX_SHADER_LIGHTS: usize = 500;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DemoConfig {
    pub window: WindowConfig,
    pub terrain: TerrainSettings,
    pub water: WaterConfig,
    pub sky: SkyConfig,
    pub lights: LightsConfig,
    pub debug: DebugConfig,
    /// Directory relative paths are resolved against (not serialized)
    #[serde(skip)]
    pub base_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub width: u32,
    pub height: u32,
    pub title: String,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            title: "Lagoon".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum NormalStrategyName {
    #[default]
    Analytic,
    Accumulated,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainSettings {
    /// Grid vertices along u
    pub grid_width: u32,
    /// Grid vertices along v
    pub grid_height: u32,
    pub height_scale: f32,
    /// Vertical term of the finite-difference normal
    pub slope_scale: f32,
    pub normal_strategy: NormalStrategyName,
    /// Grayscale heightmap image; empty keeps the terrain flat
    pub heightmap: String,
    /// Color texture modulating `mesh_color`; empty uses white
    pub color_map: String,
    pub mesh_color: [f32; 3],
}

impl Default for TerrainSettings {
    fn default() -> Self {
        Self {
            grid_width: 100,
            grid_height: 100,
            height_scale: 0.5,
            slope_scale: 2.0,
            normal_strategy: NormalStrategyName::Analytic,
            heightmap: String::new(),
            color_map: String::new(),
            mesh_color: [230.0 / 255.0, 66.0 / 255.0, 16.0 / 255.0],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaterConfig {
    pub height: f32,
    pub reflection_resolution: u32,
    pub refraction_resolution: u32,
    pub distortion_map: String,
    pub normal_map: String,
    pub distortion_scale: f32,
    pub specular_exponent: f32,
    pub wave_speed: f32,
    pub tiling: f32,
}

impl Default for WaterConfig {
    fn default() -> Self {
        Self {
            height: 0.1,
            reflection_resolution: 1024,
            refraction_resolution: 1024,
            distortion_map: String::new(),
            normal_map: String::new(),
            distortion_scale: 1.0 / 50.0,
            specular_exponent: 128.0,
            wave_speed: 0.03,
            tiling: 4.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SkyConfig {
    /// Cube map faces in +X, -X, +Y, -Y, +Z, -Z order; empty uses a flat sky
    pub faces: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightsConfig {
    /// Upper bound of the light count slider
    pub max_lights: usize,
    pub initial_count: usize,
    /// Intensity slider value, 1..=50
    pub intensity: f32,
    pub gbuffer_resolution: u32,
    /// Cubes per edge of the instanced cube field
    pub cube_grid: u32,
    /// Fixed seed for reproducible light placement
    pub seed: Option<u64>,
}

impl Default for LightsConfig {
    fn default() -> Self {
        Self {
            max_lights: 100,
            initial_count: 10,
            intensity: 10.0,
            gbuffer_resolution: 64,
            cube_grid: 10,
            seed: None,
        }
    }
}

impl LightsConfig {
    /// Range checks for the lights table alone
    pub fn validate(&self) -> Result<()> {
        check_range(
            "lights.max_lights",
            self.max_lights as f32,
            1.0,
            MAX_SHADER_LIGHTS as f32,
        )?;
        check_range(
            "lights.initial_count",
            self.initial_count as f32,
            0.0,
            self.max_lights as f32,
        )?;
        check_range("lights.intensity", self.intensity, 1.0, 50.0)?;
        check_range(
            "lights.gbuffer_resolution",
            self.gbuffer_resolution as f32,
            1.0,
            8192.0,
        )?;
        check_range("lights.cube_grid", self.cube_grid as f32, 2.0, 64.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DebugConfig {
    pub overlay: bool,
}

impl DemoConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: DemoConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from disk; relative paths resolve against the file's directory
    pub fn load(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml_str(&source)?;
        config.base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Ok(config)
    }

    /// Load `path` if it exists, otherwise fall back to defaults
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Resolve a configured path; empty strings mean "not configured"
    pub fn resolve_path(&self, relative: &str) -> Option<PathBuf> {
        if relative.trim().is_empty() {
            return None;
        }
        let path = Path::new(relative);
        if path.is_absolute() {
            Some(path.to_path_buf())
        } else {
            Some(self.base_dir.join(path))
        }
    }

    /// Sky faces as resolved paths, or `None` when the sky is not configured
    pub fn sky_face_paths(&self) -> Option<[PathBuf; 6]> {
        if self.sky.faces.len() != 6 {
            return None;
        }
        let resolved: Vec<PathBuf> = self
            .sky
            .faces
            .iter()
            .filter_map(|f| self.resolve_path(f))
            .collect();
        resolved.try_into().ok()
    }

    pub fn validate(&self) -> Result<()> {
        if self.terrain.grid_width < 2 || self.terrain.grid_height < 2 {
            return Err(LagoonError::InvalidGridSize {
                width: self.terrain.grid_width,
                height: self.terrain.grid_height,
            });
        }
        if self.window.width == 0 || self.window.height == 0 {
            return Err(LagoonError::InvalidConfig(format!(
                "window size {}x{} must be non-zero",
                self.window.width, self.window.height
            )));
        }
        check_range("terrain.height_scale", self.terrain.height_scale, 0.0, 100.0)?;
        check_range("terrain.slope_scale", self.terrain.slope_scale, 1e-4, 1000.0)?;
        check_range(
            "water.reflection_resolution",
            self.water.reflection_resolution as f32,
            1.0,
            8192.0,
        )?;
        check_range(
            "water.refraction_resolution",
            self.water.refraction_resolution as f32,
            1.0,
            8192.0,
        )?;
        check_range("water.specular_exponent", self.water.specular_exponent, 1.0, 4096.0)?;
        check_range("water.distortion_scale", self.water.distortion_scale, 0.0, 1.0)?;
        self.lights.validate()?;
        if !self.sky.faces.is_empty() && self.sky.faces.len() != 6 {
            return Err(LagoonError::InvalidConfig(format!(
                "sky.faces needs exactly 6 entries, got {}",
                self.sky.faces.len()
            )));
        }
        Ok(())
    }
}

fn check_range(field: &str, value: f32, min: f32, max: f32) -> Result<()> {
    if !(min..=max).contains(&value) {
        return Err(LagoonError::ValueOutOfRange {
            field: field.to_string(),
            min: min as f64,
            max: max as f64,
            value: value as f64,
        });
    }
    Ok(())
}

//! Terrain + water + sky, composited in reflection / refraction / final passes

use crate::camera::Camera;
use crate::context::RenderError;
use crate::debug_overlay::DebugOverlay;
use crate::frame_plan::{FramePlan, FrameReport, PassKind};
use crate::render_target::{begin_pass, ClearMode, PassTarget};
use crate::scene_object::{PassParams, SceneObject, ScenePass};
use crate::skybox::SkyboxObject;
use crate::terrain::TerrainObject;
use crate::water::WaterObject;
use lagoon_core::{DemoConfig, Vec3};
use lagoon_terrain::NormalStrategy;
use std::collections::HashSet;

/// Clear color of every scene pass (hidden behind the sky)
pub const SCENE_CLEAR: wgpu::Color = wgpu::Color {
    r: 0.05,
    g: 0.05,
    b: 0.08,
    a: 1.0,
};

/// Direction toward the sun
pub const SUN_DIRECTION: [f32; 3] = [0.4, 0.8, 0.3];

pub struct WaterDemo {
    pub camera: Camera,
    terrain: TerrainObject,
    water: WaterObject,
    sky: SkyboxObject,
    overlay: DebugOverlay,
    debug_overlay: bool,
    /// Objects whose skipped draw has already been logged
    logged_skips: HashSet<&'static str>,
}

impl WaterDemo {
    /// Build pipelines, targets and objects, and start texture loads.
    /// Any shader, pipeline or target failure is returned, not patched over.
    pub fn init(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        format: wgpu::TextureFormat,
        config: &DemoConfig,
        window_size: (u32, u32),
    ) -> Result<Self, RenderError> {
        config.validate()?;

        let terrain = TerrainObject::new(device, queue, format, config)?;
        let water = WaterObject::new(device, queue, format, config)?;
        let sky = SkyboxObject::new(device, queue, format, config)?;
        let overlay = DebugOverlay::new(device, window_size.0, window_size.1)?;

        let mut camera = Camera::new();
        camera.aspect = window_size.0 as f32 / window_size.1.max(1) as f32;

        log::info!("Water demo ready");
        Ok(Self {
            camera,
            terrain,
            water,
            sky,
            overlay,
            debug_overlay: config.debug.overlay,
            logged_skips: HashSet::new(),
        })
    }

    pub fn water_height(&self) -> f32 {
        self.water.height()
    }

    pub fn set_water_height(&mut self, height: f32) {
        self.water.set_height(height);
    }

    pub fn debug_overlay(&self) -> bool {
        self.debug_overlay
    }

    pub fn set_debug_overlay(&mut self, enabled: bool) {
        self.debug_overlay = enabled;
    }

    pub fn normal_strategy(&self) -> NormalStrategy {
        self.terrain.strategy()
    }

    pub fn set_normal_strategy(&mut self, queue: &wgpu::Queue, strategy: NormalStrategy) {
        self.terrain.set_strategy(queue, strategy);
    }

    pub fn grid_size(&self) -> (u32, u32) {
        self.terrain.grid_size()
    }

    pub fn rebuild_terrain(
        &mut self,
        device: &wgpu::Device,
        grid_width: u32,
        grid_height: u32,
    ) -> Result<(), RenderError> {
        self.terrain.rebuild(device, grid_width, grid_height)
    }

    pub fn terrain(&self) -> &TerrainObject {
        &self.terrain
    }

    pub fn water(&self) -> &WaterObject {
        &self.water
    }

    /// Debug preview target, filled only on frames with the overlay enabled
    pub fn preview_view(&self) -> Option<&wgpu::TextureView> {
        self.overlay.preview().color_view(0)
    }

    pub fn preview_size(&self) -> (u32, u32) {
        let preview = self.overlay.preview();
        (preview.width(), preview.height())
    }

    pub fn textures_pending(&self) -> bool {
        self.terrain.textures_pending() || self.water.textures_pending() || self.sky.textures_pending()
    }

    /// Upload finished texture loads without blocking
    pub fn poll_resources(&mut self, device: &wgpu::Device, queue: &wgpu::Queue) {
        self.terrain.poll_resources(device, queue);
        self.water.poll_resources(device, queue);
        self.sky.poll_resources(device, queue);
    }

    fn pass_params(&self, pass: ScenePass, time: f32) -> PassParams {
        let water_height = self.water.height();
        let camera = match pass {
            ScenePass::Reflection => self.camera.mirrored(water_height),
            ScenePass::Refraction | ScenePass::Final => self.camera.clone(),
        };
        PassParams {
            pass,
            camera,
            water_height,
            time,
            sun_direction: Vec3::from_array(SUN_DIRECTION).normalized().to_array(),
        }
    }

    /// Render one frame into `target` and submit it.
    ///
    /// Every pass of the frame plan runs, in order, in one command encoder.
    /// Draws whose resources are still loading are skipped and reported.
    pub fn frame(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        target: &dyn PassTarget,
        time: f32,
    ) -> Result<FrameReport, RenderError> {
        self.poll_resources(device, queue);

        let plan = FramePlan::water(self.debug_overlay);
        plan.validate()
            .map_err(|e| RenderError::FramePlan(e.to_string()))?;

        for pass in ScenePass::ALL {
            let params = self.pass_params(pass, time);
            for object in self.objects() {
                object.prepare(queue, &params);
            }
        }

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Water Frame Encoder"),
        });
        let mut report = FrameReport::default();

        for planned in plan.passes() {
            match planned.kind {
                PassKind::Reflection => self.encode_scene(
                    &mut encoder,
                    ScenePass::Reflection,
                    self.water.reflection_target(),
                    &mut report,
                ),
                PassKind::Refraction => self.encode_scene(
                    &mut encoder,
                    ScenePass::Refraction,
                    self.water.refraction_target(),
                    &mut report,
                ),
                PassKind::Final => {
                    self.encode_scene(&mut encoder, ScenePass::Final, target, &mut report)
                }
                PassKind::DebugOverlay => {
                    let reflection = self.water.reflection_target().color_view(0);
                    let refraction = self.water.refraction_target().color_view(0);
                    if let (Some(reflection), Some(refraction)) = (reflection, refraction) {
                        let normal = &self.water.normal_map().view;
                        self.overlay
                            .encode(device, &mut encoder, &[reflection, refraction, normal]);
                    }
                }
                other => {
                    return Err(RenderError::FramePlan(format!(
                        "{} is not part of the water demo",
                        other.label()
                    )))
                }
            }
            report.executed.push(planned.kind);
        }

        queue.submit(std::iter::once(encoder.finish()));

        for &label in &report.skipped_draws {
            if self.logged_skips.insert(label) {
                log::debug!("Skipping {} draw until its textures load", label);
            }
        }
        Ok(report)
    }

    fn objects(&self) -> [&dyn SceneObject; 3] {
        [&self.sky, &self.terrain, &self.water]
    }

    fn encode_scene(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        pass: ScenePass,
        target: &dyn PassTarget,
        report: &mut FrameReport,
    ) {
        let kind = match pass {
            ScenePass::Reflection => PassKind::Reflection,
            ScenePass::Refraction => PassKind::Refraction,
            ScenePass::Final => PassKind::Final,
        };
        let mut render_pass =
            begin_pass(encoder, target, kind.label(), ClearMode::Clear(SCENE_CLEAR));
        for object in self.objects() {
            if !object.draws_in(pass) {
                continue;
            }
            if !object.is_ready() {
                report.skipped_draws.push(object.label());
                continue;
            }
            object.draw(pass, &mut render_pass);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::{read_texture_rgba8, test_context as headless};

    fn small_config() -> DemoConfig {
        let mut config = DemoConfig::default();
        config.terrain.grid_width = 16;
        config.terrain.grid_height = 16;
        config.water.reflection_resolution = 64;
        config.water.refraction_resolution = 64;
        config
    }

    fn is_uniform(pixels: &[u8], value: [u8; 4]) -> bool {
        pixels.chunks(4).all(|p| p == value)
    }

    #[test]
    fn frame_runs_passes_in_plan_order() {
        let Some(ctx) = headless(64, 64) else { return };
        let mut demo =
            WaterDemo::init(&ctx.device, &ctx.queue, ctx.format, &small_config(), (64, 64)).unwrap();

        let report = demo.frame(&ctx.device, &ctx.queue, ctx.target(), 0.0).unwrap();
        assert_eq!(
            report.executed,
            vec![PassKind::Reflection, PassKind::Refraction, PassKind::Final]
        );
        assert!(report.skipped_draws.is_empty());

        demo.set_debug_overlay(true);
        let report = demo.frame(&ctx.device, &ctx.queue, ctx.target(), 0.0).unwrap();
        assert_eq!(report.position(PassKind::DebugOverlay), Some(3));
    }

    #[test]
    fn reflection_target_is_written_by_its_pass() {
        let Some(ctx) = headless(64, 64) else { return };
        let mut demo =
            WaterDemo::init(&ctx.device, &ctx.queue, ctx.format, &small_config(), (64, 64)).unwrap();

        let texture = demo.water().reflection_target().color_texture(0).unwrap();
        let before =
            pollster::block_on(read_texture_rgba8(&ctx.device, &ctx.queue, texture, 64, 64))
                .unwrap();
        assert!(is_uniform(&before, [0, 0, 0, 0]));

        demo.frame(&ctx.device, &ctx.queue, ctx.target(), 0.0).unwrap();
        let texture = demo.water().reflection_target().color_texture(0).unwrap();
        let after =
            pollster::block_on(read_texture_rgba8(&ctx.device, &ctx.queue, texture, 64, 64))
                .unwrap();
        assert!(!is_uniform(&after, [0, 0, 0, 0]));
    }

    #[test]
    fn debug_overlay_leaves_main_framebuffer_unchanged() {
        let Some(ctx) = headless(96, 96) else { return };
        let mut demo =
            WaterDemo::init(&ctx.device, &ctx.queue, ctx.format, &small_config(), (96, 96)).unwrap();

        demo.frame(&ctx.device, &ctx.queue, ctx.target(), 1.5).unwrap();
        let without = pollster::block_on(ctx.read_pixels()).unwrap();

        demo.set_debug_overlay(true);
        demo.frame(&ctx.device, &ctx.queue, ctx.target(), 1.5).unwrap();
        let with = pollster::block_on(ctx.read_pixels()).unwrap();

        assert_eq!(without, with);
    }

    #[test]
    fn pending_heightmap_skips_terrain_draw() {
        let Some(ctx) = headless(32, 32) else { return };
        let dir = std::env::temp_dir().join(format!("lagoon-heightmap-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("height.png");
        image::GrayImage::from_pixel(8, 8, image::Luma([128])).save(&path).unwrap();

        let mut config = small_config();
        config.terrain.heightmap = path.to_string_lossy().into_owned();
        let mut demo =
            WaterDemo::init(&ctx.device, &ctx.queue, ctx.format, &config, (32, 32)).unwrap();

        // Until the decode lands, the terrain is skipped in every scene pass
        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(10);
        loop {
            let report = demo.frame(&ctx.device, &ctx.queue, ctx.target(), 0.0).unwrap();
            if report.skipped_draws.is_empty() {
                break;
            }
            assert!(report.skipped_draws.iter().all(|&l| l == "terrain"));
            assert!(std::time::Instant::now() < deadline, "heightmap never loaded");
            std::thread::sleep(std::time::Duration::from_millis(5));
        }
        assert!(!demo.textures_pending());
        let _ = std::fs::remove_dir_all(&dir);
    }
}

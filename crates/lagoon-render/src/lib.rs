//! Lagoon Render - wgpu renderer for the water and deferred-lights demos
//!
//! The water demo composites terrain, sky and water through offscreen
//! reflection and refraction targets; the lights demo fills a G-buffer with
//! an instanced cube field and accumulates hundreds of point lights in one
//! fullscreen pass. Both run with a window (`RenderContext`) or headless.

mod camera;
mod context;
pub mod debug_overlay;
pub mod deferred;
pub mod frame_plan;
mod headless;
pub mod lights;
pub mod primitives;
pub mod render_target;
pub mod scene_object;
pub mod skybox;
pub mod terrain;
pub mod texture;
pub mod water;
pub mod water_demo;

pub use camera::Camera;
pub use context::{RenderContext, RenderError, DEPTH_FORMAT};
pub use deferred::LightsDemo;
pub use frame_plan::{FramePlan, FrameReport, FrameResource, PassKind, PlanError, PlannedPass};
pub use headless::{read_texture, read_texture_rgba8, HeadlessContext};
pub use lights::{diffuse_contribution, LightSet, PointLight};
pub use render_target::{begin_pass, ClearMode, PassTarget, RenderTarget, SurfaceTarget, TargetSpec};
pub use scene_object::{ClipMode, PassParams, SceneObject, ScenePass};
pub use texture::{GpuTexture, LoadRequest, TextureSlot, UploadOptions};
pub use water_demo::WaterDemo;

#[cfg(test)]
mod tests {
    #[test]
    fn terrain_shader_wgsl_parses() {
        let source = include_str!("shaders/terrain.wgsl");
        naga::front::wgsl::parse_str(source).expect("terrain.wgsl failed to parse");
    }

    #[test]
    fn skybox_shader_wgsl_parses() {
        let source = include_str!("shaders/skybox.wgsl");
        naga::front::wgsl::parse_str(source).expect("skybox.wgsl failed to parse");
    }

    #[test]
    fn water_shader_wgsl_parses() {
        let source = include_str!("shaders/water.wgsl");
        naga::front::wgsl::parse_str(source).expect("water.wgsl failed to parse");
    }

    #[test]
    fn debug_overlay_shader_wgsl_parses() {
        let source = include_str!("shaders/debug_overlay.wgsl");
        naga::front::wgsl::parse_str(source).expect("debug_overlay.wgsl failed to parse");
    }

    #[test]
    fn gbuffer_shader_wgsl_parses() {
        let source = include_str!("shaders/gbuffer.wgsl");
        naga::front::wgsl::parse_str(source).expect("gbuffer.wgsl failed to parse");
    }

    #[test]
    fn deferred_light_shader_wgsl_parses() {
        let source = include_str!("shaders/deferred_light.wgsl");
        naga::front::wgsl::parse_str(source).expect("deferred_light.wgsl failed to parse");
    }
}

//! Viewer application: demo frames rendered with wgpu, egui controls on top

use crate::egui_layer::EguiLayer;
use crate::panels::{ControlAction, ControlPanel, DemoSnapshot, RenderStats};
use anyhow::{Context, Result};
use lagoon_core::DemoConfig;
use lagoon_render::{Camera, LightsDemo, RenderContext, SurfaceTarget, WaterDemo};
use std::sync::Arc;
use std::time::Instant;
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

const ORBIT_SPEED: f32 = 0.01;
const PAN_SPEED: f32 = 0.004;
const ZOOM_SPEED: f32 = 0.2;

/// Which demo the viewer is driving
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum DemoKind {
    #[default]
    Water,
    Lights,
}

impl DemoKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Water => "water",
            Self::Lights => "lights",
        }
    }
}

/// Open a window and run `start` until the window is closed.
/// The other demo is initialized the first time it is selected.
pub fn run(config: DemoConfig, start: DemoKind) -> Result<()> {
    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = ViewerApp::new(config, start);
    event_loop.run_app(&mut app)?;

    match app.fatal.take() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

struct ViewerApp {
    config: DemoConfig,
    window: Option<Arc<Window>>,
    render_context: Option<RenderContext>,

    water: Option<WaterDemo>,
    lights: Option<LightsDemo>,
    active: DemoKind,
    started: Instant,

    drag: DragState,

    ui: Option<EguiLayer>,
    show_panel: bool,
    controls: ControlPanel,
    render_stats: RenderStats,
    preview_texture: Option<egui::TextureId>,

    /// Initialization failure reported once the event loop exits
    fatal: Option<anyhow::Error>,
}

impl ViewerApp {
    fn new(config: DemoConfig, start: DemoKind) -> Self {
        Self {
            config,
            window: None,
            render_context: None,
            water: None,
            lights: None,
            active: start,
            started: Instant::now(),
            drag: DragState::default(),
            ui: None,
            show_panel: true,
            controls: ControlPanel::new(),
            render_stats: RenderStats::new(),
            preview_texture: None,
            fatal: None,
        }
    }

    fn initialize(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let settings = &self.config.window;
        let attributes = Window::default_attributes()
            .with_title(settings.title.as_str())
            .with_inner_size(PhysicalSize::new(settings.width, settings.height));
        let window = event_loop
            .create_window(attributes)
            .map(Arc::new)
            .context("Failed to create viewer window")?;

        let context = pollster::block_on(RenderContext::new(Arc::clone(&window)))
            .context("Failed to initialize viewer render context")?;
        self.ui = Some(EguiLayer::new(&window, &context.device, context.config.format));
        self.render_context = Some(context);
        self.window = Some(window);

        self.ensure_demo(self.active)
    }

    /// Build `kind` if it has not been built yet
    fn ensure_demo(&mut self, kind: DemoKind) -> Result<()> {
        let Some(context) = &self.render_context else {
            return Ok(());
        };
        let size = (context.config.width, context.config.height);

        match kind {
            DemoKind::Water if self.water.is_none() => {
                let demo = WaterDemo::init(
                    &context.device,
                    &context.queue,
                    context.config.format,
                    &self.config,
                    size,
                )
                .context("Failed to initialize water demo")?;

                if let (Some(ui), Some(view)) = (&mut self.ui, demo.preview_view()) {
                    self.preview_texture = Some(ui.register_texture(&context.device, view));
                }
                self.water = Some(demo);
            }
            DemoKind::Lights if self.lights.is_none() => {
                let demo = LightsDemo::init(
                    &context.adapter,
                    &context.device,
                    context.config.format,
                    &self.config.lights,
                    size,
                )
                .context("Failed to initialize lights demo")?;
                self.lights = Some(demo);
            }
            _ => {}
        }
        Ok(())
    }

    fn switch_demo(&mut self, kind: DemoKind) {
        if kind == self.active {
            return;
        }
        match self.ensure_demo(kind) {
            Ok(()) => {
                self.active = kind;
                self.controls.reset();
                log::info!("Switched to the {} demo", kind.label());
            }
            Err(e) => log::error!("{e:#}"),
        }
    }

    fn active_camera(&mut self) -> Option<&mut Camera> {
        match self.active {
            DemoKind::Water => self.water.as_mut().map(|demo| &mut demo.camera),
            DemoKind::Lights => self.lights.as_mut().map(|demo| &mut demo.camera),
        }
    }

    fn snapshot(&self) -> Option<DemoSnapshot> {
        match self.active {
            DemoKind::Water => self.water.as_ref().map(|demo| DemoSnapshot::Water {
                water_height: demo.water_height(),
                debug_overlay: demo.debug_overlay(),
                normal_strategy: demo.normal_strategy(),
                grid_size: demo.grid_size(),
            }),
            DemoKind::Lights => self.lights.as_ref().map(|demo| DemoSnapshot::Lights {
                light_count: demo.light_count(),
                max_lights: demo.max_lights(),
                intensity: demo.intensity(),
            }),
        }
    }

    fn resize(&mut self, new_size: PhysicalSize<u32>) {
        let Some(context) = &mut self.render_context else {
            return;
        };
        context.resize(new_size);
        let aspect = context.aspect_ratio();
        if let Some(demo) = &mut self.water {
            demo.camera.aspect = aspect;
        }
        if let Some(demo) = &mut self.lights {
            demo.camera.aspect = aspect;
        }
    }

    fn render(&mut self) {
        let Some(context) = &self.render_context else {
            return;
        };

        let output = match context.surface.get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                let size = context.size;
                self.resize(size);
                return;
            }
            Err(e) => {
                log::warn!("Surface error: {:?}", e);
                return;
            }
        };

        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let target = SurfaceTarget::new(
            &view,
            &context.depth_view,
            context.config.width,
            context.config.height,
        );

        let time = self.started.elapsed().as_secs_f32();
        let result = match self.active {
            DemoKind::Water => self
                .water
                .as_mut()
                .map(|demo| demo.frame(&context.device, &context.queue, &target, time)),
            DemoKind::Lights => self
                .lights
                .as_mut()
                .map(|demo| demo.frame(&context.device, &context.queue, &target)),
        };
        match result {
            Some(Ok(report)) => self.render_stats.record_frame(&report),
            Some(Err(e)) => log::error!("Frame failed: {}", e),
            None => {}
        }

        let actions = self.draw_controls(&view);
        self.apply_actions(actions);

        output.present();
    }

    /// Paint the control window over `view` and collect what the user changed
    fn draw_controls(&mut self, view: &wgpu::TextureView) -> Vec<ControlAction> {
        let mut actions = Vec::new();
        let Some(snapshot) = self.snapshot() else {
            return actions;
        };
        let preview = self
            .preview_texture
            .zip(self.water.as_ref().map(WaterDemo::preview_size))
            .map(|(id, (w, h))| (id, egui::vec2(w as f32, h as f32)));
        let (Some(window), Some(context), Some(ui)) =
            (&self.window, &self.render_context, &mut self.ui)
        else {
            return actions;
        };

        let controls = &mut self.controls;
        let stats = &self.render_stats;
        let visible = self.show_panel;
        ui.paint(
            window,
            &context.device,
            &context.queue,
            view,
            [context.config.width, context.config.height],
            |ctx| {
                if !visible {
                    return;
                }
                egui::Window::new("Lagoon")
                    .default_pos([12.0, 12.0])
                    .resizable(false)
                    .show(ctx, |ui| {
                        actions = controls.ui(ui, &snapshot, preview);
                        ui.separator();
                        stats.ui(ui);
                    });
            },
        );
        actions
    }

    fn apply_actions(&mut self, actions: Vec<ControlAction>) {
        for action in actions {
            self.apply_action(action);
        }
    }

    fn apply_action(&mut self, action: ControlAction) {
        if let ControlAction::SwitchDemo(kind) = action {
            self.switch_demo(kind);
            return;
        }
        let Some(context) = &self.render_context else {
            return;
        };

        match (action, &mut self.water, &mut self.lights) {
            (ControlAction::SetWaterHeight(height), Some(demo), _) => demo.set_water_height(height),
            (ControlAction::SetDebugOverlay(enabled), Some(demo), _) => {
                demo.set_debug_overlay(enabled)
            }
            (ControlAction::SetNormalStrategy(strategy), Some(demo), _) => {
                demo.set_normal_strategy(&context.queue, strategy);
                log::info!("Terrain normals: {}", strategy.label());
            }
            (ControlAction::RebuildTerrain { width, height }, Some(demo), _) => {
                match demo.rebuild_terrain(&context.device, width, height) {
                    Ok(()) => log::info!("Rebuilt terrain grid at {}x{}", width, height),
                    Err(e) => log::error!("Terrain rebuild failed: {}", e),
                }
            }
            (ControlAction::SetLightCount(count), _, Some(demo)) => {
                let applied = demo.set_light_count(count);
                if applied != count {
                    log::debug!("Light count {} clamped to {}", count, applied);
                }
            }
            (ControlAction::SetIntensity(intensity), _, Some(demo)) => demo.set_intensity(intensity),
            (ControlAction::MoveLights, _, Some(demo)) => demo.move_lights(),
            (ControlAction::ChangeLightColors, _, Some(demo)) => demo.change_light_colors(),
            (action, _, _) => log::debug!("Ignoring {:?}: demo not initialized", action),
        }
    }

    fn handle_key(&mut self, code: KeyCode, event_loop: &ActiveEventLoop) {
        match code {
            KeyCode::Tab => self.show_panel = !self.show_panel,
            KeyCode::Digit1 => self.switch_demo(DemoKind::Water),
            KeyCode::Digit2 => self.switch_demo(DemoKind::Lights),
            KeyCode::KeyO if self.active == DemoKind::Water => {
                if let Some(demo) = &mut self.water {
                    demo.set_debug_overlay(!demo.debug_overlay());
                }
            }
            KeyCode::KeyN if self.active == DemoKind::Water => {
                if let Some(demo) = &self.water {
                    let next = demo.normal_strategy().toggled();
                    self.apply_action(ControlAction::SetNormalStrategy(next));
                }
            }
            KeyCode::Escape => event_loop.exit(),
            _ => {}
        }
    }
}

impl ApplicationHandler for ViewerApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            if let Err(e) = self.initialize(event_loop) {
                log::error!("Failed to initialize viewer: {e:#}");
                self.fatal = Some(e);
                event_loop.exit();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        if let (Some(ui), Some(window)) = (&mut self.ui, &self.window) {
            if ui.on_window_event(window, &event) {
                return;
            }
        }

        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }

            WindowEvent::Resized(new_size) => {
                self.resize(new_size);
            }

            WindowEvent::KeyboardInput { event: key_event, .. } => {
                if key_event.state == ElementState::Pressed && !key_event.repeat {
                    if let PhysicalKey::Code(code) = key_event.physical_key {
                        self.handle_key(code, event_loop);
                    }
                }
            }

            WindowEvent::MouseInput { state, button, .. } => {
                self.drag.press(button, state == ElementState::Pressed);
            }

            WindowEvent::CursorMoved { position, .. } => {
                let Some((dx, dy)) = self.drag.moved_to(position.x, position.y) else {
                    return;
                };
                let drag = self.drag;
                if let Some(camera) = self.active_camera() {
                    if drag.orbiting {
                        camera.orbit_horizontal(-dx * ORBIT_SPEED);
                        camera.orbit_vertical(-dy * ORBIT_SPEED);
                    }
                    if drag.panning {
                        camera.pan(-dx * PAN_SPEED, dy * PAN_SPEED);
                    }
                }
            }

            WindowEvent::MouseWheel { delta, .. } => {
                let notches = match delta {
                    MouseScrollDelta::LineDelta(_, lines) => lines,
                    MouseScrollDelta::PixelDelta(pixels) => pixels.y as f32 / 100.0,
                };
                if let Some(camera) = self.active_camera() {
                    camera.zoom(notches * ZOOM_SPEED);
                }
            }

            WindowEvent::RedrawRequested => {
                self.render();
            }

            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        self.window.iter().for_each(|window| window.request_redraw());
    }
}

/// Mouse buttons held over the scene and the last cursor position
#[derive(Clone, Copy, Debug, Default)]
struct DragState {
    orbiting: bool,
    panning: bool,
    cursor: Option<(f64, f64)>,
}

impl DragState {
    fn press(&mut self, button: MouseButton, down: bool) {
        match button {
            MouseButton::Left => self.orbiting = down,
            MouseButton::Right => self.panning = down,
            _ => {}
        }
    }

    /// Cursor delta since the previous move, `None` on the first move
    fn moved_to(&mut self, x: f64, y: f64) -> Option<(f32, f32)> {
        let delta = self
            .cursor
            .map(|(last_x, last_y)| ((x - last_x) as f32, (y - last_y) as f32));
        self.cursor = Some((x, y));
        delta
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn water_is_the_default_demo() {
        assert_eq!(DemoKind::default(), DemoKind::Water);
        assert_eq!(DemoKind::Lights.label(), "lights");
    }

    #[test]
    fn drag_reports_cursor_deltas() {
        let mut drag = DragState::default();
        assert_eq!(drag.moved_to(10.0, 20.0), None);
        assert_eq!(drag.moved_to(13.0, 18.0), Some((3.0, -2.0)));

        drag.press(MouseButton::Left, true);
        drag.press(MouseButton::Right, true);
        drag.press(MouseButton::Left, false);
        assert!(!drag.orbiting);
        assert!(drag.panning);
    }
}

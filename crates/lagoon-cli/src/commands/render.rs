//! Headless demo-to-PNG render command

use anyhow::{Context, Result};
use lagoon_core::DemoConfig;
use lagoon_render::{Camera, FrameReport, HeadlessContext, LightsDemo, WaterDemo};
use lagoon_viewer::DemoKind;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

pub struct RenderArgs {
    pub config: DemoConfig,
    pub demo: DemoKind,
    pub output: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub time: f32,
    pub timeout_secs: u64,
    pub distance: Option<f32>,
    pub yaw: Option<f32>,
    pub pitch: Option<f32>,
}

pub fn run(args: RenderArgs) -> Result<()> {
    let width = args.width.unwrap_or(args.config.window.width);
    let height = args.height.unwrap_or(args.config.window.height);

    let ctx = pollster::block_on(HeadlessContext::new(width, height))
        .context("Failed to create headless render context")?;

    let report = match args.demo {
        DemoKind::Water => render_water(&ctx, &args, (width, height))?,
        DemoKind::Lights => render_lights(&ctx, &args, (width, height))?,
    };
    for label in &report.skipped_draws {
        log::warn!("{} was not drawn: its textures never loaded", label);
    }

    let pixels =
        pollster::block_on(ctx.read_pixels()).context("Failed to read back rendered frame")?;
    let image = image::RgbaImage::from_raw(width, height, pixels)
        .context("Rendered frame has an unexpected size")?;
    image
        .save(&args.output)
        .with_context(|| format!("Failed to write {}", args.output))?;

    println!("Rendered {} demo to {} ({}x{})", args.demo.label(), args.output, width, height);
    Ok(())
}

fn render_water(ctx: &HeadlessContext, args: &RenderArgs, size: (u32, u32)) -> Result<FrameReport> {
    let mut demo = WaterDemo::init(&ctx.device, &ctx.queue, ctx.format, &args.config, size)
        .context("Failed to initialize water demo")?;
    demo.camera.aspect = ctx.aspect_ratio();
    apply_camera(&mut demo.camera, args);

    // Block until background texture loads land or the timeout expires
    let deadline = Instant::now() + Duration::from_secs(args.timeout_secs);
    loop {
        demo.poll_resources(&ctx.device, &ctx.queue);
        if !demo.textures_pending() {
            break;
        }
        if Instant::now() >= deadline {
            log::warn!(
                "Textures still loading after {}s, rendering with placeholders",
                args.timeout_secs
            );
            break;
        }
        std::thread::sleep(POLL_INTERVAL);
    }

    let report = demo.frame(&ctx.device, &ctx.queue, ctx.target(), args.time)?;
    Ok(report)
}

fn render_lights(ctx: &HeadlessContext, args: &RenderArgs, size: (u32, u32)) -> Result<FrameReport> {
    let mut demo =
        LightsDemo::init(&ctx.adapter, &ctx.device, ctx.format, &args.config.lights, size)
            .context("Failed to initialize lights demo")?;
    demo.camera.aspect = ctx.aspect_ratio();
    apply_camera(&mut demo.camera, args);

    let report = demo.frame(&ctx.device, &ctx.queue, ctx.target())?;
    Ok(report)
}

fn apply_camera(camera: &mut Camera, args: &RenderArgs) {
    if let Some(d) = args.distance {
        camera.distance = d;
    }
    if let Some(y) = args.yaw {
        camera.yaw = y.to_radians();
    }
    if let Some(p) = args.pitch {
        camera.pitch = p.to_radians();
    }
    camera.update_orbit();
}

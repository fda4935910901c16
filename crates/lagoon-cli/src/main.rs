//! Lagoon CLI - run, render and check the water and deferred-lights demos

mod commands;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use commands::{check, render, view};
use lagoon_core::{DemoConfig, NormalStrategyName};
use lagoon_viewer::DemoKind;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "lagoon")]
#[command(about = "Terrain, water and many-lights rendering demos", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the interactive viewer
    View {
        /// Demo shown first (switch at runtime with 1 / 2)
        #[arg(long, value_enum, default_value = "water")]
        demo: DemoArg,

        #[command(flatten)]
        config: ConfigArgs,
    },

    /// Render one frame to a PNG image (headless)
    Render {
        #[arg(long, value_enum, default_value = "water")]
        demo: DemoArg,

        /// Output image path
        #[arg(short, long, default_value = "lagoon.png")]
        output: String,

        /// Image width in pixels (defaults to the configured window width)
        #[arg(long)]
        width: Option<u32>,

        /// Image height in pixels (defaults to the configured window height)
        #[arg(long)]
        height: Option<u32>,

        /// Animation time in seconds (water waves)
        #[arg(long, default_value = "0")]
        time: f32,

        /// Seconds to wait for texture loads before rendering with placeholders
        #[arg(long, default_value = "10")]
        timeout: u64,

        /// Camera orbit distance
        #[arg(long)]
        distance: Option<f32>,

        /// Camera horizontal angle in degrees
        #[arg(long)]
        yaw: Option<f32>,

        /// Camera vertical angle in degrees
        #[arg(long)]
        pitch: Option<f32>,

        #[command(flatten)]
        config: ConfigArgs,
    },

    /// Validate a configuration file and report its asset paths
    Check {
        /// Print the effective configuration as TOML
        #[arg(long)]
        print: bool,

        #[command(flatten)]
        config: ConfigArgs,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum DemoArg {
    Water,
    Lights,
}

impl From<DemoArg> for DemoKind {
    fn from(arg: DemoArg) -> Self {
        match arg {
            DemoArg::Water => DemoKind::Water,
            DemoArg::Lights => DemoKind::Lights,
        }
    }
}

/// Configuration file plus per-run overrides
#[derive(Args, Debug, Default)]
struct ConfigArgs {
    /// Configuration file; defaults are used when it does not exist
    #[arg(short, long, default_value = "lagoon.toml")]
    config: PathBuf,

    /// Terrain grid vertices along each axis
    #[arg(long)]
    grid: Option<u32>,

    /// Water plane height
    #[arg(long)]
    water_height: Option<f32>,

    /// Terrain normal strategy
    #[arg(long, value_parser = parse_normals)]
    normals: Option<NormalStrategyName>,

    /// Start with the debug overlay enabled
    #[arg(long)]
    debug_overlay: bool,

    /// Initial number of active lights
    #[arg(long)]
    lights: Option<usize>,

    /// Seed for light placement and colors
    #[arg(long)]
    seed: Option<u64>,
}

impl ConfigArgs {
    fn load(&self) -> Result<DemoConfig> {
        let mut config = DemoConfig::load_or_default(&self.config)
            .with_context(|| format!("Failed to load config {}", self.config.display()))?;
        self.apply(&mut config);
        config.validate().context("Invalid configuration")?;
        Ok(config)
    }

    fn apply(&self, config: &mut DemoConfig) {
        if let Some(grid) = self.grid {
            config.terrain.grid_width = grid;
            config.terrain.grid_height = grid;
        }
        if let Some(height) = self.water_height {
            config.water.height = height;
        }
        if let Some(normals) = self.normals {
            config.terrain.normal_strategy = normals;
        }
        if self.debug_overlay {
            config.debug.overlay = true;
        }
        if let Some(lights) = self.lights {
            config.lights.initial_count = lights;
        }
        if self.seed.is_some() {
            config.lights.seed = self.seed;
        }
    }
}

fn parse_normals(s: &str) -> Result<NormalStrategyName, String> {
    match s {
        "analytic" => Ok(NormalStrategyName::Analytic),
        "accumulated" => Ok(NormalStrategyName::Accumulated),
        _ => Err(format!(
            "unknown normal strategy '{}'; valid values: analytic, accumulated",
            s
        )),
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::View { demo, config } => view::run(config.load()?, demo.into()),
        Commands::Render {
            demo,
            output,
            width,
            height,
            time,
            timeout,
            distance,
            yaw,
            pitch,
            config,
        } => render::run(render::RenderArgs {
            config: config.load()?,
            demo: demo.into(),
            output,
            width,
            height,
            time,
            timeout_secs: timeout,
            distance,
            yaw,
            pitch,
        }),
        Commands::Check { print, config } => check::run(&config, print),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_replace_file_values() {
        let args = ConfigArgs {
            grid: Some(32),
            water_height: Some(0.3),
            normals: Some(NormalStrategyName::Accumulated),
            debug_overlay: true,
            lights: Some(50),
            seed: Some(7),
            ..Default::default()
        };
        let mut config = DemoConfig::default();
        args.apply(&mut config);

        assert_eq!((config.terrain.grid_width, config.terrain.grid_height), (32, 32));
        assert_eq!(config.water.height, 0.3);
        assert_eq!(config.terrain.normal_strategy, NormalStrategyName::Accumulated);
        assert!(config.debug.overlay);
        assert_eq!(config.lights.initial_count, 50);
        assert_eq!(config.lights.seed, Some(7));
    }

    #[test]
    fn absent_overrides_keep_defaults() {
        let mut config = DemoConfig::default();
        ConfigArgs::default().apply(&mut config);
        assert_eq!(config, DemoConfig::default());
    }

    #[test]
    fn unknown_normal_strategy_is_rejected() {
        assert!(parse_normals("analytic").is_ok());
        assert!(parse_normals("smooth").is_err());
    }

    #[test]
    fn cli_parses_render_flags() {
        let cli = Cli::try_parse_from([
            "lagoon", "render", "--demo", "lights", "--width", "320", "--seed", "3",
        ])
        .unwrap();
        match cli.command {
            Commands::Render {
                demo, width, config, ..
            } => {
                assert_eq!(demo, DemoArg::Lights);
                assert_eq!(width, Some(320));
                assert_eq!(config.seed, Some(3));
                assert_eq!(config.config, PathBuf::from("lagoon.toml"));
            }
            _ => panic!("expected render"),
        }
    }
}

//! Configuration validation command

use crate::ConfigArgs;
use anyhow::{bail, Context, Result};
use lagoon_core::DemoConfig;
use std::path::PathBuf;

pub fn run(args: &ConfigArgs, print: bool) -> Result<()> {
    let mut config = if args.config.exists() {
        println!("Checking {}", args.config.display());
        DemoConfig::load(&args.config)
            .with_context(|| format!("Failed to load config {}", args.config.display()))?
    } else {
        println!("{} not found, checking defaults", args.config.display());
        DemoConfig::default()
    };
    args.apply(&mut config);

    if let Err(e) = config.validate() {
        println!("[FAIL] {}", e);
        bail!("configuration is invalid");
    }
    println!("[OK] values in range");
    println!(
        "     terrain {}x{}, water at {:.2}, {} of {} lights",
        config.terrain.grid_width,
        config.terrain.grid_height,
        config.water.height,
        config.lights.initial_count,
        config.lights.max_lights
    );

    let missing = asset_paths(&config)
        .into_iter()
        .filter(|(_, path)| !path.exists())
        .inspect(|(name, path)| {
            println!("[WARN] {} not found: {} (placeholder used)", name, path.display());
        })
        .count();
    if missing == 0 {
        println!("[OK] all configured assets present");
    }

    if print {
        println!();
        print!("{}", config.to_toml_string()?);
    }
    Ok(())
}

/// Every configured asset file, labelled by its config key
fn asset_paths(config: &DemoConfig) -> Vec<(String, PathBuf)> {
    let mut paths = Vec::new();
    let singles = [
        ("terrain.heightmap", &config.terrain.heightmap),
        ("terrain.color_map", &config.terrain.color_map),
        ("water.distortion_map", &config.water.distortion_map),
        ("water.normal_map", &config.water.normal_map),
    ];
    for (name, value) in singles {
        if let Some(path) = config.resolve_path(value) {
            paths.push((name.to_string(), path));
        }
    }
    if let Some(faces) = config.sky_face_paths() {
        for (i, path) in faces.into_iter().enumerate() {
            paths.push((format!("sky.faces[{}]", i), path));
        }
    }
    paths
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unconfigured_assets_are_not_listed() {
        assert!(asset_paths(&DemoConfig::default()).is_empty());
    }

    #[test]
    fn configured_assets_resolve_against_base_dir() {
        let mut config = DemoConfig::default();
        config.base_dir = PathBuf::from("assets");
        config.terrain.heightmap = "height.png".into();
        config.sky.faces = ["px", "nx", "py", "ny", "pz", "nz"]
            .iter()
            .map(|f| format!("sky/{}.jpg", f))
            .collect();

        let paths = asset_paths(&config);
        assert_eq!(paths.len(), 7);
        assert_eq!(paths[0], ("terrain.heightmap".to_string(), PathBuf::from("assets/height.png")));
        assert_eq!(paths[6].0, "sky.faces[5]");
    }
}

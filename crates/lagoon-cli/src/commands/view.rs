//! Interactive viewer command

use anyhow::Result;
use lagoon_core::DemoConfig;
use lagoon_viewer::DemoKind;

pub fn run(config: DemoConfig, demo: DemoKind) -> Result<()> {
    log::info!(
        "Opening {} demo ({}x{} window, {}x{} terrain grid)",
        demo.label(),
        config.window.width,
        config.window.height,
        config.terrain.grid_width,
        config.terrain.grid_height
    );
    println!("Controls: drag to orbit, right-drag to pan, scroll to zoom");
    println!("          1/2 switch demo, Tab toggles the panel, O overlay, N normals");
    lagoon_viewer::run(config, demo)
}

//! Demo controls: one column of widgets per demo
//!
//! The panel edits a copy of the demo's current values and reports the
//! differences as actions; the app applies them after the egui pass so no
//! GPU state is borrowed while the UI runs.

use crate::app::DemoKind;
use lagoon_render::lights::{MAX_INTENSITY, MIN_INTENSITY};
use lagoon_terrain::NormalStrategy;
use std::ops::RangeInclusive;

const WATER_HEIGHT_RANGE: RangeInclusive<f32> = -0.5..=1.0;
const GRID_SIZE_RANGE: RangeInclusive<u32> = 2..=512;

/// The values a panel shows for the active demo
#[derive(Clone, Debug, PartialEq)]
pub enum DemoSnapshot {
    Water {
        water_height: f32,
        debug_overlay: bool,
        normal_strategy: NormalStrategy,
        grid_size: (u32, u32),
    },
    Lights {
        light_count: usize,
        max_lights: usize,
        intensity: f32,
    },
}

impl DemoSnapshot {
    pub fn kind(&self) -> DemoKind {
        match self {
            Self::Water { .. } => DemoKind::Water,
            Self::Lights { .. } => DemoKind::Lights,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ControlAction {
    SwitchDemo(DemoKind),
    SetWaterHeight(f32),
    SetDebugOverlay(bool),
    SetNormalStrategy(NormalStrategy),
    RebuildTerrain { width: u32, height: u32 },
    SetLightCount(usize),
    SetIntensity(f32),
    MoveLights,
    ChangeLightColors,
}

/// Grid resolution being edited; applied only on "Rebuild"
#[derive(Default)]
pub struct ControlPanel {
    pending_grid: Option<(u32, u32)>,
}

impl ControlPanel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ui(
        &mut self,
        ui: &mut egui::Ui,
        snapshot: &DemoSnapshot,
        preview: Option<(egui::TextureId, egui::Vec2)>,
    ) -> Vec<ControlAction> {
        let mut actions = Vec::new();

        let mut kind = snapshot.kind();
        ui.horizontal(|ui| {
            ui.selectable_value(&mut kind, DemoKind::Water, "Water");
            ui.selectable_value(&mut kind, DemoKind::Lights, "Lights");
        });
        if kind != snapshot.kind() {
            actions.push(ControlAction::SwitchDemo(kind));
            return actions;
        }
        ui.separator();

        let mut edited = snapshot.clone();
        match &mut edited {
            DemoSnapshot::Water {
                water_height,
                debug_overlay,
                normal_strategy,
                grid_size,
            } => {
                ui.add(egui::Slider::new(water_height, WATER_HEIGHT_RANGE).text("water height"));
                ui.checkbox(debug_overlay, "debug overlay");
                ui.horizontal(|ui| {
                    ui.label("normals");
                    ui.radio_value(normal_strategy, NormalStrategy::Analytic, "analytic");
                    ui.radio_value(normal_strategy, NormalStrategy::Accumulated, "accumulated");
                });

                let (mut width, mut height) = self.pending_grid.unwrap_or(*grid_size);
                ui.add(egui::Slider::new(&mut width, GRID_SIZE_RANGE).text("grid width"));
                ui.add(egui::Slider::new(&mut height, GRID_SIZE_RANGE).text("grid height"));
                self.pending_grid = Some((width, height));
                let changed = (width, height) != *grid_size;
                if ui
                    .add_enabled(changed, egui::Button::new("rebuild terrain"))
                    .clicked()
                {
                    actions.push(ControlAction::RebuildTerrain { width, height });
                    self.pending_grid = None;
                }

                if *debug_overlay {
                    if let Some((id, size)) = preview {
                        ui.separator();
                        ui.label("reflection | refraction | normal map");
                        ui.image(egui::load::SizedTexture::new(id, size));
                    }
                }
            }
            DemoSnapshot::Lights {
                light_count,
                max_lights,
                intensity,
            } => {
                ui.add(egui::Slider::new(light_count, 0..=*max_lights).text("nb lights"));
                ui.add(
                    egui::Slider::new(intensity, MIN_INTENSITY..=MAX_INTENSITY)
                        .text("lights intensity"),
                );
                if ui.button("move lights").clicked() {
                    actions.push(ControlAction::MoveLights);
                }
                if ui.button("change lights color").clicked() {
                    actions.push(ControlAction::ChangeLightColors);
                }
            }
        }

        let mut changes = diff(snapshot, &edited);
        changes.append(&mut actions);
        changes
    }

    /// Forget an in-progress grid edit (after a demo switch or external rebuild)
    pub fn reset(&mut self) {
        self.pending_grid = None;
    }
}

/// Actions turning `before` into `after`; grid size is excluded, it only
/// changes through an explicit rebuild
pub fn diff(before: &DemoSnapshot, after: &DemoSnapshot) -> Vec<ControlAction> {
    let mut actions = Vec::new();
    match (before, after) {
        (
            DemoSnapshot::Water {
                water_height: h0,
                debug_overlay: d0,
                normal_strategy: n0,
                ..
            },
            DemoSnapshot::Water {
                water_height: h1,
                debug_overlay: d1,
                normal_strategy: n1,
                ..
            },
        ) => {
            if h0 != h1 {
                actions.push(ControlAction::SetWaterHeight(*h1));
            }
            if d0 != d1 {
                actions.push(ControlAction::SetDebugOverlay(*d1));
            }
            if n0 != n1 {
                actions.push(ControlAction::SetNormalStrategy(*n1));
            }
        }
        (
            DemoSnapshot::Lights {
                light_count: c0,
                intensity: i0,
                ..
            },
            DemoSnapshot::Lights {
                light_count: c1,
                intensity: i1,
                ..
            },
        ) => {
            if c0 != c1 {
                actions.push(ControlAction::SetLightCount(*c1));
            }
            if i0 != i1 {
                actions.push(ControlAction::SetIntensity(*i1));
            }
        }
        (_, after) => actions.push(ControlAction::SwitchDemo(after.kind())),
    }
    actions
}

#[cfg(test)]
mod tests {
    use super::*;

    fn water() -> DemoSnapshot {
        DemoSnapshot::Water {
            water_height: 0.1,
            debug_overlay: false,
            normal_strategy: NormalStrategy::Analytic,
            grid_size: (100, 100),
        }
    }

    fn lights() -> DemoSnapshot {
        DemoSnapshot::Lights {
            light_count: 10,
            max_lights: 100,
            intensity: 10.0,
        }
    }

    /// One egui frame of the panel with no input events
    fn draw(panel: &mut ControlPanel, snapshot: &DemoSnapshot) -> Vec<ControlAction> {
        let ctx = egui::Context::default();
        let mut actions = Vec::new();
        let _ = ctx.run(egui::RawInput::default(), |ctx| {
            egui::CentralPanel::default().show(ctx, |ui| {
                actions = panel.ui(ui, snapshot, None);
            });
        });
        actions
    }

    #[test]
    fn drawing_without_input_changes_nothing() {
        let mut panel = ControlPanel::new();
        assert!(draw(&mut panel, &water()).is_empty());
        assert!(draw(&mut panel, &lights()).is_empty());
    }

    #[test]
    fn zero_lights_survive_a_redraw() {
        let mut panel = ControlPanel::new();
        let dark = DemoSnapshot::Lights {
            light_count: 0,
            max_lights: 100,
            intensity: 10.0,
        };
        let actions = draw(&mut panel, &dark);
        assert!(
            !actions
                .iter()
                .any(|a| matches!(a, ControlAction::SetLightCount(_))),
            "panel rewrote the light count: {:?}",
            actions
        );
    }

    #[test]
    fn unchanged_snapshot_yields_no_actions() {
        assert!(diff(&water(), &water()).is_empty());
        assert!(diff(&lights(), &lights()).is_empty());
    }

    #[test]
    fn water_edits_map_to_actions() {
        let after = DemoSnapshot::Water {
            water_height: 0.25,
            debug_overlay: true,
            normal_strategy: NormalStrategy::Accumulated,
            grid_size: (100, 100),
        };
        assert_eq!(
            diff(&water(), &after),
            vec![
                ControlAction::SetWaterHeight(0.25),
                ControlAction::SetDebugOverlay(true),
                ControlAction::SetNormalStrategy(NormalStrategy::Accumulated),
            ]
        );
    }

    #[test]
    fn grid_size_alone_is_not_an_action() {
        let after = DemoSnapshot::Water {
            water_height: 0.1,
            debug_overlay: false,
            normal_strategy: NormalStrategy::Analytic,
            grid_size: (32, 48),
        };
        assert!(diff(&water(), &after).is_empty());
    }

    #[test]
    fn light_edits_map_to_actions() {
        let after = DemoSnapshot::Lights {
            light_count: 42,
            max_lights: 100,
            intensity: 3.0,
        };
        assert_eq!(
            diff(&lights(), &after),
            vec![ControlAction::SetLightCount(42), ControlAction::SetIntensity(3.0)]
        );
    }

    #[test]
    fn demo_change_is_a_switch() {
        assert_eq!(
            diff(&water(), &lights()),
            vec![ControlAction::SwitchDemo(DemoKind::Lights)]
        );
    }
}

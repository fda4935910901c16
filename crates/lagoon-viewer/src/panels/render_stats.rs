//! Frame statistics: FPS plus what the last frame plan executed

use lagoon_render::FrameReport;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

const FPS_WINDOW: Duration = Duration::from_secs(1);
const FPS_REFRESH: Duration = Duration::from_millis(250);

pub struct RenderStats {
    frame_times: VecDeque<Instant>,
    fps: f32,
    last_update: Instant,
    passes: Vec<&'static str>,
    skipped: Vec<&'static str>,
}

impl Default for RenderStats {
    fn default() -> Self {
        Self {
            frame_times: VecDeque::new(),
            fps: 0.0,
            last_update: Instant::now(),
            passes: Vec::new(),
            skipped: Vec::new(),
        }
    }
}

impl RenderStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_frame(&mut self, report: &FrameReport) {
        self.record_frame_at(Instant::now(), report);
    }

    fn record_frame_at(&mut self, now: Instant, report: &FrameReport) {
        self.frame_times.push_back(now);
        while self
            .frame_times
            .front()
            .is_some_and(|&t| now.duration_since(t) > FPS_WINDOW)
        {
            self.frame_times.pop_front();
        }

        if now.duration_since(self.last_update) > FPS_REFRESH {
            self.fps = self.frame_times.len() as f32;
            self.last_update = now;
        }

        self.passes = report.executed.iter().map(|kind| kind.label()).collect();
        self.skipped = report.skipped_draws.clone();
        self.skipped.dedup();
    }

    pub fn fps(&self) -> f32 {
        self.fps
    }

    pub fn ui(&self, ui: &mut egui::Ui) {
        ui.monospace(format!("FPS: {:.0}", self.fps));
        if self.fps > 0.0 {
            ui.monospace(format!("Frame: {:.1}ms", 1000.0 / self.fps));
        }
        ui.monospace(format!("Passes: {}", self.passes.join(" > ")));
        if !self.skipped.is_empty() {
            ui.colored_label(
                egui::Color32::YELLOW,
                format!("Loading: {}", self.skipped.join(", ")),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lagoon_render::PassKind;

    #[test]
    fn fps_counts_frames_in_the_last_second() {
        let mut stats = RenderStats::new();
        let start = stats.last_update;
        let report = FrameReport::default();
        for i in 1..=30 {
            stats.record_frame_at(start + Duration::from_millis(i * 10), &report);
        }
        // 300ms elapsed: refreshed once all 30 frames were inside the window
        assert_eq!(stats.fps(), 26.0);

        stats.record_frame_at(start + Duration::from_millis(2000), &report);
        stats.record_frame_at(start + Duration::from_millis(2300), &report);
        assert_eq!(stats.fps(), 2.0);
    }

    #[test]
    fn last_report_is_kept_for_display() {
        let mut stats = RenderStats::new();
        let report = FrameReport {
            executed: vec![PassKind::Reflection, PassKind::Refraction, PassKind::Final],
            skipped_draws: vec!["terrain", "terrain", "terrain"],
        };
        stats.record_frame(&report);
        assert_eq!(stats.passes.len(), 3);
        assert_eq!(stats.skipped, vec!["terrain"]);
    }
}

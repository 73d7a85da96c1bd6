//! Rerun visualization for playbacks.
//!
//! Visualization is optional and only available with the `visualization` feature.
//!
//! # What Gets Logged
//!
//! - Released events as 2-D points on the projected map, one batch per tick
//! - The `tick` sequence timeline
//! - A text entry when playback completes (marked if a snapshot was requested)

use crate::projection::{outcome_color, MapProjection};
use crate::runner::FrameRenderer;

use netviz_core::TickReport;
use netviz_env::{LatLon, Outcome, Renderer};

#[cfg(feature = "visualization")]
use rerun::{Color, Points2D, Position2D, Radius, RecordingStream};

/// Point buffered until the end of the tick.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(not(feature = "visualization"), allow(dead_code))]
struct PendingPoint {
    x: f32,
    y: f32,
    color: [u8; 3],
    consolidated: bool,
}

/// Renderer that streams released events to a Rerun viewer.
pub struct RerunRenderer {
    #[cfg(feature = "visualization")]
    rec: Option<RecordingStream>,

    /// Whether visualization is enabled
    enabled: bool,

    projection: MapProjection,
    pending: Vec<PendingPoint>,
    tick: i64,
}

impl RerunRenderer {
    /// Creates a renderer with visualization disabled.
    pub fn disabled() -> Self {
        Self {
            #[cfg(feature = "visualization")]
            rec: None,
            enabled: false,
            projection: MapProjection::default(),
            pending: Vec::new(),
            tick: 0,
        }
    }

    /// Creates a renderer with visualization enabled.
    #[cfg(feature = "visualization")]
    pub fn new(name: &str) -> Self {
        match rerun::RecordingStreamBuilder::new(name).spawn() {
            Ok(rec) => {
                tracing::info!("Rerun visualization enabled - open Rerun Viewer to watch the playback");
                Self {
                    rec: Some(rec),
                    enabled: true,
                    ..Self::disabled()
                }
            }
            Err(e) => {
                tracing::warn!("Failed to initialize Rerun: {:?}", e);
                Self::disabled()
            }
        }
    }

    /// Creates a renderer - returns disabled if visualization feature not enabled.
    #[cfg(not(feature = "visualization"))]
    pub fn new(_name: &str) -> Self {
        tracing::info!("Rerun visualization not available (compile with --features visualization)");
        Self::disabled()
    }

    /// Returns whether visualization is enabled.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Points waiting for the end of the current tick.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    #[cfg(feature = "visualization")]
    fn flush(&mut self) {
        let points = std::mem::take(&mut self.pending);
        let Some(ref rec) = self.rec else {
            return;
        };
        if points.is_empty() {
            return;
        }

        rec.set_time_sequence("tick", self.tick);

        let positions: Vec<Position2D> = points.iter().map(|p| Position2D::new(p.x, p.y)).collect();
        let colors: Vec<Color> = points
            .iter()
            .map(|p| Color::from_rgb(p.color[0], p.color[1], p.color[2]))
            .collect();
        let radii: Vec<Radius> = points
            .iter()
            .map(|p| Radius::new_ui_points(if p.consolidated { 6.0 } else { 3.0 }))
            .collect();

        let _ = rec.log(
            "map/events",
            &Points2D::new(positions).with_colors(colors).with_radii(radii),
        );
    }

    #[cfg(not(feature = "visualization"))]
    fn flush(&mut self) {
        self.pending.clear();
    }

    #[cfg(feature = "visualization")]
    fn log_completion(&self, snapshot_requested: bool, label: &str) {
        if let Some(ref rec) = self.rec {
            let message = if snapshot_requested {
                format!("Playback complete, snapshot {}", label)
            } else {
                format!("Playback complete ({})", label)
            };
            let _ = rec.log("map/status", &rerun::TextLog::new(message));
        }
    }

    #[cfg(not(feature = "visualization"))]
    fn log_completion(&self, _snapshot_requested: bool, _label: &str) {}
}

impl Renderer for RerunRenderer {
    fn render(&mut self, location: LatLon, outcome: Outcome, consolidated: bool) {
        if !self.enabled {
            return;
        }
        let point = self.projection.project(location);
        if !self.projection.contains(point) {
            return;
        }
        self.pending.push(PendingPoint {
            x: point.x as f32,
            y: point.y as f32,
            color: outcome_color(outcome),
            consolidated,
        });
    }

    fn on_playback_complete(&mut self, snapshot_requested: bool, label: &str) {
        if self.enabled {
            self.log_completion(snapshot_requested, label);
        }
    }
}

impl FrameRenderer for RerunRenderer {
    fn end_frame(&mut self, _report: &TickReport) {
        self.tick += 1;
        self.flush();
    }
}

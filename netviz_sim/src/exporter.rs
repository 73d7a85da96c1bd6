//! JSON exporter for playback frames.
//!
//! Records every tick that released events, with raw and projected
//! coordinates, so a playback can be inspected or re-drawn offline.

use crate::projection::{outcome_color, MapProjection};
use crate::runner::FrameRenderer;

use netviz_core::TickReport;
use netviz_env::{LatLon, Outcome, Renderer};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// One released event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportedEvent {
    pub lat: f64,
    pub lon: f64,
    /// Projected map position
    pub x: f64,
    pub y: f64,
    pub outcome: Outcome,
    pub color: [u8; 3],
    pub consolidated: bool,
}

/// Events released during one tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackFrame {
    /// Tick number, starting at 1
    pub tick: u64,

    /// Clock value after the tick
    pub clock: String,

    pub events: Vec<ExportedEvent>,
}

/// Completion record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportedCompletion {
    pub snapshot_requested: bool,
    pub label: String,
}

/// Complete playback export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackExport {
    /// First file name of the played range
    pub start: String,

    /// Last file name of the played range
    pub end: String,

    /// Map size used for projected coordinates
    pub map_width: f64,
    pub map_height: f64,

    /// Frames that released at least one event
    pub frames: Vec<PlaybackFrame>,

    /// Set once the playback completed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion: Option<ExportedCompletion>,
}

impl PlaybackExport {
    /// Creates a new export container.
    pub fn new(start: &str, end: &str, projection: MapProjection) -> Self {
        Self {
            start: start.to_string(),
            end: end.to_string(),
            map_width: projection.width,
            map_height: projection.height,
            frames: Vec::new(),
            completion: None,
        }
    }

    /// Total events across all frames.
    pub fn event_count(&self) -> usize {
        self.frames.iter().map(|f| f.events.len()).sum()
    }

    /// Writes to a JSON file.
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}

/// Renderer that builds a `PlaybackExport`.
pub struct ExportRenderer {
    projection: MapProjection,
    export: PlaybackExport,
    pending: Vec<ExportedEvent>,
    tick: u64,
}

impl ExportRenderer {
    pub fn new(start: &str, end: &str) -> Self {
        Self::with_projection(start, end, MapProjection::default())
    }

    pub fn with_projection(start: &str, end: &str, projection: MapProjection) -> Self {
        Self {
            projection,
            export: PlaybackExport::new(start, end, projection),
            pending: Vec::new(),
            tick: 0,
        }
    }

    pub fn export(&self) -> &PlaybackExport {
        &self.export
    }

    pub fn into_export(self) -> PlaybackExport {
        self.export
    }
}

impl Renderer for ExportRenderer {
    fn render(&mut self, location: LatLon, outcome: Outcome, consolidated: bool) {
        let point = self.projection.project(location);
        self.pending.push(ExportedEvent {
            lat: location.lat,
            lon: location.lon,
            x: point.x,
            y: point.y,
            outcome,
            color: outcome_color(outcome),
            consolidated,
        });
    }

    fn on_playback_complete(&mut self, snapshot_requested: bool, label: &str) {
        self.export.completion = Some(ExportedCompletion {
            snapshot_requested,
            label: label.to_string(),
        });
    }
}

impl FrameRenderer for ExportRenderer {
    fn end_frame(&mut self, report: &TickReport) {
        self.tick += 1;
        if self.pending.is_empty() {
            return;
        }
        self.export.frames.push(PlaybackFrame {
            tick: self.tick,
            clock: report.clock.to_string(),
            events: std::mem::take(&mut self.pending),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netviz_core::{PlaybackState, TimeStamp};
    use tempfile::TempDir;

    fn report(minute: u32, state: PlaybackState) -> TickReport {
        TickReport {
            clock: TimeStamp::new(20, 1, 1, 0, minute),
            batches_released: 1,
            events_released: 1,
            state,
            completed: state == PlaybackState::Finished,
        }
    }

    #[test]
    fn test_frames_only_for_releasing_ticks() {
        let mut exporter = ExportRenderer::new("20_01_01-00:00", "20_01_01-00:00");

        exporter.render(LatLon::new(0.0, 0.0), Outcome::Measured { intensity: 0.0 }, false);
        exporter.end_frame(&report(1, PlaybackState::Draining));
        exporter.end_frame(&report(2, PlaybackState::Draining));
        exporter.render(LatLon::SENTINEL, Outcome::FallbackMarker, false);
        exporter.render(LatLon::new(10.0, 20.0), Outcome::Unreached, false);
        exporter.on_playback_complete(true, "20_01_01-00:00");
        exporter.end_frame(&report(3, PlaybackState::Finished));

        let export = exporter.into_export();
        assert_eq!(export.frames.len(), 2);
        assert_eq!(export.frames[0].tick, 1);
        assert_eq!(export.frames[0].events[0].x, 512.0);
        assert_eq!(export.frames[0].events[0].color, [0, 255, 0]);
        assert_eq!(export.frames[1].tick, 3);
        assert_eq!(export.frames[1].clock, "20_01_01-00:03");
        assert_eq!(export.frames[1].events[0].outcome, Outcome::FallbackMarker);
        assert_eq!(export.event_count(), 3);
        assert_eq!(
            export.completion,
            Some(ExportedCompletion {
                snapshot_requested: true,
                label: "20_01_01-00:00".to_string(),
            })
        );
    }

    #[test]
    fn test_write_to_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("playback.json");

        let mut exporter = ExportRenderer::new("20_01_01-00:00", "20_01_02-00:00");
        exporter.render(LatLon::new(1.0, 2.0), Outcome::Consolidated { success_ratio: 0.5 }, true);
        exporter.end_frame(&report(1, PlaybackState::Finished));
        exporter.export().write_to_file(&path).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["frames"][0]["events"][0]["consolidated"], true);
        assert_eq!(json["frames"][0]["events"][0]["outcome"]["kind"], "consolidated");
        assert!(json.get("completion").is_none());
    }
}

//! End-to-end playback over trace directories on disk.

use netviz_core::{GroupingStrategy, ProtocolFilter, TickReport, TimeStamp};
use netviz_env::{LatLon, NullRenderer, Outcome, Renderer, TableGeoLocator, UnavailableGeoLocator};
use netviz_sim::{
    ExportRenderer, FrameRenderer, PlaybackConfig, PlaybackRunner, RendererSet, SynthConfig,
    TraceSynthesizer,
};
use std::fs;
use tempfile::TempDir;

/// Everything a renderer was told, in order.
#[derive(Debug, Default)]
struct Recorder {
    rendered: Vec<(LatLon, Outcome, bool)>,
    completions: Vec<(bool, String)>,
    frames: Vec<TickReport>,
}

impl Renderer for Recorder {
    fn render(&mut self, location: LatLon, outcome: Outcome, consolidated: bool) {
        self.rendered.push((location, outcome, consolidated));
    }

    fn on_playback_complete(&mut self, snapshot_requested: bool, label: &str) {
        self.completions.push((snapshot_requested, label.to_string()));
    }
}

impl FrameRenderer for Recorder {
    fn end_frame(&mut self, report: &TickReport) {
        self.frames.push(report.clone());
    }
}

fn geo() -> TableGeoLocator {
    let mut table = TableGeoLocator::new();
    table.insert("10.0.0.1", LatLon::new(10.0, 20.0));
    table.insert("10.0.0.2", LatLon::new(10.0, 20.0));
    table.insert("10.0.0.3", LatLon::new(-30.0, 150.0));
    table.insert("192.168.1.1", LatLon::new(48.85, 2.35));
    table
}

fn config(dir: &TempDir, start: &str, end: &str) -> PlaybackConfig {
    PlaybackConfig {
        directory: dir.path().to_path_buf(),
        start: start.to_string(),
        end: end.to_string(),
        seconds_per_day: 12,
        ..PlaybackConfig::default()
    }
}

fn write(dir: &TempDir, name: &str, lines: &[&str]) {
    fs::write(dir.path().join(name), lines.join("\n")).unwrap();
}

#[test]
fn test_single_day_snapshot() {
    let dir = TempDir::new().unwrap();
    write(
        &dir,
        "20_03_15-00:00",
        &[
            "10.0.0.1\t20_03_15-00:00\t120\t0\tTCP",
            "10.0.0.3\t20_03_15-00:00\t80\t0\tICMP",
        ],
    );
    write(&dir, "20_03_16-00:00", &["10.0.0.1\t20_03_16-00:00\t120\t0\tTCP"]);

    let mut recorder = Recorder::default();
    let report = PlaybackRunner::new(config(&dir, "20_03_15-00:00", "20_03_15-00:00"))
        .run(&geo(), &mut recorder)
        .unwrap();

    assert_eq!(report.ingest.files_in_range, 1);
    assert_eq!(recorder.rendered.len(), 2);
    assert_eq!(recorder.completions, vec![(true, "20_03_15-00:00".to_string())]);
    assert!(report.snapshot_requested);
    assert_eq!(report.ticks, 1);
    assert!(report.geo_available);
}

#[test]
fn test_consolidated_pair_has_half_success() {
    let dir = TempDir::new().unwrap();
    write(
        &dir,
        "20_01_01-00:00",
        &[
            "10.0.0.1\t20_01_01-00:00\t120\t0\tTCP",
            "10.0.0.2\t20_01_01-00:00\t-1\t192.168.1.1\tTCP",
        ],
    );

    let mut config = config(&dir, "20_01_01-00:00", "20_01_01-00:00");
    config.consolidate = true;

    let mut recorder = Recorder::default();
    let report = PlaybackRunner::new(config).run(&geo(), &mut recorder).unwrap();

    // Both addresses resolve to (10, 20); the unreached one's fallback is dropped
    assert_eq!(recorder.rendered.len(), 1);
    let (location, outcome, consolidated) = recorder.rendered[0];
    assert_eq!(location, LatLon::new(10.0, 20.0));
    assert_eq!(outcome, Outcome::Consolidated { success_ratio: 0.5 });
    assert!(consolidated);
    assert_eq!(report.outcomes.consolidated, 1);
}

#[test]
fn test_fallback_renders_before_principal() {
    let dir = TempDir::new().unwrap();
    write(&dir, "20_01_01-00:00", &["10.0.0.3\t20_01_01-00:00\t-1\t192.168.1.1\tICMP"]);

    let mut recorder = Recorder::default();
    PlaybackRunner::new(config(&dir, "20_01_01-00:00", "20_01_01-00:00"))
        .run(&geo(), &mut recorder)
        .unwrap();

    assert_eq!(recorder.rendered.len(), 2);
    assert_eq!(recorder.rendered[0].0, LatLon::new(48.85, 2.35));
    assert_eq!(recorder.rendered[0].1, Outcome::FallbackMarker);
    assert_eq!(recorder.rendered[1].0, LatLon::new(-30.0, 150.0));
    assert_eq!(recorder.rendered[1].1, Outcome::Unreached);
}

#[test]
fn test_empty_directory_finishes_immediately() {
    let dir = TempDir::new().unwrap();

    let mut recorder = Recorder::default();
    let report = PlaybackRunner::new(config(&dir, "20_01_01-00:00", "20_01_02-00:00"))
        .run(&geo(), &mut recorder)
        .unwrap();

    assert!(recorder.rendered.is_empty());
    assert_eq!(recorder.completions, vec![(false, "20_01_01-00:00".to_string())]);
    assert_eq!(report.ticks, 1);
    assert_eq!(report.final_clock, TimeStamp::new(20, 1, 1, 0, 0));
    assert_eq!(recorder.frames.len(), 1);
    assert!(recorder.frames[0].completed);
}

#[test]
fn test_batches_release_when_clock_reaches_them() {
    let dir = TempDir::new().unwrap();
    write(&dir, "20_01_01-00:00", &["10.0.0.1\t20_01_01-00:00\t10\t0\tTCP"]);
    write(&dir, "20_01_01-00:30", &["10.0.0.3\t20_01_01-00:30\t10\t0\tTCP"]);

    // 1440 / (10 * 12) = 12 minutes per tick
    let mut recorder = Recorder::default();
    let report = PlaybackRunner::new(config(&dir, "20_01_01-00:00", "20_01_01-00:30"))
        .run(&geo(), &mut recorder)
        .unwrap();

    let clocks: Vec<(String, usize)> = recorder
        .frames
        .iter()
        .map(|f| (f.clock.to_string(), f.events_released))
        .collect();
    assert_eq!(
        clocks,
        vec![
            ("20_01_01-00:12".to_string(), 1),
            ("20_01_01-00:24".to_string(), 0),
            ("20_01_01-00:36".to_string(), 1),
        ]
    );
    assert_eq!(report.minutes_per_tick, 12);
    assert!(recorder.frames[2].completed);
}

#[test]
fn test_protocol_filter_and_malformed_lines() {
    let dir = TempDir::new().unwrap();
    write(
        &dir,
        "20_01_01-00:00",
        &[
            "10.0.0.1\t20_01_01-00:00\t10\t0\tTCP",
            "10.0.0.3\t20_01_01-00:00\t900\tWEB",
            "10.0.0.3\t20_01_01-00:00\t10\tUDP",
            "garbage",
        ],
    );

    let mut config = config(&dir, "20_01_01-00:00", "20_01_01-00:00");
    config.protocol = ProtocolFilter::Only("web".to_string());

    let mut recorder = Recorder::default();
    let report = PlaybackRunner::new(config).run(&geo(), &mut recorder).unwrap();

    assert_eq!(report.ingest.records_retained, 1);
    assert_eq!(report.ingest.records_filtered, 1);
    assert_eq!(report.ingest.lines_malformed, 2);
    assert_eq!(recorder.rendered.len(), 1);
    assert_eq!(recorder.rendered[0].1, Outcome::Measured { intensity: 0.0 });
}

#[test]
fn test_missing_geolocation_places_events_off_map() {
    let dir = TempDir::new().unwrap();
    write(&dir, "20_01_01-00:00", &["10.0.0.1\t20_01_01-00:00\t10\t0\tTCP"]);

    let mut recorder = Recorder::default();
    let report = PlaybackRunner::new(config(&dir, "20_01_01-00:00", "20_01_01-00:00"))
        .run(&UnavailableGeoLocator::new(), &mut recorder)
        .unwrap();

    assert_eq!(recorder.rendered[0].0, LatLon::SENTINEL);
    assert_eq!(report.outcomes.off_map, 1);
    assert!(!report.geo_available);
}

#[test]
fn test_synthetic_traces_play_through() {
    let dir = TempDir::new().unwrap();
    let summary = TraceSynthesizer::new(
        SynthConfig::new(dir.path(), TimeStamp::new(20, 1, 1, 0, 0), 6, 42).with_records_per_file(30),
    )
    .write()
    .unwrap();
    let geo = TableGeoLocator::from_file(&summary.geo_table).unwrap();

    let mut plain = config(&dir, "20_01_01-00:00", "20_01_01-05:00");
    plain.grouping = GroupingStrategy::RunLength;
    let mut merged = plain.clone();
    merged.consolidate = true;

    let mut exporter = ExportRenderer::new(&plain.start, &plain.end);
    let mut counter = NullRenderer::default();
    let report = {
        let mut set = RendererSet::new().with(&mut exporter).with(&mut counter);
        PlaybackRunner::new(plain).run(&geo, &mut set).unwrap()
    };

    assert!(report.completed);
    assert_eq!(report.ingest.files_read, 6);
    assert_eq!(report.ingest.lines_read, 180);
    assert_eq!(report.ingest.records_retained, 180);
    assert_eq!(report.batches_released, 6);
    assert_eq!(report.outcomes.off_map, 0);
    // Slow responses are unreached too, but only probe failures carry a fallback
    assert!(report.outcomes.fallback > 0);
    assert!(report.outcomes.fallback <= report.outcomes.unreached);
    assert_eq!(counter.rendered, report.events_released);
    assert_eq!(exporter.export().event_count() as u64, report.events_released);

    let consolidated = PlaybackRunner::new(merged)
        .run(&geo, &mut NullRenderer::default())
        .unwrap();
    assert!(consolidated.outcomes.consolidated > 0);
    assert!(consolidated.events_released < report.events_released);
}

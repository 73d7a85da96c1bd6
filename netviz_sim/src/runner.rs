//! Playback runner - ingests a trace directory and drives the scheduler.
//!
//! # Tick Loop
//!
//! ```text
//! prepare:  validate -> ingest -> [consolidate] -> Scheduler + Clock
//! step:     Scheduler::tick(clock, renderer) -> end_frame(report)
//! run:      step until the completion signal fires (or max ticks)
//! ```
//!
//! `run` steps back-to-back. `run_realtime` paces steps on a tokio
//! interval of `1 / frame_rate` seconds.

use crate::config::{ConfigError, PlaybackConfig};

use netviz_core::{
    consolidate_batches, ingest, Clock, IngestStats, NetvizError, Scheduler, TickReport, TimeStamp,
};
use netviz_env::{GeoLocator, LatLon, Outcome, Renderer};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Errors that stop a playback before it starts.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Engine(#[from] NetvizError),

    /// The async runtime for paced playback could not start
    #[error("Cannot start runtime: {0}")]
    Runtime(#[from] std::io::Error),
}

/// A renderer that also hears about tick boundaries.
pub trait FrameRenderer: Renderer {
    /// Called after every tick, whether or not it released anything.
    fn end_frame(&mut self, _report: &TickReport) {}
}

impl<R: FrameRenderer + ?Sized> FrameRenderer for &mut R {
    fn end_frame(&mut self, report: &TickReport) {
        (**self).end_frame(report)
    }
}

impl FrameRenderer for netviz_env::NullRenderer {}

/// Fans every call out to several renderers, in insertion order.
#[derive(Default)]
pub struct RendererSet<'a> {
    renderers: Vec<&'a mut dyn FrameRenderer>,
}

impl<'a> RendererSet<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a renderer.
    pub fn with(mut self, renderer: &'a mut dyn FrameRenderer) -> Self {
        self.renderers.push(renderer);
        self
    }

    pub fn len(&self) -> usize {
        self.renderers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.renderers.is_empty()
    }
}

impl Renderer for RendererSet<'_> {
    fn render(&mut self, location: LatLon, outcome: Outcome, consolidated: bool) {
        for renderer in self.renderers.iter_mut() {
            renderer.render(location, outcome, consolidated);
        }
    }

    fn on_playback_complete(&mut self, snapshot_requested: bool, label: &str) {
        for renderer in self.renderers.iter_mut() {
            renderer.on_playback_complete(snapshot_requested, label);
        }
    }
}

impl FrameRenderer for RendererSet<'_> {
    fn end_frame(&mut self, report: &TickReport) {
        for renderer in self.renderers.iter_mut() {
            renderer.end_frame(report);
        }
    }
}

/// Renderer calls by outcome.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeTally {
    pub measured: u64,
    pub unreached: u64,
    pub fallback: u64,
    pub consolidated: u64,
    /// Events placed at the off-map sentinel
    pub off_map: u64,
}

impl OutcomeTally {
    /// Counts one rendered event.
    pub fn record(&mut self, location: LatLon, outcome: Outcome) {
        match outcome {
            Outcome::Measured { .. } => self.measured += 1,
            Outcome::Unreached => self.unreached += 1,
            Outcome::FallbackMarker => self.fallback += 1,
            Outcome::Consolidated { .. } => self.consolidated += 1,
        }
        if location.is_sentinel() {
            self.off_map += 1;
        }
    }

    /// Total renderer calls counted.
    pub fn total(&self) -> u64 {
        self.measured + self.unreached + self.fallback + self.consolidated
    }
}

/// Forwards to a renderer while counting outcomes.
struct Tallying<'r, R: ?Sized> {
    inner: &'r mut R,
    tally: &'r mut OutcomeTally,
}

impl<R: Renderer + ?Sized> Renderer for Tallying<'_, R> {
    fn render(&mut self, location: LatLon, outcome: Outcome, consolidated: bool) {
        self.tally.record(location, outcome);
        self.inner.render(location, outcome, consolidated);
    }

    fn on_playback_complete(&mut self, snapshot_requested: bool, label: &str) {
        self.inner.on_playback_complete(snapshot_requested, label);
    }
}

/// Summary of a finished (or truncated) playback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackReport {
    /// Scheduler ticks executed, the completion tick included
    pub ticks: u64,

    /// Clock increment per tick
    pub minutes_per_tick: u32,

    /// Clock value when the run stopped
    pub final_clock: TimeStamp,

    /// Totals released to the renderer
    pub batches_released: u64,
    pub events_released: u64,

    /// True if the completion signal fired
    pub completed: bool,

    /// True if the run hit the tick limit first
    pub truncated: bool,

    /// Batches still queued when the run stopped
    pub pending_batches: usize,

    /// Completion payload
    pub snapshot_requested: bool,
    pub label: String,

    /// Renderer calls by outcome
    pub outcomes: OutcomeTally,

    /// Ingestion counters
    pub ingest: IngestStats,

    /// False if playback ran without a geolocation database
    pub geo_available: bool,
}

/// A prepared playback: a loaded scheduler and its clock.
pub struct Playback {
    clock: Clock,
    scheduler: Scheduler,
    ingest: IngestStats,
    tally: OutcomeTally,
    ticks: u64,
    geo_available: bool,
}

impl Playback {
    /// Wraps an already-loaded scheduler.
    pub fn new(clock: Clock, scheduler: Scheduler, ingest: IngestStats) -> Self {
        Self {
            clock,
            scheduler,
            ingest,
            tally: OutcomeTally::default(),
            ticks: 0,
            geo_available: true,
        }
    }

    /// Runs one tick.
    pub fn step<R: FrameRenderer + ?Sized>(&mut self, renderer: &mut R) -> TickReport {
        let report = {
            let mut tallying = Tallying {
                inner: &mut *renderer,
                tally: &mut self.tally,
            };
            self.scheduler.tick(&mut self.clock, &mut tallying)
        };
        self.ticks += 1;
        renderer.end_frame(&report);
        report
    }

    /// Returns true once the completion signal has fired.
    pub fn is_finished(&self) -> bool {
        self.scheduler.is_terminated()
    }

    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Consumes the playback into its report.
    pub fn into_report(self, truncated: bool) -> PlaybackReport {
        let completed = self.scheduler.is_terminated();
        let completion = self.scheduler.completion();

        PlaybackReport {
            ticks: self.ticks,
            minutes_per_tick: self.clock.minutes_per_tick(),
            final_clock: self.clock.now(),
            batches_released: self.scheduler.batches_released(),
            events_released: self.scheduler.events_released(),
            completed,
            truncated,
            pending_batches: self.scheduler.pending_batches(),
            snapshot_requested: completed && completion.snapshot_requested,
            label: completion.label.clone(),
            outcomes: self.tally,
            ingest: self.ingest,
            geo_available: self.geo_available,
        }
    }
}

/// Runs playbacks for one configuration.
pub struct PlaybackRunner {
    config: PlaybackConfig,
    max_ticks: Option<u64>,
}

impl PlaybackRunner {
    /// Creates a runner.
    pub fn new(config: PlaybackConfig) -> Self {
        Self {
            config,
            max_ticks: None,
        }
    }

    /// Stops the run after `ticks` ticks even if batches remain.
    pub fn with_max_ticks(mut self, ticks: u64) -> Self {
        self.max_ticks = Some(ticks);
        self
    }

    pub fn config(&self) -> &PlaybackConfig {
        &self.config
    }

    /// Validates the configuration, ingests and loads the scheduler.
    pub fn prepare<G: GeoLocator + ?Sized>(&self, geo: &G) -> Result<Playback, RunError> {
        self.config.validate()?;

        let ingestion = ingest(&self.config.ingest_config(), geo)?;
        let stats = ingestion.stats;
        let mut batches = ingestion.batches;

        if self.config.consolidate {
            let before: usize = batches.iter().map(|b| b.len()).sum();
            batches = consolidate_batches(batches);
            let after: usize = batches.iter().map(|b| b.len()).sum();
            info!("Consolidation: {} events -> {} ({} batches)", before, after, batches.len());
        }

        let clock = Clock::new(self.config.start_time()?, self.config.minutes_per_tick()?);
        let scheduler = Scheduler::with_batches(batches, self.config.completion());

        let geo_available = geo.is_available();
        info!(
            "Playback ready: {} batches queued, clock {} (+{} min/tick), geolocation {}",
            scheduler.pending_batches(),
            clock.now(),
            clock.minutes_per_tick(),
            if geo_available { "available" } else { "unavailable" }
        );
        if !geo_available {
            warn!("Every event will be placed off-map");
        }
        if let Some(next) = scheduler.next_due() {
            if next < clock.now() {
                warn!("Earliest batch {} precedes the start bound {}", next, clock.now());
            }
        }

        let mut playback = Playback::new(clock, scheduler, stats);
        playback.geo_available = geo_available;
        Ok(playback)
    }

    fn limit_reached(&self, playback: &Playback) -> bool {
        self.max_ticks.map_or(false, |max| playback.ticks() >= max)
    }

    /// Runs to completion without pacing.
    pub fn run<G, R>(&self, geo: &G, renderer: &mut R) -> Result<PlaybackReport, RunError>
    where
        G: GeoLocator + ?Sized,
        R: FrameRenderer + ?Sized,
    {
        let mut playback = self.prepare(geo)?;

        while !playback.is_finished() {
            if self.limit_reached(&playback) {
                return Ok(self.truncate(playback));
            }
            playback.step(renderer);
        }

        Ok(self.finish(playback))
    }

    /// Runs to completion, one tick per frame period.
    pub async fn run_realtime<G, R>(&self, geo: &G, renderer: &mut R) -> Result<PlaybackReport, RunError>
    where
        G: GeoLocator + ?Sized,
        R: FrameRenderer + ?Sized,
    {
        let mut playback = self.prepare(geo)?;

        let period = Duration::from_secs_f64(1.0 / f64::from(self.config.frame_rate));
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!("Real-time playback at {} fps ({:?} per tick)", self.config.frame_rate, period);

        while !playback.is_finished() {
            if self.limit_reached(&playback) {
                return Ok(self.truncate(playback));
            }
            interval.tick().await;
            let report = playback.step(renderer);
            if report.batches_released > 0 {
                debug!("frame {} @ {}", playback.ticks(), report.clock);
            }
        }

        Ok(self.finish(playback))
    }

    fn truncate(&self, playback: Playback) -> PlaybackReport {
        warn!(
            "Stopped after {} ticks with {} batches still queued",
            playback.ticks(),
            playback.scheduler().pending_batches()
        );
        playback.into_report(true)
    }

    fn finish(&self, playback: Playback) -> PlaybackReport {
        let report = playback.into_report(false);
        info!(
            "Playback finished after {} ticks at {}: {} batches, {} events",
            report.ticks, report.final_clock, report.batches_released, report.events_released
        );
        report
    }
}

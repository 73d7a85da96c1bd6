//! Playback scheduler - releases event batches as simulated time arrives.
//!
//! # State Machine
//!
//! ```text
//!            push (queue non-empty)
//!   ┌──────────────────────────────┐
//!   │                              ▼
//! Finished ◄── queue drained ── Draining
//!   │
//!   └─ first tick while Finished: emit completion once, then terminal
//! ```
//!
//! Each tick advances the clock, then pops every batch whose timestamp is
//! at or before the new clock value. Batches with equal timestamps leave
//! the queue in insertion order.

use crate::grouping::EventBatch;
use crate::timestamp::{Clock, TimeStamp};
use netviz_env::Renderer;
use serde::{Deserialize, Serialize};
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use tracing::{debug, info, warn};

/// Scheduler state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaybackState {
    /// Batches remain in the queue
    Draining,

    /// Queue empty; terminal once the completion signal has fired
    Finished,
}

/// What to tell the renderer when playback completes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Completion {
    /// Request a single snapshot of the final frame
    pub snapshot_requested: bool,

    /// Label for the snapshot
    pub label: String,
}

impl Completion {
    /// Derives the completion from the configured file range.
    ///
    /// Identical bounds select single-day snapshot mode.
    pub fn for_bounds(start: &str, end: &str) -> Self {
        Self {
            snapshot_requested: start == end,
            label: start.to_string(),
        }
    }
}

/// A batch plus its insertion sequence, ordered by (timestamp, sequence).
#[derive(Debug)]
struct QueuedBatch {
    sequence: u64,
    batch: EventBatch,
}

impl QueuedBatch {
    fn key(&self) -> (TimeStamp, u64) {
        (self.batch.timestamp(), self.sequence)
    }
}

impl PartialEq for QueuedBatch {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for QueuedBatch {}

impl PartialOrd for QueuedBatch {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedBatch {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

/// Summary of one tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickReport {
    /// Clock value after the tick
    pub clock: TimeStamp,

    /// Batches released this tick
    pub batches_released: usize,

    /// Renderer calls made this tick (fallbacks included)
    pub events_released: usize,

    /// State after the tick
    pub state: PlaybackState,

    /// True on the one tick that emitted the completion signal
    pub completed: bool,
}

/// Priority queue of event batches keyed by timestamp.
pub struct Scheduler {
    /// Min-heap on (timestamp, insertion sequence)
    queue: BinaryHeap<Reverse<QueuedBatch>>,

    /// Next insertion sequence number
    next_sequence: u64,

    /// Completion payload
    completion: Completion,

    /// Set once the completion signal has fired
    terminated: bool,

    /// Totals across the run
    batches_released: u64,
    events_released: u64,

    /// Timestamp of the most recently released batch
    last_released: Option<TimeStamp>,
}

impl Scheduler {
    /// Creates an empty scheduler.
    pub fn new(completion: Completion) -> Self {
        Self {
            queue: BinaryHeap::new(),
            next_sequence: 0,
            completion,
            terminated: false,
            batches_released: 0,
            events_released: 0,
            last_released: None,
        }
    }

    /// Creates a scheduler loaded with `batches`, in the given order.
    pub fn with_batches(batches: impl IntoIterator<Item = EventBatch>, completion: Completion) -> Self {
        let mut scheduler = Self::new(completion);
        for batch in batches {
            scheduler.push(batch);
        }
        scheduler
    }

    /// Queues a batch.
    ///
    /// Returns false (and drops the batch) once playback has terminated.
    pub fn push(&mut self, batch: EventBatch) -> bool {
        if self.terminated {
            warn!("Dropping batch at {}: playback already finished", batch.timestamp());
            return false;
        }
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.queue.push(Reverse(QueuedBatch { sequence, batch }));
        true
    }

    /// Current state.
    pub fn state(&self) -> PlaybackState {
        if self.queue.is_empty() {
            PlaybackState::Finished
        } else {
            PlaybackState::Draining
        }
    }

    /// Returns true once the completion signal has been emitted.
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Number of queued batches.
    pub fn pending_batches(&self) -> usize {
        self.queue.len()
    }

    /// Timestamp of the next batch due, if any.
    pub fn next_due(&self) -> Option<TimeStamp> {
        self.queue.peek().map(|Reverse(queued)| queued.batch.timestamp())
    }

    /// Total batches released so far.
    pub fn batches_released(&self) -> u64 {
        self.batches_released
    }

    /// Total renderer calls made so far.
    pub fn events_released(&self) -> u64 {
        self.events_released
    }

    /// Timestamp of the last released batch.
    pub fn last_released(&self) -> Option<TimeStamp> {
        self.last_released
    }

    /// Completion payload.
    pub fn completion(&self) -> &Completion {
        &self.completion
    }

    /// Runs one tick against `clock`, releasing due batches to `renderer`.
    ///
    /// After termination this is a no-op that leaves the clock untouched.
    pub fn tick<R: Renderer + ?Sized>(&mut self, clock: &mut Clock, renderer: &mut R) -> TickReport {
        let mut report = TickReport {
            clock: clock.now(),
            batches_released: 0,
            events_released: 0,
            state: PlaybackState::Finished,
            completed: false,
        };

        if self.terminated {
            return report;
        }

        if self.queue.is_empty() {
            self.finish(renderer);
            report.completed = true;
            return report;
        }

        clock.advance();
        let now = clock.now();
        report.clock = now;

        while let Some(Reverse(next)) = self.queue.peek() {
            if next.batch.timestamp() > now {
                break;
            }
            let Some(Reverse(queued)) = self.queue.pop() else {
                break;
            };

            let released = self.release(queued.batch, renderer);
            report.batches_released += 1;
            report.events_released += released;
        }

        if report.batches_released > 0 {
            debug!(
                "t={} released {} batches ({} events), {} pending",
                now,
                report.batches_released,
                report.events_released,
                self.queue.len()
            );
        }

        if self.queue.is_empty() {
            self.finish(renderer);
            report.completed = true;
        } else {
            report.state = PlaybackState::Draining;
        }

        report
    }

    fn release<R: Renderer + ?Sized>(&mut self, batch: EventBatch, renderer: &mut R) -> usize {
        let timestamp = batch.timestamp();
        let mut released = 0;
        for event in batch.events() {
            released += event.release(renderer);
        }

        self.batches_released += 1;
        self.events_released += released as u64;
        self.last_released = Some(timestamp);
        released
    }

    fn finish<R: Renderer + ?Sized>(&mut self, renderer: &mut R) {
        self.terminated = true;
        info!(
            "Playback complete: {} batches, {} events released{}",
            self.batches_released,
            self.events_released,
            if self.completion.snapshot_requested { " (snapshot requested)" } else { "" }
        );
        renderer.on_playback_complete(self.completion.snapshot_requested, &self.completion.label);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Event;
    use netviz_env::{LatLon, NullRenderer, Outcome};
    use proptest::prelude::*;

    /// Renderer that records every call in order.
    #[derive(Default)]
    struct Recorder {
        rendered: Vec<(LatLon, Outcome)>,
        completions: Vec<(bool, String)>,
    }

    impl Renderer for Recorder {
        fn render(&mut self, location: LatLon, outcome: Outcome, _consolidated: bool) {
            self.rendered.push((location, outcome));
        }

        fn on_playback_complete(&mut self, snapshot_requested: bool, label: &str) {
            self.completions.push((snapshot_requested, label.to_string()));
        }
    }

    fn ts(hour: u32, minute: u32) -> TimeStamp {
        TimeStamp::new(20, 1, 1, hour, minute)
    }

    fn ev(lat: f64, at: TimeStamp) -> Event {
        Event {
            location: LatLon::new(lat, 0.0),
            timestamp: at,
            outcome: Outcome::Measured { intensity: 0.5 },
            source_id: String::new(),
            protocol: "TCP".to_string(),
            fallback: None,
        }
    }

    fn batch(at: TimeStamp, lats: &[f64]) -> EventBatch {
        EventBatch::new(at, lats.iter().map(|&lat| ev(lat, at)).collect())
    }

    fn completion() -> Completion {
        Completion::for_bounds("20_01_01-00:00", "20_01_02-00:00")
    }

    #[test]
    fn test_releases_due_batches_in_time_order() {
        let mut scheduler = Scheduler::with_batches(
            vec![batch(ts(0, 30), &[3.0]), batch(ts(0, 10), &[1.0]), batch(ts(0, 20), &[2.0])],
            completion(),
        );
        let mut clock = Clock::new(ts(0, 0), 20);
        let mut renderer = Recorder::default();

        // 00:20 -> first two due
        let report = scheduler.tick(&mut clock, &mut renderer);
        assert_eq!(report.clock, ts(0, 20));
        assert_eq!(report.batches_released, 2);
        assert_eq!(report.state, PlaybackState::Draining);

        // 00:40 -> last one, then finished
        let report = scheduler.tick(&mut clock, &mut renderer);
        assert_eq!(report.batches_released, 1);
        assert!(report.completed);
        assert_eq!(report.state, PlaybackState::Finished);

        let lats: Vec<f64> = renderer.rendered.iter().map(|(l, _)| l.lat).collect();
        assert_eq!(lats, vec![1.0, 2.0, 3.0]);
        assert_eq!(renderer.completions, vec![(false, "20_01_01-00:00".to_string())]);
    }

    #[test]
    fn test_equal_timestamps_are_fifo() {
        let at = ts(1, 0);
        let mut scheduler = Scheduler::with_batches(
            vec![batch(at, &[1.0]), batch(at, &[2.0]), batch(at, &[3.0])],
            completion(),
        );
        let mut clock = Clock::new(ts(1, 0), 1);
        let mut renderer = Recorder::default();

        scheduler.tick(&mut clock, &mut renderer);

        let lats: Vec<f64> = renderer.rendered.iter().map(|(l, _)| l.lat).collect();
        assert_eq!(lats, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_nothing_released_before_due() {
        let mut scheduler = Scheduler::with_batches(vec![batch(ts(5, 0), &[1.0])], completion());
        let mut clock = Clock::new(ts(0, 0), 60);
        let mut renderer = NullRenderer::default();

        for _ in 0..4 {
            let report = scheduler.tick(&mut clock, &mut renderer);
            assert_eq!(report.batches_released, 0);
        }
        assert_eq!(scheduler.next_due(), Some(ts(5, 0)));

        let report = scheduler.tick(&mut clock, &mut renderer);
        assert_eq!(report.batches_released, 1);
        assert_eq!(renderer.rendered, 1);
    }

    #[test]
    fn test_fallback_released_before_principal() {
        let at = ts(0, 1);
        let mut principal = ev(10.0, at);
        principal.outcome = Outcome::Unreached;
        let mut fallback = ev(20.0, at);
        fallback.outcome = Outcome::FallbackMarker;
        principal.fallback = Some(Box::new(fallback));

        let mut scheduler = Scheduler::with_batches(vec![EventBatch::new(at, vec![principal])], completion());
        let mut clock = Clock::new(ts(0, 0), 1);
        let mut renderer = Recorder::default();

        let report = scheduler.tick(&mut clock, &mut renderer);

        assert_eq!(report.events_released, 2);
        assert_eq!(renderer.rendered[0], (LatLon::new(20.0, 0.0), Outcome::FallbackMarker));
        assert_eq!(renderer.rendered[1], (LatLon::new(10.0, 0.0), Outcome::Unreached));
    }

    #[test]
    fn test_empty_queue_starts_finished() {
        let mut scheduler = Scheduler::new(Completion::for_bounds("20_01_01-00:00", "20_01_01-00:00"));
        let mut clock = Clock::new(ts(0, 0), 10);
        let mut renderer = Recorder::default();

        assert_eq!(scheduler.state(), PlaybackState::Finished);

        let report = scheduler.tick(&mut clock, &mut renderer);
        assert!(report.completed);
        assert_eq!(clock.now(), ts(0, 0));
        assert_eq!(renderer.completions, vec![(true, "20_01_01-00:00".to_string())]);
    }

    #[test]
    fn test_finished_is_terminal() {
        let mut scheduler = Scheduler::with_batches(vec![batch(ts(0, 0), &[1.0])], completion());
        let mut clock = Clock::new(ts(0, 0), 10);
        let mut renderer = Recorder::default();

        assert!(scheduler.tick(&mut clock, &mut renderer).completed);
        let frozen = clock.now();

        for _ in 0..3 {
            let report = scheduler.tick(&mut clock, &mut renderer);
            assert!(!report.completed);
            assert_eq!(report.batches_released, 0);
        }

        assert_eq!(clock.now(), frozen);
        assert_eq!(renderer.completions.len(), 1);
        assert!(!scheduler.push(batch(ts(9, 0), &[1.0])));
        assert_eq!(scheduler.pending_batches(), 0);
    }

    proptest! {
        #[test]
        fn prop_release_order_is_monotonic(
            times in prop::collection::vec((0u32..24, 0u32..60), 1..40),
            step in 1u32..90,
        ) {
            let times: Vec<TimeStamp> = times.into_iter().map(|(h, m)| ts(h, m)).collect();
            // Each batch carries one event whose latitude is the batch index
            let batches = times
                .iter()
                .enumerate()
                .map(|(i, &t)| batch(t, &[i as f64]));
            let mut scheduler = Scheduler::with_batches(batches, completion());
            let mut clock = Clock::new(ts(0, 0), step);
            let mut recorder = Recorder::default();

            let mut ticks = 0;
            while !scheduler.is_terminated() && ticks < 2000 {
                let before = recorder.rendered.len();
                scheduler.tick(&mut clock, &mut recorder);
                for (location, _) in &recorder.rendered[before..] {
                    prop_assert!(times[location.lat as usize] <= clock.now());
                }
                ticks += 1;
            }

            prop_assert!(scheduler.is_terminated());
            prop_assert_eq!(recorder.rendered.len(), times.len());
            prop_assert_eq!(recorder.completions.len(), 1);

            let released: Vec<(TimeStamp, usize)> = recorder
                .rendered
                .iter()
                .map(|(location, _)| (times[location.lat as usize], location.lat as usize))
                .collect();
            // Time order, insertion order among equal times
            for pair in released.windows(2) {
                prop_assert!(pair[0] < pair[1]);
            }
        }
    }
}

//! Event batches and the strategies that form them.

use crate::event::Event;
use crate::timestamp::TimeStamp;
use serde::{Deserialize, Serialize};

/// An ordered group of events that fire at the same time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventBatch {
    timestamp: TimeStamp,
    events: Vec<Event>,
}

impl EventBatch {
    /// Creates a batch.
    pub fn new(timestamp: TimeStamp, events: Vec<Event>) -> Self {
        Self { timestamp, events }
    }

    /// When the batch fires.
    pub fn timestamp(&self) -> TimeStamp {
        self.timestamp
    }

    /// Events in release order.
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Takes the events out of the batch.
    pub fn into_events(self) -> Vec<Event> {
        self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// How retained records are bucketed into batches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GroupingStrategy {
    /// One batch per file, timestamped by the file name
    #[default]
    PerFile,

    /// One batch per run of consecutive records sharing a timestamp string
    RunLength,
}

impl GroupingStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            GroupingStrategy::PerFile => "per-file",
            GroupingStrategy::RunLength => "run-length",
        }
    }
}

impl std::fmt::Display for GroupingStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for GroupingStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "per-file" | "per_file" | "file" => Ok(GroupingStrategy::PerFile),
            "run-length" | "run_length" | "runs" => Ok(GroupingStrategy::RunLength),
            _ => Err(format!("Unknown grouping strategy: {}", s)),
        }
    }
}

/// Splits an ordered sequence of keyed events into batches of
/// consecutive equal keys.
///
/// A batch closes as soon as the key changes or the input ends; equal keys
/// separated by a different key land in separate batches.
pub fn group_runs<K, I>(items: I) -> Vec<EventBatch>
where
    K: PartialEq,
    I: IntoIterator<Item = (K, Event)>,
{
    let mut batches = Vec::new();
    let mut current: Option<(K, EventBatch)> = None;

    for (key, event) in items {
        let same_run = matches!(&current, Some((open_key, _)) if *open_key == key);
        if same_run {
            if let Some((_, batch)) = current.as_mut() {
                batch.events.push(event);
            }
            continue;
        }

        if let Some((_, batch)) = current.take() {
            batches.push(batch);
        }
        current = Some((key, EventBatch::new(event.timestamp, vec![event])));
    }

    if let Some((_, batch)) = current {
        batches.push(batch);
    }

    batches
}

/// Run-length batching keyed on the raw timestamp strings.
///
/// `keyed` pairs each event with the timestamp column it was parsed from.
pub fn group_by_raw_timestamp(keyed: Vec<(String, Event)>) -> Vec<EventBatch> {
    group_runs(keyed)
}

/// Run-length batching keyed on parsed timestamps.
pub fn group_by_timestamp(events: Vec<Event>) -> Vec<EventBatch> {
    group_runs(events.into_iter().map(|event| (event.timestamp, event)))
}

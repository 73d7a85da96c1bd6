//! NetViz Core - Temporal Ingestion and Playback Engine for Probe Traces
//!
//! This library turns an unordered directory of timestamped trace files
//! into a time-ordered stream of renderable events:
//! 1. **Ingestion**: range-filtered directory scan, line parsing, protocol filter
//! 2. **Grouping**: records bucketed into batches sharing one timestamp
//! 3. **Consolidation**: co-located events merged into success-ratio aggregates
//! 4. **Playback**: a min-heap of batches released against a simulated clock
//!
//! Data flows one way:
//!
//! ```text
//! files -> TraceRecord -> Event -> EventBatch -> Scheduler -> Renderer
//! ```
//!
//! Geolocation and drawing are collaborators defined in `netviz_env`.

pub mod error;
pub mod timestamp;
pub mod trace;
pub mod event;
pub mod ingest;
pub mod grouping;
pub mod consolidation;
pub mod scheduler;

// Re-export key types for convenience
pub use error::{NetvizError, Result, TimeStampError, TraceError};
pub use timestamp::{Clock, TimeStamp};
pub use trace::TraceRecord;
pub use event::{Event, ResponseCeilings};
pub use ingest::{ingest, IngestConfig, IngestStats, Ingestion, Ingestor, ProtocolFilter};
pub use grouping::{EventBatch, GroupingStrategy};
pub use consolidation::{consolidate, consolidate_batches};
pub use scheduler::{Completion, PlaybackState, Scheduler, TickReport};
pub use netviz_env::{LatLon, Outcome};

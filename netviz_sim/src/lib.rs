//! NetViz playback driver
//!
//! Wires the engine in `netviz_core` to concrete collaborators and runs it:
//! - **Configuration**: args file plus CLI overrides, validated up front
//! - **Runner**: fast-forward or real-time (tokio interval) tick loop
//! - **Renderers**: JSON frame export, optional Rerun viewer
//! - **Synthesis**: seeded trace directories for demos and tests
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────────────────────────────────┐
//! │ trace dir    │──►│ netviz_core: ingest -> [consolidate]     │
//! │ geo table    │   │              -> Scheduler + Clock        │
//! └──────────────┘   └───────────────────┬──────────────────────┘
//!                                        │ render / complete
//!                         ┌──────────────▼──────────────┐
//!                         │ RendererSet                 │
//!                         │  ExportRenderer (JSON)      │
//!                         │  RerunRenderer  (optional)  │
//!                         └─────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use netviz_sim::{PlaybackConfig, PlaybackRunner};
//! use netviz_env::{NullRenderer, TableGeoLocator};
//!
//! let config = PlaybackConfig {
//!     directory: "traces".into(),
//!     start: "20_01_01-00:00".into(),
//!     end: "20_01_07-00:00".into(),
//!     seconds_per_day: 12,
//!     ..Default::default()
//! };
//!
//! let geo = TableGeoLocator::from_file("traces/geo.tsv")?;
//! let report = PlaybackRunner::new(config).run(&geo, &mut NullRenderer::default())?;
//! ```

pub mod config;
pub mod exporter;
pub mod projection;
pub mod runner;
pub mod synth;
pub mod visualizer;

pub use config::{ArgsFile, ConfigError, PlaybackConfig, DEFAULT_FRAME_RATE};
pub use exporter::{ExportRenderer, ExportedEvent, PlaybackExport, PlaybackFrame};
pub use projection::{outcome_color, MapPoint, MapProjection};
pub use runner::{FrameRenderer, OutcomeTally, Playback, PlaybackReport, PlaybackRunner, RendererSet, RunError};
pub use synth::{SynthConfig, SynthSummary, TraceSynthesizer, GEO_TABLE_NAME};
pub use visualizer::RerunRenderer;

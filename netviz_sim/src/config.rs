//! Playback configuration.
//!
//! Values come from two places, in increasing priority:
//! 1. an ordered args file (one value per line)
//! 2. command-line flags
//!
//! The args file layout is positional:
//!
//! ```text
//! line 1   trace directory
//! line 2   protocol filter ("ALL" or a tag)
//! line 3   start bound (file name, inclusive)
//! line 4   end bound (file name, inclusive)
//! line 5   seconds per simulated day
//! line 6   max response, milliseconds (optional)
//! line 7   max response, seconds (optional)
//! ```

use netviz_core::timestamp::minutes_per_tick;
use netviz_core::{
    Completion, GroupingStrategy, IngestConfig, ProtocolFilter, ResponseCeilings, TimeStamp,
    TimeStampError,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default animation frame rate (ticks per second).
pub const DEFAULT_FRAME_RATE: u32 = 10;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Args file could not be read
    #[error("Cannot read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Args file is missing a required line
    #[error("Config file {path} is missing line {line} ({field})")]
    Missing {
        path: String,
        line: usize,
        field: &'static str,
    },

    /// Args file line has the wrong type
    #[error("Config file {path} line {line}: {reason}")]
    Parse {
        path: String,
        line: usize,
        reason: String,
    },

    /// Value out of range or inconsistent
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    /// Start bound is not a timestamp
    #[error("Start bound is not a timestamp: {0}")]
    StartBound(#[from] TimeStampError),
}

/// Values read from an args file.
#[derive(Debug, Clone, PartialEq)]
pub struct ArgsFile {
    pub directory: PathBuf,
    pub protocol: String,
    pub start: String,
    pub end: String,
    pub seconds_per_day: u32,
    pub max_response_ms: Option<f64>,
    pub max_response_sec: Option<f64>,
}

impl ArgsFile {
    /// Parses args file text. `origin` is only used in error messages.
    pub fn parse(text: &str, origin: &str) -> Result<Self, ConfigError> {
        let lines: Vec<&str> = text.lines().map(|l| l.trim()).collect();

        let required = |index: usize, field: &'static str| {
            match lines.get(index) {
                Some(line) if !line.is_empty() => Ok(*line),
                _ => Err(ConfigError::Missing {
                    path: origin.to_string(),
                    line: index + 1,
                    field,
                }),
            }
        };

        let parse_error = |index: usize, reason: String| ConfigError::Parse {
            path: origin.to_string(),
            line: index + 1,
            reason,
        };

        let directory = PathBuf::from(required(0, "trace directory")?);
        let protocol = required(1, "protocol filter")?.to_string();
        let start = required(2, "start bound")?.to_string();
        let end = required(3, "end bound")?.to_string();
        let seconds_per_day = required(4, "seconds per day")?
            .parse::<u32>()
            .map_err(|e| parse_error(4, format!("seconds per day: {}", e)))?;

        let optional_f64 = |index: usize| -> Result<Option<f64>, ConfigError> {
            match lines.get(index) {
                Some(line) if !line.is_empty() => line
                    .parse::<f64>()
                    .map(Some)
                    .map_err(|e| parse_error(index, format!("response ceiling: {}", e))),
                _ => Ok(None),
            }
        };

        Ok(Self {
            directory,
            protocol,
            start,
            end,
            seconds_per_day,
            max_response_ms: optional_f64(5)?,
            max_response_sec: optional_f64(6)?,
        })
    }

    /// Reads and parses an args file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&text, &path.display().to_string())
    }
}

/// Everything needed to run one playback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackConfig {
    /// Directory holding trace files
    pub directory: PathBuf,

    /// Protocol filter
    pub protocol: ProtocolFilter,

    /// First file name to read (inclusive); also where the clock starts
    pub start: String,

    /// Last file name to read (inclusive)
    pub end: String,

    /// Animation seconds per simulated day
    pub seconds_per_day: u32,

    /// Ticks per second
    pub frame_rate: u32,

    /// Response ceilings
    pub ceilings: ResponseCeilings,

    /// Batching strategy
    pub grouping: GroupingStrategy,

    /// Merge co-located events before playback
    pub consolidate: bool,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::new(),
            protocol: ProtocolFilter::All,
            start: String::new(),
            end: String::new(),
            seconds_per_day: 0,
            frame_rate: DEFAULT_FRAME_RATE,
            ceilings: ResponseCeilings::default(),
            grouping: GroupingStrategy::default(),
            consolidate: false,
        }
    }
}

impl From<ArgsFile> for PlaybackConfig {
    fn from(file: ArgsFile) -> Self {
        let defaults = ResponseCeilings::default();
        Self {
            directory: file.directory,
            protocol: file.protocol.parse().unwrap_or_default(),
            start: file.start,
            end: file.end,
            seconds_per_day: file.seconds_per_day,
            ceilings: ResponseCeilings {
                max_response_ms: file.max_response_ms.unwrap_or(defaults.max_response_ms),
                max_response_sec: file.max_response_sec.unwrap_or(defaults.max_response_sec),
            },
            ..Self::default()
        }
    }
}

impl PlaybackConfig {
    /// Checks that the configuration can drive a playback.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.directory.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("trace directory is required".into()));
        }
        if self.start.is_empty() || self.end.is_empty() {
            return Err(ConfigError::Invalid("start and end bounds are required".into()));
        }
        if self.start > self.end {
            return Err(ConfigError::Invalid(format!(
                "start bound '{}' sorts after end bound '{}'",
                self.start, self.end
            )));
        }
        if self.frame_rate == 0 {
            return Err(ConfigError::Invalid("frame rate must be positive".into()));
        }
        if self.seconds_per_day == 0 {
            return Err(ConfigError::Invalid("seconds per day must be positive".into()));
        }
        for (name, value) in [
            ("max response ms", self.ceilings.max_response_ms),
            ("max response sec", self.ceilings.max_response_sec),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::Invalid(format!("{} must be positive, got {}", name, value)));
            }
        }

        self.start_time()?;
        self.minutes_per_tick()?;
        Ok(())
    }

    /// Clock starting point.
    pub fn start_time(&self) -> Result<TimeStamp, ConfigError> {
        Ok(TimeStamp::parse(&self.start)?)
    }

    /// Clock increment per tick.
    pub fn minutes_per_tick(&self) -> Result<u32, ConfigError> {
        minutes_per_tick(self.frame_rate, self.seconds_per_day).ok_or_else(|| {
            ConfigError::Invalid(format!(
                "cannot derive a tick increment from {} fps and {} s/day",
                self.frame_rate, self.seconds_per_day
            ))
        })
    }

    /// Single-day snapshot mode.
    pub fn snapshot_mode(&self) -> bool {
        self.start == self.end
    }

    /// Ingestion parameters.
    pub fn ingest_config(&self) -> IngestConfig {
        IngestConfig::new(&self.directory, &self.start, &self.end)
            .with_protocol(self.protocol.clone())
            .with_grouping(self.grouping)
            .with_ceilings(self.ceilings)
    }

    /// Completion payload for the scheduler.
    pub fn completion(&self) -> Completion {
        Completion::for_bounds(&self.start, &self.end)
    }
}

//! Trace directory ingestion.
//!
//! Walks a directory of trace files, keeps the files whose names fall in
//! an inclusive lexicographic range, parses every line, applies the
//! protocol filter and turns the surviving records into event batches.
//!
//! Bad data never aborts ingestion:
//! - an unreadable file is logged and skipped
//! - a malformed line is counted and dropped
//!
//! Only a directory that cannot be listed at all is an error.

use crate::error::{NetvizError, Result, TraceError};
use crate::event::{Event, ResponseCeilings};
use crate::grouping::{group_by_raw_timestamp, EventBatch, GroupingStrategy};
use crate::timestamp::TimeStamp;
use crate::trace::TraceRecord;
use netviz_env::GeoLocator;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Which protocol tags survive ingestion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProtocolFilter {
    /// Keep everything
    #[default]
    All,

    /// Keep records whose tag matches, ignoring case
    Only(String),
}

impl ProtocolFilter {
    /// Returns true if a record with `tag` is retained.
    pub fn accepts(&self, tag: &str) -> bool {
        match self {
            ProtocolFilter::All => true,
            ProtocolFilter::Only(wanted) => wanted.eq_ignore_ascii_case(tag.trim()),
        }
    }
}

impl std::str::FromStr for ProtocolFilter {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("ALL") {
            Ok(ProtocolFilter::All)
        } else {
            Ok(ProtocolFilter::Only(s.to_string()))
        }
    }
}

impl std::fmt::Display for ProtocolFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProtocolFilter::All => write!(f, "ALL"),
            ProtocolFilter::Only(tag) => write!(f, "{}", tag),
        }
    }
}

/// Parameters of one ingestion run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Directory holding the trace files
    pub directory: PathBuf,

    /// Lowest file name to read (inclusive)
    pub start: String,

    /// Highest file name to read (inclusive)
    pub end: String,

    /// Protocol filter
    pub protocol: ProtocolFilter,

    /// Batching strategy
    pub grouping: GroupingStrategy,

    /// Response ceilings for classification
    pub ceilings: ResponseCeilings,
}

impl IngestConfig {
    /// Creates a config with the default filter, grouping and ceilings.
    pub fn new(directory: impl Into<PathBuf>, start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            start: start.into(),
            end: end.into(),
            protocol: ProtocolFilter::All,
            grouping: GroupingStrategy::default(),
            ceilings: ResponseCeilings::default(),
        }
    }

    /// Sets the protocol filter.
    pub fn with_protocol(mut self, protocol: ProtocolFilter) -> Self {
        self.protocol = protocol;
        self
    }

    /// Sets the grouping strategy.
    pub fn with_grouping(mut self, grouping: GroupingStrategy) -> Self {
        self.grouping = grouping;
        self
    }

    /// Sets the response ceilings.
    pub fn with_ceilings(mut self, ceilings: ResponseCeilings) -> Self {
        self.ceilings = ceilings;
        self
    }

    /// Returns true if `name` lies in `[start, end]`.
    pub fn in_range(&self, name: &str) -> bool {
        name >= self.start.as_str() && name <= self.end.as_str()
    }
}

/// Counters collected during ingestion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestStats {
    /// Files whose names fell inside the range
    pub files_in_range: usize,

    /// Files opened and read
    pub files_read: usize,

    /// Files that could not be opened, named or read to the end
    pub files_skipped: usize,

    /// Lines read across all files
    pub lines_read: usize,

    /// Records kept
    pub records_retained: usize,

    /// Well-formed records rejected by the protocol filter
    pub records_filtered: usize,

    /// Lines dropped as malformed
    pub lines_malformed: usize,

    /// Batches produced
    pub batches: usize,
}

/// Result of ingestion: batches in file order plus counters.
#[derive(Debug, Clone, Default)]
pub struct Ingestion {
    pub batches: Vec<EventBatch>,
    pub stats: IngestStats,
}

impl Ingestion {
    /// Total number of principal events.
    pub fn event_count(&self) -> usize {
        self.batches.iter().map(EventBatch::len).sum()
    }

    /// Flattens the batches into a single event list.
    pub fn into_events(self) -> Vec<Event> {
        self.batches.into_iter().flat_map(EventBatch::into_events).collect()
    }
}

/// Reads trace directories into event batches.
pub struct Ingestor<'a, G: GeoLocator + ?Sized> {
    config: &'a IngestConfig,
    geo: &'a G,
}

impl<'a, G: GeoLocator + ?Sized> Ingestor<'a, G> {
    /// Creates an ingestor.
    pub fn new(config: &'a IngestConfig, geo: &'a G) -> Self {
        Self { config, geo }
    }

    /// Ingests every in-range file.
    pub fn run(&self) -> Result<Ingestion> {
        let files = self.list_files()?;
        let mut ingestion = Ingestion::default();
        ingestion.stats.files_in_range = files.len();

        info!(
            "Ingesting {} trace files from {} (range {}..={}, protocol {}, grouping {})",
            files.len(),
            self.config.directory.display(),
            self.config.start,
            self.config.end,
            self.config.protocol,
            self.config.grouping
        );

        for (name, path) in files {
            let batches = self.read_file(&name, &path, &mut ingestion.stats);
            ingestion.stats.batches += batches.len();
            ingestion.batches.extend(batches);
        }

        let stats = &ingestion.stats;
        info!(
            "Ingestion done: {} files read, {} skipped, {} records kept, {} filtered, {} malformed, {} batches",
            stats.files_read,
            stats.files_skipped,
            stats.records_retained,
            stats.records_filtered,
            stats.lines_malformed,
            stats.batches
        );

        Ok(ingestion)
    }

    /// Lists in-range regular files, sorted by name.
    pub fn list_files(&self) -> Result<Vec<(String, PathBuf)>> {
        let dir = &self.config.directory;
        let entries = std::fs::read_dir(dir).map_err(|source| NetvizError::Directory {
            path: dir.display().to_string(),
            source,
        })?;

        let mut files = Vec::new();
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable directory entry in {}: {}", dir.display(), e);
                    continue;
                }
            };

            let path = entry.path();
            if !path.is_file() {
                continue;
            }

            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                warn!("Skipping non UTF-8 file name {}", path.display());
                continue;
            };

            if self.config.in_range(&name) {
                files.push((name, path));
            }
        }

        files.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(files)
    }

    /// Reads one file into batches according to the grouping strategy.
    fn read_file(&self, name: &str, path: &Path, stats: &mut IngestStats) -> Vec<EventBatch> {
        let file_time = match self.config.grouping {
            GroupingStrategy::PerFile => match TimeStamp::parse(name) {
                Ok(ts) => Some(ts),
                Err(e) => {
                    warn!("Skipping {}: file name is not a timestamp ({})", path.display(), e);
                    stats.files_skipped += 1;
                    return Vec::new();
                }
            },
            GroupingStrategy::RunLength => None,
        };

        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) => {
                warn!("Skipping {}: {}", path.display(), e);
                stats.files_skipped += 1;
                return Vec::new();
            }
        };
        stats.files_read += 1;

        let keyed = self.read_records(BufReader::new(file), path, stats);
        debug!("{}: {} records retained", name, keyed.len());

        if keyed.is_empty() {
            return Vec::new();
        }

        match file_time {
            Some(ts) => vec![EventBatch::new(ts, keyed.into_iter().map(|(_, e)| e).collect())],
            None => group_by_raw_timestamp(keyed),
        }
    }

    /// Parses, filters and converts the lines of one reader.
    ///
    /// Returns each retained event paired with its raw timestamp column.
    pub fn read_records<R: BufRead>(
        &self,
        mut reader: R,
        origin: &Path,
        stats: &mut IngestStats,
    ) -> Vec<(String, Event)> {
        let mut keyed = Vec::new();
        let mut buf = Vec::new();
        let mut index = 0;

        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) => {
                    warn!("Stopped reading {} at line {}: {}", origin.display(), index + 1, e);
                    stats.files_skipped += 1;
                    break;
                }
            }
            index += 1;
            stats.lines_read += 1;

            let line = match std::str::from_utf8(trim_line_ending(&buf)) {
                Ok(line) => line,
                Err(e) => {
                    debug!("Dropping {}:{}: not UTF-8 ({})", origin.display(), index, e);
                    stats.lines_malformed += 1;
                    continue;
                }
            };

            if line.trim().is_empty() {
                continue;
            }

            let record = match TraceRecord::parse_line(line) {
                Ok(record) => record,
                Err(e) => {
                    log_malformed(origin, index, &e);
                    stats.lines_malformed += 1;
                    continue;
                }
            };

            if !self.config.protocol.accepts(&record.protocol) {
                stats.records_filtered += 1;
                continue;
            }

            stats.records_retained += 1;
            let event = Event::from_record(&record, self.geo, &self.config.ceilings);
            keyed.push((record.raw_timestamp, event));
        }

        keyed
    }
}

fn trim_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

fn log_malformed(origin: &Path, line: usize, error: &TraceError) {
    debug!("Dropping {}:{}: {}", origin.display(), line, error);
}

/// Convenience wrapper around `Ingestor::run`.
pub fn ingest<G: GeoLocator + ?Sized>(config: &IngestConfig, geo: &G) -> Result<Ingestion> {
    Ingestor::new(config, geo).run()
}

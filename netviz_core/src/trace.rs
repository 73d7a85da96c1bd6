//! Trace line parser.
//!
//! A trace file holds one probe per line, tab separated:
//!
//! ```text
//! network:  ip \t timestamp \t response \t fallback_ip \t protocol
//! web:      ip \t timestamp \t response \t WEB
//! ```
//!
//! Web lines are reshaped into the canonical network shape with both the
//! response and fallback columns zeroed. A line whose field count does not
//! match its protocol tag is malformed.

use crate::error::TraceError;
use crate::timestamp::TimeStamp;

/// Response flag: the probe never answered.
pub const UNREACHED: f64 = -1.0;

/// Response flag: synthetic last-known-location marker.
pub const FALLBACK_MARKER: f64 = -2.0;

/// Protocol tag of web traffic.
pub const WEB_TAG: &str = "WEB";

/// Returns true if `tag` denotes web traffic.
pub fn is_web(tag: &str) -> bool {
    tag.trim().eq_ignore_ascii_case(WEB_TAG)
}

/// One parsed line of a trace file, in canonical 5-field form.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceRecord {
    /// Probed address
    pub source_id: String,

    /// Timestamp column exactly as written (run-length batching keys on it)
    pub raw_timestamp: String,

    /// Parsed timestamp
    pub timestamp: TimeStamp,

    /// Response magnitude, or `UNREACHED` / `FALLBACK_MARKER`
    pub outcome: f64,

    /// Last reachable address; meaningful only when unreached
    pub fallback_id: String,

    /// Protocol tag (`WEB` or a network-layer name)
    pub protocol: String,
}

impl TraceRecord {
    /// Parses one line.
    pub fn parse_line(line: &str) -> Result<Self, TraceError> {
        let line = line.trim_end_matches(|c| c == '\r' || c == '\n');
        let fields: Vec<&str> = line.split('\t').collect();

        let canonical: [&str; 5] = match fields.len() {
            4 if is_web(fields[3]) => [fields[0], fields[1], "0", "0", fields[3]],
            5 if !is_web(fields[4]) => [fields[0], fields[1], fields[2], fields[3], fields[4]],
            n if n >= 4 => {
                let protocol = fields[n - 1].trim().to_string();
                let expected = if is_web(&protocol) { 4 } else { 5 };
                return Err(TraceError::FieldCount {
                    protocol,
                    expected,
                    found: n,
                });
            }
            n => return Err(TraceError::Truncated(n)),
        };

        let raw_timestamp = canonical[1].trim().to_string();
        let timestamp = TimeStamp::parse(&raw_timestamp)?;
        let outcome = parse_outcome(canonical[2])?;

        Ok(Self {
            source_id: canonical[0].trim().to_string(),
            raw_timestamp,
            timestamp,
            outcome,
            fallback_id: canonical[3].trim().to_string(),
            protocol: canonical[4].trim().to_string(),
        })
    }

    /// Returns true for web traffic.
    pub fn is_web(&self) -> bool {
        is_web(&self.protocol)
    }

    /// Returns true if the probe never answered.
    pub fn is_unreached(&self) -> bool {
        self.outcome == UNREACHED
    }

    /// Builds the synthetic record describing this probe's last known
    /// reachable hop: same time and protocol, address taken from the
    /// fallback column, flagged as a fallback marker.
    pub fn fallback_record(&self) -> Self {
        Self {
            source_id: self.fallback_id.clone(),
            raw_timestamp: self.raw_timestamp.clone(),
            timestamp: self.timestamp,
            outcome: FALLBACK_MARKER,
            fallback_id: "-1".to_string(),
            protocol: self.protocol.clone(),
        }
    }
}

impl std::str::FromStr for TraceRecord {
    type Err = TraceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_line(s)
    }
}

fn parse_outcome(field: &str) -> Result<f64, TraceError> {
    let value: f64 = field
        .trim()
        .parse()
        .map_err(|_| TraceError::InvalidOutcome(field.to_string()))?;

    if !value.is_finite() {
        return Err(TraceError::InvalidOutcome(field.to_string()));
    }
    if value < 0.0 && value != UNREACHED && value != FALLBACK_MARKER {
        return Err(TraceError::UnknownFlag(value));
    }

    Ok(value)
}

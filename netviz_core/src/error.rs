//! Error types for the NetViz engine.

use thiserror::Error;

/// Failure to parse a `YY_MM_DD-HH:MM[:SS]` timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimeStampError {
    /// Wrong number of separator-delimited fields
    #[error("Timestamp '{input}' has {found} fields, expected 4 to 6")]
    FieldCount { input: String, found: usize },
    
    /// A field was not an unsigned integer
    #[error("Timestamp '{input}' has a non-numeric field '{field}'")]
    InvalidField { input: String, field: String },
}

/// Failure to parse one line of a trace file.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TraceError {
    /// Field count does not match the shape implied by the protocol tag
    #[error("Expected {expected} fields for protocol '{protocol}', found {found}")]
    FieldCount {
        protocol: String,
        expected: usize,
        found: usize,
    },
    
    /// Line had too few fields to carry a protocol tag at all
    #[error("Line has only {0} fields")]
    Truncated(usize),
    
    /// Timestamp column did not parse
    #[error("Bad timestamp: {0}")]
    TimeStamp(#[from] TimeStampError),
    
    /// Response column did not parse as a number
    #[error("Bad response value '{0}'")]
    InvalidOutcome(String),
    
    /// Negative response other than the unreached/fallback flags
    #[error("Unknown response flag {0}")]
    UnknownFlag(f64),
}

/// Top-level engine errors. Only setup failures surface here; bad data
/// inside trace files is counted and skipped instead.
#[derive(Debug, Error)]
pub enum NetvizError {
    /// The trace directory could not be listed
    #[error("Cannot read trace directory {path}: {source}")]
    Directory {
        path: String,
        #[source]
        source: std::io::Error,
    },
    
    /// A configured bound or clock start did not parse
    #[error("Invalid bound: {0}")]
    Bound(#[from] TimeStampError),
}

/// Convenience alias for engine results.
pub type Result<T> = std::result::Result<T, NetvizError>;

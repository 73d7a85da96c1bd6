//! Error types for the NetViz environment abstraction.

use thiserror::Error;

/// Errors that can occur while setting up a collaborator.
#[derive(Debug, Error)]
pub enum EnvError {
    /// The geolocation table could not be read
    #[error("Geolocation database error: {0}")]
    GeoDatabase(String),
    
    /// A geolocation table line did not have the `ip \t lat \t lon` shape
    #[error("Malformed geolocation entry at line {line}: {reason}")]
    MalformedEntry { line: usize, reason: String },
}

impl EnvError {
    /// Creates a database error.
    pub fn database(msg: impl Into<String>) -> Self {
        Self::GeoDatabase(msg.into())
    }
    
    /// Creates a malformed-entry error.
    pub fn malformed(line: usize, reason: impl std::fmt::Display) -> Self {
        Self::MalformedEntry {
            line,
            reason: reason.to_string(),
        }
    }
}

//! Table-backed implementations of `GeoLocator`.

use crate::error::EnvError;
use crate::geo::GeoLocator;
use crate::types::LatLon;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, warn};

/// Geolocator backed by an in-memory address table.
///
/// The table file has one entry per line, `ip \t lat \t lon`. Blank lines
/// and lines starting with `#` are ignored.
#[derive(Debug, Default, Clone)]
pub struct TableGeoLocator {
    entries: HashMap<String, LatLon>,
}

impl TableGeoLocator {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }
    
    /// Adds or replaces one entry.
    pub fn insert(&mut self, ip: impl Into<String>, location: LatLon) {
        self.entries.insert(ip.into(), location);
    }
    
    /// Parses a table from text.
    pub fn parse(text: &str) -> Result<Self, EnvError> {
        let mut table = Self::new();
        
        for (index, line) in text.lines().enumerate() {
            let line = line.trim_end_matches('\r');
            if line.trim().is_empty() || line.starts_with('#') {
                continue;
            }
            
            let fields: Vec<&str> = line.split('\t').collect();
            if fields.len() != 3 {
                return Err(EnvError::malformed(
                    index + 1,
                    format!("expected 3 fields, found {}", fields.len()),
                ));
            }
            
            let lat: f64 = fields[1]
                .trim()
                .parse()
                .map_err(|e| EnvError::malformed(index + 1, e))?;
            let lon: f64 = fields[2]
                .trim()
                .parse()
                .map_err(|e| EnvError::malformed(index + 1, e))?;
            
            table.insert(fields[0].trim(), LatLon::new(lat, lon));
        }
        
        Ok(table)
    }
    
    /// Loads a table from a file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, EnvError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| EnvError::database(format!("{}: {}", path.display(), e)))?;
        let table = Self::parse(&text)?;
        debug!("Loaded {} geolocation entries from {}", table.len(), path.display());
        Ok(table)
    }
    
    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }
    
    /// Returns true if the table has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl GeoLocator for TableGeoLocator {
    fn lookup(&self, ip: &str) -> Option<LatLon> {
        self.entries.get(ip).copied()
    }
}

/// Stand-in used when no database could be opened.
///
/// Every lookup misses, so every event lands on the sentinel coordinate.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableGeoLocator;

impl UnavailableGeoLocator {
    /// Creates the stand-in and logs that lookups are disabled.
    pub fn new() -> Self {
        warn!("Geolocation database unavailable - all events will be placed off-map");
        Self
    }
}

impl GeoLocator for UnavailableGeoLocator {
    fn lookup(&self, _ip: &str) -> Option<LatLon> {
        None
    }
    
    fn is_available(&self) -> bool {
        false
    }
}

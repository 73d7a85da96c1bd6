//! Common types shared by the engine and its collaborators.

use serde::{Deserialize, Serialize};

/// A geographic coordinate in degrees.
///
/// The engine stores raw latitude/longitude and leaves projection to the
/// renderer, which knows its own map geometry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

impl LatLon {
    /// Off-map placeholder used when an address cannot be located.
    ///
    /// Both components lie far outside the valid degree range, so any
    /// equirectangular projection places the point outside the map.
    pub const SENTINEL: LatLon = LatLon { lat: 1000.0, lon: 1000.0 };
    
    /// Creates a coordinate.
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
    
    /// Returns true if this is the off-map sentinel.
    pub fn is_sentinel(&self) -> bool {
        *self == Self::SENTINEL
    }
    
    /// Returns true if both components are within the valid degree range.
    pub fn is_on_map(&self) -> bool {
        (-90.0..=90.0).contains(&self.lat) && (-180.0..=180.0).contains(&self.lon)
    }
}

impl std::fmt::Display for LatLon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.4}, {:.4})", self.lat, self.lon)
    }
}

/// How a released event should be presented.
///
/// This is the "color or ratio" half of the render contract: renderers pick
/// their own palette from it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Outcome {
    /// Probe answered; `intensity` is the response normalized to [0, 1]
    Measured { intensity: f64 },
    
    /// Probe did not answer (or answered slower than the ceiling)
    Unreached,
    
    /// Last known reachable location of an unreached probe
    FallbackMarker,
    
    /// Aggregate of co-located events
    Consolidated { success_ratio: f64 },
}

impl Outcome {
    /// Returns true for the `Measured` classification.
    pub fn is_measured(&self) -> bool {
        matches!(self, Outcome::Measured { .. })
    }
    
    /// Returns true if this outcome came out of consolidation.
    pub fn is_consolidated(&self) -> bool {
        matches!(self, Outcome::Consolidated { .. })
    }
    
    /// Short lowercase label, used in logs and exports.
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Measured { .. } => "measured",
            Outcome::Unreached => "unreached",
            Outcome::FallbackMarker => "fallback",
            Outcome::Consolidated { .. } => "consolidated",
        }
    }
}

//! Map projection and colour classification used by the renderers.
//!
//! The engine hands renderers raw coordinates. Renderers in this crate
//! share one equirectangular map:
//!
//! ```text
//! (0, 0) ------------------- (width, 0)      lat  90
//!   |                            |
//!   |      x = (lon + 180) / 360 * width
//!   |      y = (90 - lat)  / 180 * height
//!   |                            |
//! (0, height) ------------ (width, height)   lat -90
//! ```

use netviz_env::{LatLon, Outcome};
use serde::{Deserialize, Serialize};

/// Default map width in pixels.
pub const MAP_WIDTH: f64 = 1024.0;

/// Default map height in pixels.
pub const MAP_HEIGHT: f64 = 600.0;

/// A projected point in map pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MapPoint {
    pub x: f64,
    pub y: f64,
}

/// Equirectangular projection onto a fixed-size map.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MapProjection {
    pub width: f64,
    pub height: f64,
}

impl Default for MapProjection {
    fn default() -> Self {
        Self {
            width: MAP_WIDTH,
            height: MAP_HEIGHT,
        }
    }
}

impl MapProjection {
    /// Creates a projection for a map of the given size.
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Projects a coordinate. The sentinel lands off-map.
    pub fn project(&self, location: LatLon) -> MapPoint {
        MapPoint {
            x: (location.lon + 180.0) / 360.0 * self.width,
            y: (90.0 - location.lat) / 180.0 * self.height,
        }
    }

    /// Returns true if the point falls inside the map.
    pub fn contains(&self, point: MapPoint) -> bool {
        (0.0..=self.width).contains(&point.x) && (0.0..=self.height).contains(&point.y)
    }
}

/// RGB colour for an outcome.
///
/// Faster responses are brighter green; consolidated events blend from red
/// (nothing reached) to green (everything reached).
pub fn outcome_color(outcome: Outcome) -> [u8; 3] {
    match outcome {
        Outcome::Measured { intensity } => {
            let green = 255.0 - intensity.clamp(0.0, 1.0) * 155.0;
            [0, green.round() as u8, 0]
        }
        Outcome::Unreached => [255, 0, 0],
        Outcome::FallbackMarker => [255, 255, 0],
        Outcome::Consolidated { success_ratio } => {
            let ratio = success_ratio.clamp(0.0, 1.0);
            [
                (255.0 * (1.0 - ratio)).round() as u8,
                (255.0 * ratio).round() as u8,
                0,
            ]
        }
    }
}

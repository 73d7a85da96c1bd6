//! NetViz Environment Abstraction Layer
//!
//! This crate provides the seams between the NetViz playback engine and
//! the outside world. The engine never talks to a GeoIP database or a
//! drawing surface directly; it goes through two traits:
//!
//! - **Geolocation**: `GeoLocator::lookup(ip)` resolves a probe address
//! - **Rendering**: `Renderer::render(...)` receives every released event
//!
//! Missing collaborators degrade gracefully. An unavailable database maps
//! every address to the off-map sentinel, and a renderer can simply count.
//!
//! # Example
//!
//! ```ignore
//! use netviz_env::{GeoLocator, LatLon, TableGeoLocator};
//!
//! let geo = TableGeoLocator::from_file("geo.tsv")?;
//! let here = geo.lookup("1.2.3.4").unwrap_or(LatLon::SENTINEL);
//! ```

mod error;
mod geo;
mod render;
mod types;
mod table_impl;

pub use error::EnvError;
pub use geo::GeoLocator;
pub use render::{Renderer, NullRenderer};
pub use types::{LatLon, Outcome};
pub use table_impl::{TableGeoLocator, UnavailableGeoLocator};

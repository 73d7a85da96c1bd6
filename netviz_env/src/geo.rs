//! Geolocation collaborator trait.

use crate::types::LatLon;

/// Resolves a probe address to a coordinate.
///
/// # Implementations
///
/// - **Table**: `TableGeoLocator` - in-memory `ip -> (lat, lon)` map
/// - **Unavailable**: `UnavailableGeoLocator` - database missing, always `None`
///
/// The engine never validates address syntax; whatever string the trace
/// carried is handed over as-is. A `None` result is not an error: the
/// caller substitutes `LatLon::SENTINEL` and carries on.
pub trait GeoLocator {
    /// Looks up an address. Returns `None` if it is unknown.
    fn lookup(&self, ip: &str) -> Option<LatLon>;
    
    /// Returns false when the backing database could not be opened.
    ///
    /// Purely informational; lookups against an unavailable locator
    /// still return `None` rather than failing.
    fn is_available(&self) -> bool {
        true
    }
    
    /// Looks up an address, falling back to the off-map sentinel.
    fn locate(&self, ip: &str) -> LatLon {
        self.lookup(ip).unwrap_or(LatLon::SENTINEL)
    }
}

impl<G: GeoLocator + ?Sized> GeoLocator for &G {
    fn lookup(&self, ip: &str) -> Option<LatLon> {
        (**self).lookup(ip)
    }
    
    fn is_available(&self) -> bool {
        (**self).is_available()
    }
}

impl<G: GeoLocator + ?Sized> GeoLocator for Box<G> {
    fn lookup(&self, ip: &str) -> Option<LatLon> {
        (**self).lookup(ip)
    }
    
    fn is_available(&self) -> bool {
        (**self).is_available()
    }
}

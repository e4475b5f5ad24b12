//! Great-circle distance and point-in-zone matching.

use tracing::debug;

use crate::zone::{Coordinate, Zone};

/// Mean Earth radius in meters (spherical model).
const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Haversine distance in meters between two coordinates.
///
/// Spherical Earth approximation; adequate for geofences in the tens to
/// hundreds of meters. Not corrected for the ellipsoid.
pub fn distance_meters(a: Coordinate, b: Coordinate) -> f64 {
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();
    let h = (d_lat / 2.0).sin().powi(2)
        + a.lat.to_radians().cos() * b.lat.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_METERS * c
}

/// Whether `point` falls inside `zone`, boundary inclusive.
pub fn is_inside(point: Coordinate, zone: &Zone) -> bool {
    distance_meters(point, zone.coordinates) <= zone.radius
}

/// First zone in catalog order whose circle contains `point`.
///
/// Returns `None` for an empty catalog or when no zone matches. When zones
/// overlap, the first listed zone wins.
pub fn find_match(point: Coordinate, zones: &[Zone]) -> Option<&Zone> {
    let matched = zones.iter().find(|zone| is_inside(point, zone));
    if let Some(zone) = matched {
        debug!(zone = %zone.id, "coordinate matched zone");
    }
    matched
}

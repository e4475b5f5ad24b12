//! Shared types for the zone catalog wire format.

use serde::{Deserialize, Serialize};

/// A WGS84 coordinate in decimal degrees.
///
/// Values outside the valid range are accepted as-is; they produce
/// implausible distances rather than errors.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

/// A circular geofenced zone from the catalog service.
///
/// Zones are immutable for the lifetime of a session; the catalog order is
/// whatever order the service returns and is significant for overlap
/// tie-breaking.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Zone {
    pub id: String,
    pub name: String,
    pub coordinates: Coordinate,
    /// Geofence radius in meters.
    pub radius: f64,
    /// Opaque overlay style key, resolved by the image pipeline.
    pub filter_image: String,
    pub description: String,
}

//! Core types, geofence matching, and the visit state machine for CityStamp.

pub mod geo;
pub mod state;
pub mod zone;

pub use geo::{distance_meters, find_match, is_inside};
pub use state::{CaptureSignals, SubmissionStatus, VisitState, visit_state};
pub use zone::{Coordinate, Zone};

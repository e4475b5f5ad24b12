//! Capture session flow: reconciles geolocation, the zone catalog, visit
//! history, and submission outcomes into the visit state machine.

mod api;
mod cache;
mod location;
mod session;

pub use api::VisitApi;
pub use cache::{VisitHistory, ZoneCatalog};
pub use location::{FIX_TIMEOUT, LocationError, LocationProvider, LocationTracker, MAX_FIX_AGE};
pub use session::{CaptureSession, CaptureStart, SessionError, SubmitOutcome};

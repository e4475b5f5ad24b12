//! Device location acquisition: single-shot fixes with a timeout and a
//! bounded cached-fix age. Failures degrade to "no coordinate"; they are
//! never fatal to the capture flow.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use citystamp_core::Coordinate;
use thiserror::Error;
use tracing::warn;

/// How long to wait for a fresh fix.
pub const FIX_TIMEOUT: Duration = Duration::from_secs(10);

/// Maximum age of a cached fix before a fresh one is required.
pub const MAX_FIX_AGE: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum LocationError {
    #[error("location permission denied")]
    PermissionDenied,
    #[error("location acquisition timed out")]
    Timeout,
    #[error("no location provider on this device")]
    Unsupported,
}

/// Single-shot location source (device GPS or equivalent).
#[async_trait]
pub trait LocationProvider {
    async fn current_location(&self) -> Result<Coordinate, LocationError>;
}

/// Applies the acquisition policy on top of a provider: recent fixes are
/// reused, fresh acquisitions are bounded by [`FIX_TIMEOUT`].
pub struct LocationTracker<P> {
    provider: P,
    last_fix: Option<(Coordinate, Instant)>,
}

impl<P: LocationProvider> LocationTracker<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            last_fix: None,
        }
    }

    /// Best-effort coordinate for a capture.
    ///
    /// Returns the cached fix when it is younger than [`MAX_FIX_AGE`],
    /// otherwise asks the provider with a [`FIX_TIMEOUT`] bound. `None`
    /// means the device could not supply a location.
    pub async fn acquire(&mut self) -> Option<Coordinate> {
        if let Some((fix, at)) = self.last_fix
            && at.elapsed() <= MAX_FIX_AGE
        {
            return Some(fix);
        }
        match tokio::time::timeout(FIX_TIMEOUT, self.provider.current_location()).await {
            Ok(Ok(fix)) => {
                self.last_fix = Some((fix, Instant::now()));
                Some(fix)
            }
            Ok(Err(err)) => {
                warn!(error = %err, "location unavailable");
                None
            }
            Err(_) => {
                warn!("location acquisition timed out");
                None
            }
        }
    }
}

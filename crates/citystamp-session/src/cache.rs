//! Session-lifetime caches: the zone catalog snapshot and the visit history.

use std::collections::HashSet;

use citystamp_core::{Coordinate, Zone, find_match};

/// Read-only snapshot of the zone catalog, fetched once per session.
///
/// Catalog order is preserved; it is the overlap tie-break.
pub struct ZoneCatalog {
    zones: Vec<Zone>,
}

impl ZoneCatalog {
    pub fn new(zones: Vec<Zone>) -> Self {
        Self { zones }
    }

    pub fn zones(&self) -> &[Zone] {
        &self.zones
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    /// First zone containing `point`, in catalog order.
    pub fn match_point(&self, point: Coordinate) -> Option<&Zone> {
        find_match(point, &self.zones)
    }
}

/// Cached set of zone ids the current user has already collected.
///
/// The cache keeps serving its last snapshot after [`invalidate`] until the
/// next [`replace`]; only before the first successful fetch does it count as
/// not loaded. It is invalidated exactly once per successful submission.
///
/// [`invalidate`]: VisitHistory::invalidate
/// [`replace`]: VisitHistory::replace
#[derive(Debug, Default)]
pub struct VisitHistory {
    visits: Option<HashSet<String>>,
    stale: bool,
}

impl VisitHistory {
    /// False only before the first successful fetch.
    pub fn is_loaded(&self) -> bool {
        self.visits.is_some()
    }

    /// Whether the next read should trigger a refetch.
    pub fn is_stale(&self) -> bool {
        self.stale || self.visits.is_none()
    }

    /// Whether the zone id is in the last known snapshot.
    pub fn contains(&self, zone_id: &str) -> bool {
        self.visits.as_ref().is_some_and(|v| v.contains(zone_id))
    }

    /// Mark the snapshot stale; it keeps serving reads until replaced.
    pub fn invalidate(&mut self) {
        self.stale = true;
    }

    /// Install a fresh snapshot.
    pub fn replace(&mut self, visits: HashSet<String>) {
        self.visits = Some(visits);
        self.stale = false;
    }
}

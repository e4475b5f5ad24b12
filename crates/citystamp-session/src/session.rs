//! The capture session: one capture at a time, reconciled into a visit state.
//!
//! The host drives the session step by step: `begin_capture` stakes out a new
//! capture sequence number, the host runs the image pipeline, and
//! `finish_pipeline` installs the result only if that capture is still
//! current. A slow pipeline run for a superseded capture can therefore never
//! overwrite a newer capture's output.

use citystamp_client::ApiError;
use citystamp_core::{
    CaptureSignals, Coordinate, SubmissionStatus, VisitState, Zone, visit_state,
};
use citystamp_image::PipelineOutput;
use futures::future;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::api::VisitApi;
use crate::cache::{VisitHistory, ZoneCatalog};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("zone catalog unavailable: {0}")]
    Catalog(#[source] ApiError),
    #[error("visit history unavailable: {0}")]
    History(#[source] ApiError),
}

/// Handle returned by [`CaptureSession::begin_capture`]: the staleness token
/// for this capture plus the matched zone the pipeline should stamp with.
#[derive(Debug, Clone)]
pub struct CaptureStart {
    pub seq: u64,
    pub zone: Option<Zone>,
}

/// Result of a submission attempt. Failures are states, not errors: the
/// capture and its stamped image are preserved so the user can retry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Visit recorded; the server's message is shown to the user.
    Accepted(String),
    /// The backend rejected or never received the attempt; message shown,
    /// retry allowed.
    Rejected(String),
    /// A submission is already in flight for this capture.
    AlreadyPending,
    /// The current state does not allow submission.
    NotReady,
}

struct ActiveCapture {
    seq: u64,
    coordinate: Option<Coordinate>,
    zone: Option<Zone>,
    output: Option<PipelineOutput>,
    submission: SubmissionStatus,
}

/// Session state for the capture-and-collect flow.
pub struct CaptureSession<A> {
    api: A,
    catalog: ZoneCatalog,
    history: VisitHistory,
    next_seq: u64,
    current: Option<ActiveCapture>,
}

impl<A: VisitApi> CaptureSession<A> {
    /// Fetch the zone catalog and visit history concurrently and build the
    /// session. The catalog is required; a failed history fetch degrades to
    /// the not-loaded state and is retried by [`refresh_history`].
    ///
    /// [`refresh_history`]: CaptureSession::refresh_history
    pub async fn start(api: A) -> Result<Self, SessionError> {
        let (zones, visits) = future::join(api.fetch_zones(), api.fetch_my_visits()).await;
        let catalog = ZoneCatalog::new(zones.map_err(SessionError::Catalog)?);
        let mut history = VisitHistory::default();
        match visits {
            Ok(v) => history.replace(v),
            Err(err) => warn!(error = %err, "visit history unavailable at startup"),
        }
        info!(zones = catalog.len(), "capture session ready");
        Ok(Self {
            api,
            catalog,
            history,
            next_seq: 0,
            current: None,
        })
    }

    pub fn catalog(&self) -> &ZoneCatalog {
        &self.catalog
    }

    /// Start a new capture, superseding any previous one.
    ///
    /// Matches the coordinate against the catalog and resets the submission
    /// state. The returned sequence number is the staleness token the host
    /// must hand back to [`finish_pipeline`].
    ///
    /// [`finish_pipeline`]: CaptureSession::finish_pipeline
    pub fn begin_capture(&mut self, coordinate: Option<Coordinate>) -> CaptureStart {
        self.next_seq += 1;
        let seq = self.next_seq;
        let zone = coordinate
            .and_then(|point| self.catalog.match_point(point))
            .cloned();
        info!(
            seq,
            matched = zone.as_ref().map(|z| z.id.as_str()),
            "capture started"
        );
        self.current = Some(ActiveCapture {
            seq,
            coordinate,
            zone: zone.clone(),
            output: None,
            submission: SubmissionStatus::Idle,
        });
        CaptureStart { seq, zone }
    }

    /// Install a pipeline result for the capture identified by `seq`.
    ///
    /// Returns false (and discards the output) when that capture has been
    /// superseded.
    pub fn finish_pipeline(&mut self, seq: u64, output: PipelineOutput) -> bool {
        match self.current.as_mut() {
            Some(cap) if cap.seq == seq => {
                cap.output = Some(output);
                true
            }
            _ => {
                debug!(seq, "discarding stale pipeline output");
                false
            }
        }
    }

    /// Stamped output for the current capture, once the pipeline finished.
    pub fn output(&self) -> Option<&PipelineOutput> {
        self.current.as_ref()?.output.as_ref()
    }

    /// Zone matched by the current capture.
    pub fn matched_zone(&self) -> Option<&Zone> {
        self.current.as_ref()?.zone.as_ref()
    }

    /// Refetch the visit history when it was never loaded or has been
    /// invalidated by a successful submission. No-op otherwise.
    pub async fn refresh_history(&mut self) -> Result<(), SessionError> {
        if !self.history.is_stale() {
            return Ok(());
        }
        let visits = self
            .api
            .fetch_my_visits()
            .await
            .map_err(SessionError::History)?;
        self.history.replace(visits);
        Ok(())
    }

    /// Current visit state, or `None` before the first capture.
    pub fn state(&self) -> Option<VisitState> {
        let cap = self.current.as_ref()?;
        let signals = CaptureSignals {
            has_coordinate: cap.coordinate.is_some(),
            zone_matched: cap.zone.is_some(),
            history_loading: !self.history.is_loaded(),
            already_visited: cap
                .zone
                .as_ref()
                .is_some_and(|z| self.history.contains(&z.id)),
            submission: cap.submission.clone(),
        };
        Some(visit_state(&signals))
    }

    /// Submit the current capture's stamped image as a visit.
    ///
    /// At most one submission is in flight per capture; a second invocation
    /// while one is pending is a no-op. Success invalidates the visit
    /// history cache exactly once; failure leaves the capture intact for
    /// retry.
    pub async fn submit(&mut self) -> SubmitOutcome {
        match self.state() {
            Some(VisitState::Submitting) => return SubmitOutcome::AlreadyPending,
            Some(VisitState::ReadyToCollect) => {}
            _ => return SubmitOutcome::NotReady,
        }
        let (seq, zone_id, image) = {
            let Some(cap) = self.current.as_mut() else {
                return SubmitOutcome::NotReady;
            };
            let (Some(zone), Some(output)) = (cap.zone.as_ref(), cap.output.as_ref()) else {
                return SubmitOutcome::NotReady;
            };
            let zone_id = zone.id.clone();
            let image = output.encoded_image.clone();
            cap.submission = SubmissionStatus::Pending;
            (cap.seq, zone_id, image)
        };

        let result = self.api.create_visit(&zone_id, &image).await;

        let Some(cap) = self.current.as_mut() else {
            return SubmitOutcome::NotReady;
        };
        if cap.seq != seq {
            debug!(seq, "submission result for a superseded capture, discarding");
            return SubmitOutcome::NotReady;
        }
        match result {
            Ok(message) => {
                cap.submission = SubmissionStatus::Succeeded;
                self.history.invalidate();
                info!(zone = %zone_id, "visit collected");
                SubmitOutcome::Accepted(message)
            }
            Err(err) => {
                let message = match err {
                    ApiError::Server { message, .. } if !message.is_empty() => message,
                    other => other.to_string(),
                };
                warn!(zone = %zone_id, message = %message, "submission failed");
                cap.submission = SubmissionStatus::Failed(message.clone());
                SubmitOutcome::Rejected(message)
            }
        }
    }

    /// Discard the current capture. Any in-flight pipeline result for it is
    /// rejected by the staleness token.
    pub fn retake(&mut self) {
        self.current = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

    const CENTRAL_PARK: Coordinate = Coordinate {
        lat: 40.785091,
        lng: -73.968285,
    };

    fn zone(id: &str, lat: f64, lng: f64, radius: f64) -> Zone {
        Zone {
            id: id.into(),
            name: id.into(),
            coordinates: Coordinate { lat, lng },
            radius,
            filter_image: id.into(),
            description: String::new(),
        }
    }

    fn fake_output(zone: Option<Zone>) -> PipelineOutput {
        PipelineOutput {
            encoded_image: "data:image/jpeg;base64,ZmFrZQ==".into(),
            source_zone: zone,
        }
    }

    struct MockApi {
        zones: Vec<Zone>,
        visits: Mutex<HashSet<String>>,
        history_fetches: AtomicU32,
        fail_zones: bool,
        fail_history: AtomicBool,
        reject_create: bool,
    }

    impl MockApi {
        fn with_zones(zones: Vec<Zone>) -> Self {
            Self {
                zones,
                visits: Mutex::new(HashSet::new()),
                history_fetches: AtomicU32::new(0),
                fail_zones: false,
                fail_history: AtomicBool::new(false),
                reject_create: false,
            }
        }

        fn server_error(message: &str) -> ApiError {
            ApiError::Server {
                status: 500,
                message: message.into(),
            }
        }
    }

    #[async_trait]
    impl VisitApi for MockApi {
        async fn fetch_zones(&self) -> Result<Vec<Zone>, ApiError> {
            if self.fail_zones {
                return Err(Self::server_error("catalog down"));
            }
            Ok(self.zones.clone())
        }

        async fn fetch_my_visits(&self) -> Result<HashSet<String>, ApiError> {
            if self.fail_history.load(Ordering::SeqCst) {
                return Err(Self::server_error("history down"));
            }
            self.history_fetches.fetch_add(1, Ordering::SeqCst);
            Ok(self.visits.lock().unwrap().clone())
        }

        async fn create_visit(
            &self,
            poi_id: &str,
            _image_data_url: &str,
        ) -> Result<String, ApiError> {
            if self.reject_create {
                return Err(ApiError::Server {
                    status: 400,
                    message: "Zone already collected".into(),
                });
            }
            self.visits.lock().unwrap().insert(poi_id.to_string());
            Ok("Visit recorded!".into())
        }
    }

    fn park_api() -> MockApi {
        MockApi::with_zones(vec![zone("central-park", 40.785091, -73.968285, 200.0)])
    }

    #[tokio::test]
    async fn no_state_before_first_capture() {
        let session = CaptureSession::start(park_api()).await.unwrap();
        assert!(session.state().is_none());
        assert_eq!(session.catalog().len(), 1);
    }

    #[tokio::test]
    async fn catalog_failure_is_fatal_for_the_session() {
        let mut api = park_api();
        api.fail_zones = true;
        let result = CaptureSession::start(api).await;
        assert!(matches!(result, Err(SessionError::Catalog(_))));
    }

    #[tokio::test]
    async fn missing_coordinate_yields_location_unavailable() {
        let mut session = CaptureSession::start(park_api()).await.unwrap();
        let start = session.begin_capture(None);
        assert!(start.zone.is_none());
        assert_eq!(session.state(), Some(VisitState::LocationUnavailable));
    }

    #[tokio::test]
    async fn far_coordinate_yields_out_of_zone() {
        let mut session = CaptureSession::start(park_api()).await.unwrap();
        session.begin_capture(Some(Coordinate { lat: 10.0, lng: 10.0 }));
        assert_eq!(session.state(), Some(VisitState::OutOfZone));
    }

    #[tokio::test]
    async fn matched_capture_is_ready_to_collect() {
        let mut session = CaptureSession::start(park_api()).await.unwrap();
        let start = session.begin_capture(Some(CENTRAL_PARK));
        assert_eq!(start.zone.as_ref().map(|z| z.id.as_str()), Some("central-park"));
        assert!(session.finish_pipeline(start.seq, fake_output(start.zone.clone())));
        assert_eq!(session.state(), Some(VisitState::ReadyToCollect));
    }

    #[tokio::test]
    async fn unloaded_history_reports_checking() {
        let api = park_api();
        api.fail_history.store(true, Ordering::SeqCst);
        let mut session = CaptureSession::start(api).await.unwrap();

        session.begin_capture(Some(CENTRAL_PARK));
        assert_eq!(session.state(), Some(VisitState::CheckingHistory));

        // The backend recovers; the next refresh unblocks the capture.
        session.api.fail_history.store(false, Ordering::SeqCst);
        session.refresh_history().await.unwrap();
        assert_eq!(session.state(), Some(VisitState::ReadyToCollect));
    }

    #[tokio::test]
    async fn previously_collected_zone_reports_already_collected() {
        let api = park_api();
        api.visits.lock().unwrap().insert("central-park".into());
        let mut session = CaptureSession::start(api).await.unwrap();

        let start = session.begin_capture(Some(CENTRAL_PARK));
        session.finish_pipeline(start.seq, fake_output(start.zone.clone()));
        assert_eq!(session.state(), Some(VisitState::AlreadyCollected));
        assert_eq!(session.submit().await, SubmitOutcome::NotReady);
    }

    #[tokio::test]
    async fn submit_success_collects_and_invalidates_history() {
        let mut session = CaptureSession::start(park_api()).await.unwrap();
        let fetches_at_start = session.api.history_fetches.load(Ordering::SeqCst);

        let start = session.begin_capture(Some(CENTRAL_PARK));
        session.finish_pipeline(start.seq, fake_output(start.zone.clone()));
        assert_eq!(session.state(), Some(VisitState::ReadyToCollect));

        let outcome = session.submit().await;
        assert_eq!(outcome, SubmitOutcome::Accepted("Visit recorded!".into()));
        assert_eq!(session.state(), Some(VisitState::JustCollected));

        // Invalidation triggers exactly one refetch, which now lists the zone.
        session.refresh_history().await.unwrap();
        assert_eq!(
            session.api.history_fetches.load(Ordering::SeqCst),
            fetches_at_start + 1
        );
        assert_eq!(session.state(), Some(VisitState::JustCollected));
        session.refresh_history().await.unwrap();
        assert_eq!(
            session.api.history_fetches.load(Ordering::SeqCst),
            fetches_at_start + 1,
            "fresh history must not refetch"
        );

        // A new capture of the same spot is now a repeat visit.
        let start = session.begin_capture(Some(CENTRAL_PARK));
        session.finish_pipeline(start.seq, fake_output(start.zone.clone()));
        assert_eq!(session.state(), Some(VisitState::AlreadyCollected));
    }

    #[tokio::test]
    async fn submit_failure_preserves_capture_for_retry() {
        let mut api = park_api();
        api.reject_create = true;
        let mut session = CaptureSession::start(api).await.unwrap();

        let start = session.begin_capture(Some(CENTRAL_PARK));
        session.finish_pipeline(start.seq, fake_output(start.zone.clone()));

        let outcome = session.submit().await;
        assert_eq!(
            outcome,
            SubmitOutcome::Rejected("Zone already collected".into())
        );
        // Failure returns to the submit-capable state with the stamp intact.
        assert_eq!(session.state(), Some(VisitState::ReadyToCollect));
        assert!(session.output().is_some());

        // The retry goes through once the backend accepts.
        session.api.reject_create = false;
        assert_eq!(
            session.submit().await,
            SubmitOutcome::Accepted("Visit recorded!".into())
        );
    }

    #[tokio::test]
    async fn stale_pipeline_output_is_discarded() {
        let mut session = CaptureSession::start(park_api()).await.unwrap();

        let first = session.begin_capture(Some(CENTRAL_PARK));
        let second = session.begin_capture(Some(CENTRAL_PARK));
        assert!(second.seq > first.seq);

        assert!(!session.finish_pipeline(first.seq, fake_output(first.zone.clone())));
        assert!(session.output().is_none());

        assert!(session.finish_pipeline(second.seq, fake_output(second.zone.clone())));
        assert!(session.output().is_some());
    }

    #[tokio::test]
    async fn submit_requires_a_pipeline_output() {
        let mut session = CaptureSession::start(park_api()).await.unwrap();
        session.begin_capture(Some(CENTRAL_PARK));
        // Pipeline still running (or failed): state is ready but there is
        // nothing to post yet.
        assert_eq!(session.state(), Some(VisitState::ReadyToCollect));
        assert_eq!(session.submit().await, SubmitOutcome::NotReady);
    }

    #[tokio::test]
    async fn retake_discards_the_capture() {
        let mut session = CaptureSession::start(park_api()).await.unwrap();
        let start = session.begin_capture(Some(CENTRAL_PARK));
        session.finish_pipeline(start.seq, fake_output(start.zone.clone()));

        session.retake();
        assert!(session.state().is_none());
        assert!(session.output().is_none());
        // The old capture's token no longer installs anything.
        assert!(!session.finish_pipeline(start.seq, fake_output(None)));
    }
}

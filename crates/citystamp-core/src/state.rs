//! Visit state derivation for a capture.
//!
//! A capture reconciles three asynchronous signals — geolocation, the zone
//! match, and the visit history — plus the submission outcome into exactly
//! one display/action state. The derivation is a single decision function
//! with strict precedence, so every input combination maps to exactly one
//! state.

/// Outcome of the submission attempt for the current capture.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SubmissionStatus {
    /// No submission started for this capture.
    #[default]
    Idle,
    /// A create-visit request is in flight.
    Pending,
    /// The backend recorded the visit.
    Succeeded,
    /// The attempt failed; the message is shown to the user and the capture
    /// is preserved for retry.
    Failed(String),
}

/// The signals a capture's state is derived from.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureSignals {
    /// The device supplied a coordinate for this capture.
    pub has_coordinate: bool,
    /// The coordinate fell inside a catalog zone.
    pub zone_matched: bool,
    /// The visit history has never loaded.
    pub history_loading: bool,
    /// The matched zone's id is already in the visit history.
    pub already_visited: bool,
    /// Submission outcome for this capture.
    pub submission: SubmissionStatus,
}

/// Display/action state for one capture. Exactly one is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitState {
    /// The device could not supply a location; the visit cannot be confirmed.
    LocationUnavailable,
    /// Located, but outside every catalog zone.
    OutOfZone,
    /// Waiting for the visit history to load.
    CheckingHistory,
    /// This zone was collected on an earlier visit.
    AlreadyCollected,
    /// The submission for this capture succeeded.
    JustCollected,
    /// A submission is in flight.
    Submitting,
    /// Matched, uncollected, and ready to submit.
    ReadyToCollect,
}

impl VisitState {
    /// Whether the user may start a submission in this state.
    pub fn can_submit(self) -> bool {
        matches!(self, VisitState::ReadyToCollect)
    }

    /// Whether taking another photo is offered in this state.
    pub fn can_retake(self) -> bool {
        matches!(
            self,
            VisitState::LocationUnavailable
                | VisitState::OutOfZone
                | VisitState::JustCollected
                | VisitState::ReadyToCollect
        )
    }
}

/// Derive the single active state for a capture.
///
/// Rules are evaluated top to bottom; the first match wins:
/// 1. no coordinate → [`VisitState::LocationUnavailable`]
/// 2. no zone match → [`VisitState::OutOfZone`]
/// 3. history still loading → [`VisitState::CheckingHistory`]
/// 4. already visited (and this capture did not just succeed) → [`VisitState::AlreadyCollected`]
/// 5. submission succeeded → [`VisitState::JustCollected`]
/// 6. submission pending → [`VisitState::Submitting`]
/// 7. otherwise → [`VisitState::ReadyToCollect`]
pub fn visit_state(signals: &CaptureSignals) -> VisitState {
    if !signals.has_coordinate {
        return VisitState::LocationUnavailable;
    }
    if !signals.zone_matched {
        return VisitState::OutOfZone;
    }
    if signals.history_loading {
        return VisitState::CheckingHistory;
    }
    if signals.already_visited && signals.submission != SubmissionStatus::Succeeded {
        return VisitState::AlreadyCollected;
    }
    match signals.submission {
        SubmissionStatus::Succeeded => VisitState::JustCollected,
        SubmissionStatus::Pending => VisitState::Submitting,
        SubmissionStatus::Idle | SubmissionStatus::Failed(_) => VisitState::ReadyToCollect,
    }
}

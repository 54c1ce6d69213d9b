//! Scan Session State Machine
//!
//! One session per scanning screen. While `Searching` every frame goes through
//! the card locator; once a card is found the session holds exactly one
//! rectangle and only runs the cheap tracker, handing an extraction job back to
//! the caller for every frame the card stays tracked.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::capture::Frame;
use crate::geometry::RectangleCandidate;
use crate::vision::{CardLocator, RectangleTracker};

/// Session state. The tracked rectangle exists only inside `Tracking`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum ScanState {
    #[default]
    Searching,
    Tracking(RectangleCandidate),
}

/// State without its payload, for reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanPhase {
    Searching,
    Tracking,
}

impl fmt::Display for ScanPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanPhase::Searching => write!(f, "searching"),
            ScanPhase::Tracking => write!(f, "tracking"),
        }
    }
}

/// What the locator or tracker saw in a frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Observation {
    /// Locator found a card
    Located(RectangleCandidate),
    /// Locator found nothing
    NotFound,
    /// Tracker followed the card to a new position
    Tracked(RectangleCandidate),
    /// Tracker lost the card
    Lost,
}

/// Result of applying one observation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transition {
    pub next: ScanState,
    /// Rectangle to read card data from, when the card is still tracked
    pub extract: Option<RectangleCandidate>,
}

impl ScanState {
    pub fn phase(&self) -> ScanPhase {
        match self {
            ScanState::Searching => ScanPhase::Searching,
            ScanState::Tracking(_) => ScanPhase::Tracking,
        }
    }

    /// The held rectangle, if tracking
    pub fn tracked(&self) -> Option<&RectangleCandidate> {
        match self {
            ScanState::Searching => None,
            ScanState::Tracking(rect) => Some(rect),
        }
    }

    /// Transition table. Observations from the other phase leave the state as is.
    pub fn next(self, observation: Observation) -> Transition {
        match (self, observation) {
            (ScanState::Searching, Observation::Located(rect)) => Transition {
                next: ScanState::Tracking(rect),
                extract: None,
            },
            (ScanState::Searching, Observation::NotFound) => Transition {
                next: ScanState::Searching,
                extract: None,
            },
            (ScanState::Tracking(_), Observation::Tracked(rect)) => Transition {
                next: ScanState::Tracking(rect),
                extract: Some(rect),
            },
            (ScanState::Tracking(_), Observation::Lost) => Transition {
                next: ScanState::Searching,
                extract: None,
            },
            (state, _) => Transition {
                next: state,
                extract: None,
            },
        }
    }
}

/// Snapshot handed to an extraction worker; never refers back to the session
#[derive(Debug, Clone)]
pub struct ExtractionJob {
    pub attempt_id: Uuid,
    pub frame: Arc<Frame>,
    pub rectangle: RectangleCandidate,
}

/// What happened to one frame
#[derive(Debug, Clone)]
pub struct FrameOutcome {
    pub phase: ScanPhase,
    /// Whether the phase differs from before this frame
    pub phase_changed: bool,
    pub job: Option<ExtractionJob>,
}

/// Per-session driver of the state machine
pub struct ScanSession {
    state: ScanState,
    locator: CardLocator,
    tracker: RectangleTracker,
}

impl ScanSession {
    pub fn new(locator: CardLocator, tracker: RectangleTracker) -> Self {
        Self {
            state: ScanState::Searching,
            locator,
            tracker,
        }
    }

    pub fn state(&self) -> &ScanState {
        &self.state
    }

    pub fn phase(&self) -> ScanPhase {
        self.state.phase()
    }

    /// Drop any held rectangle and start searching again
    pub fn reset(&mut self) {
        self.state = ScanState::Searching;
    }

    /// Run the locate or track step for `frame` and apply the transition
    pub fn process_frame(&mut self, frame: Arc<Frame>) -> FrameOutcome {
        let observation = match &self.state {
            ScanState::Searching => match self.locator.locate(&frame) {
                Some(rect) => Observation::Located(rect),
                None => Observation::NotFound,
            },
            ScanState::Tracking(previous) => match self.tracker.track(previous, &frame) {
                Some(rect) => Observation::Tracked(rect),
                None => Observation::Lost,
            },
        };

        let before = self.state.phase();
        let transition = self.state.next(observation);
        self.state = transition.next;
        let phase = self.state.phase();

        if phase != before {
            match phase {
                ScanPhase::Tracking => info!("Frame {}: card located, tracking", frame.sequence),
                ScanPhase::Searching => info!("Frame {}: card lost, searching", frame.sequence),
            }
        }

        let job = transition.extract.map(|rectangle| {
            let attempt_id = Uuid::new_v4();
            debug!("Frame {}: extraction attempt {}", frame.sequence, attempt_id);
            ExtractionJob {
                attempt_id,
                frame,
                rectangle,
            }
        });

        FrameOutcome {
            phase,
            phase_changed: phase != before,
            job,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vision::{ScriptedBackend, ScriptedFrame};

    fn rect(x: f32) -> RectangleCandidate {
        RectangleCandidate::from_raw([x, 0.3, 0.8, 0.35], 0.95).unwrap()
    }

    fn located() -> ScriptedFrame {
        ScriptedFrame {
            rectangles: vec![([0.1, 0.3, 0.8, 0.35], 0.95).into()],
            text_regions: vec![[0.15, 0.55, 0.4, 0.05]],
            ..Default::default()
        }
    }

    fn tracked(x: f32) -> ScriptedFrame {
        ScriptedFrame {
            track: Some(([x, 0.3, 0.8, 0.35], 0.95).into()),
            ..Default::default()
        }
    }

    fn session(frames: Vec<ScriptedFrame>) -> (ScanSession, Arc<ScriptedBackend>) {
        let backend = Arc::new(ScriptedBackend::new(frames));
        let locator = CardLocator::new(backend.clone(), backend.clone());
        let tracker = RectangleTracker::new(backend.clone());
        (ScanSession::new(locator, tracker), backend)
    }

    #[test]
    fn test_transition_table() {
        let r = rect(0.1);
        let moved = rect(0.12);

        let t = ScanState::Searching.next(Observation::NotFound);
        assert_eq!(t.next, ScanState::Searching);
        assert_eq!(t.extract, None);

        let t = ScanState::Searching.next(Observation::Located(r));
        assert_eq!(t.next, ScanState::Tracking(r));
        assert_eq!(t.extract, None);

        let t = ScanState::Tracking(r).next(Observation::Tracked(moved));
        assert_eq!(t.next, ScanState::Tracking(moved));
        assert_eq!(t.extract, Some(moved));

        let t = ScanState::Tracking(r).next(Observation::Lost);
        assert_eq!(t.next, ScanState::Searching);
        assert_eq!(t.extract, None);
    }

    #[test]
    fn test_foreign_observations_keep_state() {
        let r = rect(0.1);
        assert_eq!(
            ScanState::Searching.next(Observation::Lost).next,
            ScanState::Searching
        );
        assert_eq!(
            ScanState::Searching.next(Observation::Tracked(r)).next,
            ScanState::Searching
        );
        assert_eq!(
            ScanState::Tracking(r).next(Observation::NotFound).next,
            ScanState::Tracking(r)
        );
    }

    #[test]
    fn test_tracks_from_first_located_frame() {
        let frames = vec![
            ScriptedFrame::default(),
            ScriptedFrame::default(),
            ScriptedFrame::default(),
            located(),
        ];
        let (mut session, _) = session(frames);

        for sequence in 0..3 {
            let outcome = session.process_frame(Arc::new(Frame::blank(sequence, 64, 40)));
            assert_eq!(outcome.phase, ScanPhase::Searching);
            assert!(!outcome.phase_changed);
            assert!(outcome.job.is_none());
        }

        let outcome = session.process_frame(Arc::new(Frame::blank(3, 64, 40)));
        assert_eq!(outcome.phase, ScanPhase::Tracking);
        assert!(outcome.phase_changed);
        assert!(outcome.job.is_none());
        assert_eq!(session.state().tracked(), Some(&rect(0.1)));
    }

    #[test]
    fn test_loss_clears_rectangle() {
        let (mut session, _) = session(vec![located(), tracked(0.12), ScriptedFrame::default()]);

        session.process_frame(Arc::new(Frame::blank(0, 64, 40)));
        let outcome = session.process_frame(Arc::new(Frame::blank(1, 64, 40)));
        assert_eq!(outcome.phase, ScanPhase::Tracking);
        assert_eq!(session.state().tracked(), Some(&rect(0.12)));

        let outcome = session.process_frame(Arc::new(Frame::blank(2, 64, 40)));
        assert_eq!(outcome.phase, ScanPhase::Searching);
        assert!(outcome.phase_changed);
        assert!(session.state().tracked().is_none());
    }

    #[test]
    fn test_tracked_frames_produce_jobs_with_updated_rectangle() {
        let (mut session, _) = session(vec![located(), tracked(0.12), tracked(0.14)]);

        session.process_frame(Arc::new(Frame::blank(0, 64, 40)));
        let first = session
            .process_frame(Arc::new(Frame::blank(1, 64, 40)))
            .job
            .unwrap();
        let second = session
            .process_frame(Arc::new(Frame::blank(2, 64, 40)))
            .job
            .unwrap();

        assert_eq!(first.frame.sequence, 1);
        assert_eq!(first.rectangle, rect(0.12));
        assert_eq!(second.rectangle, rect(0.14));
        assert_ne!(first.attempt_id, second.attempt_id);
    }

    #[test]
    fn test_no_detection_while_tracking() {
        let (mut session, backend) =
            session(vec![located(), tracked(0.1), tracked(0.1), tracked(0.1)]);

        for sequence in 0..4 {
            session.process_frame(Arc::new(Frame::blank(sequence, 64, 40)));
        }

        let calls = backend.calls();
        assert_eq!(calls.rectangle_detection, 1);
        assert_eq!(calls.text_region_detection, 1);
        assert_eq!(calls.tracking, 3);
    }

    #[test]
    fn test_detection_resumes_after_loss() {
        let (mut session, backend) = session(vec![
            located(),
            ScriptedFrame::default(),
            ScriptedFrame::default(),
            located(),
        ]);

        let phases: Vec<ScanPhase> = (0..4)
            .map(|sequence| {
                session
                    .process_frame(Arc::new(Frame::blank(sequence, 64, 40)))
                    .phase
            })
            .collect();

        assert_eq!(
            phases,
            vec![
                ScanPhase::Tracking,
                ScanPhase::Searching,
                ScanPhase::Searching,
                ScanPhase::Tracking
            ]
        );
        // loss on frame 1 is not retried by the tracker
        assert_eq!(backend.calls().tracking, 1);
        assert_eq!(backend.calls().rectangle_detection, 3);
    }

    #[test]
    fn test_reset() {
        let (mut session, _) = session(vec![located()]);
        session.process_frame(Arc::new(Frame::blank(0, 64, 40)));
        assert_eq!(session.phase(), ScanPhase::Tracking);
        session.reset();
        assert_eq!(session.phase(), ScanPhase::Searching);
    }
}

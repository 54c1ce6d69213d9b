//! Frame-to-frame rectangle tracking
//!
//! Tracking is much cheaper than running both detectors again. A lost target is
//! never recovered here; the session goes back to full detection instead.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use crate::capture::Frame;
use crate::error::ScanResult;
use crate::geometry::RectangleCandidate;

/// Tracker speed profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingLevel {
    #[default]
    Fast,
    Accurate,
}

/// External single-rectangle tracking capability
pub trait TrackingCapability: Send + Sync {
    /// Re-locate `previous` in `frame`. `Ok(None)` means the target was lost.
    fn track_rectangle(
        &self,
        previous: &RectangleCandidate,
        frame: &Frame,
        level: TrackingLevel,
    ) -> ScanResult<Option<RectangleCandidate>>;
}

/// Follows the located card across frames
#[derive(Clone)]
pub struct RectangleTracker {
    capability: Arc<dyn TrackingCapability>,
    level: TrackingLevel,
}

impl RectangleTracker {
    pub fn new(capability: Arc<dyn TrackingCapability>) -> Self {
        Self::with_level(capability, TrackingLevel::Fast)
    }

    pub fn with_level(capability: Arc<dyn TrackingCapability>, level: TrackingLevel) -> Self {
        Self { capability, level }
    }

    /// Updated rectangle for `frame`, or `None` on loss or tracker failure
    pub fn track(&self, previous: &RectangleCandidate, frame: &Frame) -> Option<RectangleCandidate> {
        match self.capability.track_rectangle(previous, frame, self.level) {
            Ok(Some(updated)) => Some(updated),
            Ok(None) => {
                debug!("Frame {}: tracker lost the card", frame.sequence);
                None
            }
            Err(e) => {
                debug!("Frame {}: tracking failed, treating as loss: {}", frame.sequence, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AdapterKind;
    use crate::vision::scripted::{ScriptedBackend, ScriptedFrame};

    fn previous() -> RectangleCandidate {
        RectangleCandidate::from_raw([0.1, 0.3, 0.8, 0.35], 0.95).unwrap()
    }

    #[test]
    fn test_track_returns_update() {
        let backend = ScriptedBackend::new(vec![ScriptedFrame {
            track: Some(([0.12, 0.31, 0.8, 0.35], 0.9).into()),
            ..Default::default()
        }]);
        let tracker = RectangleTracker::new(Arc::new(backend));

        let updated = tracker.track(&previous(), &Frame::blank(0, 64, 40)).unwrap();
        assert!((updated.bounding_box.x() - 0.12).abs() < 1e-6);
    }

    #[test]
    fn test_track_reports_loss() {
        let backend = ScriptedBackend::new(vec![ScriptedFrame::default()]);
        let tracker = RectangleTracker::new(Arc::new(backend));
        assert!(tracker.track(&previous(), &Frame::blank(0, 64, 40)).is_none());
    }

    #[test]
    fn test_tracker_failure_is_loss() {
        let backend = ScriptedBackend::new(vec![ScriptedFrame {
            track: Some(([0.12, 0.31, 0.8, 0.35], 0.9).into()),
            fail: vec![AdapterKind::Tracker],
            ..Default::default()
        }]);
        let tracker = RectangleTracker::new(Arc::new(backend));
        assert!(tracker.track(&previous(), &Frame::blank(0, 64, 40)).is_none());
    }
}

//! Frame Intake Layer
//!
//! Camera capture itself lives outside this crate. The capture side hands
//! upright BGRA frames to [`FrameIntake`], which only passes a frame on when the
//! sequential scan worker is idle and discards it otherwise.

pub mod frame;

pub use frame::Frame;

use crossbeam_channel::{Sender, TrySendError};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::trace;

use crate::error::{ScanError, ScanResult};
use crate::shared::SessionStats;

/// Handle the frame source uses to feed the scan worker
#[derive(Clone)]
pub struct FrameIntake {
    /// Zero-capacity: a send only succeeds while the worker waits for a frame
    frames: Sender<Arc<Frame>>,
    stats: Arc<RwLock<SessionStats>>,
}

impl FrameIntake {
    pub(crate) fn new(frames: Sender<Arc<Frame>>, stats: Arc<RwLock<SessionStats>>) -> Self {
        Self { frames, stats }
    }

    /// Offer a frame to the worker. Returns `false` when the frame was dropped
    /// because the previous locate/track step is still running.
    pub fn submit(&self, frame: Frame) -> bool {
        let sequence = frame.sequence;
        self.stats.write().frames_received += 1;

        match self.frames.try_send(Arc::new(frame)) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {
                trace!("Dropping late frame {}", sequence);
                self.stats.write().frames_dropped += 1;
                false
            }
        }
    }

    /// Wait until the worker takes the frame. Used for offline replay where
    /// every frame must be processed.
    pub fn submit_blocking(&self, frame: Frame) -> ScanResult<()> {
        self.stats.write().frames_received += 1;
        self.frames
            .send(Arc::new(frame))
            .map_err(|_| ScanError::Worker("frame worker has stopped".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;

    #[test]
    fn test_submit_drops_when_worker_busy() {
        let (tx, _rx) = bounded(0);
        let stats = Arc::new(RwLock::new(SessionStats::default()));
        let intake = FrameIntake::new(tx, stats.clone());

        // nobody is receiving, so every frame is late
        assert!(!intake.submit(Frame::blank(0, 4, 4)));
        assert!(!intake.submit(Frame::blank(1, 4, 4)));

        let stats = stats.read();
        assert_eq!(stats.frames_received, 2);
        assert_eq!(stats.frames_dropped, 2);
    }

    #[test]
    fn test_submit_blocking_fails_after_worker_exit() {
        let (tx, rx) = bounded(0);
        drop(rx);
        let intake = FrameIntake::new(tx, Arc::new(RwLock::new(SessionStats::default())));
        assert!(intake.submit_blocking(Frame::blank(0, 2, 2)).is_err());
    }
}

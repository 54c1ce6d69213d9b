//! Message types emitted by the scan worker

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::analysis::ExtractionResult;
use crate::geometry::RectangleCandidate;
use crate::session::ScanPhase;

/// Outcome of one extraction attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionReport {
    /// Identifies the attempt across logs and reports
    pub attempt_id: Uuid,
    /// Frame the card data was read from
    pub frame_sequence: u64,
    /// Card rectangle the frame was cropped to
    pub rectangle: RectangleCandidate,
    pub result: ExtractionResult,
}

/// Messages sent from the scan worker to whoever owns presentation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScanMessage {
    /// The session moved between searching and tracking
    PhaseChanged { frame_sequence: u64, phase: ScanPhase },
    /// An extraction attempt finished
    Extracted(ExtractionReport),
    /// The frame worker has exited
    Stopped,
}

/// Commands sent to the scan worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCommand {
    /// Drop the tracked card and search again
    Reset,
    /// Stop the frame worker
    Shutdown,
}

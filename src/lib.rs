//! Card Scanner - payment card reading from a live camera feed
//!
//! Frames go through a sequential worker that locates a card, then tracks it.
//! Every tracked frame is cropped to the card and read on a worker pool, and
//! the card number and expiration found there are reported back as messages.

pub mod analysis;
pub mod app;
pub mod capture;
pub mod config;
pub mod error;
pub mod geometry;
pub mod session;
pub mod shared;
pub mod storage;
pub mod vision;

pub use app::CardScannerApp;
pub use capture::{Frame, FrameIntake};
pub use config::AppConfig;
pub use error::{ScanError, ScanResult};
pub use geometry::{NormalizedRect, RectangleCandidate};
pub use session::{ScanPhase, ScanSession, ScanState};
pub use shared::{ExtractionReport, ScanMessage, SessionStats};
pub use vision::{Adapters, ExtractionPipeline};

//! Error types for the scanning pipeline
//!
//! Adapter and geometry errors never escape the frame loop: the locator,
//! tracker and extraction pipeline log them and degrade to "no result" for the
//! frame. They are still typed so adapters can say what went wrong.

use std::fmt;
use thiserror::Error;

/// External capability an adapter error originated from
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdapterKind {
    /// Rectangle (card outline) detection
    RectangleDetector,
    /// Coarse text region detection
    TextRegionDetector,
    /// Frame-to-frame rectangle tracking
    Tracker,
    /// Text recognition
    Ocr,
}

impl fmt::Display for AdapterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdapterKind::RectangleDetector => write!(f, "rectangle detector"),
            AdapterKind::TextRegionDetector => write!(f, "text region detector"),
            AdapterKind::Tracker => write!(f, "tracker"),
            AdapterKind::Ocr => write!(f, "ocr"),
        }
    }
}

/// Malformed normalized geometry
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeometryError {
    #[error("coordinate is not finite")]
    NonFinite,

    #[error("negative extent ({width} x {height})")]
    NegativeExtent { width: f32, height: f32 },

    #[error("rectangle ({x}, {y}, {width}, {height}) lies outside the unit square")]
    OutOfRange {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    },

    #[error("confidence {0} is outside [0, 1]")]
    Confidence(f32),

    #[error("rectangle maps to an empty pixel area")]
    EmptyArea,
}

/// Errors produced by the scanning pipeline and its adapters
#[derive(Error, Debug)]
pub enum ScanError {
    /// An external capability failed outright
    #[error("{adapter} unavailable: {message}")]
    AdapterUnavailable { adapter: AdapterKind, message: String },

    /// A rectangle or region was malformed
    #[error("invalid geometry")]
    GeometryInvalid(#[from] GeometryError),

    /// Frame buffer does not match its declared dimensions
    #[error("invalid frame: {width}x{height} needs {expected} bytes, got {actual}")]
    InvalidFrame {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },

    /// The frame worker could not be started or has stopped
    #[error("scan worker: {0}")]
    Worker(String),
}

impl ScanError {
    /// Shorthand for an adapter failure
    pub fn unavailable(adapter: AdapterKind, message: impl Into<String>) -> Self {
        ScanError::AdapterUnavailable {
            adapter,
            message: message.into(),
        }
    }
}

/// Result alias used across the library
pub type ScanResult<T> = std::result::Result<T, ScanError>;

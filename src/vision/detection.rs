//! Card detection module
//!
//! A card is located when the shape detector reports a card-shaped rectangle
//! and the coarse text detector reports at least one text box fully inside it.
//! Blank rectangular objects (screens, paper, table edges) fail the text gate.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::capture::Frame;
use crate::error::ScanResult;
use crate::geometry::{NormalizedRect, RectangleCandidate};

/// Geometry policy handed to the rectangle detector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RectangleDetectionConfig {
    /// Minimum width/height ratio
    pub min_aspect_ratio: f32,
    /// Maximum width/height ratio
    pub max_aspect_ratio: f32,
    /// Minimum size as a fraction of the frame's smaller dimension
    pub min_size: f32,
    /// Minimum detector confidence (0.0 - 1.0)
    pub min_confidence: f32,
    /// Maximum deviation from 90 degree corners, in degrees
    pub quadrature_tolerance: f32,
}

impl Default for RectangleDetectionConfig {
    fn default() -> Self {
        // ISO/IEC 7810 ID-1 cards are 85.60 x 53.98 mm, a ratio of ~1.586
        Self {
            min_aspect_ratio: 1.3,
            max_aspect_ratio: 1.7,
            min_size: 0.3,
            min_confidence: 0.9,
            quadrature_tolerance: 15.0,
        }
    }
}

/// External rectangle detection capability
pub trait RectangleDetector: Send + Sync {
    /// Detect rectangles matching `config`, best first. May return an empty vec.
    fn detect_rectangles(
        &self,
        frame: &Frame,
        config: &RectangleDetectionConfig,
    ) -> ScanResult<Vec<RectangleCandidate>>;
}

/// External coarse text detection capability (boxes only, no content)
pub trait TextRegionDetector: Send + Sync {
    /// Detect text line boxes. May return an empty vec.
    fn detect_text_regions(&self, frame: &Frame) -> ScanResult<Vec<NormalizedRect>>;
}

/// Decides, for a single frame, whether a plausible card is in view
#[derive(Clone)]
pub struct CardLocator {
    rectangles: Arc<dyn RectangleDetector>,
    text_regions: Arc<dyn TextRegionDetector>,
    config: RectangleDetectionConfig,
}

impl CardLocator {
    /// Create a locator with the default card geometry policy
    pub fn new(
        rectangles: Arc<dyn RectangleDetector>,
        text_regions: Arc<dyn TextRegionDetector>,
    ) -> Self {
        Self::with_config(rectangles, text_regions, RectangleDetectionConfig::default())
    }

    /// Create a locator with a custom geometry policy
    pub fn with_config(
        rectangles: Arc<dyn RectangleDetector>,
        text_regions: Arc<dyn TextRegionDetector>,
        config: RectangleDetectionConfig,
    ) -> Self {
        Self {
            rectangles,
            text_regions,
            config,
        }
    }

    pub fn config(&self) -> &RectangleDetectionConfig {
        &self.config
    }

    /// Locate the card in `frame`, or `None` if no text-bearing card rectangle is present
    pub fn locate(&self, frame: &Frame) -> Option<RectangleCandidate> {
        let rectangles = match self.rectangles.detect_rectangles(frame, &self.config) {
            Ok(rectangles) => rectangles,
            Err(e) => {
                warn!("Frame {}: rectangle detection failed: {}", frame.sequence, e);
                return None;
            }
        };

        // Run independently of the rectangle result, as both requests share the frame
        let text_regions = match self.text_regions.detect_text_regions(frame) {
            Ok(regions) => regions,
            Err(e) => {
                warn!("Frame {}: text region detection failed: {}", frame.sequence, e);
                return None;
            }
        };

        let top = rectangles.first()?;

        if top.confidence() < self.config.min_confidence {
            debug!(
                "Frame {}: top rectangle confidence {:.2} below {:.2}",
                frame.sequence,
                top.confidence(),
                self.config.min_confidence
            );
            return None;
        }

        let has_text = text_regions
            .iter()
            .any(|region| top.bounding_box.contains(region));

        if !has_text {
            debug!(
                "Frame {}: rectangle without contained text ({} text regions)",
                frame.sequence,
                text_regions.len()
            );
            return None;
        }

        debug!(
            "Frame {}: card located at {:?} (confidence {:.2})",
            frame.sequence,
            top.bounding_box,
            top.confidence()
        );
        Some(*top)
    }
}

//! Vision Layer
//!
//! Wraps the external capabilities the scanner depends on (rectangle
//! detection, text region detection, tracking and OCR) behind traits, and
//! composes them into the card locator, the tracker and the extraction
//! pipeline that reads the card region.

pub mod detection;
pub mod ocr;
pub mod scripted;
pub mod tracking;

pub use detection::{CardLocator, RectangleDetectionConfig, RectangleDetector, TextRegionDetector};
pub use ocr::{RecognitionConfig, RecognitionLevel, RecognizedLine, TextCandidate, TextRecognizer};
pub use scripted::{ScanScript, ScriptedBackend, ScriptedFrame};
pub use tracking::{RectangleTracker, TrackingCapability, TrackingLevel};

use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use crate::analysis::{self, ExtractionResult};
use crate::capture::Frame;
use crate::geometry::RectangleCandidate;

/// One implementation of every external capability
#[derive(Clone)]
pub struct Adapters {
    pub rectangles: Arc<dyn RectangleDetector>,
    pub text_regions: Arc<dyn TextRegionDetector>,
    pub tracker: Arc<dyn TrackingCapability>,
    pub ocr: Arc<dyn TextRecognizer>,
}

impl Adapters {
    /// Use a single backend that implements all four capabilities
    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: RectangleDetector + TextRegionDetector + TrackingCapability + TextRecognizer + 'static,
    {
        Self {
            rectangles: backend.clone(),
            text_regions: backend.clone(),
            tracker: backend.clone(),
            ocr: backend,
        }
    }
}

/// Reads card data from the tracked region of a frame
#[derive(Clone)]
pub struct ExtractionPipeline {
    recognizer: Arc<dyn TextRecognizer>,
    recognition: RecognitionConfig,
}

impl ExtractionPipeline {
    /// Create a pipeline with default recognition settings
    pub fn new(recognizer: Arc<dyn TextRecognizer>) -> Self {
        Self::with_config(recognizer, RecognitionConfig::default())
    }

    /// Create a pipeline with custom recognition settings
    pub fn with_config(recognizer: Arc<dyn TextRecognizer>, recognition: RecognitionConfig) -> Self {
        Self {
            recognizer,
            recognition,
        }
    }

    /// Crop `frame` to `rectangle`, recognize text in the crop only and run
    /// both filters over the same OCR output
    pub fn extract(&self, frame: &Frame, rectangle: &RectangleCandidate) -> ExtractionResult {
        let Some(region) = rectangle
            .bounding_box
            .to_pixel_rect(frame.width(), frame.height())
        else {
            warn!(
                "Frame {}: card rectangle {:?} maps to an empty crop",
                frame.sequence, rectangle.bounding_box
            );
            return ExtractionResult::default();
        };

        let start = Instant::now();
        let crop = frame.crop(&region);

        let lines = match self.recognizer.recognize_text(&crop, &self.recognition) {
            Ok(lines) => lines,
            Err(e) => {
                warn!("Frame {}: text recognition failed: {}", frame.sequence, e);
                return ExtractionResult::default();
            }
        };

        let result = ExtractionResult {
            card_number: analysis::extract_card_number_with(&lines, self.recognition.max_candidates),
            expiration: analysis::extract_expiration_with(&lines, self.recognition.max_candidates),
        };

        debug!(
            "Frame {}: OCR on {}x{} crop found {} lines in {:?} (number: {}, expiration: {})",
            frame.sequence,
            region.width,
            region.height,
            lines.len(),
            start.elapsed(),
            result.card_number.is_some(),
            result.expiration.is_some()
        );

        result
    }
}

//! Scripted vision backend
//!
//! Implements every adapter trait from a per-frame script instead of device
//! capabilities. Frame `n` of the stream (by sequence number) is answered from
//! entry `n` of the script; frames past the end see empty results. Used by the
//! `replay` command and throughout the tests.

use anyhow::{Context, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::capture::Frame;
use crate::error::{AdapterKind, ScanError, ScanResult};
use crate::geometry::{NormalizedRect, RectangleCandidate};
use crate::vision::detection::{RectangleDetectionConfig, RectangleDetector, TextRegionDetector};
use crate::vision::ocr::{RecognitionConfig, RecognizedLine, TextRecognizer};
use crate::vision::tracking::{TrackingCapability, TrackingLevel};

/// Frame size used when a script entry names neither size nor image
pub const DEFAULT_FRAME_SIZE: (u32, u32) = (640, 400);

/// A raw rectangle as written in a script, validated only when served
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScriptedRectangle {
    /// `[x, y, width, height]` in normalized coordinates
    pub bbox: [f32; 4],
    pub confidence: f32,
}

impl From<([f32; 4], f32)> for ScriptedRectangle {
    fn from((bbox, confidence): ([f32; 4], f32)) -> Self {
        Self { bbox, confidence }
    }
}

impl ScriptedRectangle {
    fn to_candidate(self) -> ScanResult<RectangleCandidate> {
        Ok(RectangleCandidate::from_raw(self.bbox, self.confidence)?)
    }
}

/// What the capabilities report for one frame
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptedFrame {
    /// Frame width in pixels
    pub width: Option<u32>,
    /// Frame height in pixels
    pub height: Option<u32>,
    /// Image file to use as frame content, relative to the script
    pub image: Option<PathBuf>,
    /// Rectangle detector output, best first
    pub rectangles: Vec<ScriptedRectangle>,
    /// Text region detector output
    pub text_regions: Vec<[f32; 4]>,
    /// Tracker output; absent means the target is lost
    pub track: Option<ScriptedRectangle>,
    /// OCR output: one entry per line, candidates best-first
    pub ocr: Vec<Vec<String>>,
    /// Capabilities that fail outright on this frame
    pub fail: Vec<AdapterKind>,
}

impl ScriptedFrame {
    fn check(&self, adapter: AdapterKind) -> ScanResult<()> {
        if self.fail.contains(&adapter) {
            return Err(ScanError::unavailable(adapter, "scripted failure"));
        }
        Ok(())
    }
}

/// A whole scripted capture session
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanScript {
    #[serde(default)]
    pub frames: Vec<ScriptedFrame>,
    #[serde(skip)]
    base_dir: Option<PathBuf>,
}

impl ScanScript {
    /// Parse a script from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        let script: ScanScript = toml::from_str(content).context("Invalid scan script")?;
        Ok(script)
    }

    /// Load a script file. Image paths resolve against the file's directory.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scan script: {:?}", path))?;
        let mut script = Self::from_toml(&content)?;
        script.base_dir = path.parent().map(Path::to_path_buf);
        Ok(script)
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Build the frame the capture side would deliver for entry `index`
    pub fn frame(&self, index: usize) -> Result<Frame> {
        let entry = self
            .frames
            .get(index)
            .with_context(|| format!("Script has no frame {}", index))?;
        let sequence = index as u64;

        if let Some(image_path) = &entry.image {
            let path = match &self.base_dir {
                Some(dir) => dir.join(image_path),
                None => image_path.clone(),
            };
            let img = image::open(&path)
                .with_context(|| format!("Failed to load frame image: {:?}", path))?;
            return Ok(Frame::from_image(sequence, &img));
        }

        let width = entry.width.unwrap_or(DEFAULT_FRAME_SIZE.0);
        let height = entry.height.unwrap_or(DEFAULT_FRAME_SIZE.1);
        Ok(Frame::blank(sequence, width, height))
    }
}

/// Number of times each capability was invoked
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub rectangle_detection: usize,
    pub text_region_detection: usize,
    pub tracking: usize,
    pub recognition: usize,
}

/// Adapter implementation answering from a [`ScanScript`]
pub struct ScriptedBackend {
    script: ScanScript,
    calls: Mutex<CallCounts>,
    /// Policy from the latest rectangle detection request
    detection_config: Mutex<Option<RectangleDetectionConfig>>,
}

impl ScriptedBackend {
    pub fn new(frames: Vec<ScriptedFrame>) -> Self {
        Self::from_script(ScanScript {
            frames,
            base_dir: None,
        })
    }

    pub fn from_script(script: ScanScript) -> Self {
        Self {
            script,
            calls: Mutex::new(CallCounts::default()),
            detection_config: Mutex::new(None),
        }
    }

    pub fn script(&self) -> &ScanScript {
        &self.script
    }

    /// Snapshot of the invocation counters
    pub fn calls(&self) -> CallCounts {
        *self.calls.lock()
    }

    /// Geometry policy the locator last asked the detector to apply
    pub fn last_detection_config(&self) -> Option<RectangleDetectionConfig> {
        self.detection_config.lock().clone()
    }

    fn entry(&self, frame: &Frame) -> Option<&ScriptedFrame> {
        usize::try_from(frame.sequence)
            .ok()
            .and_then(|index| self.script.frames.get(index))
    }
}

impl RectangleDetector for ScriptedBackend {
    fn detect_rectangles(
        &self,
        frame: &Frame,
        config: &RectangleDetectionConfig,
    ) -> ScanResult<Vec<RectangleCandidate>> {
        self.calls.lock().rectangle_detection += 1;
        *self.detection_config.lock() = Some(config.clone());
        let Some(entry) = self.entry(frame) else {
            return Ok(vec![]);
        };
        entry.check(AdapterKind::RectangleDetector)?;
        entry
            .rectangles
            .iter()
            .map(|r| r.to_candidate())
            .collect()
    }
}

impl TextRegionDetector for ScriptedBackend {
    fn detect_text_regions(&self, frame: &Frame) -> ScanResult<Vec<NormalizedRect>> {
        self.calls.lock().text_region_detection += 1;
        let Some(entry) = self.entry(frame) else {
            return Ok(vec![]);
        };
        entry.check(AdapterKind::TextRegionDetector)?;
        entry
            .text_regions
            .iter()
            .map(|raw| NormalizedRect::try_from(*raw).map_err(ScanError::from))
            .collect()
    }
}

impl TrackingCapability for ScriptedBackend {
    fn track_rectangle(
        &self,
        _previous: &RectangleCandidate,
        frame: &Frame,
        _level: TrackingLevel,
    ) -> ScanResult<Option<RectangleCandidate>> {
        self.calls.lock().tracking += 1;
        let Some(entry) = self.entry(frame) else {
            return Ok(None);
        };
        entry.check(AdapterKind::Tracker)?;
        entry.track.map(ScriptedRectangle::to_candidate).transpose()
    }
}

impl TextRecognizer for ScriptedBackend {
    fn recognize_text(
        &self,
        region: &Frame,
        config: &RecognitionConfig,
    ) -> ScanResult<Vec<RecognizedLine>> {
        self.calls.lock().recognition += 1;
        let Some(entry) = self.entry(region) else {
            return Ok(vec![]);
        };
        entry.check(AdapterKind::Ocr)?;
        Ok(entry
            .ocr
            .iter()
            .map(|line| RecognizedLine::from_ranked(line.iter().take(config.max_candidates).cloned()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCRIPT: &str = r#"
[[frames]]

[[frames]]
width = 320
height = 200
rectangles = [{ bbox = [0.1, 0.3, 0.8, 0.35], confidence = 0.95 }]
text_regions = [[0.15, 0.55, 0.4, 0.05]]

[[frames]]
track = { bbox = [0.1, 0.3, 0.8, 0.35], confidence = 0.9 }
ocr = [["4111 1111 1111 1111", "4111 1111 1111 1117"], ["JOHN DOE"], ["04/26"]]
fail = ["text_region_detector"]
"#;

    #[test]
    fn test_parse_script() {
        let script = ScanScript::from_toml(SCRIPT).unwrap();
        assert_eq!(script.len(), 3);
        assert!(script.frames[0].rectangles.is_empty());
        assert!((script.frames[1].rectangles[0].confidence - 0.95).abs() < 1e-6);
        assert_eq!(script.frames[2].ocr.len(), 3);
        assert_eq!(script.frames[2].fail, vec![AdapterKind::TextRegionDetector]);
    }

    #[test]
    fn test_script_frames_have_sizes() {
        let script = ScanScript::from_toml(SCRIPT).unwrap();
        assert_eq!(script.frame(0).unwrap().dimensions(), DEFAULT_FRAME_SIZE);
        let second = script.frame(1).unwrap();
        assert_eq!(second.dimensions(), (320, 200));
        assert_eq!(second.sequence, 1);
        assert!(script.frame(3).is_err());
    }

    #[test]
    fn test_backend_answers_per_frame() {
        let backend = ScriptedBackend::from_script(ScanScript::from_toml(SCRIPT).unwrap());
        let config = RectangleDetectionConfig::default();

        let first = Frame::blank(0, 64, 40);
        assert!(backend.detect_rectangles(&first, &config).unwrap().is_empty());

        let second = Frame::blank(1, 64, 40);
        assert_eq!(backend.detect_rectangles(&second, &config).unwrap().len(), 1);
        assert_eq!(backend.detect_text_regions(&second).unwrap().len(), 1);

        let third = Frame::blank(2, 64, 40);
        assert!(backend.detect_text_regions(&third).is_err());
        let lines = backend
            .recognize_text(&third, &RecognitionConfig::default())
            .unwrap();
        assert_eq!(lines[0].best(), Some("4111 1111 1111 1111"));

        let calls = backend.calls();
        assert_eq!(calls.rectangle_detection, 2);
        assert_eq!(calls.text_region_detection, 2);
        assert_eq!(calls.recognition, 1);
    }

    #[test]
    fn test_frames_past_script_end_are_empty() {
        let backend = ScriptedBackend::new(vec![]);
        let frame = Frame::blank(42, 8, 8);
        let previous = RectangleCandidate::from_raw([0.1, 0.1, 0.5, 0.3], 0.9).unwrap();

        assert!(backend.detect_text_regions(&frame).unwrap().is_empty());
        assert!(backend
            .track_rectangle(&previous, &frame, TrackingLevel::Fast)
            .unwrap()
            .is_none());
        assert!(backend
            .recognize_text(&frame, &RecognitionConfig::default())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_invalid_script_is_rejected() {
        assert!(ScanScript::from_toml("[[frames]]\nrectangles = 3").is_err());
    }
}

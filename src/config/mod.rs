//! Application Configuration
//!
//! Scanner settings stored in TOML format. Every section falls back to its
//! defaults, so a config file only needs the values it changes.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::analysis::ReportingSettings;
use crate::vision::{RecognitionConfig, RectangleDetectionConfig, TrackingLevel};

/// Application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Frame intake settings
    pub capture: CaptureSettings,
    /// Card rectangle detection policy
    pub detection: RectangleDetectionConfig,
    /// Tracker settings
    pub tracking: TrackingSettings,
    /// Text recognition settings
    pub recognition: RecognitionConfig,
    /// Extraction worker settings
    pub extraction: ExtractionSettings,
    /// Reconciliation of repeated reports
    pub reporting: ReportingSettings,
}

/// Frame intake settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureSettings {
    /// Frame rate the frame source delivers at (used to pace replays)
    pub max_fps: u32,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self { max_fps: 30 }
    }
}

/// Tracker settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingSettings {
    /// Speed profile
    pub level: TrackingLevel,
}

/// Extraction worker settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionSettings {
    /// Threads in the extraction pool
    pub worker_threads: usize,
    /// Extractions allowed to run or wait at once; tracked frames beyond
    /// this are not read
    pub max_in_flight: usize,
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        Self {
            worker_threads: 2,
            max_in_flight: 2,
        }
    }
}

impl AppConfig {
    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        let detection = &self.detection;
        anyhow::ensure!(
            detection.min_aspect_ratio > 0.0 && detection.min_aspect_ratio <= detection.max_aspect_ratio,
            "detection.min_aspect_ratio must be positive and not above max_aspect_ratio"
        );
        anyhow::ensure!(
            (0.0..=1.0).contains(&detection.min_size),
            "detection.min_size must be within [0, 1]"
        );
        anyhow::ensure!(
            (0.0..=1.0).contains(&detection.min_confidence),
            "detection.min_confidence must be within [0, 1]"
        );
        anyhow::ensure!(
            (0.0..=45.0).contains(&detection.quadrature_tolerance),
            "detection.quadrature_tolerance must be within [0, 45] degrees"
        );
        anyhow::ensure!(
            self.recognition.max_candidates > 0,
            "recognition.max_candidates must be at least 1"
        );
        anyhow::ensure!(
            self.extraction.worker_threads > 0,
            "extraction.worker_threads must be at least 1"
        );
        anyhow::ensure!(
            self.extraction.max_in_flight > 0,
            "extraction.max_in_flight must be at least 1"
        );
        anyhow::ensure!(self.capture.max_fps > 0, "capture.max_fps must be at least 1");
        Ok(())
    }
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config: {:?}", path))?;
    let config: AppConfig =
        toml::from_str(&content).with_context(|| format!("Invalid config: {:?}", path))?;
    config.validate()?;
    Ok(config)
}

/// Save configuration to file
pub fn save_config(config: &AppConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}

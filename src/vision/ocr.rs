//! OCR (Optical Character Recognition) data contract
//!
//! Text recognition itself is an external capability. This module defines what
//! it is asked to do and the shape of what it returns: one [`RecognizedLine`]
//! per detected text line, each holding ranked string candidates best-first.

use serde::{Deserialize, Serialize};

use crate::capture::Frame;
use crate::analysis::DEFAULT_TOP_CANDIDATES;
use crate::error::ScanResult;

/// External text recognition capability
pub trait TextRecognizer: Send + Sync {
    /// Recognize text lines in `region`, which is already cropped to the card.
    /// Lines come back in detection order; an empty vec means no text.
    fn recognize_text(
        &self,
        region: &Frame,
        config: &RecognitionConfig,
    ) -> ScanResult<Vec<RecognizedLine>>;
}

/// Recognition accuracy profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecognitionLevel {
    /// Slower, higher quality recognition
    #[default]
    Accurate,
    /// Faster, lower quality recognition
    Fast,
}

/// Options passed to the text recognizer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognitionConfig {
    /// Accuracy profile
    pub level: RecognitionLevel,
    /// Dictionary-based correction. Off: card numbers are not words.
    pub language_correction: bool,
    /// Ranked candidates requested per line; the card data filters look at
    /// the same number
    pub max_candidates: usize,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            level: RecognitionLevel::Accurate,
            language_correction: false,
            max_candidates: DEFAULT_TOP_CANDIDATES,
        }
    }
}

/// One ranked reading of a text line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextCandidate {
    /// Recognized text
    pub text: String,
    /// 0-based rank within the line (0 = best)
    pub rank: usize,
}

/// All candidates recognized for a single text line
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecognizedLine {
    /// Candidates ordered best-first
    pub candidates: Vec<TextCandidate>,
}

impl RecognizedLine {
    /// Build a line from candidate strings given best-first
    pub fn from_ranked<I, S>(candidates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            candidates: candidates
                .into_iter()
                .enumerate()
                .map(|(rank, text)| TextCandidate {
                    text: text.into(),
                    rank,
                })
                .collect(),
        }
    }

    /// The best `n` candidates in rank order
    pub fn top_candidates(&self, n: usize) -> impl Iterator<Item = &TextCandidate> {
        self.candidates.iter().take(n)
    }

    /// Best candidate text, if any
    pub fn best(&self) -> Option<&str> {
        self.candidates.first().map(|c| c.text.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_ranked_assigns_ranks() {
        let line = RecognizedLine::from_ranked(["4111", "4lll", "411l"]);
        let ranks: Vec<usize> = line.candidates.iter().map(|c| c.rank).collect();
        assert_eq!(ranks, vec![0, 1, 2]);
        assert_eq!(line.best(), Some("4111"));
    }

    #[test]
    fn test_top_candidates_truncates() {
        let line = RecognizedLine::from_ranked((0..15).map(|i| i.to_string()));
        assert_eq!(line.top_candidates(10).count(), 10);
        assert_eq!(line.top_candidates(100).count(), 15);
    }

    #[test]
    fn test_default_recognition_config() {
        let config = RecognitionConfig::default();
        assert_eq!(config.level, RecognitionLevel::Accurate);
        assert!(!config.language_correction);
        assert_eq!(config.max_candidates, 10);
    }
}

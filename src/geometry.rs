//! Normalized and pixel geometry
//!
//! All rectangles handed between pipeline stages are normalized to the unit
//! square with a top-left origin. They can only be built through validating
//! constructors, so anything that reaches a crop is well-formed.

use serde::{Deserialize, Serialize};

use crate::error::GeometryError;

/// Slack allowed when a rectangle touches the unit square border
const EDGE_EPSILON: f32 = 1e-4;

/// Rectangle in normalized `[0, 1] x [0, 1]` frame coordinates (top-left origin)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "[f32; 4]", into = "[f32; 4]")]
pub struct NormalizedRect {
    x: f32,
    y: f32,
    width: f32,
    height: f32,
}

impl NormalizedRect {
    /// Build a rectangle, rejecting NaN, negative extents and anything outside the unit square
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Result<Self, GeometryError> {
        if ![x, y, width, height].iter().all(|v| v.is_finite()) {
            return Err(GeometryError::NonFinite);
        }
        if width < 0.0 || height < 0.0 {
            return Err(GeometryError::NegativeExtent { width, height });
        }
        let in_range = x >= -EDGE_EPSILON
            && y >= -EDGE_EPSILON
            && width <= 1.0 + EDGE_EPSILON
            && height <= 1.0 + EDGE_EPSILON
            && x + width <= 1.0 + EDGE_EPSILON
            && y + height <= 1.0 + EDGE_EPSILON;
        if !in_range {
            return Err(GeometryError::OutOfRange {
                x,
                y,
                width,
                height,
            });
        }

        Ok(Self {
            x: x.max(0.0),
            y: y.max(0.0),
            width: width.min(1.0),
            height: height.min(1.0),
        })
    }

    /// The whole frame
    pub fn unit() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: 1.0,
            height: 1.0,
        }
    }

    pub fn x(&self) -> f32 {
        self.x
    }

    pub fn y(&self) -> f32 {
        self.y
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    pub fn height(&self) -> f32 {
        self.height
    }

    pub fn max_x(&self) -> f32 {
        self.x + self.width
    }

    pub fn max_y(&self) -> f32 {
        self.y + self.height
    }

    /// Whether `other` lies entirely inside this rectangle (shared edges count as inside)
    pub fn contains(&self, other: &NormalizedRect) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.max_x() <= self.max_x()
            && other.max_y() <= self.max_y()
    }

    /// Map onto a pixel grid, clamped to the frame. Returns `None` for an empty area.
    pub fn to_pixel_rect(&self, frame_width: u32, frame_height: u32) -> Option<PixelRect> {
        let fw = frame_width as f32;
        let fh = frame_height as f32;

        let x0 = (self.x * fw).floor().clamp(0.0, fw) as u32;
        let y0 = (self.y * fh).floor().clamp(0.0, fh) as u32;
        let x1 = (self.max_x() * fw).ceil().clamp(0.0, fw) as u32;
        let y1 = (self.max_y() * fh).ceil().clamp(0.0, fh) as u32;

        if x1 <= x0 || y1 <= y0 {
            return None;
        }

        Some(PixelRect {
            x: x0,
            y: y0,
            width: x1 - x0,
            height: y1 - y0,
        })
    }
}

impl TryFrom<[f32; 4]> for NormalizedRect {
    type Error = GeometryError;

    fn try_from(raw: [f32; 4]) -> Result<Self, Self::Error> {
        NormalizedRect::new(raw[0], raw[1], raw[2], raw[3])
    }
}

impl From<NormalizedRect> for [f32; 4] {
    fn from(rect: NormalizedRect) -> Self {
        [rect.x, rect.y, rect.width, rect.height]
    }
}

/// Rectangle in integer pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// A detected quadrilateral with its detector confidence
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCandidate")]
pub struct RectangleCandidate {
    pub bounding_box: NormalizedRect,
    confidence: f32,
}

/// Unchecked wire form of [`RectangleCandidate`]
#[derive(Deserialize)]
struct RawCandidate {
    bounding_box: NormalizedRect,
    confidence: f32,
}

impl TryFrom<RawCandidate> for RectangleCandidate {
    type Error = GeometryError;

    fn try_from(raw: RawCandidate) -> Result<Self, Self::Error> {
        RectangleCandidate::new(raw.bounding_box, raw.confidence)
    }
}

impl RectangleCandidate {
    pub fn new(bounding_box: NormalizedRect, confidence: f32) -> Result<Self, GeometryError> {
        if !confidence.is_finite() || !(0.0..=1.0).contains(&confidence) {
            return Err(GeometryError::Confidence(confidence));
        }
        Ok(Self {
            bounding_box,
            confidence,
        })
    }

    /// Build from a raw `[x, y, width, height]` box
    pub fn from_raw(raw: [f32; 4], confidence: f32) -> Result<Self, GeometryError> {
        Self::new(NormalizedRect::try_from(raw)?, confidence)
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }
}

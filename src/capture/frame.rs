//! Frame data structures for captured camera content

use image::DynamicImage;
use std::time::Instant;

use crate::error::{ScanError, ScanResult};
use crate::geometry::PixelRect;

/// Bytes per packed BGRA pixel
pub const BYTES_PER_PIXEL: usize = 4;

/// A captured camera frame in packed 32-bit BGRA, already upright
#[derive(Debug, Clone)]
pub struct Frame {
    /// Position of this frame in the capture stream
    pub sequence: u64,
    data: Vec<u8>,
    width: u32,
    height: u32,
    /// Timestamp when frame was captured
    pub timestamp: Instant,
}

impl Frame {
    /// Create a frame from raw BGRA bytes
    pub fn new(sequence: u64, data: Vec<u8>, width: u32, height: u32) -> ScanResult<Self> {
        let expected = width as usize * height as usize * BYTES_PER_PIXEL;
        if data.len() != expected {
            return Err(ScanError::InvalidFrame {
                width,
                height,
                expected,
                actual: data.len(),
            });
        }

        Ok(Self {
            sequence,
            data,
            width,
            height,
            timestamp: Instant::now(),
        })
    }

    /// A uniformly black frame, used when only geometry matters
    pub fn blank(sequence: u64, width: u32, height: u32) -> Self {
        Self {
            sequence,
            data: vec![0; width as usize * height as usize * BYTES_PER_PIXEL],
            width,
            height,
            timestamp: Instant::now(),
        }
    }

    /// Convert any decoded image into a BGRA frame
    pub fn from_image(sequence: u64, image: &DynamicImage) -> Self {
        let rgba = image.to_rgba8();
        let (width, height) = rgba.dimensions();
        let mut data = rgba.into_raw();
        for pixel in data.chunks_exact_mut(BYTES_PER_PIXEL) {
            pixel.swap(0, 2);
        }

        Self {
            sequence,
            data,
            width,
            height,
            timestamp: Instant::now(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Raw BGRA bytes, row-major without padding
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Get frame dimensions as (width, height)
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Copy a region out of this frame. The region is clamped to the frame bounds;
    /// the crop keeps the source sequence number and timestamp.
    pub fn crop(&self, region: &PixelRect) -> Frame {
        let x = region.x.min(self.width);
        let y = region.y.min(self.height);
        let width = region.width.min(self.width - x);
        let height = region.height.min(self.height - y);

        let stride = self.width as usize * BYTES_PER_PIXEL;
        let row_len = width as usize * BYTES_PER_PIXEL;
        let mut data = Vec::with_capacity(row_len * height as usize);

        for row in y..(y + height) {
            let start = row as usize * stride + x as usize * BYTES_PER_PIXEL;
            data.extend_from_slice(&self.data[start..start + row_len]);
        }

        Frame {
            sequence: self.sequence,
            data,
            width,
            height,
            timestamp: self.timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;

    fn gradient(width: u32, height: u32) -> Frame {
        let mut data = Vec::new();
        for y in 0..height {
            for x in 0..width {
                data.extend_from_slice(&[x as u8, y as u8, 0, 255]);
            }
        }
        Frame::new(7, data, width, height).unwrap()
    }

    #[test]
    fn test_rejects_mismatched_buffer() {
        let result = Frame::new(0, vec![0; 10], 2, 2);
        assert!(matches!(
            result,
            Err(ScanError::InvalidFrame {
                expected: 16,
                actual: 10,
                ..
            })
        ));
    }

    #[test]
    fn test_crop_copies_region() {
        let frame = gradient(8, 6);
        let crop = frame.crop(&PixelRect {
            x: 2,
            y: 1,
            width: 3,
            height: 2,
        });

        assert_eq!(crop.dimensions(), (3, 2));
        assert_eq!(crop.sequence, 7);
        // first pixel of the crop is (2, 1) in the source
        assert_eq!(&crop.data()[0..2], &[2, 1]);
        // last pixel is (4, 2)
        let last = crop.data().len() - BYTES_PER_PIXEL;
        assert_eq!(&crop.data()[last..last + 2], &[4, 2]);
    }

    #[test]
    fn test_crop_is_clamped() {
        let frame = gradient(4, 4);
        let crop = frame.crop(&PixelRect {
            x: 3,
            y: 3,
            width: 10,
            height: 10,
        });
        assert_eq!(crop.dimensions(), (1, 1));
        assert_eq!(crop.data().len(), BYTES_PER_PIXEL);
    }

    #[test]
    fn test_from_image_swaps_channels() {
        let mut rgba = RgbaImage::new(1, 1);
        rgba.put_pixel(0, 0, image::Rgba([10, 20, 30, 255]));
        let frame = Frame::from_image(1, &DynamicImage::ImageRgba8(rgba));

        assert_eq!(frame.data(), &[30, 20, 10, 255]);
    }
}

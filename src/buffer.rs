//! Dense RGBA pixel buffer shared by every stage of the grading pipeline.

use image::RgbaImage;
use crate::error::{Result, GradeError};

/// Row-major RGBA8 pixels with known dimensions.
///
/// `samples.len() == width * height * 4` always holds. Buffers are never
/// modified after construction; transforms produce new buffers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    samples: Vec<u8>,
}

impl PixelBuffer {
    /// Wrap raw RGBA samples, checking the dimensions against the sample count
    pub fn new(width: u32, height: u32, samples: Vec<u8>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(GradeError::InvalidParameter(format!(
                "Buffer dimensions must be positive, got {}x{}",
                width, height
            )));
        }

        let expected = width as usize * height as usize * 4;
        if samples.len() != expected {
            return Err(GradeError::InvalidParameter(format!(
                "Expected {} samples for {}x{} RGBA, got {}",
                expected,
                width,
                height,
                samples.len()
            )));
        }

        Ok(Self { width, height, samples })
    }

    /// Build a buffer from a list of RGBA pixels in row-major order
    pub fn from_pixels(width: u32, height: u32, pixels: &[[u8; 4]]) -> Result<Self> {
        let samples = pixels.iter().flat_map(|p| p.iter().copied()).collect();
        Self::new(width, height, samples)
    }

    /// Single-color buffer
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Result<Self> {
        let count = width as usize * height as usize;
        let samples = rgba.iter().copied().cycle().take(count * 4).collect();
        Self::new(width, height, samples)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn samples(&self) -> &[u8] {
        &self.samples
    }

    /// Iterate pixels as `[r, g, b, a]` slices
    pub fn pixels(&self) -> std::slice::ChunksExact<'_, u8> {
        self.samples.chunks_exact(4)
    }

    pub fn into_samples(self) -> Vec<u8> {
        self.samples
    }

    /// Convert to an `image` crate buffer for resampling and encoding
    pub fn to_rgba_image(&self) -> RgbaImage {
        // Dimensions and length are checked at construction
        RgbaImage::from_raw(self.width, self.height, self.samples.clone())
            .unwrap_or_else(|| RgbaImage::new(self.width, self.height))
    }
}

impl TryFrom<RgbaImage> for PixelBuffer {
    type Error = GradeError;

    fn try_from(img: RgbaImage) -> Result<Self> {
        let (width, height) = img.dimensions();
        Self::new(width, height, img.into_raw())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_mismatched_length() {
        let result = PixelBuffer::new(2, 2, vec![0; 15]);
        assert!(matches!(result, Err(GradeError::InvalidParameter(_))));
    }

    #[test]
    fn test_rejects_zero_dimension() {
        assert!(PixelBuffer::new(0, 4, Vec::new()).is_err());
    }

    #[test]
    fn test_filled() {
        let buf = PixelBuffer::filled(3, 2, [10, 20, 30, 255]).unwrap();
        assert_eq!(buf.samples().len(), 24);
        assert!(buf.pixels().all(|p| p == [10, 20, 30, 255]));
    }

    #[test]
    fn test_image_roundtrip_keeps_samples() {
        let buf = PixelBuffer::from_pixels(2, 1, &[[1, 2, 3, 4], [5, 6, 7, 8]]).unwrap();
        let back = PixelBuffer::try_from(buf.to_rgba_image()).unwrap();
        assert_eq!(buf, back);
    }
}

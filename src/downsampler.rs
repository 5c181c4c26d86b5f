use image::imageops::{self, FilterType};
use tracing::debug;
use crate::buffer::PixelBuffer;
use crate::error::{Result, GradeError};

/// Default bound on the longer side of the analysis copy
pub const DEFAULT_MAX_DIMENSION: u32 = 256;

/// Compute the working size so the longer side equals `max_dimension`
///
/// Returns the input size unchanged when it already fits (no upscaling).
pub fn target_size(width: u32, height: u32, max_dimension: u32) -> (u32, u32) {
    if width <= max_dimension && height <= max_dimension {
        return (width, height);
    }

    if width > height {
        let scaled = (height as f64 * max_dimension as f64 / width as f64).round() as u32;
        (max_dimension, scaled.max(1))
    } else {
        let scaled = (width as f64 * max_dimension as f64 / height as f64).round() as u32;
        (scaled.max(1), max_dimension)
    }
}

/// Produce a bounded-resolution copy for analysis
///
/// Bilinear (triangle) resampling is deterministic, so identical inputs give
/// identical working copies.
pub fn downsample(buffer: &PixelBuffer, max_dimension: u32) -> Result<PixelBuffer> {
    if max_dimension == 0 {
        return Err(GradeError::InvalidParameter(
            "max_dimension must be positive".to_string(),
        ));
    }

    let (width, height) = buffer.dimensions();
    let (out_width, out_height) = target_size(width, height, max_dimension);

    if (out_width, out_height) == (width, height) {
        return Ok(buffer.clone());
    }

    debug!(width, height, out_width, out_height, "downsampling for analysis");
    let resized = imageops::resize(&buffer.to_rgba_image(), out_width, out_height, FilterType::Triangle);
    PixelBuffer::try_from(resized)
}

//! Batch rendering of a grade onto target images.
//!
//! Every target is decoded, graded and written on its own; a failing item is
//! recorded in the report and the rest of the batch carries on. Output names
//! share one timestamp per batch: `{prefix}-{index}-{millis}.{ext}`.

use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;
use rayon::prelude::*;
use serde::Serialize;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};
use crate::buffer::PixelBuffer;
use crate::config::{GradeSettings, RenderFormat};
use crate::error::{Result, GradeError};
use crate::source::PixelSource;
use crate::transfer::{self, PixelTransform};

/// Outcome for one target image
#[derive(Debug, Serialize)]
pub struct BatchItem {
    pub input: PathBuf,
    /// Written file, absent on failure
    pub output: Option<PathBuf>,
    pub error: Option<GradeError>,
}

impl BatchItem {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Serialize)]
pub struct BatchReport {
    pub timestamp: i64,
    pub succeeded: usize,
    pub failed: usize,
    pub items: Vec<BatchItem>,
    pub elapsed_ms: u64,
}

// ============================================================================
// ENCODING
// ============================================================================

/// Encode a buffer as PNG or JPEG bytes
///
/// JPEG has no alpha channel, so alpha is dropped for that format.
pub fn encode(buffer: &PixelBuffer, format: RenderFormat, jpeg_quality: u8) -> Result<Vec<u8>> {
    let img = buffer.to_rgba_image();
    let mut cursor = Cursor::new(Vec::new());

    match format {
        RenderFormat::Png => {
            img.write_to(&mut cursor, image::ImageFormat::Png)
                .map_err(|e| GradeError::Processing(format!("Failed to encode PNG: {}", e)))?;
        }
        RenderFormat::Jpeg => {
            let rgb = DynamicImage::ImageRgba8(img).to_rgb8();
            let encoder = JpegEncoder::new_with_quality(&mut cursor, jpeg_quality);
            rgb.write_with_encoder(encoder)
                .map_err(|e| GradeError::Processing(format!("Failed to encode JPEG: {}", e)))?;
        }
    }

    Ok(cursor.into_inner())
}

/// File name for the `index`-th (1-based) output of a batch
pub fn output_name(prefix: &str, index: usize, timestamp: i64, format: RenderFormat) -> String {
    format!("{}-{}-{}.{}", prefix, index, timestamp, format.extension())
}

// ============================================================================
// RENDERING
// ============================================================================

fn render_one(
    input: &Path,
    output: &Path,
    transform: &PixelTransform,
    source: &PixelSource,
    settings: &GradeSettings,
) -> Result<()> {
    let buffer = source.decode_file(input)?;
    let graded = transfer::apply(transform, &buffer)?;
    let bytes = encode(&graded, settings.output_format, settings.jpeg_quality)?;

    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(output, bytes)?;
    Ok(())
}

/// Render `transform` onto every target
///
/// Items keep the order of `targets`. Output goes to `settings.output_dir`,
/// or the current directory when unset.
pub fn render_batch(
    targets: &[PathBuf],
    transform: &PixelTransform,
    source: &PixelSource,
    settings: &GradeSettings,
) -> BatchReport {
    let start = Instant::now();
    let timestamp = chrono::Utc::now().timestamp_millis();
    let out_dir = PathBuf::from(settings.output_dir.as_deref().unwrap_or("."));

    let render = |(i, input): (usize, &PathBuf)| {
        let output = out_dir.join(output_name(&settings.file_prefix, i + 1, timestamp, settings.output_format));
        match render_one(input, &output, transform, source, settings) {
            Ok(()) => {
                debug!(input = %input.display(), output = %output.display(), "rendered");
                BatchItem { input: input.clone(), output: Some(output), error: None }
            }
            Err(e) => {
                warn!(input = %input.display(), error = %e, "target failed");
                BatchItem { input: input.clone(), output: None, error: Some(e) }
            }
        }
    };

    let items: Vec<BatchItem> = if settings.parallel {
        targets.par_iter().enumerate().map(render).collect()
    } else {
        targets.iter().enumerate().map(render).collect()
    };

    let succeeded = items.iter().filter(|item| item.is_ok()).count();
    let failed = items.len() - succeeded;
    info!(succeeded, failed, "batch complete");

    BatchReport {
        timestamp,
        succeeded,
        failed,
        items,
        elapsed_ms: start.elapsed().as_millis() as u64,
    }
}

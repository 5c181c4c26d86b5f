pub mod adjustments;
pub mod analyzer;
pub mod batch;
pub mod buffer;
pub mod config;
pub mod downsampler;
pub mod error;
pub mod exporter;
pub mod mapper;
pub mod session;
pub mod source;
pub mod transfer;

use std::path::PathBuf;

pub use adjustments::{AdjustmentKey, AdjustmentVector, Intensity, SelectionMask};
pub use analyzer::{ImageFingerprint, QuantizedColor};
pub use batch::{BatchItem, BatchReport};
pub use buffer::PixelBuffer;
pub use config::{GradeSettings, RenderFormat};
pub use error::{GradeError, Result};
pub use exporter::{PresetExporter, PresetFormat};
pub use session::{GradeSession, ReferenceSession};
pub use source::{PixelSource, RawDecoder};
pub use transfer::PixelTransform;

/// Downsample and analyze a decoded image
pub fn fingerprint(buffer: &PixelBuffer, max_dimension: u32) -> Result<ImageFingerprint> {
    let working = downsampler::downsample(buffer, max_dimension)?;
    Ok(analyzer::analyze(&working))
}

// Async entry points for callers running on a tokio runtime

pub async fn analyze_reference_async(
    path: PathBuf,
    source: PixelSource,
    settings: GradeSettings,
) -> Result<ReferenceSession> {
    tokio::task::spawn_blocking(move || {
        ReferenceSession::analyze_file(&source, &path, &settings)
    })
    .await
    .map_err(|e| GradeError::Processing(format!("Task join error: {}", e)))?
}

pub async fn render_batch_async(
    targets: Vec<PathBuf>,
    transform: PixelTransform,
    source: PixelSource,
    settings: GradeSettings,
) -> Result<BatchReport> {
    tokio::task::spawn_blocking(move || {
        batch::render_batch(&targets, &transform, &source, &settings)
    })
    .await
    .map_err(|e| GradeError::Processing(format!("Task join error: {}", e)))
}

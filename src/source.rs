//! Image decoding into [`PixelBuffer`]s.
//!
//! Standard raster formats (PNG, JPEG, WebP, ...) are decoded with the `image`
//! crate. Camera raw files are recognised by extension and forwarded to an
//! external [`RawDecoder`]; without one they fail with a decode error.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;
use crate::buffer::PixelBuffer;
use crate::error::{Result, GradeError};

/// Camera raw extensions routed to the external raw decoder
pub const RAW_EXTENSIONS: [&str; 13] = [
    "cr2", "cr3", "nef", "nrw", "arw", "srf", "sr2", "orf", "raf", "dng", "rw2", "pef", "ptx",
];

/// External collaborator that develops camera raw files to RGBA
pub trait RawDecoder: Send + Sync {
    fn decode_raw(&self, bytes: &[u8], extension: &str) -> Result<PixelBuffer>;
}

/// Check whether a path names a camera raw file (case-insensitive)
pub fn is_raw_extension(path: &Path) -> bool {
    raw_extension(path).is_some()
}

fn raw_extension(path: &Path) -> Option<String> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    RAW_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}

/// Decode raster image bytes into an RGBA buffer
pub fn decode_bytes(bytes: &[u8]) -> Result<PixelBuffer> {
    let img = image::load_from_memory(bytes)
        .map_err(|e| GradeError::Decode(format!("Failed to decode image: {}", e)))?;
    let rgba = img.to_rgba8();
    debug!(width = rgba.width(), height = rgba.height(), "decoded raster image");
    PixelBuffer::try_from(rgba)
}

/// Decoder front end holding the optional raw collaborator
#[derive(Clone, Default)]
pub struct PixelSource {
    raw_decoder: Option<Arc<dyn RawDecoder>>,
}

impl PixelSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_raw_decoder(decoder: Arc<dyn RawDecoder>) -> Self {
        Self { raw_decoder: Some(decoder) }
    }

    /// Decode bytes, using the file name only to detect raw formats
    pub fn decode(&self, bytes: &[u8], name: &Path) -> Result<PixelBuffer> {
        match raw_extension(name) {
            Some(ext) => match &self.raw_decoder {
                Some(decoder) => {
                    debug!(file = %name.display(), "forwarding to raw decoder");
                    decoder.decode_raw(bytes, &ext)
                }
                None => Err(GradeError::Decode(format!(
                    "No raw decoder configured for {}",
                    name.display()
                ))),
            },
            None => decode_bytes(bytes),
        }
    }

    /// Read and decode a file from disk
    pub fn decode_file(&self, path: &Path) -> Result<PixelBuffer> {
        let bytes = std::fs::read(path)
            .map_err(|e| GradeError::Decode(format!("Failed to read {}: {}", path.display(), e)))?;
        self.decode(&bytes, path)
            .map_err(|e| match e {
                GradeError::Decode(msg) => GradeError::Decode(format!("{}: {}", path.display(), msg)),
                other => other,
            })
    }

    /// Decode on the blocking pool so async callers are never stalled
    pub async fn decode_async(&self, path: PathBuf) -> Result<PixelBuffer> {
        let source = self.clone();
        tokio::task::spawn_blocking(move || source.decode_file(&path))
            .await
            .map_err(|e| GradeError::Processing(format!("Task join error: {}", e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn png_bytes(img: &RgbaImage) -> Vec<u8> {
        let mut cursor = std::io::Cursor::new(Vec::new());
        img.write_to(&mut cursor, image::ImageFormat::Png).unwrap();
        cursor.into_inner()
    }

    struct GrayRaw;

    impl RawDecoder for GrayRaw {
        fn decode_raw(&self, _bytes: &[u8], _extension: &str) -> Result<PixelBuffer> {
            PixelBuffer::filled(2, 2, [90, 90, 90, 255])
        }
    }

    #[test]
    fn test_raw_extension_detection() {
        assert!(is_raw_extension(Path::new("shot.CR2")));
        assert!(is_raw_extension(Path::new("dir/frame.dng")));
        assert!(!is_raw_extension(Path::new("photo.jpg")));
        assert!(!is_raw_extension(Path::new("noext")));
    }

    #[test]
    fn test_decode_png() {
        let img = RgbaImage::from_pixel(3, 2, Rgba([200, 100, 50, 255]));
        let buf = decode_bytes(&png_bytes(&img)).unwrap();
        assert_eq!(buf.dimensions(), (3, 2));
        assert_eq!(&buf.samples()[..4], &[200, 100, 50, 255]);
    }

    #[test]
    fn test_corrupt_bytes_are_decode_errors() {
        let result = decode_bytes(b"definitely not an image");
        assert!(matches!(result, Err(GradeError::Decode(_))));
    }

    #[test]
    fn test_raw_without_decoder_fails() {
        let source = PixelSource::new();
        let result = source.decode(b"raw", Path::new("a.nef"));
        assert!(matches!(result, Err(GradeError::Decode(_))));
    }

    #[test]
    fn test_raw_forwarded_to_decoder() {
        let source = PixelSource::with_raw_decoder(Arc::new(GrayRaw));
        let buf = source.decode(b"raw", Path::new("a.ARW")).unwrap();
        assert_eq!(buf.dimensions(), (2, 2));
    }

    #[tokio::test]
    async fn test_decode_async_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("img.png");
        RgbaImage::from_pixel(4, 4, Rgba([1, 2, 3, 255])).save(&path).unwrap();

        let buf = PixelSource::new().decode_async(path).await.unwrap();
        assert_eq!(buf.dimensions(), (4, 4));
    }

    #[tokio::test]
    async fn test_decode_async_missing_file() {
        let result = PixelSource::new().decode_async(PathBuf::from("/nonexistent/x.png")).await;
        assert!(matches!(result, Err(GradeError::Decode(_))));
    }
}

//! Session State
//!
//! Interactive state kept explicit so the core stays stateless:
//! - **Reference session** - fingerprint and derived reference vector for one
//!   reference image, immutable once built
//! - **Grade session** - working vector, selection, intensity and target list
//!   for one export session, reset-able back to the reference
//!
//! Grade sessions persist as pretty JSON.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;
use crate::adjustments::{AdjustmentKey, AdjustmentVector, Intensity, SelectionMask};
use crate::analyzer::{self, ImageFingerprint};
use crate::buffer::PixelBuffer;
use crate::config::GradeSettings;
use crate::downsampler;
use crate::error::{Result, GradeError};
use crate::exporter::{PresetExporter, PresetFormat};
use crate::mapper;
use crate::source::PixelSource;
use crate::transfer::{self, PixelTransform};

// ============================================================================
// REFERENCE
// ============================================================================

/// Measurements of one reference image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceSession {
    /// SHA-256 of the source file bytes
    pub source_hash: String,
    pub fingerprint: ImageFingerprint,
    /// Adjustments derived from the fingerprint
    pub reference: AdjustmentVector,
    /// Creation timestamp (ISO 8601)
    pub created: String,
}

impl ReferenceSession {
    /// Measure an already-decoded buffer
    pub fn from_buffer(buffer: &PixelBuffer, source_hash: String, settings: &GradeSettings) -> Result<Self> {
        let working = downsampler::downsample(buffer, settings.analysis_max_dimension)?;
        let fingerprint = analyzer::analyze(&working);
        let reference = mapper::to_adjustments(&fingerprint);

        Ok(Self {
            source_hash,
            fingerprint,
            reference,
            created: now_iso(),
        })
    }

    /// Decode, downsample, analyze and map a reference image
    pub fn analyze(source: &PixelSource, bytes: &[u8], name: &Path, settings: &GradeSettings) -> Result<Self> {
        let buffer = source.decode(bytes, name)?;
        let session = Self::from_buffer(&buffer, hash_bytes(bytes), settings)?;
        info!(
            file = %name.display(),
            brightness = session.fingerprint.brightness,
            contrast = session.fingerprint.contrast,
            saturation = session.fingerprint.saturation,
            "analyzed reference"
        );
        Ok(session)
    }

    /// Read errors surface as decode failures, like any other unusable source
    pub fn analyze_file(source: &PixelSource, path: &Path, settings: &GradeSettings) -> Result<Self> {
        let bytes = fs::read(path)
            .map_err(|e| GradeError::Decode(format!("Failed to read {}: {}", path.display(), e)))?;
        Self::analyze(source, &bytes, path, settings)
    }
}

// ============================================================================
// GRADE SESSION
// ============================================================================

/// Per-export-session editable state
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeSession {
    pub reference: ReferenceSession,
    /// User-edited values, starts as the reference vector
    pub working: AdjustmentVector,
    pub selection: SelectionMask,
    pub intensity: Intensity,
    /// Images the grade will be rendered onto
    pub targets: Vec<PathBuf>,
}

impl GradeSession {
    /// Start a session with nothing selected and the reference as working vector
    pub fn new(reference: ReferenceSession, settings: &GradeSettings) -> Result<Self> {
        let intensity = Intensity::new(settings.default_intensity)?;
        Ok(Self {
            working: reference.reference,
            reference,
            selection: SelectionMask::empty(),
            intensity,
            targets: Vec::new(),
        })
    }

    pub fn set_adjustment(&mut self, key: AdjustmentKey, value: f32) {
        self.working.set(key, value);
    }

    pub fn set_intensity(&mut self, percent: f32) -> Result<()> {
        self.intensity = Intensity::new(percent)?;
        Ok(())
    }

    /// Restore one key to its reference value
    pub fn reset_adjustment(&mut self, key: AdjustmentKey) {
        self.working.set(key, self.reference.reference.get(key));
    }

    /// Restore every key and the intensity
    pub fn reset_all(&mut self) {
        self.working = self.reference.reference;
        self.intensity = Intensity::default();
    }

    pub fn add_targets<I: IntoIterator<Item = PathBuf>>(&mut self, paths: I) {
        self.targets.extend(paths);
    }

    pub fn clear_targets(&mut self) {
        self.targets.clear();
    }

    /// Transform for the current working state
    pub fn build_transform(&self) -> Result<PixelTransform> {
        transfer::build_transform(&self.working, &self.selection, self.intensity.percent())
    }

    pub fn export_preset(&self, exporter: &PresetExporter, format: PresetFormat) -> Result<String> {
        exporter.export(&self.working, &self.selection, format)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Load a saved session, rejecting adjustment values outside [-100, 100]
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let session: GradeSession = serde_json::from_str(&content)?;
        session.reference.reference.validate()?;
        session.working.validate()?;
        Ok(session)
    }
}

// ============================================================================
// UTILITY FUNCTIONS
// ============================================================================

/// Calculate SHA-256 hash of image bytes
pub fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// Get current timestamp as ISO 8601 string
pub fn now_iso() -> String {
    chrono::Utc::now().to_rfc3339()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn reference() -> ReferenceSession {
        let px: Vec<[u8; 4]> = (0..64 * 64)
            .map(|i: u32| [(i % 64 * 4) as u8, 90, (255 - i / 64 * 4) as u8, 255])
            .collect();
        let buffer = PixelBuffer::from_pixels(64, 64, &px).unwrap();
        ReferenceSession::from_buffer(&buffer, hash_bytes(b"ref"), &GradeSettings::default()).unwrap()
    }

    #[test]
    fn test_new_session_starts_from_reference() {
        let reference = reference();
        let session = GradeSession::new(reference.clone(), &GradeSettings::default()).unwrap();
        assert_eq!(session.working, reference.reference);
        assert!(session.selection.is_empty());
        assert_eq!(session.intensity.percent(), 100.0);
    }

    #[test]
    fn test_reset_adjustment_and_all() {
        let mut session = GradeSession::new(reference(), &GradeSettings::default()).unwrap();
        let original = session.working;

        session.set_adjustment(AdjustmentKey::Tint, 42.0);
        session.set_adjustment(AdjustmentKey::Clarity, -42.0);
        session.set_intensity(150.0).unwrap();

        session.reset_adjustment(AdjustmentKey::Tint);
        assert_eq!(session.working.tint, original.tint);
        assert_eq!(session.working.clarity, -42.0);

        session.reset_all();
        assert_eq!(session.working, original);
        assert_eq!(session.intensity.percent(), 100.0);
    }

    #[test]
    fn test_set_intensity_validates() {
        let mut session = GradeSession::new(reference(), &GradeSettings::default()).unwrap();
        assert!(session.set_intensity(201.0).is_err());
        assert_eq!(session.intensity.percent(), 100.0);
    }

    #[test]
    fn test_empty_selection_builds_identity() {
        let session = GradeSession::new(reference(), &GradeSettings::default()).unwrap();
        assert!(session.build_transform().unwrap().is_identity());
    }

    #[test]
    fn test_targets() {
        let mut session = GradeSession::new(reference(), &GradeSettings::default()).unwrap();
        session.add_targets([PathBuf::from("a.jpg"), PathBuf::from("b.png")]);
        assert_eq!(session.targets.len(), 2);
        session.clear_targets();
        assert!(session.targets.is_empty());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("session.json");

        let mut session = GradeSession::new(reference(), &GradeSettings::default()).unwrap();
        session.selection.insert(AdjustmentKey::Contrast);
        session.set_adjustment(AdjustmentKey::Contrast, 12.0);
        session.save(&path).unwrap();

        let loaded = GradeSession::load(&path).unwrap();
        assert_eq!(loaded.working, session.working);
        assert_eq!(loaded.selection, session.selection);
        assert_eq!(loaded.reference, session.reference);
    }

    #[test]
    fn test_load_rejects_out_of_range_working_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        let mut session = GradeSession::new(reference(), &GradeSettings::default()).unwrap();
        session.set_adjustment(AdjustmentKey::Saturation, 500.0);
        session.save(&path).unwrap();

        assert!(matches!(GradeSession::load(&path), Err(GradeError::InvalidParameter(_))));
    }

    #[test]
    fn test_missing_reference_is_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope").join("ref.png");

        let result = ReferenceSession::analyze_file(&PixelSource::new(), &missing, &GradeSettings::default());
        assert!(matches!(result, Err(GradeError::Decode(_))));
    }

    #[test]
    fn test_export_preset_uses_working_values() {
        let mut session = GradeSession::new(reference(), &GradeSettings::default()).unwrap();
        session.selection.insert(AdjustmentKey::Saturation);
        session.set_adjustment(AdjustmentKey::Saturation, -17.0);

        let xmp = session
            .export_preset(&PresetExporter::new("t"), PresetFormat::EditorMetadata)
            .unwrap();
        assert!(xmp.contains("crs:Saturation=\"-17\""));
    }

    #[test]
    fn test_hash_bytes() {
        let hash1 = hash_bytes(b"hello");
        let hash2 = hash_bytes(b"hello");
        let hash3 = hash_bytes(b"world");

        assert_eq!(hash1, hash2);
        assert_ne!(hash1, hash3);
        assert_eq!(hash1.len(), 64); // SHA-256 produces 64 hex chars
    }
}

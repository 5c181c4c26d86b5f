//! Settings shared by the analysis, render and batch stages.
//!
//! Loaded from JSON; any field left out takes its default.

use serde::{Deserialize, Serialize};
use std::path::Path;
use crate::adjustments::{INTENSITY_MAX, INTENSITY_MIN};
use crate::downsampler::DEFAULT_MAX_DIMENSION;
use crate::error::{Result, GradeError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RenderFormat {
    #[default]
    Png,
    Jpeg,
}

impl RenderFormat {
    pub fn extension(self) -> &'static str {
        match self {
            RenderFormat::Png => "png",
            RenderFormat::Jpeg => "jpg",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GradeSettings {
    /// Longer side of the analysis copy (default: 256)
    pub analysis_max_dimension: u32,
    /// Intensity percent for new grade sessions (default: 100)
    pub default_intensity: f32,
    /// Directory for rendered images; current directory when unset
    pub output_dir: Option<String>,
    /// Prefix of rendered file names (default: "clonegrade")
    pub file_prefix: String,
    /// Encoding for rendered images (default: png)
    pub output_format: RenderFormat,
    /// JPEG quality 1-100 (default: 92)
    pub jpeg_quality: u8,
    /// Render batch items on the rayon pool (default: true)
    pub parallel: bool,
}

impl Default for GradeSettings {
    fn default() -> Self {
        Self {
            analysis_max_dimension: DEFAULT_MAX_DIMENSION,
            default_intensity: 100.0,
            output_dir: None,
            file_prefix: "clonegrade".to_string(),
            output_format: RenderFormat::Png,
            jpeg_quality: 92,
            parallel: true,
        }
    }
}

impl GradeSettings {
    /// Read settings from a JSON file and validate them
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let settings: GradeSettings = serde_json::from_str(&content)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.analysis_max_dimension == 0 {
            return Err(GradeError::InvalidParameter(
                "analysis_max_dimension must be positive".to_string(),
            ));
        }
        if !(INTENSITY_MIN..=INTENSITY_MAX).contains(&self.default_intensity) {
            return Err(GradeError::InvalidParameter(format!(
                "default_intensity {} outside [{}, {}]",
                self.default_intensity, INTENSITY_MIN, INTENSITY_MAX
            )));
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(GradeError::InvalidParameter(format!(
                "jpeg_quality {} outside [1, 100]",
                self.jpeg_quality
            )));
        }
        if self.file_prefix.is_empty() || self.file_prefix.contains(['/', '\\', ':']) {
            return Err(GradeError::InvalidParameter(format!(
                "file_prefix {:?} is not a plain file name",
                self.file_prefix
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = GradeSettings::default();
        assert_eq!(settings.analysis_max_dimension, 256);
        assert_eq!(settings.default_intensity, 100.0);
        assert_eq!(settings.output_format, RenderFormat::Png);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let settings: GradeSettings =
            serde_json::from_str(r#"{"output_format": "jpeg", "jpeg_quality": 80}"#).unwrap();
        assert_eq!(settings.output_format, RenderFormat::Jpeg);
        assert_eq!(settings.jpeg_quality, 80);
        assert_eq!(settings.file_prefix, "clonegrade");
    }

    #[test]
    fn test_validation() {
        let mut settings = GradeSettings::default();
        settings.default_intensity = 250.0;
        assert!(settings.validate().is_err());

        let mut settings = GradeSettings::default();
        settings.analysis_max_dimension = 0;
        assert!(settings.validate().is_err());

        let mut settings = GradeSettings::default();
        settings.file_prefix = "../out".to_string();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"analysis_max_dimension": 128, "parallel": false}"#).unwrap();

        let settings = GradeSettings::load(&path).unwrap();
        assert_eq!(settings.analysis_max_dimension, 128);
        assert!(!settings.parallel);

        std::fs::write(&path, r#"{"jpeg_quality": 0}"#).unwrap();
        assert!(GradeSettings::load(&path).is_err());
    }
}

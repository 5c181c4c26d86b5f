//! Preset Export
//!
//! Serializes the selected part of an adjustment vector into portable text:
//! - **Editor metadata** - XMP fragment with camera-raw-settings fields
//! - **LUT** - `.cube` header and parameter comments around a two-row anchor
//!   table. This is a placeholder, not a usable 3D LUT.
//! - **Cube grid** - full 33x33x33 `.cube` lattice sampled from the per-pixel
//!   stages of the grade. Clarity is spatial and cannot be baked into a LUT.
//!
//! Presets are write-only; nothing here parses them back.

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::Writer;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::io::Cursor;
use std::str::FromStr;
use crate::adjustments::{AdjustmentKey, AdjustmentVector, SelectionMask, ADJUSTMENT_MAX, ADJUSTMENT_MIN};
use crate::error::{Result, GradeError};
use crate::transfer::build_transform;

/// Lattice size written in every `.cube` header
pub const LUT_SIZE: usize = 33;

const XMP_META_NS: &str = "adobe:ns:meta/";
const RDF_NS: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";
const CRS_NS: &str = "http://ns.adobe.com/camera-raw-settings/1.0/";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PresetFormat {
    EditorMetadata,
    Lut,
    CubeGrid,
}

impl PresetFormat {
    pub fn extension(self) -> &'static str {
        match self {
            PresetFormat::EditorMetadata => "xmp",
            PresetFormat::Lut | PresetFormat::CubeGrid => "cube",
        }
    }
}

impl FromStr for PresetFormat {
    type Err = GradeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "xmp" | "editor-metadata" => Ok(PresetFormat::EditorMetadata),
            "cube" | "lut" => Ok(PresetFormat::Lut),
            "cube-grid" | "grid" => Ok(PresetFormat::CubeGrid),
            other => Err(GradeError::InvalidParameter(format!("Unknown preset format: {}", other))),
        }
    }
}

/// XMP attribute for each key
fn xmp_field(key: AdjustmentKey) -> &'static str {
    match key {
        AdjustmentKey::Highlights => "crs:Highlights2012",
        AdjustmentKey::Shadows => "crs:Shadows2012",
        AdjustmentKey::Contrast => "crs:Contrast2012",
        AdjustmentKey::Saturation => "crs:Saturation",
        AdjustmentKey::Temperature => "crs:Temperature",
        AdjustmentKey::Tint => "crs:Tint",
        AdjustmentKey::Vibrance => "crs:Vibrance",
        AdjustmentKey::Clarity => "crs:Clarity2012",
    }
}

/// Human label used in `.cube` comments
fn label(key: AdjustmentKey) -> &'static str {
    match key {
        AdjustmentKey::Highlights => "Highlights",
        AdjustmentKey::Shadows => "Shadows",
        AdjustmentKey::Contrast => "Contrast",
        AdjustmentKey::Saturation => "Saturation",
        AdjustmentKey::Temperature => "Temperature",
        AdjustmentKey::Tint => "Tint",
        AdjustmentKey::Vibrance => "Vibrance",
        AdjustmentKey::Clarity => "Clarity",
    }
}

/// Render a value as a camera-raw integer field in [-100, 100]
fn integer_field(key: AdjustmentKey, value: f32) -> Result<String> {
    if !value.is_finite() || value.fract() != 0.0 || !(ADJUSTMENT_MIN..=ADJUSTMENT_MAX).contains(&value) {
        return Err(GradeError::Serialization(format!(
            "{} value {} is not an integer in [{}, {}]",
            key, value, ADJUSTMENT_MIN, ADJUSTMENT_MAX
        )));
    }
    Ok(format!("{}", value as i64))
}

fn xml_error<E: std::fmt::Display>(e: E) -> GradeError {
    GradeError::Serialization(format!("XML write failed: {}", e))
}

/// Writes presets under a fixed `.cube` title
#[derive(Debug, Clone)]
pub struct PresetExporter {
    title: String,
}

impl Default for PresetExporter {
    fn default() -> Self {
        Self::new(format!("CloneGrade_{}", chrono::Utc::now().timestamp_millis()))
    }
}

impl PresetExporter {
    pub fn new(title: impl Into<String>) -> Self {
        Self { title: title.into() }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Serialize the keys present in `mask`
    pub fn export(&self, vector: &AdjustmentVector, mask: &SelectionMask, format: PresetFormat) -> Result<String> {
        match format {
            PresetFormat::EditorMetadata => editor_metadata(vector, mask),
            PresetFormat::Lut => Ok(self.lut_stub(vector, mask)),
            PresetFormat::CubeGrid => self.cube_grid(vector, mask),
        }
    }

    fn cube_header(&self, out: &mut String) {
        let _ = writeln!(out, "# CloneGrade LUT Export");
        let _ = writeln!(out, "TITLE \"{}\"", self.title);
        let _ = writeln!(out, "LUT_3D_SIZE {}", LUT_SIZE);
        out.push('\n');
    }

    fn lut_stub(&self, vector: &AdjustmentVector, mask: &SelectionMask) -> String {
        let mut out = String::new();
        self.cube_header(&mut out);

        let _ = writeln!(out, "# Generated adjustments:");
        for key in [AdjustmentKey::Contrast, AdjustmentKey::Saturation, AdjustmentKey::Highlights] {
            if mask.contains(key) {
                let _ = writeln!(out, "# {}: {}", label(key), vector.get(key));
            }
        }
        let _ = writeln!(out, "# Placeholder anchors only; use cube-grid for a working LUT");
        out.push('\n');

        out.push_str("0.0 0.0 0.0\n");
        out.push_str("1.0 1.0 1.0\n");
        out
    }

    fn cube_grid(&self, vector: &AdjustmentVector, mask: &SelectionMask) -> Result<String> {
        let transform = build_transform(vector, mask, 100.0)?;

        let mut out = String::with_capacity(LUT_SIZE * LUT_SIZE * LUT_SIZE * 28);
        self.cube_header(&mut out);

        let _ = writeln!(out, "# Generated adjustments:");
        for key in mask.iter() {
            let _ = writeln!(out, "# {}: {}", label(key), vector.get(key));
        }
        if mask.contains(AdjustmentKey::Clarity) {
            let _ = writeln!(out, "# Clarity is spatial and not baked into this table");
        }
        out.push('\n');

        let step = 255.0 / (LUT_SIZE - 1) as f32;
        // Red varies fastest
        for b in 0..LUT_SIZE {
            for g in 0..LUT_SIZE {
                for r in 0..LUT_SIZE {
                    let [ro, go, bo] = transform.grade_rgb([r as f32 * step, g as f32 * step, b as f32 * step]);
                    let _ = writeln!(out, "{:.6} {:.6} {:.6}", ro / 255.0, go / 255.0, bo / 255.0);
                }
            }
        }

        Ok(out)
    }
}

/// XMP fragment with one camera-raw field per selected key
fn editor_metadata(vector: &AdjustmentVector, mask: &SelectionMask) -> Result<String> {
    let mut fields = Vec::with_capacity(mask.len());
    for key in AdjustmentKey::ALL {
        if mask.contains(key) {
            fields.push((xmp_field(key), integer_field(key, vector.get(key))?));
        }
    }

    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);

    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(xml_error)?;

    let mut meta = BytesStart::new("x:xmpmeta");
    meta.push_attribute(("xmlns:x", XMP_META_NS));
    writer.write_event(Event::Start(meta)).map_err(xml_error)?;

    let mut rdf = BytesStart::new("rdf:RDF");
    rdf.push_attribute(("xmlns:rdf", RDF_NS));
    writer.write_event(Event::Start(rdf)).map_err(xml_error)?;

    let mut description = BytesStart::new("rdf:Description");
    description.push_attribute(("rdf:about", ""));
    description.push_attribute(("xmlns:crs", CRS_NS));
    for (name, value) in &fields {
        description.push_attribute((*name, value.as_str()));
    }
    writer.write_event(Event::Empty(description)).map_err(xml_error)?;

    writer.write_event(Event::End(BytesEnd::new("rdf:RDF"))).map_err(xml_error)?;
    writer.write_event(Event::End(BytesEnd::new("x:xmpmeta"))).map_err(xml_error)?;

    String::from_utf8(writer.into_inner().into_inner())
        .map_err(|e| GradeError::Serialization(format!("XMP is not UTF-8: {}", e)))
}

/// Export with a timestamped title
pub fn export(vector: &AdjustmentVector, mask: &SelectionMask, format: PresetFormat) -> Result<String> {
    PresetExporter::default().export(vector, mask, format)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_vector() -> AdjustmentVector {
        AdjustmentVector {
            highlights: 65.0,
            shadows: -45.0,
            contrast: 30.0,
            saturation: 25.0,
            temperature: 15.0,
            tint: -5.0,
            vibrance: 40.0,
            clarity: 20.0,
        }
    }

    fn mask(keys: &[AdjustmentKey]) -> SelectionMask {
        keys.iter().copied().collect()
    }

    #[test]
    fn test_xmp_only_selected_fields() {
        let m = mask(&[AdjustmentKey::Contrast, AdjustmentKey::Saturation]);
        let xmp = export(&sample_vector(), &m, PresetFormat::EditorMetadata).unwrap();

        assert!(xmp.contains("crs:Contrast2012=\"30\""));
        assert!(xmp.contains("crs:Saturation=\"25\""));
        assert!(!xmp.contains("Highlights"));
        assert!(!xmp.contains("Vibrance"));
        assert!(xmp.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(xmp.contains("<x:xmpmeta xmlns:x=\"adobe:ns:meta/\">"));
    }

    #[test]
    fn test_xmp_all_fields_signed_integers() {
        let xmp = export(&sample_vector(), &SelectionMask::all(), PresetFormat::EditorMetadata).unwrap();
        assert!(xmp.contains("crs:Highlights2012=\"65\""));
        assert!(xmp.contains("crs:Shadows2012=\"-45\""));
        assert!(xmp.contains("crs:Tint=\"-5\""));
        assert!(xmp.contains("crs:Clarity2012=\"20\""));
    }

    #[test]
    fn test_xmp_rejects_non_finite() {
        let v = sample_vector().with(AdjustmentKey::Contrast, f32::INFINITY);
        let result = export(&v, &mask(&[AdjustmentKey::Contrast]), PresetFormat::EditorMetadata);
        assert!(matches!(result, Err(GradeError::Serialization(_))));

        // Unselected non-finite values are never emitted
        assert!(export(&v, &mask(&[AdjustmentKey::Tint]), PresetFormat::EditorMetadata).is_ok());
    }

    #[test]
    fn test_xmp_rejects_fractional_and_out_of_range() {
        let m = mask(&[AdjustmentKey::Contrast, AdjustmentKey::Saturation]);

        let fractional = sample_vector().with(AdjustmentKey::Contrast, 12.5);
        let result = export(&fractional, &m, PresetFormat::EditorMetadata);
        assert!(matches!(result, Err(GradeError::Serialization(_))));

        let too_large = sample_vector().with(AdjustmentKey::Saturation, 500.0);
        let result = export(&too_large, &m, PresetFormat::EditorMetadata);
        assert!(matches!(result, Err(GradeError::Serialization(_))));

        let edges = sample_vector()
            .with(AdjustmentKey::Contrast, -100.0)
            .with(AdjustmentKey::Saturation, 100.0);
        let xmp = export(&edges, &m, PresetFormat::EditorMetadata).unwrap();
        assert!(xmp.contains("crs:Contrast2012=\"-100\""));
        assert!(xmp.contains("crs:Saturation=\"100\""));
    }

    #[test]
    fn test_lut_stub_layout() {
        let exporter = PresetExporter::new("CloneGrade_1");
        let m = mask(&[AdjustmentKey::Contrast, AdjustmentKey::Highlights, AdjustmentKey::Tint]);
        let cube = exporter.export(&sample_vector(), &m, PresetFormat::Lut).unwrap();

        assert!(cube.contains("TITLE \"CloneGrade_1\"\n"));
        assert!(cube.contains("LUT_3D_SIZE 33\n"));
        assert!(cube.contains("# Contrast: 30\n"));
        assert!(cube.contains("# Highlights: 65\n"));
        assert!(!cube.contains("# Saturation"));
        assert!(cube.ends_with("0.0 0.0 0.0\n1.0 1.0 1.0\n"));
    }

    #[test]
    fn test_cube_grid_identity_for_empty_mask() {
        let exporter = PresetExporter::new("grid");
        let cube = exporter.export(&sample_vector(), &SelectionMask::empty(), PresetFormat::CubeGrid).unwrap();

        let rows: Vec<&str> = cube
            .lines()
            .filter(|l| l.starts_with(|c: char| c.is_ascii_digit()))
            .collect();
        assert_eq!(rows.len(), LUT_SIZE * LUT_SIZE * LUT_SIZE);
        assert_eq!(rows[0], "0.000000 0.000000 0.000000");
        assert_eq!(rows[1], "0.031250 0.000000 0.000000");
        assert_eq!(*rows.last().unwrap(), "1.000000 1.000000 1.000000");
    }

    #[test]
    fn test_cube_grid_reflects_contrast() {
        let exporter = PresetExporter::new("grid");
        let v = AdjustmentVector::default().with(AdjustmentKey::Contrast, 100.0);
        let cube = exporter
            .export(&v, &mask(&[AdjustmentKey::Contrast, AdjustmentKey::Clarity]), PresetFormat::CubeGrid)
            .unwrap();

        assert!(cube.contains("# Contrast: 100\n"));
        assert!(cube.contains("# Clarity is spatial"));
        let first = cube.lines().find(|l| l.starts_with(|c: char| c.is_ascii_digit())).unwrap();
        // Black is pushed below zero then clamped
        assert_eq!(first, "0.000000 0.000000 0.000000");
    }

    #[test]
    fn test_cube_grid_rejects_out_of_range() {
        let v = sample_vector().with(AdjustmentKey::Contrast, 140.0);
        let result = PresetExporter::new("x").export(&v, &SelectionMask::all(), PresetFormat::CubeGrid);
        assert!(matches!(result, Err(GradeError::InvalidParameter(_))));
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("xmp".parse::<PresetFormat>().unwrap(), PresetFormat::EditorMetadata);
        assert_eq!("LUT".parse::<PresetFormat>().unwrap(), PresetFormat::Lut);
        assert_eq!("cube-grid".parse::<PresetFormat>().unwrap(), PresetFormat::CubeGrid);
        assert!("dng".parse::<PresetFormat>().is_err());
        assert_eq!(PresetFormat::CubeGrid.extension(), "cube");
    }
}

//! Fingerprint to adjustment mapping.
//!
//! Each parameter is derived from how far the reference sits from a neutral
//! baseline (brightness 50, contrast 25, saturation 50, achromatic palette).
//! The palette's CIELAB a*/b* means drive tint and temperature.

use palette::{IntoColor, Lab, Srgb};
use serde::{Deserialize, Serialize};
use crate::adjustments::{AdjustmentVector, ADJUSTMENT_MAX, ADJUSTMENT_MIN};
use crate::analyzer::{ImageFingerprint, QuantizedColor};

/// Neutral point the reference is measured against
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingBaseline {
    pub brightness: f32,
    pub contrast: f32,
    pub saturation: f32,
}

impl Default for MappingBaseline {
    fn default() -> Self {
        Self {
            brightness: 50.0,
            contrast: 25.0,
            saturation: 50.0,
        }
    }
}

// Gains from baseline deltas to adjustment units
const TONE_GAIN: f32 = 1.2;
const TONE_CONTRAST_SPLIT: f32 = 0.6;
const CONTRAST_GAIN: f32 = 2.0;
const SATURATION_GAIN: f32 = 1.0;
const VIBRANCE_SATURATION_GAIN: f32 = 0.6;
const VIBRANCE_CHROMA_GAIN: f32 = 0.5;
const CLARITY_GAIN: f32 = 0.8;
const TEMPERATURE_GAIN: f32 = 1.5;
const TINT_GAIN: f32 = 1.5;

/// Rank-weighted mean of the palette in CIELAB: (a*, b*, chroma)
fn palette_lab_means(colors: &[QuantizedColor]) -> (f32, f32, f32) {
    if colors.is_empty() {
        return (0.0, 0.0, 0.0);
    }

    let n = colors.len();
    let mut sum_a = 0.0f32;
    let mut sum_b = 0.0f32;
    let mut sum_chroma = 0.0f32;
    let mut total_weight = 0.0f32;

    for (rank, color) in colors.iter().enumerate() {
        // Most frequent color weighs most
        let weight = (n - rank) as f32;
        let [r, g, b] = color.to_rgb8();
        let lab: Lab = Srgb::new(r, g, b).into_format::<f32>().into_color();

        sum_a += lab.a * weight;
        sum_b += lab.b * weight;
        sum_chroma += (lab.a * lab.a + lab.b * lab.b).sqrt() * weight;
        total_weight += weight;
    }

    (sum_a / total_weight, sum_b / total_weight, sum_chroma / total_weight)
}

/// Round to a whole adjustment unit inside [-100, 100]
fn finish(value: f32) -> f32 {
    // Adding 0.0 folds -0.0 into 0.0
    value.round().clamp(ADJUSTMENT_MIN, ADJUSTMENT_MAX) + 0.0
}

/// Derive the reference adjustment vector using the default baseline
pub fn to_adjustments(fingerprint: &ImageFingerprint) -> AdjustmentVector {
    to_adjustments_with(fingerprint, &MappingBaseline::default())
}

/// Derive the reference adjustment vector from a fingerprint
///
/// Pure function of its inputs. Every value is a whole number in [-100, 100];
/// a fingerprint equal to the baseline maps to all zeros.
pub fn to_adjustments_with(fingerprint: &ImageFingerprint, baseline: &MappingBaseline) -> AdjustmentVector {
    let brightness = fingerprint.brightness as f32 - baseline.brightness;
    let contrast = fingerprint.contrast as f32 - baseline.contrast;
    let saturation = fingerprint.saturation as f32 - baseline.saturation;
    let (mean_a, mean_b, mean_chroma) = palette_lab_means(&fingerprint.dominant_colors);

    AdjustmentVector {
        highlights: finish(TONE_GAIN * brightness + TONE_CONTRAST_SPLIT * contrast),
        shadows: finish(TONE_GAIN * brightness - TONE_CONTRAST_SPLIT * contrast),
        contrast: finish(CONTRAST_GAIN * contrast),
        saturation: finish(SATURATION_GAIN * saturation),
        temperature: finish(TEMPERATURE_GAIN * mean_b),
        tint: finish(TINT_GAIN * mean_a),
        vibrance: finish(VIBRANCE_SATURATION_GAIN * saturation + VIBRANCE_CHROMA_GAIN * mean_chroma),
        clarity: finish(CLARITY_GAIN * contrast),
    }
}

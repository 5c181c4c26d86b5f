//! Grade Transfer
//!
//! Builds a deterministic [`PixelTransform`] from an adjustment vector, a
//! selection mask and an intensity, and applies it to pixel buffers.
//!
//! ## Operation Order
//! 1. Contrast (around the 128 midpoint)
//! 2. Saturation / Vibrance (chroma scaling around pixel luma)
//! 3. Highlights / Shadows (luma-weighted brightness offsets)
//! 4. Temperature / Tint (R/B and G/M balance shifts)
//! 5. Clarity (midtone local contrast against a blurred luma)
//!
//! Channels are clamped to [0, 255] after every group. Applying a transform
//! twice compounds it; only identical inputs give identical outputs.

use image::{GrayImage, Luma};
use rayon::prelude::*;
use tracing::debug;
use crate::adjustments::{AdjustmentKey, AdjustmentVector, Intensity, SelectionMask};
use crate::buffer::PixelBuffer;
use crate::error::Result;

/// Contrast slope change per 100 units
const CONTRAST_GAIN: f32 = 1.0;
/// Chroma scale change per 100 units of saturation
const SATURATION_GAIN: f32 = 1.0;
/// Chroma scale change per 100 units of vibrance on an unsaturated pixel
const VIBRANCE_GAIN: f32 = 1.0;
/// Largest highlights/shadows offset, as a fraction of full scale
const TONE_OFFSET: f32 = 0.25;
/// R/B shift at 100 units of temperature, fraction of full scale
const TEMPERATURE_OFFSET: f32 = 0.15;
/// G/M shift at 100 units of tint, fraction of full scale
const TINT_OFFSET: f32 = 0.1;
/// Local contrast gain at 100 units of clarity
const CLARITY_GAIN: f32 = 1.5;
/// Luma detail at or below this is blur rounding noise
const CLARITY_NOISE_FLOOR: f32 = 1.0;

const MIDPOINT: f32 = 128.0;

// ============================================================================
// TRANSFORM
// ============================================================================

/// Effective per-key amounts after masking and intensity scaling
#[derive(Debug, Clone, PartialEq)]
pub struct PixelTransform {
    amounts: AdjustmentVector,
}

/// Build a transform from a vector, the keys to use and an intensity percent
///
/// Fails before any pixel work if the intensity is outside [0, 200] or any
/// vector value is outside [-100, 100]. Keys outside the mask contribute
/// nothing.
pub fn build_transform(
    vector: &AdjustmentVector,
    mask: &SelectionMask,
    intensity: f32,
) -> Result<PixelTransform> {
    let intensity = Intensity::new(intensity)?;
    vector.validate()?;

    let factor = intensity.factor();
    let mut amounts = AdjustmentVector::default();
    for key in mask.iter() {
        amounts.set(key, vector.get(key) * factor);
    }

    debug!(selected = mask.len(), intensity = intensity.percent(), "built transform");
    Ok(PixelTransform { amounts })
}

#[inline]
fn luma(rgb: &[f32; 3]) -> f32 {
    0.299 * rgb[0] + 0.587 * rgb[1] + 0.114 * rgb[2]
}

#[inline]
fn clamp_channels(rgb: [f32; 3]) -> [f32; 3] {
    rgb.map(|c| c.clamp(0.0, 255.0))
}

/// Smooth interpolation, 0 at `edge0` and 1 at `edge1`
#[inline]
fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

impl PixelTransform {
    /// Transform that leaves every buffer untouched
    pub fn identity() -> Self {
        Self { amounts: AdjustmentVector::default() }
    }

    /// Scaled amount for a key; zero for unselected keys
    pub fn amount(&self, key: AdjustmentKey) -> f32 {
        self.amounts.get(key)
    }

    pub fn is_identity(&self) -> bool {
        self.amounts.iter().all(|(_, amount)| amount == 0.0)
    }

    /// True when the transform needs neighbouring pixels (clarity)
    pub fn is_spatial(&self) -> bool {
        self.amounts.clarity != 0.0
    }

    /// Slope is floored at 0: amounts below -100 (intensity over 100%)
    /// flatten to the midpoint instead of inverting
    fn contrast(&self, rgb: [f32; 3]) -> [f32; 3] {
        let amount = self.amounts.contrast;
        if amount == 0.0 {
            return rgb;
        }
        let slope = (1.0 + CONTRAST_GAIN * amount / 100.0).max(0.0);
        clamp_channels(rgb.map(|c| (c - MIDPOINT) * slope + MIDPOINT))
    }

    fn saturation_vibrance(&self, rgb: [f32; 3]) -> [f32; 3] {
        let (saturation, vibrance) = (self.amounts.saturation, self.amounts.vibrance);
        if saturation == 0.0 && vibrance == 0.0 {
            return rgb;
        }

        let mut scale = (1.0 + SATURATION_GAIN * saturation / 100.0).max(0.0);
        if vibrance != 0.0 {
            // Vibrance fades out on already-saturated pixels
            let max = rgb[0].max(rgb[1]).max(rgb[2]);
            let min = rgb[0].min(rgb[1]).min(rgb[2]);
            let current = (max - min) / 255.0;
            scale *= (1.0 + VIBRANCE_GAIN * vibrance / 100.0 * (1.0 - current)).max(0.0);
        }

        let y = luma(&rgb);
        clamp_channels(rgb.map(|c| y + (c - y) * scale))
    }

    fn highlights_shadows(&self, rgb: [f32; 3]) -> [f32; 3] {
        let (highlights, shadows) = (self.amounts.highlights, self.amounts.shadows);
        if highlights == 0.0 && shadows == 0.0 {
            return rgb;
        }

        let y = luma(&rgb) / 255.0;
        let highlight_weight = smoothstep(0.5, 1.0, y);
        let shadow_weight = smoothstep(0.5, 0.0, y);
        let offset = (highlights / 100.0 * highlight_weight + shadows / 100.0 * shadow_weight)
            * TONE_OFFSET
            * 255.0;
        clamp_channels(rgb.map(|c| c + offset))
    }

    fn temperature_tint(&self, rgb: [f32; 3]) -> [f32; 3] {
        let (temperature, tint) = (self.amounts.temperature, self.amounts.tint);
        if temperature == 0.0 && tint == 0.0 {
            return rgb;
        }

        // Positive temperature warms (R up, B down); positive tint goes magenta
        let warm = temperature / 100.0 * TEMPERATURE_OFFSET * 255.0;
        let magenta = tint / 100.0 * TINT_OFFSET * 255.0;
        clamp_channels([
            rgb[0] + warm + magenta / 2.0,
            rgb[1] - magenta,
            rgb[2] - warm + magenta / 2.0,
        ])
    }

    /// Per-pixel groups 1-4 on an RGB triple in 0-255 space
    pub fn grade_rgb(&self, rgb: [f32; 3]) -> [f32; 3] {
        let rgb = self.contrast(rgb);
        let rgb = self.saturation_vibrance(rgb);
        let rgb = self.highlights_shadows(rgb);
        self.temperature_tint(rgb)
    }

    fn clarity(&self, samples: &mut [u8], width: u32, height: u32) {
        let amount = self.amounts.clarity;
        if amount == 0.0 {
            return;
        }

        let luma_image = GrayImage::from_fn(width, height, |x, y| {
            let i = (y as usize * width as usize + x as usize) * 4;
            let rgb = [samples[i] as f32, samples[i + 1] as f32, samples[i + 2] as f32];
            Luma([luma(&rgb).round() as u8])
        });
        let sigma = (width.max(height) as f32 / 200.0).clamp(1.0, 10.0);
        let blurred = imageproc::filter::gaussian_blur_f32(&luma_image, sigma);

        let gain = CLARITY_GAIN * amount / 100.0;
        let row_len = width as usize * 4;
        samples
            .par_chunks_mut(row_len)
            .enumerate()
            .for_each(|(y, row)| {
                for (x, px) in row.chunks_exact_mut(4).enumerate() {
                    let local = luma_image.get_pixel(x as u32, y as u32)[0] as f32;
                    let base = blurred.get_pixel(x as u32, y as u32)[0] as f32;
                    if (local - base).abs() <= CLARITY_NOISE_FLOOR {
                        continue;
                    }
                    let t = local / 255.0;
                    // Midtones get the full effect, clipped ends none
                    let delta = gain * (local - base) * 4.0 * t * (1.0 - t);
                    for c in px.iter_mut().take(3) {
                        *c = (*c as f32 + delta).clamp(0.0, 255.0).round() as u8;
                    }
                }
            });
    }
}

/// Apply a transform, returning a new buffer of the same size
///
/// The input buffer is never modified. Alpha passes through unchanged.
pub fn apply(transform: &PixelTransform, buffer: &PixelBuffer) -> Result<PixelBuffer> {
    if transform.is_identity() {
        return Ok(buffer.clone());
    }

    let (width, height) = buffer.dimensions();
    let mut samples = buffer.samples().to_vec();

    samples
        .par_chunks_mut(width as usize * 4)
        .for_each(|row| {
            for px in row.chunks_exact_mut(4) {
                let graded = transform.grade_rgb([px[0] as f32, px[1] as f32, px[2] as f32]);
                for (c, value) in px.iter_mut().zip(graded) {
                    *c = value.round() as u8;
                }
            }
        });

    transform.clarity(&mut samples, width, height);

    PixelBuffer::new(width, height, samples)
}

// ============================================================================
// TESTS
// ============================================================================

//! Statistics Extraction
//!
//! Turns a pixel buffer into an [`ImageFingerprint`]: mean brightness, luma
//! contrast, mean HSL saturation and a five-entry dominant color palette.
//!
//! ## Passes
//!
//! 1. **Tally pass** - per-pixel luma and saturation sums plus quantized color
//!    counts with first-seen positions.
//! 2. **Spread pass** - squared luma deviation from the pass-1 mean.
//!
//! Both passes reduce over fixed-size pixel chunks. Partial results are
//! combined in chunk order, so parallel and sequential runs produce
//! bit-identical fingerprints. Alpha is ignored.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;
use crate::buffer::PixelBuffer;

/// Pixels per reduction chunk
const CHUNK_PIXELS: usize = 4096;

/// Quantization step for dominant color buckets
const BUCKET_STEP: u16 = 32;

/// Levels per channel after quantization (0, 32, ..., 256)
const BUCKET_LEVELS: usize = 9;

const BUCKET_COUNT: usize = BUCKET_LEVELS * BUCKET_LEVELS * BUCKET_LEVELS;

/// Number of palette entries kept in the fingerprint
pub const MAX_DOMINANT_COLORS: usize = 5;

/// Contrast scale applied to the luma standard deviation
const CONTRAST_SCALE: f64 = 200.0;

// ============================================================================
// FINGERPRINT
// ============================================================================

/// Quantized palette entry; channels are multiples of 32 in [0, 256]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuantizedColor {
    pub r: u16,
    pub g: u16,
    pub b: u16,
}

impl QuantizedColor {
    /// Channels as 0-255 values for color math
    pub fn to_rgb8(self) -> [u8; 3] {
        [
            self.r.min(255) as u8,
            self.g.min(255) as u8,
            self.b.min(255) as u8,
        ]
    }
}

impl fmt::Display for QuantizedColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rgb({}, {}, {})", self.r, self.g, self.b)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageFingerprint {
    /// Most frequent first, ties in first-seen order
    pub dominant_colors: Vec<QuantizedColor>,
    /// Mean luma, 0-100
    pub brightness: u32,
    /// Luma standard deviation x 200; not clamped, may exceed 100
    pub contrast: u32,
    /// Mean HSL saturation, 0-100
    pub saturation: u32,
}

// ============================================================================
// PER-PIXEL MEASURES
// ============================================================================

/// Rec.601 luma scaled by 1000, exact in integers
#[inline]
fn luma_milli(r: u8, g: u8, b: u8) -> u64 {
    299 * r as u64 + 587 * g as u64 + 114 * b as u64
}

/// HSL saturation of an RGB8 pixel, 0-1
#[inline]
pub fn hsl_saturation(r: u8, g: u8, b: u8) -> f64 {
    let max = r.max(g).max(b) as f64 / 255.0;
    let min = r.min(g).min(b) as f64 / 255.0;
    if max == min {
        return 0.0;
    }
    let l = (max + min) / 2.0;
    if l > 0.5 {
        (max - min) / (2.0 - max - min)
    } else {
        (max - min) / (max + min)
    }
}

/// Round a channel to the nearest multiple of 32 (halves round up)
#[inline]
fn quantize(c: u8) -> u16 {
    (c as u16 + BUCKET_STEP / 2) / BUCKET_STEP * BUCKET_STEP
}

#[inline]
fn bucket_index(r: u8, g: u8, b: u8) -> usize {
    let level = |c: u8| (quantize(c) / BUCKET_STEP) as usize;
    (level(r) * BUCKET_LEVELS + level(g)) * BUCKET_LEVELS + level(b)
}

fn bucket_color(index: usize) -> QuantizedColor {
    let step = BUCKET_STEP;
    QuantizedColor {
        r: (index / (BUCKET_LEVELS * BUCKET_LEVELS)) as u16 * step,
        g: (index / BUCKET_LEVELS % BUCKET_LEVELS) as u16 * step,
        b: (index % BUCKET_LEVELS) as u16 * step,
    }
}

// ============================================================================
// PASS 1: TALLY
// ============================================================================

struct Tally {
    luma_milli: u64,
    saturation: f64,
    counts: Vec<u32>,
    first_seen: Vec<usize>,
}

impl Tally {
    fn new() -> Self {
        Self {
            luma_milli: 0,
            saturation: 0.0,
            counts: vec![0; BUCKET_COUNT],
            first_seen: vec![usize::MAX; BUCKET_COUNT],
        }
    }

    fn over_chunk(chunk: &[u8], first_index: usize) -> Self {
        let mut tally = Self::new();
        for (offset, px) in chunk.chunks_exact(4).enumerate() {
            let (r, g, b) = (px[0], px[1], px[2]);
            tally.luma_milli += luma_milli(r, g, b);
            tally.saturation += hsl_saturation(r, g, b);

            let bucket = bucket_index(r, g, b);
            if tally.counts[bucket] == 0 {
                tally.first_seen[bucket] = first_index + offset;
            }
            tally.counts[bucket] += 1;
        }
        tally
    }

    /// Fold a later chunk into this one
    fn merge(mut self, later: Tally) -> Self {
        self.luma_milli += later.luma_milli;
        self.saturation += later.saturation;
        for i in 0..BUCKET_COUNT {
            self.counts[i] += later.counts[i];
            self.first_seen[i] = self.first_seen[i].min(later.first_seen[i]);
        }
        self
    }

    fn dominant_colors(&self) -> Vec<QuantizedColor> {
        let mut used: Vec<usize> = (0..BUCKET_COUNT).filter(|&i| self.counts[i] > 0).collect();
        // Stable on first-seen position, then by frequency
        used.sort_by_key(|&i| self.first_seen[i]);
        used.sort_by(|&a, &b| self.counts[b].cmp(&self.counts[a]));
        used.into_iter()
            .take(MAX_DOMINANT_COLORS)
            .map(bucket_color)
            .collect()
    }
}

fn tally_pass(samples: &[u8]) -> Tally {
    let partials: Vec<Tally> = samples
        .par_chunks(CHUNK_PIXELS * 4)
        .enumerate()
        .map(|(i, chunk)| Tally::over_chunk(chunk, i * CHUNK_PIXELS))
        .collect();

    partials.into_iter().fold(Tally::new(), Tally::merge)
}

// ============================================================================
// PASS 2: SPREAD
// ============================================================================

fn spread_pass(samples: &[u8], mean_luma: f64) -> f64 {
    let partials: Vec<f64> = samples
        .par_chunks(CHUNK_PIXELS * 4)
        .map(|chunk| {
            chunk
                .chunks_exact(4)
                .map(|px| {
                    let y = luma_milli(px[0], px[1], px[2]) as f64 / 1000.0 / 255.0;
                    (y - mean_luma).powi(2)
                })
                .sum::<f64>()
        })
        .collect();

    partials.into_iter().sum()
}

// ============================================================================
// MAIN ENTRY POINT
// ============================================================================

/// Compute the fingerprint of a buffer
///
/// Pure and deterministic. Callers normally pass a downsampled copy.
pub fn analyze(buffer: &PixelBuffer) -> ImageFingerprint {
    let samples = buffer.samples();
    let n = buffer.pixel_count() as f64;

    let tally = tally_pass(samples);

    // Normalized mean luma, 0-1
    let mean_luma = tally.luma_milli as f64 / 1000.0 / 255.0 / n;
    let mean_saturation = tally.saturation / n;

    let variance = spread_pass(samples, mean_luma) / n;
    let contrast = (variance.sqrt() * CONTRAST_SCALE).round() as u32;

    let fingerprint = ImageFingerprint {
        dominant_colors: tally.dominant_colors(),
        brightness: (mean_luma * 100.0).round() as u32,
        contrast,
        saturation: (mean_saturation * 100.0).round() as u32,
    };

    debug!(
        brightness = fingerprint.brightness,
        contrast = fingerprint.contrast,
        saturation = fingerprint.saturation,
        colors = fingerprint.dominant_colors.len(),
        "analyzed buffer"
    );

    fingerprint
}

// ============================================================================
// TESTS
// ============================================================================

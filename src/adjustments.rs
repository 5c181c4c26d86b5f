//! The eight-parameter grade model: keys, values, selection and intensity.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use crate::error::{Result, GradeError};

/// Bounds for every adjustment value
pub const ADJUSTMENT_MIN: f32 = -100.0;
pub const ADJUSTMENT_MAX: f32 = 100.0;

/// Bounds for the intensity percentage
pub const INTENSITY_MIN: f32 = 0.0;
pub const INTENSITY_MAX: f32 = 200.0;

// ============================================================================
// KEYS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdjustmentKey {
    Highlights,
    Shadows,
    Contrast,
    Saturation,
    Temperature,
    Tint,
    Vibrance,
    Clarity,
}

impl AdjustmentKey {
    pub const ALL: [AdjustmentKey; 8] = [
        AdjustmentKey::Highlights,
        AdjustmentKey::Shadows,
        AdjustmentKey::Contrast,
        AdjustmentKey::Saturation,
        AdjustmentKey::Temperature,
        AdjustmentKey::Tint,
        AdjustmentKey::Vibrance,
        AdjustmentKey::Clarity,
    ];

    pub fn name(self) -> &'static str {
        match self {
            AdjustmentKey::Highlights => "highlights",
            AdjustmentKey::Shadows => "shadows",
            AdjustmentKey::Contrast => "contrast",
            AdjustmentKey::Saturation => "saturation",
            AdjustmentKey::Temperature => "temperature",
            AdjustmentKey::Tint => "tint",
            AdjustmentKey::Vibrance => "vibrance",
            AdjustmentKey::Clarity => "clarity",
        }
    }
}

impl fmt::Display for AdjustmentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AdjustmentKey {
    type Err = GradeError;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.trim().to_ascii_lowercase();
        AdjustmentKey::ALL
            .into_iter()
            .find(|key| key.name() == lower)
            .ok_or_else(|| GradeError::InvalidParameter(format!("Unknown adjustment key: {}", s)))
    }
}

// ============================================================================
// VECTOR
// ============================================================================

/// Signed values in [-100, 100] for each of the eight keys
///
/// Used both as the immutable reference vector derived from a fingerprint and
/// as the user-editable working vector of a grade session.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AdjustmentVector {
    pub highlights: f32,
    pub shadows: f32,
    pub contrast: f32,
    pub saturation: f32,
    pub temperature: f32,
    pub tint: f32,
    pub vibrance: f32,
    pub clarity: f32,
}

impl AdjustmentVector {
    pub fn get(&self, key: AdjustmentKey) -> f32 {
        match key {
            AdjustmentKey::Highlights => self.highlights,
            AdjustmentKey::Shadows => self.shadows,
            AdjustmentKey::Contrast => self.contrast,
            AdjustmentKey::Saturation => self.saturation,
            AdjustmentKey::Temperature => self.temperature,
            AdjustmentKey::Tint => self.tint,
            AdjustmentKey::Vibrance => self.vibrance,
            AdjustmentKey::Clarity => self.clarity,
        }
    }

    pub fn set(&mut self, key: AdjustmentKey, value: f32) {
        let slot = match key {
            AdjustmentKey::Highlights => &mut self.highlights,
            AdjustmentKey::Shadows => &mut self.shadows,
            AdjustmentKey::Contrast => &mut self.contrast,
            AdjustmentKey::Saturation => &mut self.saturation,
            AdjustmentKey::Temperature => &mut self.temperature,
            AdjustmentKey::Tint => &mut self.tint,
            AdjustmentKey::Vibrance => &mut self.vibrance,
            AdjustmentKey::Clarity => &mut self.clarity,
        };
        *slot = value;
    }

    /// Builder-style [`set`](Self::set)
    pub fn with(mut self, key: AdjustmentKey, value: f32) -> Self {
        self.set(key, value);
        self
    }

    /// Key/value pairs in the fixed key order
    pub fn iter(&self) -> impl Iterator<Item = (AdjustmentKey, f32)> + '_ {
        AdjustmentKey::ALL.into_iter().map(move |key| (key, self.get(key)))
    }

    /// Reject NaN or out-of-range values
    pub fn validate(&self) -> Result<()> {
        for (key, value) in self.iter() {
            if !(ADJUSTMENT_MIN..=ADJUSTMENT_MAX).contains(&value) {
                return Err(GradeError::InvalidParameter(format!(
                    "{} = {} outside [{}, {}]",
                    key, value, ADJUSTMENT_MIN, ADJUSTMENT_MAX
                )));
            }
        }
        Ok(())
    }
}

// ============================================================================
// SELECTION
// ============================================================================

/// Subset of keys that take part in transfer and export
///
/// Starts empty. Unselected keys have no effect whatever their value.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SelectionMask {
    keys: BTreeSet<AdjustmentKey>,
}

impl SelectionMask {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn all() -> Self {
        AdjustmentKey::ALL.into_iter().collect()
    }

    pub fn insert(&mut self, key: AdjustmentKey) {
        self.keys.insert(key);
    }

    pub fn remove(&mut self, key: AdjustmentKey) {
        self.keys.remove(&key);
    }

    /// Flip membership of a key, returning whether it is now selected
    pub fn toggle(&mut self, key: AdjustmentKey) -> bool {
        if !self.keys.remove(&key) {
            self.keys.insert(key);
            true
        } else {
            false
        }
    }

    pub fn contains(&self, key: AdjustmentKey) -> bool {
        self.keys.contains(&key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = AdjustmentKey> + '_ {
        self.keys.iter().copied()
    }

    /// Parse a comma-separated key list; `all` selects every key
    pub fn parse(list: &str) -> Result<Self> {
        if list.trim().eq_ignore_ascii_case("all") {
            return Ok(Self::all());
        }
        list.split(',')
            .filter(|part| !part.trim().is_empty())
            .map(AdjustmentKey::from_str)
            .collect()
    }
}

impl FromIterator<AdjustmentKey> for SelectionMask {
    fn from_iter<I: IntoIterator<Item = AdjustmentKey>>(iter: I) -> Self {
        Self { keys: iter.into_iter().collect() }
    }
}

// ============================================================================
// INTENSITY
// ============================================================================

/// Percentage in [0, 200] scaling every active adjustment
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "f32", into = "f32")]
pub struct Intensity(f32);

impl Intensity {
    pub fn new(percent: f32) -> Result<Self> {
        if !(INTENSITY_MIN..=INTENSITY_MAX).contains(&percent) {
            return Err(GradeError::InvalidParameter(format!(
                "Intensity {} outside [{}, {}]",
                percent, INTENSITY_MIN, INTENSITY_MAX
            )));
        }
        Ok(Self(percent))
    }

    pub fn percent(self) -> f32 {
        self.0
    }

    /// Multiplier applied to adjustment magnitudes
    pub fn factor(self) -> f32 {
        self.0 / 100.0
    }
}

impl Default for Intensity {
    fn default() -> Self {
        Self(100.0)
    }
}

impl TryFrom<f32> for Intensity {
    type Error = GradeError;

    fn try_from(value: f32) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Intensity> for f32 {
    fn from(value: Intensity) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_names_roundtrip() {
        for key in AdjustmentKey::ALL {
            assert_eq!(key.name().parse::<AdjustmentKey>().unwrap(), key);
        }
        assert_eq!("Clarity".parse::<AdjustmentKey>().unwrap(), AdjustmentKey::Clarity);
        assert!("exposure".parse::<AdjustmentKey>().is_err());
    }

    #[test]
    fn test_vector_get_set() {
        let mut v = AdjustmentVector::default();
        v.set(AdjustmentKey::Tint, -5.0);
        assert_eq!(v.get(AdjustmentKey::Tint), -5.0);
        assert_eq!(v.tint, -5.0);
        assert_eq!(v.iter().count(), 8);
    }

    #[test]
    fn test_vector_validation() {
        let ok = AdjustmentVector::default().with(AdjustmentKey::Highlights, 100.0);
        assert!(ok.validate().is_ok());

        let bad = AdjustmentVector::default().with(AdjustmentKey::Shadows, -100.5);
        assert!(matches!(bad.validate(), Err(GradeError::InvalidParameter(_))));

        let nan = AdjustmentVector::default().with(AdjustmentKey::Clarity, f32::NAN);
        assert!(nan.validate().is_err());
    }

    #[test]
    fn test_selection_toggle() {
        let mut mask = SelectionMask::empty();
        assert!(mask.is_empty());
        assert!(mask.toggle(AdjustmentKey::Contrast));
        assert!(mask.contains(AdjustmentKey::Contrast));
        assert!(!mask.toggle(AdjustmentKey::Contrast));
        assert!(mask.is_empty());
    }

    #[test]
    fn test_selection_parse() {
        let mask = SelectionMask::parse("contrast, saturation").unwrap();
        assert_eq!(mask.len(), 2);
        assert!(mask.contains(AdjustmentKey::Saturation));
        assert_eq!(SelectionMask::parse("all").unwrap(), SelectionMask::all());
        assert!(SelectionMask::parse("contrast,bogus").is_err());
    }

    #[test]
    fn test_intensity_bounds() {
        assert!(Intensity::new(0.0).is_ok());
        assert!(Intensity::new(200.0).is_ok());
        assert!(Intensity::new(200.1).is_err());
        assert!(Intensity::new(-1.0).is_err());
        assert!(Intensity::new(f32::NAN).is_err());
        assert_eq!(Intensity::default().factor(), 1.0);
    }

    #[test]
    fn test_intensity_deserialize_checks_range() {
        assert!(serde_json::from_str::<Intensity>("150").is_ok());
        assert!(serde_json::from_str::<Intensity>("300").is_err());
    }
}

use serde::{Deserialize, Serialize};

/// Side length of the square canvas every face image is reduced to.
pub const IMAGE_SIZE: usize = 100;
/// Number of grid cells per side used for block histograms.
pub const GRID_SIZE: usize = 5;
/// Buckets per block histogram.
pub const HISTOGRAM_BINS: usize = 16;

/// Flattened row-major grayscale samples of a fixed-size image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PixelVector(Vec<u8>);

impl PixelVector {
    pub fn new(values: Vec<u8>) -> Self {
        Self(values)
    }

    /// Build a `width`×`height` vector from a per-pixel function.
    pub fn from_fn<F>(width: usize, height: usize, f: F) -> Self
    where
        F: Fn(usize, usize) -> u8,
    {
        let mut values = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                values.push(f(x, y));
            }
        }
        Self(values)
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.0
    }

    /// Average intensity (0.0–255.0).
    pub fn mean(&self) -> f64 {
        if self.0.is_empty() {
            return 0.0;
        }
        self.0.iter().map(|&v| v as f64).sum::<f64>() / self.0.len() as f64
    }
}

impl From<Vec<u8>> for PixelVector {
    fn from(values: Vec<u8>) -> Self {
        Self(values)
    }
}

/// Composite similarity in [0, 100], rounded to two decimals.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SimilarityScore(f64);

impl SimilarityScore {
    pub const MIN: SimilarityScore = SimilarityScore(0.0);
    pub const MAX: SimilarityScore = SimilarityScore(100.0);

    /// Scale a unit-interval value to a score, clamping and rounding to 2 decimals.
    pub fn from_unit(scaled: f64) -> Self {
        let clamped = if scaled.is_nan() { 0.0 } else { scaled.clamp(0.0, 1.0) };
        Self(round2(clamped * 100.0))
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

impl std::fmt::Display for SimilarityScore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

/// Round to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Tunables for the composite similarity score.
///
/// Every field has a default, so a partial `[scoring]` table in a config file
/// only overrides what it names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Side of the square canvas both vectors were sampled on.
    pub image_size: usize,
    /// Cells per side for the block histogram comparison.
    pub grid_size: usize,
    pub pixel_weight: f64,
    pub gradient_weight: f64,
    pub block_weight: f64,
    /// Combined values at or below this map to a score of 0.
    pub rescale_floor: f64,
    /// Width of the combined range mapped onto [0, 100].
    pub rescale_span: f64,
    /// Weight of cells in the middle half of the grid.
    pub center_weight: f64,
    pub edge_weight: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            image_size: IMAGE_SIZE,
            grid_size: GRID_SIZE,
            pixel_weight: 0.25,
            gradient_weight: 0.45,
            block_weight: 0.30,
            rescale_floor: 0.3,
            rescale_span: 0.7,
            center_weight: 2.0,
            edge_weight: 0.5,
        }
    }
}

impl ScoringConfig {
    /// Number of samples a vector must hold to be scored.
    pub fn expected_len(&self) -> usize {
        self.image_size * self.image_size
    }
}

/// Cosine similarity between two equal-length sequences.
///
/// Returns a value in [-1, 1]. Two zero-magnitude vectors are identical and
/// score 1.0; a zero vector against a non-zero one scores 0.0.
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    match (norm_a > 0.0, norm_b > 0.0) {
        (true, true) => (dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(-1.0, 1.0),
        (false, false) => 1.0,
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity_identical() {
        let a = [1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &a) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_cosine_similarity_orthogonal() {
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-12);
    }

    #[test]
    fn test_cosine_similarity_opposite() {
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_cosine_similarity_zero_vectors() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[0.0, 0.0]), 1.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[2.0, 0.0], &[0.0, 0.0]), 0.0);
    }

    #[test]
    fn test_score_from_unit_clamps_and_rounds() {
        assert_eq!(SimilarityScore::from_unit(1.7).value(), 100.0);
        assert_eq!(SimilarityScore::from_unit(-0.2).value(), 0.0);
        assert_eq!(SimilarityScore::from_unit(0.123456).value(), 12.35);
        assert_eq!(SimilarityScore::from_unit(f64::NAN).value(), 0.0);
    }

    #[test]
    fn test_score_display() {
        assert_eq!(SimilarityScore::from_unit(0.5).to_string(), "50.00");
    }

    #[test]
    fn test_scoring_config_partial_table() {
        let cfg: ScoringConfig = serde_json::from_str(r#"{"grid_size": 4}"#).unwrap();
        assert_eq!(cfg.grid_size, 4);
        assert_eq!(cfg.image_size, IMAGE_SIZE);
        assert_eq!(cfg.gradient_weight, 0.45);
    }

    #[test]
    fn test_pixel_vector_from_fn_row_major() {
        let v = PixelVector::from_fn(3, 2, |x, y| (y * 10 + x) as u8);
        assert_eq!(v.as_slice(), &[0, 1, 2, 10, 11, 12]);
        assert_eq!(v.len(), 6);
    }

    #[test]
    fn test_pixel_vector_json_is_plain_array() {
        let v = PixelVector::new(vec![1, 2, 3]);
        assert_eq!(serde_json::to_string(&v).unwrap(), "[1,2,3]");
    }
}

//! Composite image similarity.
//!
//! Scores two equal-size grayscale faces by blending three comparisons made
//! on their equalized forms: z-scored pixel cosine, gradient cosine and
//! center-weighted block histogram intersection. The blend is rescaled onto
//! [0, 100].

use crate::equalize::equalize;
use crate::features::{block_histogram_similarity, block_histograms, gradient_features};
use crate::types::{cosine_similarity, PixelVector, ScoringConfig, SimilarityScore};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ScoreError {
    #[error("invalid input: vectors differ in length ({query} vs {stored})")]
    LengthMismatch { query: usize, stored: usize },
    #[error("invalid input: empty pixel vector")]
    Empty,
    #[error("invalid input: expected {expected} samples for a {size}x{size} image, got {actual}")]
    WrongDimensions {
        size: usize,
        expected: usize,
        actual: usize,
    },
}

/// Intermediate similarities, useful for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreBreakdown {
    pub pixel_cosine: f64,
    pub gradient_cosine: f64,
    pub block_similarity: f64,
    /// Weighted blend before rescaling.
    pub combined: f64,
    pub score: SimilarityScore,
}

/// Score two pixel vectors with the given configuration.
pub fn similarity(
    query: &PixelVector,
    stored: &PixelVector,
    config: &ScoringConfig,
) -> Result<SimilarityScore, ScoreError> {
    score_breakdown(query, stored, config).map(|b| b.score)
}

/// Score two pixel vectors, keeping every intermediate term.
pub fn score_breakdown(
    query: &PixelVector,
    stored: &PixelVector,
    config: &ScoringConfig,
) -> Result<ScoreBreakdown, ScoreError> {
    validate(query, stored, config)?;

    let size = config.image_size;
    let eq_query = equalize(query);
    let eq_stored = equalize(stored);

    let pixel_cosine = cosine_similarity(&z_score(&eq_query), &z_score(&eq_stored));

    let grad_query = gradient_features(eq_query.as_slice(), size, size);
    let grad_stored = gradient_features(eq_stored.as_slice(), size, size);
    let gradient_cosine = cosine_similarity(&grad_query.values, &grad_stored.values);

    let hists_query = block_histograms(eq_query.as_slice(), size, size, config.grid_size);
    let hists_stored = block_histograms(eq_stored.as_slice(), size, size, config.grid_size);
    let block_similarity = block_histogram_similarity(
        &hists_query,
        &hists_stored,
        config.grid_size,
        config.center_weight,
        config.edge_weight,
    );

    let combined = pixel_cosine * config.pixel_weight
        + gradient_cosine * config.gradient_weight
        + block_similarity * config.block_weight;

    let span = if config.rescale_span > 0.0 { config.rescale_span } else { 1.0 };
    let score = SimilarityScore::from_unit((combined - config.rescale_floor) / span);

    tracing::trace!(
        pixel_cosine,
        gradient_cosine,
        block_similarity,
        combined,
        score = score.value(),
        "similarity computed"
    );

    Ok(ScoreBreakdown {
        pixel_cosine,
        gradient_cosine,
        block_similarity,
        combined,
        score,
    })
}

fn validate(
    query: &PixelVector,
    stored: &PixelVector,
    config: &ScoringConfig,
) -> Result<(), ScoreError> {
    if query.len() != stored.len() {
        return Err(ScoreError::LengthMismatch {
            query: query.len(),
            stored: stored.len(),
        });
    }
    if query.is_empty() {
        return Err(ScoreError::Empty);
    }
    let expected = config.expected_len();
    if query.len() != expected {
        return Err(ScoreError::WrongDimensions {
            size: config.image_size,
            expected,
            actual: query.len(),
        });
    }
    Ok(())
}

/// Subtract the mean and divide by the population standard deviation.
///
/// A zero standard deviation divides by 1 instead.
fn z_score(pixels: &PixelVector) -> Vec<f64> {
    let n = pixels.len() as f64;
    let mean = pixels.mean();
    let variance = pixels
        .as_slice()
        .iter()
        .map(|&v| (v as f64 - mean).powi(2))
        .sum::<f64>()
        / n;
    let std = match variance.sqrt() {
        s if s > 0.0 => s,
        _ => 1.0,
    };
    pixels
        .as_slice()
        .iter()
        .map(|&v| (v as f64 - mean) / std)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::IMAGE_SIZE;

    fn face_like() -> PixelVector {
        // Radial blob with some texture, values kept below 235.
        PixelVector::from_fn(IMAGE_SIZE, IMAGE_SIZE, |x, y| {
            let dx = x as f64 - 50.0;
            let dy = y as f64 - 45.0;
            let r = (dx * dx + dy * dy).sqrt();
            let base = (200.0 - r * 2.5).max(20.0);
            (base + ((x * 7 + y * 3) % 13) as f64) as u8
        })
    }

    fn checkerboard(cell: usize) -> PixelVector {
        PixelVector::from_fn(IMAGE_SIZE, IMAGE_SIZE, |x, y| {
            if (x / cell + y / cell) % 2 == 0 { 30 } else { 220 }
        })
    }

    #[test]
    fn test_identical_scores_max() {
        let cfg = ScoringConfig::default();
        let v = face_like();
        let score = similarity(&v, &v, &cfg).unwrap();
        assert_eq!(score.value(), 100.0);
    }

    #[test]
    fn test_constant_images_score_max() {
        let cfg = ScoringConfig::default();
        let a = PixelVector::new(vec![128u8; 10_000]);
        let b = PixelVector::new(vec![128u8; 10_000]);
        let breakdown = score_breakdown(&a, &b, &cfg).unwrap();
        assert!(!breakdown.combined.is_nan());
        assert_eq!(breakdown.score.value(), 100.0);
    }

    #[test]
    fn test_length_mismatch_is_error() {
        let cfg = ScoringConfig::default();
        let a = PixelVector::new(vec![10u8; 9_999]);
        let b = PixelVector::new(vec![10u8; 10_000]);
        assert_eq!(
            similarity(&a, &b, &cfg),
            Err(ScoreError::LengthMismatch {
                query: 9_999,
                stored: 10_000
            })
        );
    }

    #[test]
    fn test_empty_is_error() {
        let cfg = ScoringConfig::default();
        let e = PixelVector::new(Vec::new());
        assert_eq!(similarity(&e, &e, &cfg), Err(ScoreError::Empty));
    }

    #[test]
    fn test_wrong_dimensions_is_error() {
        let cfg = ScoringConfig::default();
        let a = PixelVector::new(vec![1u8; 64]);
        assert!(matches!(
            similarity(&a, &a, &cfg),
            Err(ScoreError::WrongDimensions { expected: 10_000, actual: 64, .. })
        ));
    }

    #[test]
    fn test_symmetric() {
        let cfg = ScoringConfig::default();
        let a = face_like();
        let b = checkerboard(10);
        let ab = similarity(&a, &b, &cfg).unwrap();
        let ba = similarity(&b, &a, &cfg).unwrap();
        assert_eq!(ab, ba);
    }

    #[test]
    fn test_brightness_offset_scores_high() {
        let cfg = ScoringConfig::default();
        let a = face_like();
        let b = PixelVector::new(
            a.as_slice()
                .iter()
                .map(|&v| (v as u16 + 20).min(255) as u8)
                .collect(),
        );
        let score = similarity(&a, &b, &cfg).unwrap();
        assert!(score.value() > 80.0, "score = {score}");
    }

    #[test]
    fn test_different_images_score_lower() {
        let cfg = ScoringConfig::default();
        let a = face_like();
        let b = checkerboard(7);
        let score = similarity(&a, &b, &cfg).unwrap();
        assert!(score.value() < 100.0, "score = {score}");
        assert!((0.0..=100.0).contains(&score.value()));
    }

    #[test]
    fn test_score_in_range_for_inverted_image() {
        let cfg = ScoringConfig::default();
        let a = face_like();
        let inverted = PixelVector::new(a.as_slice().iter().map(|&v| 255 - v).collect());
        let breakdown = score_breakdown(&a, &inverted, &cfg).unwrap();
        assert!(breakdown.pixel_cosine < 0.0);
        assert!((0.0..=100.0).contains(&breakdown.score.value()));
    }

    #[test]
    fn test_custom_image_size() {
        let cfg = ScoringConfig {
            image_size: 20,
            grid_size: 4,
            ..ScoringConfig::default()
        };
        let v = PixelVector::from_fn(20, 20, |x, y| (x * 9 + y * 4) as u8);
        assert_eq!(similarity(&v, &v, &cfg).unwrap().value(), 100.0);
    }

    #[test]
    fn test_z_score_zero_std() {
        let z = z_score(&PixelVector::new(vec![5u8; 4]));
        assert!(z.iter().all(|&v| v == 0.0));
    }
}

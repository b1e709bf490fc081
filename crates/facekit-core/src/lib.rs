//! facekit-core — Face image normalization and similarity scoring.
//!
//! Reduces uploaded photos to fixed-size grayscale vectors and compares them
//! with a composite of pixel, gradient and block-histogram similarity.

pub mod equalize;
pub mod features;
pub mod preprocess;
pub mod similarity;
pub mod types;

pub use preprocess::PreprocessError;
pub use similarity::{score_breakdown, similarity, ScoreBreakdown, ScoreError};
pub use types::{PixelVector, ScoringConfig, SimilarityScore};

//! Global histogram equalization.
//!
//! Remaps intensities through the cumulative distribution so that images
//! taken under different lighting end up with comparable contrast.

use crate::types::PixelVector;

const LEVELS: usize = 256;

/// 256-bin intensity histogram.
pub fn histogram(pixels: &[u8]) -> [u32; LEVELS] {
    let mut hist = [0u32; LEVELS];
    for &p in pixels {
        hist[p as usize] += 1;
    }
    hist
}

/// Cumulative distribution of a histogram.
pub fn cumulative(hist: &[u32; LEVELS]) -> [u32; LEVELS] {
    let mut cdf = [0u32; LEVELS];
    cdf[0] = hist[0];
    for i in 1..LEVELS {
        cdf[i] = cdf[i - 1] + hist[i];
    }
    cdf
}

/// Equalize a pixel vector.
///
/// Each sample `v` maps to `round((cdf[v] - cdf_min) * 255 / (N - cdf_min))`
/// where `cdf_min` is the first non-zero CDF entry. A zero denominator
/// (single-valued image) is treated as 1, which sends every sample to 0.
pub fn equalize(pixels: &PixelVector) -> PixelVector {
    let samples = pixels.as_slice();
    if samples.is_empty() {
        return PixelVector::new(Vec::new());
    }

    let cdf = cumulative(&histogram(samples));
    let cdf_min = cdf.iter().find(|&&v| v > 0).copied().unwrap_or(0);
    let denom = match samples.len() as u32 - cdf_min {
        0 => 1,
        d => d,
    };
    let scale = 255.0 / denom as f64;

    // Per-level lookup table.
    let mut lut = [0u8; LEVELS];
    for (v, slot) in lut.iter_mut().enumerate() {
        let shifted = cdf[v].saturating_sub(cdf_min) as f64;
        *slot = (shifted * scale).round().clamp(0.0, 255.0) as u8;
    }

    PixelVector::new(samples.iter().map(|&p| lut[p as usize]).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_histogram_counts() {
        let hist = histogram(&[0, 0, 5, 255]);
        assert_eq!(hist[0], 2);
        assert_eq!(hist[5], 1);
        assert_eq!(hist[255], 1);
        assert_eq!(hist.iter().sum::<u32>(), 4);
    }

    #[test]
    fn test_cumulative_monotonic() {
        let cdf = cumulative(&histogram(&[3, 1, 1, 200]));
        assert!(cdf.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(cdf[255], 4);
    }

    #[test]
    fn test_equalize_constant_image_is_zero() {
        let flat = PixelVector::new(vec![128u8; 10_000]);
        let eq = equalize(&flat);
        assert_eq!(eq.len(), 10_000);
        assert!(eq.as_slice().iter().all(|&v| v == 0));
    }

    #[test]
    fn test_equalize_stretches_low_contrast() {
        // Values confined to 100..110 should spread to the full range.
        let pixels = PixelVector::new((0..1100).map(|i| 100 + (i % 11) as u8).collect());
        let eq = equalize(&pixels);
        let min = *eq.as_slice().iter().min().unwrap();
        let max = *eq.as_slice().iter().max().unwrap();
        assert_eq!(min, 0);
        assert_eq!(max, 255);
    }

    #[test]
    fn test_equalize_two_levels() {
        // Half 10, half 20: cdf_min = 50, N - cdf_min = 50.
        let mut raw = vec![10u8; 50];
        raw.extend(vec![20u8; 50]);
        let eq = equalize(&PixelVector::new(raw));
        assert_eq!(eq.as_slice()[0], 0);
        assert_eq!(eq.as_slice()[99], 255);
    }

    #[test]
    fn test_equalize_shift_invariant() {
        let base = PixelVector::from_fn(20, 20, |x, y| (x * 5 + y * 3) as u8);
        let shifted = PixelVector::new(base.as_slice().iter().map(|&v| v + 20).collect());
        assert_eq!(equalize(&base), equalize(&shifted));
    }

    #[test]
    fn test_equalize_empty() {
        assert!(equalize(&PixelVector::new(Vec::new())).is_empty());
    }
}

//! Spatial features extracted from equalized pixel vectors.

use crate::types::HISTOGRAM_BINS;

/// Per-pixel gradient magnitude and direction, interleaved as
/// `[mag0, angle0, mag1, angle1, ...]` over the interior pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct GradientVector {
    pub values: Vec<f64>,
}

impl GradientVector {
    /// Gradient magnitudes only.
    pub fn magnitudes(&self) -> impl Iterator<Item = f64> + '_ {
        self.values.iter().step_by(2).copied()
    }

    /// Gradient directions only, in (-π, π].
    pub fn angles(&self) -> impl Iterator<Item = f64> + '_ {
        self.values.iter().skip(1).step_by(2).copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Normalized 16-bin intensity histogram of one grid cell.
pub type BlockHistogram = [f64; HISTOGRAM_BINS];

/// Central-difference gradients for every pixel except the 1-pixel border.
///
/// Produces `2 * (width - 2) * (height - 2)` values. Images narrower or
/// shorter than 3 pixels have no interior and yield an empty vector.
pub fn gradient_features(pixels: &[u8], width: usize, height: usize) -> GradientVector {
    if width < 3 || height < 3 || pixels.len() < width * height {
        return GradientVector { values: Vec::new() };
    }

    let mut values = Vec::with_capacity(2 * (width - 2) * (height - 2));
    for y in 1..height - 1 {
        for x in 1..width - 1 {
            let idx = y * width + x;
            let gx = pixels[idx + 1] as f64 - pixels[idx - 1] as f64;
            let gy = pixels[idx + width] as f64 - pixels[idx - width] as f64;
            values.push((gx * gx + gy * gy).sqrt());
            values.push(gy.atan2(gx));
        }
    }

    GradientVector { values }
}

/// Split the image into `grid`×`grid` cells and histogram each one.
///
/// Cell sizes are floored, so a remainder strip on the right and bottom is
/// ignored. Histograms come back row-major and sum to 1 unless the cell is
/// empty.
pub fn block_histograms(
    pixels: &[u8],
    width: usize,
    height: usize,
    grid: usize,
) -> Vec<BlockHistogram> {
    if grid == 0 || pixels.len() < width * height {
        return Vec::new();
    }

    let block_w = width / grid;
    let block_h = height / grid;
    let mut histograms = Vec::with_capacity(grid * grid);

    for by in 0..grid {
        for bx in 0..grid {
            let mut counts = [0u32; HISTOGRAM_BINS];
            for y in by * block_h..(by + 1) * block_h {
                for x in bx * block_w..(bx + 1) * block_w {
                    let bin = (pixels[y * width + x] as usize / 16).min(HISTOGRAM_BINS - 1);
                    counts[bin] += 1;
                }
            }

            let total = match counts.iter().sum::<u32>() {
                0 => 1.0,
                t => t as f64,
            };
            let mut hist = [0.0f64; HISTOGRAM_BINS];
            for (slot, &count) in hist.iter_mut().zip(counts.iter()) {
                *slot = count as f64 / total;
            }
            histograms.push(hist);
        }
    }

    histograms
}

/// Whether grid cell (`row`, `col`) lies in the middle half of the grid.
pub fn is_center_cell(row: usize, col: usize, grid: usize) -> bool {
    let lo = grid / 4;
    let hi = grid * 3 / 4;
    (lo..hi).contains(&row) && (lo..hi).contains(&col)
}

/// Weighted histogram-intersection similarity over two sets of block histograms.
///
/// Center cells carry `center_weight`, the rest `edge_weight`. The result is
/// the weighted mean of per-cell intersections, in [0, 1].
pub fn block_histogram_similarity(
    a: &[BlockHistogram],
    b: &[BlockHistogram],
    grid: usize,
    center_weight: f64,
    edge_weight: f64,
) -> f64 {
    let mut total_sim = 0.0f64;
    let mut total_weight = 0.0f64;

    for (i, (ha, hb)) in a.iter().zip(b.iter()).enumerate() {
        let (row, col) = (i / grid, i % grid);
        let weight = if is_center_cell(row, col, grid) {
            center_weight
        } else {
            edge_weight
        };

        let intersection: f64 = ha.iter().zip(hb.iter()).map(|(x, y)| x.min(*y)).sum();
        total_sim += intersection * weight;
        total_weight += weight;
    }

    if total_weight > 0.0 {
        total_sim / total_weight
    } else {
        0.0
    }
}

use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::shared::config::CompressionConfig;

/// Draws the planner's row sample once per compression: a fixed-seed sample
/// without replacement, returned sorted ascending. Small inputs are scanned
/// in full.
pub fn sample_rows(num_rows: usize, cfg: &CompressionConfig) -> Vec<u32> {
    let target = ((num_rows as f64 * cfg.sample_fraction).ceil() as usize).max(cfg.sample_min_rows);
    if target >= num_rows {
        return (0..num_rows as u32).collect();
    }
    let mut rng = StdRng::seed_from_u64(cfg.sample_seed);
    let mut rows: Vec<u32> = rand::seq::index::sample(&mut rng, num_rows, target)
        .iter()
        .map(|i| i as u32)
        .collect();
    rows.sort_unstable();
    rows
}

/// Chao's unbiased cardinality estimator from sample frequency counts:
/// `d + f1^2 / 2*f2`, with the `f2 = 0` degenerate form `d + f1*(f1-1)/2`.
/// `d` is the distinct count in the sample, `f1`/`f2` the number of tuples
/// seen exactly once/twice. Clamped to `[d, num_rows]`.
pub fn estimate_cardinality(d: usize, f1: usize, f2: usize, num_rows: usize) -> usize {
    if d == 0 {
        return 0;
    }
    let est = if f2 > 0 {
        d as f64 + (f1 * f1) as f64 / (2.0 * f2 as f64)
    } else {
        d as f64 + (f1 * f1.saturating_sub(1)) as f64 / 2.0
    };
    est.round().clamp(d as f64, num_rows as f64) as usize
}

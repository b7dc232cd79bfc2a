//! Percentile and histogram computation over latency samples.

use serde::Serialize;

/// Upper bounds (milliseconds) of the latency histogram buckets. The
/// final bucket is unbounded.
pub const HISTOGRAM_BOUNDS_MS: &[f64] = &[
    0.5, 1.0, 2.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0,
];

/// One latency histogram bucket.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HistogramBucket {
    /// Inclusive upper bound in milliseconds; `f64::INFINITY` for the
    /// overflow bucket.
    pub le_ms: f64,
    /// Samples that fell into this bucket.
    pub count: u64,
}

/// The k-th percentile of ascending-sorted samples.
///
/// Index rule: `ceil(n * k / 100) - 1`, clamped to `[0, n-1]`. Returns
/// 0.0 on an empty slice.
#[must_use]
pub fn percentile(sorted: &[f64], k: u8) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let n = sorted.len();
    let rank = (n * usize::from(k)).div_ceil(100);
    let index = rank.saturating_sub(1).min(n - 1);
    sorted[index]
}

/// Bucket samples into the fixed latency histogram. Bucket counts sum
/// to the sample count.
#[must_use]
pub fn histogram(samples: &[f64]) -> Vec<HistogramBucket> {
    let mut buckets: Vec<HistogramBucket> = HISTOGRAM_BOUNDS_MS
        .iter()
        .map(|&le_ms| HistogramBucket { le_ms, count: 0 })
        .collect();
    buckets.push(HistogramBucket {
        le_ms: f64::INFINITY,
        count: 0,
    });

    for &sample in samples {
        let slot = buckets
            .iter()
            .position(|b| sample <= b.le_ms)
            .unwrap_or(buckets.len() - 1);
        buckets[slot].count += 1;
    }

    buckets
}

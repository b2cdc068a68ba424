//! Descriptive statistics over raw sample sequences.
//!
//! Percentiles use the nearest-rank rule: sort, then index at
//! `floor(p * n)` (clamped to the last element). No interpolation is
//! performed, so every reported percentile is an observed sample.
//!
//! Empty input is permissive: percentiles, means and summaries come back
//! as zeros rather than errors.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Descriptive summary of a sample sequence
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SampleSummary {
    /// Number of samples
    pub count: usize,
    /// Arithmetic mean (0 when empty)
    pub mean: f64,
    /// Bessel-corrected standard deviation (0 when fewer than 2 samples)
    pub std_dev: f64,
    /// Smallest sample
    pub min: f64,
    /// Largest sample
    pub max: f64,
    /// Median
    pub p50: f64,
    /// 90th percentile
    pub p90: f64,
    /// 95th percentile
    pub p95: f64,
    /// 99th percentile
    pub p99: f64,
}

/// One histogram bucket covering `[start, end)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramBucket {
    /// Inclusive lower bound
    pub start: f64,
    /// Exclusive upper bound (the last bucket also absorbs `end` itself)
    pub end: f64,
    /// Number of samples in the bucket
    pub count: usize,
}

/// Compute mean of samples
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn mean(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    samples.iter().sum::<f64>() / samples.len() as f64
}

/// Sample variance with `n - 1` denominator
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn variance(samples: &[f64]) -> f64 {
    if samples.len() < 2 {
        return 0.0;
    }
    let mean = mean(samples);
    samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (samples.len() - 1) as f64
}

/// Compute standard deviation of samples
#[must_use]
pub fn std_dev(samples: &[f64]) -> f64 {
    variance(samples).sqrt()
}

fn sorted(samples: &[f64]) -> Vec<f64> {
    let mut sorted = samples.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    sorted
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let p = if p.is_nan() { 0.0 } else { p.clamp(0.0, 1.0) };
    let idx = ((p * sorted.len() as f64).floor() as usize).min(sorted.len() - 1);
    sorted[idx]
}

/// Nearest-rank percentile, `p` in `[0, 1]`
///
/// Values of `p` outside the unit interval are clamped.
#[must_use]
pub fn percentile(samples: &[f64], p: f64) -> f64 {
    percentile_sorted(&sorted(samples), p)
}

/// Summarize a sample sequence
#[must_use]
pub fn analyze(samples: &[f64]) -> SampleSummary {
    if samples.is_empty() {
        return SampleSummary::default();
    }

    let sorted = sorted(samples);

    SampleSummary {
        count: samples.len(),
        mean: mean(samples),
        std_dev: std_dev(samples),
        min: sorted[0],
        max: sorted[sorted.len() - 1],
        p50: percentile_sorted(&sorted, 0.50),
        p90: percentile_sorted(&sorted, 0.90),
        p95: percentile_sorted(&sorted, 0.95),
        p99: percentile_sorted(&sorted, 0.99),
    }
}

/// Bucket samples into `bucket_count` equal-width buckets over `[min, max]`
///
/// Membership is half-open; values at or above the last bucket's end are
/// folded into the last bucket. When every sample is identical the range
/// is empty and all of them land in the last bucket.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn histogram(samples: &[f64], bucket_count: usize) -> Vec<HistogramBucket> {
    if samples.is_empty() || bucket_count == 0 {
        return Vec::new();
    }

    let min = samples.iter().copied().fold(f64::INFINITY, f64::min);
    let max = samples.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let width = (max - min) / bucket_count as f64;

    let mut buckets: Vec<HistogramBucket> = (0..bucket_count)
        .map(|i| {
            let start = (i as f64).mul_add(width, min);
            HistogramBucket {
                start,
                end: start + width,
                count: 0,
            }
        })
        .collect();

    let last = bucket_count - 1;
    for &value in samples {
        let idx = buckets
            .iter()
            .position(|b| value >= b.start && value < b.end)
            .unwrap_or(last);
        buckets[idx].count += 1;
    }

    buckets
}

/// Confidence interval for the mean: `mean ± critical * s / sqrt(n)`
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn mean_ci(samples: &[f64], critical: f64) -> (f64, f64) {
    let mean = mean(samples);
    if samples.len() < 2 {
        return (mean, mean);
    }
    let margin = critical * std_dev(samples) / (samples.len() as f64).sqrt();
    (mean - margin, mean + margin)
}

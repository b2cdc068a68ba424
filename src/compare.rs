//! Two-sample comparison for A/B testing of model metrics.
//!
//! The test is deliberately simple and tuned for a non-statistician
//! audience:
//! - Welch-style standard error `sqrt(var_a/n_a + var_b/n_b)`
//! - simplified degrees of freedom `n_a + n_b - 2`
//! - p-value from a standard-normal lookup, deflated for `df <= 30`
//! - Cohen's d with the pooled `(n - 1)`-weighted standard deviation
//!
//! [`PValueMethod::StudentT`] swaps the lookup for an exact Student's t
//! CDF while every other field stays identical.

use crate::error::{LabError, Result};
use crate::simulator::ModelSamples;
use crate::stats::{mean, variance};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, StudentsT};
use std::fmt;

/// Significance level for `statistically_significant`
pub const ALPHA: f64 = 0.05;

/// Minimum |d| for `practically_significant` (Cohen's "small" effect)
pub const PRACTICAL_EFFECT: f64 = 0.2;

/// Two-tailed standard-normal critical values `(z, p)`
const NORMAL_TABLE: [(f64, f64); 8] = [
    (0.0, 1.0),
    (0.674, 0.5),
    (1.282, 0.2),
    (1.645, 0.1),
    (1.96, 0.05),
    (2.326, 0.02),
    (2.576, 0.01),
    (3.291, 0.001),
];

/// How p-values are computed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PValueMethod {
    /// Piecewise normal lookup with small-sample deflation
    #[default]
    Approximate,
    /// Exact two-tailed Student's t CDF
    StudentT,
}

/// Cohen's d magnitude bands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectMagnitude {
    Negligible,
    Small,
    Medium,
    Large,
}

impl EffectMagnitude {
    /// Interpret Cohen's d effect size
    #[must_use]
    pub fn from_cohens_d(d: f64) -> Self {
        let abs_d = d.abs();
        if abs_d < 0.2 {
            Self::Negligible
        } else if abs_d < 0.5 {
            Self::Small
        } else if abs_d < 0.8 {
            Self::Medium
        } else {
            Self::Large
        }
    }
}

impl fmt::Display for EffectMagnitude {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Negligible => "negligible",
            Self::Small => "small",
            Self::Medium => "medium",
            Self::Large => "large",
        };
        f.write_str(label)
    }
}

/// Outcome of comparing two independent samples
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub n_a: usize,
    pub n_b: usize,
    pub mean_a: f64,
    pub mean_b: f64,
    pub std_a: f64,
    pub std_b: f64,
    /// 95% CI of group A's mean
    pub ci_a: (f64, f64),
    /// 95% CI of group B's mean
    pub ci_b: (f64, f64),
    /// `mean_a - mean_b`
    pub difference: f64,
    /// 95% CI of the difference
    pub ci_lower: f64,
    pub ci_upper: f64,
    pub t_statistic: f64,
    pub degrees_of_freedom: f64,
    pub p_value: f64,
    pub p_value_method: PValueMethod,
    pub cohens_d: f64,
    pub effect_magnitude: EffectMagnitude,
    /// `p_value < 0.05`
    pub statistically_significant: bool,
    /// `|cohens_d| >= 0.2`
    pub practically_significant: bool,
    /// One-line interpretation
    pub summary: String,
}

/// Critical value used for every 95% interval
#[must_use]
pub fn critical_value(degrees_of_freedom: f64) -> f64 {
    if degrees_of_freedom > 30.0 {
        1.96
    } else {
        2.0
    }
}

fn normal_lookup(z: f64) -> f64 {
    let z = z.abs();
    for window in NORMAL_TABLE.windows(2) {
        let (z0, p0) = window[0];
        let (z1, p1) = window[1];
        if z <= z1 {
            let fraction = (z - z0) / (z1 - z0);
            return fraction.mul_add(p1 - p0, p0);
        }
    }
    NORMAL_TABLE[NORMAL_TABLE.len() - 1].1
}

/// Approximate two-tailed p-value for a t statistic
///
/// For `df <= 30` the statistic is shrunk by `sqrt(30 / max(df, 5))`
/// before the normal lookup, mimicking the heavier tails of the t
/// distribution. This is a coarse approximation, not an exact CDF.
#[must_use]
pub fn approximate_p_value(t_statistic: f64, degrees_of_freedom: f64) -> f64 {
    if t_statistic.is_nan() {
        return 1.0;
    }
    let t = t_statistic.abs();
    let effective = if degrees_of_freedom > 30.0 {
        t
    } else {
        t / (30.0 / degrees_of_freedom.max(5.0)).sqrt()
    };
    normal_lookup(effective)
}

fn student_t_p_value(t_statistic: f64, degrees_of_freedom: f64) -> f64 {
    if degrees_of_freedom < 1.0 {
        return approximate_p_value(t_statistic, degrees_of_freedom);
    }
    StudentsT::new(0.0, 1.0, degrees_of_freedom).map_or_else(
        |_| approximate_p_value(t_statistic, degrees_of_freedom),
        |dist| (2.0 * (1.0 - dist.cdf(t_statistic.abs()))).clamp(0.0, 1.0),
    )
}

/// Compare two samples using the approximate p-value
///
/// # Errors
///
/// Returns `LabError::InvalidArgument` if either sample is empty.
pub fn compare(samples_a: &[f64], samples_b: &[f64]) -> Result<ComparisonResult> {
    compare_with(samples_a, samples_b, PValueMethod::Approximate)
}

/// Compare two samples with an explicit p-value method
///
/// # Errors
///
/// Returns `LabError::InvalidArgument` if either sample is empty.
#[allow(clippy::cast_precision_loss, clippy::similar_names)]
pub fn compare_with(
    samples_a: &[f64],
    samples_b: &[f64],
    method: PValueMethod,
) -> Result<ComparisonResult> {
    if samples_a.is_empty() || samples_b.is_empty() {
        return Err(LabError::InvalidArgument(format!(
            "comparison needs non-empty samples (got {} and {})",
            samples_a.len(),
            samples_b.len()
        )));
    }

    let n_a = samples_a.len() as f64;
    let n_b = samples_b.len() as f64;
    let mean_a = mean(samples_a);
    let mean_b = mean(samples_b);
    let var_a = variance(samples_a);
    let var_b = variance(samples_b);
    let std_a = var_a.sqrt();
    let std_b = var_b.sqrt();
    let difference = mean_a - mean_b;

    let se = ((var_a / n_a) + (var_b / n_b)).sqrt();
    let t_statistic = if se > 0.0 { difference / se } else { 0.0 };
    let degrees_of_freedom = n_a + n_b - 2.0;

    let p_value = match method {
        PValueMethod::Approximate => approximate_p_value(t_statistic, degrees_of_freedom),
        PValueMethod::StudentT => student_t_p_value(t_statistic, degrees_of_freedom),
    };

    let pooled_std = if degrees_of_freedom > 0.0 {
        (((n_a - 1.0) * var_a + (n_b - 1.0) * var_b) / degrees_of_freedom).sqrt()
    } else {
        0.0
    };
    let cohens_d = if pooled_std > 0.0 {
        difference / pooled_std
    } else {
        0.0
    };

    let critical = critical_value(degrees_of_freedom);
    let margin_a = critical * std_a / n_a.sqrt();
    let margin_b = critical * std_b / n_b.sqrt();
    let margin = critical * se;

    let effect_magnitude = EffectMagnitude::from_cohens_d(cohens_d);
    let statistically_significant = p_value < ALPHA;
    let practically_significant = cohens_d.abs() >= PRACTICAL_EFFECT;

    let verdict = match (statistically_significant, practically_significant) {
        (true, true) => "significant and meaningful",
        (true, false) => "significant but too small to matter",
        (false, true) => "large but not statistically reliable",
        (false, false) => "no detectable difference",
    };
    let shift = if difference > 0.0 {
        format!("A is higher by {difference:.4}")
    } else if difference < 0.0 {
        format!("A is lower by {:.4}", -difference)
    } else {
        "A and B have equal means".to_string()
    };
    let summary =
        format!("{shift} (p={p_value:.3}, d={cohens_d:.2} {effect_magnitude}): {verdict}");

    tracing::debug!(
        n_a = samples_a.len(),
        n_b = samples_b.len(),
        t_statistic,
        p_value,
        cohens_d,
        "two-sample comparison"
    );

    Ok(ComparisonResult {
        n_a: samples_a.len(),
        n_b: samples_b.len(),
        mean_a,
        mean_b,
        std_a,
        std_b,
        ci_a: (mean_a - margin_a, mean_a + margin_a),
        ci_b: (mean_b - margin_b, mean_b + margin_b),
        difference,
        ci_lower: difference - margin,
        ci_upper: difference + margin,
        t_statistic,
        degrees_of_freedom,
        p_value,
        p_value_method: method,
        cohens_d,
        effect_magnitude,
        statistically_significant,
        practically_significant,
        summary,
    })
}

/// Metric compared between two models
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricComparison {
    /// Metric name (`accuracy`, `latency_ms`, `cost`)
    pub metric: String,
    /// Whether larger values are better for this metric
    pub higher_is_better: bool,
    /// Model preferred on this metric, only when the difference is significant
    pub preferred: Option<String>,
    /// Underlying test
    pub result: ComparisonResult,
}

/// Side-by-side comparison of two models across all simulated metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelComparison {
    pub model_a: String,
    pub model_b: String,
    pub metrics: Vec<MetricComparison>,
    /// Plain-language recommendation
    pub recommendation: String,
}

impl ModelComparison {
    /// Look up the comparison for one metric
    #[must_use]
    pub fn metric(&self, name: &str) -> Option<&MetricComparison> {
        self.metrics.iter().find(|m| m.metric == name)
    }
}

/// Compare accuracy, latency and cost between two models' samples
///
/// # Errors
///
/// Returns `LabError::InvalidArgument` if any metric array is empty.
pub fn compare_models(a: &ModelSamples, b: &ModelSamples) -> Result<ModelComparison> {
    compare_models_with(a, b, PValueMethod::Approximate)
}

/// [`compare_models`] with an explicit p-value method
///
/// # Errors
///
/// Returns `LabError::InvalidArgument` if any metric array is empty.
pub fn compare_models_with(
    a: &ModelSamples,
    b: &ModelSamples,
    method: PValueMethod,
) -> Result<ModelComparison> {
    let metrics = [
        ("accuracy", true, &a.accuracy, &b.accuracy),
        ("latency_ms", false, &a.latency_ms, &b.latency_ms),
        ("cost", false, &a.cost, &b.cost),
    ]
    .into_iter()
    .map(|(metric, higher_is_better, samples_a, samples_b)| -> Result<MetricComparison> {
        let result = compare_with(samples_a, samples_b, method)?;
        let preferred = if result.statistically_significant && result.difference != 0.0 {
            let a_better = (result.difference > 0.0) == higher_is_better;
            Some(if a_better { a.model.clone() } else { b.model.clone() })
        } else {
            None
        };
        Ok(MetricComparison {
            metric: metric.to_string(),
            higher_is_better,
            preferred,
            result,
        })
    })
    .collect::<Result<Vec<_>>>()?;

    let wins = |model: &str| {
        metrics
            .iter()
            .filter(|m| m.preferred.as_deref() == Some(model))
            .count()
    };
    let (wins_a, wins_b) = (wins(&a.model), wins(&b.model));
    let recommendation = match wins_a.cmp(&wins_b) {
        std::cmp::Ordering::Greater => format!(
            "{} is better on {wins_a} of {} metrics",
            a.model,
            metrics.len()
        ),
        std::cmp::Ordering::Less => format!(
            "{} is better on {wins_b} of {} metrics",
            b.model,
            metrics.len()
        ),
        std::cmp::Ordering::Equal if wins_a == 0 => {
            "No statistically significant differences; collect more samples".to_string()
        }
        std::cmp::Ordering::Equal => format!(
            "Trade-off: each model wins {wins_a} metric(s); choose by priority"
        ),
    };

    tracing::info!(
        model_a = %a.model,
        model_b = %b.model,
        wins_a,
        wins_b,
        "model comparison complete"
    );

    Ok(ModelComparison {
        model_a: a.model.clone(),
        model_b: b.model.clone(),
        metrics,
        recommendation,
    })
}

#[cfg(test)]
#[allow(
    clippy::float_cmp,
    clippy::unwrap_used,
    clippy::cast_precision_loss,
    clippy::suboptimal_flops
)]
mod tests {
    use super::*;

    // =========================================================================
    // p-value approximation
    // =========================================================================

    #[test]
    fn test_normal_lookup_table_points() {
        assert_eq!(approximate_p_value(0.0, 100.0), 1.0);
        assert!((approximate_p_value(1.96, 100.0) - 0.05).abs() < 1e-12);
        assert!((approximate_p_value(-2.576, 100.0) - 0.01).abs() < 1e-12);
        assert_eq!(approximate_p_value(10.0, 100.0), 0.001);
    }

    #[test]
    fn test_lookup_is_monotone() {
        let mut previous = 1.0;
        for i in 0..400 {
            let p = approximate_p_value(f64::from(i) * 0.01, 60.0);
            assert!(p <= previous);
            previous = p;
        }
    }

    #[test]
    fn test_small_df_is_conservative() {
        let large = approximate_p_value(2.5, 100.0);
        let small = approximate_p_value(2.5, 10.0);
        assert!(small > large);
        // df below 5 deflates as much as df = 5
        assert_eq!(approximate_p_value(2.5, 2.0), approximate_p_value(2.5, 5.0));
    }

    #[test]
    fn test_student_t_method_close_for_large_df() {
        let exact = student_t_p_value(1.96, 1000.0);
        assert!((exact - 0.05).abs() < 0.002, "p = {exact}");
    }

    // =========================================================================
    // compare
    // =========================================================================

    #[test]
    fn test_compare_identical() {
        let a: Vec<f64> = (0..40).map(|i| 0.9 + f64::from(i) * 0.001).collect();
        let r = compare(&a, &a).unwrap();
        assert_eq!(r.difference, 0.0);
        assert_eq!(r.cohens_d, 0.0);
        assert_eq!(r.t_statistic, 0.0);
        assert_eq!(r.p_value, 1.0);
        assert!(!r.statistically_significant);
        assert!(!r.practically_significant);
        assert_eq!(r.effect_magnitude, EffectMagnitude::Negligible);
    }

    #[test]
    fn test_compare_significant_difference() {
        let a: Vec<f64> = (0..50).map(|i| 0.95 + (i as f64 * 0.002)).collect();
        let b: Vec<f64> = (0..50).map(|i| 0.75 + (i as f64 * 0.002)).collect();
        let r = compare(&a, &b).unwrap();
        assert!(r.statistically_significant);
        assert!(r.practically_significant);
        assert!(r.p_value < 0.05);
        assert!((r.difference - 0.2).abs() < 1e-9);
        assert!(r.ci_lower < r.difference && r.difference < r.ci_upper);
        assert!(r.ci_lower > 0.0);
        assert_eq!(r.degrees_of_freedom, 98.0);
        assert_eq!(r.effect_magnitude, EffectMagnitude::Large);
    }

    #[test]
    fn test_compare_antisymmetric() {
        let a = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.5];
        let b = vec![2.0, 3.5, 4.0, 5.0, 6.0, 7.0, 8.0];
        let ab = compare(&a, &b).unwrap();
        let ba = compare(&b, &a).unwrap();
        assert!((ab.difference + ba.difference).abs() < 1e-12);
        assert!((ab.t_statistic + ba.t_statistic).abs() < 1e-12);
        assert!((ab.cohens_d + ba.cohens_d).abs() < 1e-12);
        assert_eq!(ab.p_value, ba.p_value);
        assert!((ab.ci_lower + ba.ci_upper).abs() < 1e-12);
    }

    #[test]
    fn test_compare_small_sample_uses_wider_interval() {
        let a = vec![1.0, 2.0, 3.0];
        let b = vec![1.5, 2.5, 3.5];
        let r = compare(&a, &b).unwrap();
        assert_eq!(r.degrees_of_freedom, 4.0);
        let se = ((1.0 / 3.0) + (1.0 / 3.0f64)).sqrt();
        assert!((r.ci_upper - r.difference - 2.0 * se).abs() < 1e-9);
    }

    #[test]
    fn test_compare_rejects_empty() {
        assert!(matches!(
            compare(&[], &[1.0]),
            Err(LabError::InvalidArgument(_))
        ));
        assert!(matches!(
            compare(&[1.0], &[]),
            Err(LabError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_compare_single_values_guarded() {
        let r = compare(&[0.9], &[0.8]).unwrap();
        assert_eq!(r.std_a, 0.0);
        assert_eq!(r.t_statistic, 0.0);
        assert_eq!(r.cohens_d, 0.0);
        assert_eq!(r.p_value, 1.0);
        assert!(r.p_value.is_finite());
    }

    #[test]
    fn test_compare_with_student_t_keeps_other_fields() {
        let a = vec![10.0, 12.0, 11.0, 13.0, 10.0, 12.0];
        let b = vec![25.0, 27.0, 26.0, 28.0, 25.0, 26.0];
        let approx = compare(&a, &b).unwrap();
        let exact = compare_with(&a, &b, PValueMethod::StudentT).unwrap();
        assert_eq!(approx.t_statistic, exact.t_statistic);
        assert_eq!(approx.cohens_d, exact.cohens_d);
        assert_eq!(exact.p_value_method, PValueMethod::StudentT);
        assert!(exact.p_value < 0.001);
    }

    #[test]
    fn test_cohens_d_interpretation() {
        assert_eq!(EffectMagnitude::from_cohens_d(0.1), EffectMagnitude::Negligible);
        assert_eq!(EffectMagnitude::from_cohens_d(0.3), EffectMagnitude::Small);
        assert_eq!(EffectMagnitude::from_cohens_d(0.6), EffectMagnitude::Medium);
        assert_eq!(EffectMagnitude::from_cohens_d(1.0), EffectMagnitude::Large);
        assert_eq!(EffectMagnitude::from_cohens_d(-0.9), EffectMagnitude::Large);
        assert_eq!(EffectMagnitude::Medium.to_string(), "medium");
    }

    // =========================================================================
    // compare_models
    // =========================================================================

    fn samples(model: &str, accuracy: f64, latency: f64, cost: f64) -> ModelSamples {
        let jitter = |i: usize| (i % 7) as f64 - 3.0;
        ModelSamples {
            model: model.to_string(),
            accuracy: (0..60).map(|i| accuracy + jitter(i) * 0.005).collect(),
            latency_ms: (0..60).map(|i| latency + jitter(i) * 20.0).collect(),
            cost: (0..60).map(|i| cost + jitter(i) * 0.0001).collect(),
        }
    }

    #[test]
    fn test_compare_models_trade_off() {
        let big = samples("big", 0.95, 1500.0, 0.02);
        let small = samples("small", 0.85, 300.0, 0.002);
        let cmp = compare_models(&big, &small).unwrap();
        assert_eq!(cmp.metrics.len(), 3);
        assert_eq!(
            cmp.metric("accuracy").unwrap().preferred.as_deref(),
            Some("big")
        );
        assert_eq!(
            cmp.metric("latency_ms").unwrap().preferred.as_deref(),
            Some("small")
        );
        assert_eq!(cmp.metric("cost").unwrap().preferred.as_deref(), Some("small"));
        assert!(cmp.recommendation.contains("small"));
    }

    #[test]
    fn test_compare_models_no_difference() {
        let a = samples("a", 0.9, 500.0, 0.01);
        let b = samples("b", 0.9, 500.0, 0.01);
        let cmp = compare_models(&a, &b).unwrap();
        assert!(cmp.metrics.iter().all(|m| m.preferred.is_none()));
        assert!(cmp.recommendation.contains("No statistically significant"));
    }
}

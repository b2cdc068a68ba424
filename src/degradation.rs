//! Production-health monitoring against a historical baseline.
//!
//! Each tracked metric is summarised over the baseline population, the
//! current observation is turned into a z-score, and the largest |z|
//! across metrics drives the alert tier. Retraining is only recommended
//! when a metric moves past the critical threshold in its *bad*
//! direction, so a sharp improvement raises attention but never asks for
//! retraining.

use crate::error::{LabError, Result};
use crate::stats::{mean, std_dev};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as FmtWrite;

/// Which direction of change is harmful for a metric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricDirection {
    /// Lower values are worse (accuracy, throughput)
    HigherIsBetter,
    /// Higher values are worse (latency, error rate, cost)
    LowerIsBetter,
}

impl MetricDirection {
    /// Re-sign a z-score so that positive always means "worse"
    #[must_use]
    pub fn badness(self, z_score: f64) -> f64 {
        match self {
            Self::HigherIsBetter => -z_score,
            Self::LowerIsBetter => z_score,
        }
    }
}

/// Metric monitored by the detector
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedMetric {
    pub name: String,
    pub direction: MetricDirection,
}

impl TrackedMetric {
    #[must_use]
    pub fn new(name: &str, direction: MetricDirection) -> Self {
        Self {
            name: name.to_string(),
            direction,
        }
    }

    #[must_use]
    pub fn higher_is_better(name: &str) -> Self {
        Self::new(name, MetricDirection::HigherIsBetter)
    }

    #[must_use]
    pub fn lower_is_better(name: &str) -> Self {
        Self::new(name, MetricDirection::LowerIsBetter)
    }
}

/// One snapshot of metric values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Observation(BTreeMap<String, f64>);

impl Observation {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    #[must_use]
    pub fn with(mut self, metric: &str, value: f64) -> Self {
        self.0.insert(metric.to_string(), value);
        self
    }

    pub fn insert(&mut self, metric: &str, value: f64) {
        self.0.insert(metric.to_string(), value);
    }

    #[must_use]
    pub fn get(&self, metric: &str) -> Option<f64> {
        self.0.get(metric).copied()
    }
}

impl<S: Into<String>> FromIterator<(S, f64)> for Observation {
    fn from_iter<I: IntoIterator<Item = (S, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// Alert tiers, ordered by severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    Normal,
    Warning,
    Critical,
}

impl std::fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Normal => "normal",
            Self::Warning => "warning",
            Self::Critical => "critical",
        })
    }
}

const fn default_warning_z() -> f64 {
    1.5
}
const fn default_critical_z() -> f64 {
    2.0
}

/// z-score thresholds for the alert tiers
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MonitoringThresholds {
    /// |z| above this raises a warning
    #[serde(default = "default_warning_z")]
    pub warning_z: f64,
    /// |z| above this is critical
    #[serde(default = "default_critical_z")]
    pub critical_z: f64,
}

impl Default for MonitoringThresholds {
    fn default() -> Self {
        Self {
            warning_z: default_warning_z(),
            critical_z: default_critical_z(),
        }
    }
}

impl MonitoringThresholds {
    /// Tier for a magnitude (`|z|` or a directional badness)
    #[must_use]
    pub fn classify(&self, magnitude: f64) -> AlertStatus {
        if magnitude > self.critical_z {
            AlertStatus::Critical
        } else if magnitude > self.warning_z {
            AlertStatus::Warning
        } else {
            AlertStatus::Normal
        }
    }
}

/// Summary of one metric over the baseline population
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineStats {
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    /// `mean - 2σ`
    pub ci_lower: f64,
    /// `mean + 2σ`
    pub ci_upper: f64,
    pub sample_size: usize,
}

impl BaselineStats {
    /// Summarise baseline values for `metric`
    ///
    /// # Errors
    ///
    /// Returns `LabError::InsufficientData` with fewer than two values.
    pub fn from_samples(metric: &str, values: &[f64]) -> Result<Self> {
        if values.len() < 2 {
            return Err(LabError::InsufficientData {
                metric: metric.to_string(),
                required: 2,
                actual: values.len(),
            });
        }
        let mean = mean(values);
        let std_dev = std_dev(values);
        Ok(Self {
            mean,
            std_dev,
            min: values.iter().copied().fold(f64::INFINITY, f64::min),
            max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            ci_lower: 2.0f64.mul_add(-std_dev, mean),
            ci_upper: 2.0f64.mul_add(std_dev, mean),
            sample_size: values.len(),
        })
    }

    /// z-score of a value (0 when the baseline has no spread)
    #[must_use]
    pub fn z_score(&self, value: f64) -> f64 {
        if self.std_dev > 0.0 {
            (value - self.mean) / self.std_dev
        } else {
            0.0
        }
    }

    /// Percent change from the baseline mean (0 when the mean is 0)
    #[must_use]
    pub fn percent_change(&self, value: f64) -> f64 {
        if self.mean == 0.0 {
            0.0
        } else {
            (value - self.mean) / self.mean * 100.0
        }
    }
}

/// Assessment of a single metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricAssessment {
    pub name: String,
    pub direction: MetricDirection,
    pub baseline: BaselineStats,
    pub current: f64,
    pub z_score: f64,
    pub percent_change: f64,
    /// Tier of the move in the harmful direction
    pub severity: AlertStatus,
    pub degraded: bool,
}

/// Health verdict for one current observation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DegradationReport {
    pub metrics: Vec<MetricAssessment>,
    pub z_scores: BTreeMap<String, f64>,
    pub percent_changes: BTreeMap<String, f64>,
    pub degraded: BTreeMap<String, bool>,
    /// Largest |z| across tracked metrics
    pub max_abs_z: f64,
    pub alert_status: AlertStatus,
    pub needs_retraining: bool,
    pub message: String,
}

impl DegradationReport {
    /// Assessment for one metric
    #[must_use]
    pub fn metric(&self, name: &str) -> Option<&MetricAssessment> {
        self.metrics.iter().find(|m| m.name == name)
    }
}

/// Baseline-vs-current degradation detector
#[derive(Debug, Clone, Copy, Default)]
pub struct DegradationDetector {
    thresholds: MonitoringThresholds,
}

impl DegradationDetector {
    #[must_use]
    pub const fn new(thresholds: MonitoringThresholds) -> Self {
        Self { thresholds }
    }

    #[must_use]
    pub const fn thresholds(&self) -> &MonitoringThresholds {
        &self.thresholds
    }

    /// Compute baseline statistics for one metric
    ///
    /// Observations that lack the metric are skipped.
    ///
    /// # Errors
    ///
    /// Returns `LabError::InsufficientData` when fewer than two
    /// observations carry the metric.
    pub fn baseline(&self, population: &[Observation], metric: &str) -> Result<BaselineStats> {
        let values: Vec<f64> = population.iter().filter_map(|o| o.get(metric)).collect();
        BaselineStats::from_samples(metric, &values)
    }

    /// Assess a current observation against the baseline population
    ///
    /// # Errors
    ///
    /// - `LabError::InvalidArgument` when no metrics are tracked
    /// - `LabError::NotFound` when the current observation lacks a tracked metric
    /// - `LabError::InsufficientData` when the baseline is too small for a metric
    pub fn detect(
        &self,
        population: &[Observation],
        current: &Observation,
        tracked: &[TrackedMetric],
    ) -> Result<DegradationReport> {
        if tracked.is_empty() {
            return Err(LabError::InvalidArgument(
                "degradation detection needs at least one tracked metric".to_string(),
            ));
        }

        let mut metrics = Vec::with_capacity(tracked.len());
        for metric in tracked {
            let value = current.get(&metric.name).ok_or_else(|| {
                LabError::NotFound(format!("metric '{}' in current observation", metric.name))
            })?;
            let baseline = self.baseline(population, &metric.name)?;
            let z_score = baseline.z_score(value);
            let severity = self.thresholds.classify(metric.direction.badness(z_score));

            metrics.push(MetricAssessment {
                name: metric.name.clone(),
                direction: metric.direction,
                current: value,
                z_score,
                percent_change: baseline.percent_change(value),
                severity,
                degraded: severity != AlertStatus::Normal,
                baseline,
            });
        }

        let max_abs_z = metrics.iter().map(|m| m.z_score.abs()).fold(0.0, f64::max);
        let alert_status = self.thresholds.classify(max_abs_z);
        let needs_retraining = metrics.iter().any(|m| m.severity == AlertStatus::Critical);
        let message = build_message(&metrics, alert_status, &self.thresholds);

        if alert_status == AlertStatus::Normal {
            tracing::debug!(max_abs_z, "metrics within baseline range");
        } else {
            tracing::warn!(
                alert = %alert_status,
                max_abs_z,
                needs_retraining,
                "{message}"
            );
        }

        Ok(DegradationReport {
            z_scores: metrics.iter().map(|m| (m.name.clone(), m.z_score)).collect(),
            percent_changes: metrics
                .iter()
                .map(|m| (m.name.clone(), m.percent_change))
                .collect(),
            degraded: metrics.iter().map(|m| (m.name.clone(), m.degraded)).collect(),
            metrics,
            max_abs_z,
            alert_status,
            needs_retraining,
            message,
        })
    }
}

/// Detect degradation with the default 1.5 / 2.0 thresholds
///
/// # Errors
///
/// See [`DegradationDetector::detect`].
pub fn detect(
    population: &[Observation],
    current: &Observation,
    tracked: &[TrackedMetric],
) -> Result<DegradationReport> {
    DegradationDetector::default().detect(population, current, tracked)
}

fn describe(list: &[&MetricAssessment]) -> String {
    list.iter()
        .map(|m| {
            format!(
                "{} (z={:.2}, {:+.1}%)",
                m.name, m.z_score, m.percent_change
            )
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn build_message(
    metrics: &[MetricAssessment],
    alert_status: AlertStatus,
    thresholds: &MonitoringThresholds,
) -> String {
    let critical: Vec<_> = metrics
        .iter()
        .filter(|m| m.severity == AlertStatus::Critical)
        .collect();
    let warning: Vec<_> = metrics
        .iter()
        .filter(|m| m.severity == AlertStatus::Warning)
        .collect();

    if critical.is_empty() && warning.is_empty() {
        if alert_status == AlertStatus::Normal {
            return "All metrics within baseline range".to_string();
        }
        let shifted: Vec<&str> = metrics
            .iter()
            .filter(|m| thresholds.classify(m.z_score.abs()) != AlertStatus::Normal)
            .map(|m| m.name.as_str())
            .collect();
        return format!(
            "Metrics shifted from baseline without degrading: {}",
            shifted.join(", ")
        );
    }

    let mut message = String::new();
    if !critical.is_empty() {
        write!(message, "CRITICAL: {}", describe(&critical)).ok();
    }
    if !warning.is_empty() {
        if !message.is_empty() {
            message.push_str("; ");
        }
        write!(message, "WARNING: {}", describe(&warning)).ok();
    }
    message
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;

    fn accuracy_population() -> Vec<Observation> {
        [0.90, 0.91, 0.92, 0.93, 0.94]
            .iter()
            .cycle()
            .take(30)
            .map(|&v| Observation::new().with("accuracy", v))
            .collect()
    }

    fn multi_population() -> Vec<Observation> {
        (0..30)
            .map(|i| {
                let wobble = f64::from(i % 5) - 2.0;
                Observation::new()
                    .with("accuracy", 0.01f64.mul_add(wobble, 0.92))
                    .with("latency_ms", 20.0f64.mul_add(wobble, 800.0))
                    .with("error_rate", 0.002f64.mul_add(wobble, 0.02))
            })
            .collect()
    }

    fn tracked() -> Vec<TrackedMetric> {
        vec![
            TrackedMetric::higher_is_better("accuracy"),
            TrackedMetric::lower_is_better("latency_ms"),
            TrackedMetric::lower_is_better("error_rate"),
        ]
    }

    // =========================================================================
    // Baseline statistics
    // =========================================================================

    #[test]
    fn test_baseline_stats() {
        let detector = DegradationDetector::default();
        let stats = detector.baseline(&accuracy_population(), "accuracy").unwrap();
        assert_eq!(stats.sample_size, 30);
        assert!((stats.mean - 0.92).abs() < 1e-12);
        assert!((stats.std_dev - 0.014_384).abs() < 1e-5, "{}", stats.std_dev);
        assert_eq!(stats.min, 0.90);
        assert_eq!(stats.max, 0.94);
        assert!((stats.ci_upper - stats.mean - 2.0 * stats.std_dev).abs() < 1e-12);
    }

    #[test]
    fn test_baseline_insufficient_data() {
        let population = vec![Observation::new().with("accuracy", 0.9)];
        let result = detect(
            &population,
            &Observation::new().with("accuracy", 0.9),
            &[TrackedMetric::higher_is_better("accuracy")],
        );
        assert!(matches!(
            result,
            Err(LabError::InsufficientData { required: 2, actual: 1, .. })
        ));
    }

    #[test]
    fn test_zero_spread_is_guarded() {
        let stats = BaselineStats::from_samples("x", &[5.0, 5.0, 5.0]).unwrap();
        assert_eq!(stats.z_score(9.0), 0.0);
        let zero_mean = BaselineStats::from_samples("y", &[-1.0, 1.0]).unwrap();
        assert_eq!(zero_mean.percent_change(3.0), 0.0);
    }

    // =========================================================================
    // Detection
    // =========================================================================

    #[test]
    fn test_at_baseline_mean_is_normal() {
        let current = Observation::new()
            .with("accuracy", 0.92)
            .with("latency_ms", 800.0)
            .with("error_rate", 0.02);
        let report = detect(&multi_population(), &current, &tracked()).unwrap();
        assert_eq!(report.alert_status, AlertStatus::Normal);
        assert!(!report.needs_retraining);
        assert!(report.degraded.values().all(|d| !d));
        assert_eq!(report.message, "All metrics within baseline range");
    }

    #[test]
    fn test_three_sigma_accuracy_drop_needs_retraining() {
        let population = multi_population();
        let detector = DegradationDetector::default();
        let stats = detector.baseline(&population, "accuracy").unwrap();
        let current = Observation::new()
            .with("accuracy", 3.0f64.mul_add(-stats.std_dev, stats.mean))
            .with("latency_ms", 800.0)
            .with("error_rate", 0.02);
        let report = detector.detect(&population, &current, &tracked()).unwrap();
        assert_eq!(report.alert_status, AlertStatus::Critical);
        assert!(report.needs_retraining);
        assert!((report.z_scores["accuracy"] + 3.0).abs() < 1e-9);
        assert!(report.degraded["accuracy"]);
        assert!(report.message.starts_with("CRITICAL: accuracy"));
    }

    #[test]
    fn test_latency_spike_is_bad_direction() {
        let current = Observation::new()
            .with("accuracy", 0.92)
            .with("latency_ms", 900.0)
            .with("error_rate", 0.02);
        let report = detect(&multi_population(), &current, &tracked()).unwrap();
        assert!(report.needs_retraining);
        assert_eq!(report.metric("latency_ms").unwrap().severity, AlertStatus::Critical);
        assert!(report.percent_changes["latency_ms"] > 12.0);
    }

    #[test]
    fn test_improvement_alerts_without_retraining() {
        let current = Observation::new()
            .with("accuracy", 0.92)
            .with("latency_ms", 650.0)
            .with("error_rate", 0.02);
        let report = detect(&multi_population(), &current, &tracked()).unwrap();
        assert_eq!(report.alert_status, AlertStatus::Critical);
        assert!(!report.needs_retraining);
        assert!(!report.degraded["latency_ms"]);
        assert!(report.message.contains("without degrading"));
        assert!(report.message.contains("latency_ms"));
    }

    #[test]
    fn test_warning_and_critical_tiers_in_message() {
        let population = multi_population();
        let detector = DegradationDetector::default();
        let acc = detector.baseline(&population, "accuracy").unwrap();
        let err = detector.baseline(&population, "error_rate").unwrap();
        let current = Observation::new()
            .with("accuracy", 2.5f64.mul_add(-acc.std_dev, acc.mean))
            .with("latency_ms", 800.0)
            .with("error_rate", 1.75f64.mul_add(err.std_dev, err.mean));
        let report = detector.detect(&population, &current, &tracked()).unwrap();
        assert_eq!(report.metric("accuracy").unwrap().severity, AlertStatus::Critical);
        assert_eq!(report.metric("error_rate").unwrap().severity, AlertStatus::Warning);
        assert!(report.message.contains("CRITICAL: accuracy"));
        assert!(report.message.contains("WARNING: error_rate"));
    }

    #[test]
    fn test_mild_dip_is_not_critical() {
        let population = accuracy_population();
        let tracked = [TrackedMetric::higher_is_better("accuracy")];

        let report = detect(&population, &Observation::new().with("accuracy", 0.90), &tracked)
            .unwrap();
        assert_eq!(report.alert_status, AlertStatus::Normal);

        let report = detect(&population, &Observation::new().with("accuracy", 0.895), &tracked)
            .unwrap();
        assert_eq!(report.alert_status, AlertStatus::Warning);
        assert!(!report.needs_retraining);
    }

    #[test]
    fn test_point_eight_nine_crosses_critical() {
        // 0.89 sits about 2.09 sigma below the 0.90..0.94 baseline
        let report = detect(
            &accuracy_population(),
            &Observation::new().with("accuracy", 0.89),
            &[TrackedMetric::higher_is_better("accuracy")],
        )
        .unwrap();
        let z = report.z_scores["accuracy"];
        assert!(z < -2.0 && z > -2.2, "z = {z}");
        assert_eq!(report.alert_status, AlertStatus::Critical);
        assert!(report.needs_retraining);
    }

    #[test]
    fn test_severe_drop_is_critical() {
        let report = detect(
            &accuracy_population(),
            &Observation::new().with("accuracy", 0.80),
            &[TrackedMetric::higher_is_better("accuracy")],
        )
        .unwrap();
        assert_eq!(report.alert_status, AlertStatus::Critical);
        assert!(report.needs_retraining);
        assert!(report.percent_changes["accuracy"] < -13.0);
    }

    #[test]
    fn test_missing_current_metric() {
        let result = detect(
            &multi_population(),
            &Observation::new().with("accuracy", 0.9),
            &tracked(),
        );
        assert!(matches!(result, Err(LabError::NotFound(_))));
    }

    #[test]
    fn test_no_tracked_metrics() {
        let result = detect(&multi_population(), &Observation::new(), &[]);
        assert!(matches!(result, Err(LabError::InvalidArgument(_))));
    }

    #[test]
    fn test_custom_thresholds() {
        let detector = DegradationDetector::new(MonitoringThresholds {
            warning_z: 3.0,
            critical_z: 4.0,
        });
        let report = detector
            .detect(
                &accuracy_population(),
                &Observation::new().with("accuracy", 0.88),
                &[TrackedMetric::higher_is_better("accuracy")],
            )
            .unwrap();
        assert_eq!(report.alert_status, AlertStatus::Normal);
    }

    #[test]
    fn test_alert_status_ordering() {
        assert!(AlertStatus::Critical > AlertStatus::Warning);
        assert!(AlertStatus::Warning > AlertStatus::Normal);
        assert_eq!(AlertStatus::Warning.to_string(), "warning");
    }
}

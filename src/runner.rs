//! Scenario runner.
//!
//! Owns the immutable profile registry and model catalog built from a
//! [`LabConfig`] and runs the lab scenarios against them: latency
//! sampling, hedging, model comparison, monitoring and ensembles.

use crate::compare::{compare_models_with, ModelComparison};
use crate::config::{ConfigError, LabConfig};
use crate::degradation::{DegradationDetector, DegradationReport, Observation, TrackedMetric};
use crate::ensemble::{Ensemble, EnsembleReport, VotingStrategy};
use crate::error::LabError;
use crate::hedging::{HedgePolicy, HedgeReport, HedgingSimulator};
use crate::latency::{LatencyModel, ProfileRegistry};
use crate::report::{LabReport, LatencySection, ReportBuilder};
use crate::rng::Seed;
use crate::simulator::{ModelCatalog, QuerySimulator};
use crate::stats::{analyze, histogram};
use thiserror::Error;

/// Errors that can occur while running scenarios
#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Lab(#[from] LabError),
}

pub type Result<T> = std::result::Result<T, RunnerError>;

/// Monitoring scenario parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonitorPlan {
    /// Healthy runs forming the baseline population
    pub baseline_runs: usize,
    /// Queries per run
    pub run_size: usize,
    /// Accuracy drop applied to the current run
    pub degrade_by: f64,
}

impl Default for MonitorPlan {
    fn default() -> Self {
        Self {
            baseline_runs: 20,
            run_size: 50,
            degrade_by: 0.0,
        }
    }
}

/// Full-report scenario parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReportPlan {
    /// Samples per latency profile, hedging evaluation and model batch
    pub samples: usize,
    /// Profile quantile used as the hedge trigger
    pub hedge_quantile: f64,
    /// Trials per ensemble
    pub ensemble_trials: usize,
    pub monitor: MonitorPlan,
}

impl Default for ReportPlan {
    fn default() -> Self {
        Self {
            samples: 1_000,
            hedge_quantile: 0.95,
            ensemble_trials: 200,
            monitor: MonitorPlan::default(),
        }
    }
}

/// Configured lab
#[derive(Debug)]
pub struct Lab {
    config: LabConfig,
    profiles: ProfileRegistry,
    catalog: ModelCatalog,
}

impl Lab {
    /// Validate a configuration and build its registry and catalog
    ///
    /// # Errors
    ///
    /// Returns `RunnerError::Config` if the configuration is invalid.
    pub fn new(config: LabConfig) -> Result<Self> {
        config.validate()?;
        let profiles = config.profile_registry()?;
        let catalog = config.model_catalog(&profiles)?;
        tracing::debug!(
            profiles = profiles.len(),
            models = catalog.len(),
            "lab configured"
        );
        Ok(Self {
            config,
            profiles,
            catalog,
        })
    }

    #[must_use]
    pub const fn config(&self) -> &LabConfig {
        &self.config
    }

    #[must_use]
    pub const fn profiles(&self) -> &ProfileRegistry {
        &self.profiles
    }

    #[must_use]
    pub const fn catalog(&self) -> &ModelCatalog {
        &self.catalog
    }

    /// Seed from an explicit override, else from the configuration
    ///
    /// With neither, a fresh seed is drawn and logged so the run can be
    /// replayed with `--seed`.
    #[must_use]
    pub fn seed(&self, explicit: Option<u64>) -> Seed {
        if let Some(base) = explicit {
            return Seed::new(base);
        }
        let seed = self.config.stats.seed();
        if self.config.stats.seed.is_none() {
            tracing::info!(seed = seed.base, "no seed configured, drew a fresh one");
        }
        seed
    }

    fn latency_model(&self) -> LatencyModel<'_> {
        LatencyModel::new(&self.profiles)
    }

    fn simulator(&self) -> QuerySimulator<'_> {
        QuerySimulator::new(&self.catalog, &self.profiles)
    }

    /// Sample a profile and summarise it
    ///
    /// # Errors
    ///
    /// Returns `LabError::NotFound` for an unknown profile.
    pub fn latency(&self, profile: &str, count: usize, seed: Seed) -> Result<LatencySection> {
        let samples = self
            .latency_model()
            .simulate_batch(profile, count, &mut seed.rng())?;
        Ok(LatencySection {
            profile: profile.to_string(),
            summary: analyze(&samples),
            histogram: histogram(&samples, self.config.stats.histogram_buckets),
        })
    }

    /// Evaluate a hedging policy on a profile
    ///
    /// # Errors
    ///
    /// Propagates [`HedgingSimulator::evaluate`] errors.
    pub fn hedge(
        &self,
        profile: &str,
        policy: HedgePolicy,
        count: usize,
        seed: Seed,
    ) -> Result<HedgeReport> {
        let report = HedgingSimulator::new(self.latency_model()).evaluate(
            profile,
            policy,
            count,
            &mut seed.rng(),
        )?;
        Ok(report)
    }

    /// Simulate two models and compare their metrics
    ///
    /// # Errors
    ///
    /// Returns `LabError::NotFound` for unknown models and
    /// `LabError::InvalidArgument` for `count == 0`.
    pub fn compare(
        &self,
        model_a: &str,
        model_b: &str,
        count: usize,
        seed: Seed,
    ) -> Result<ModelComparison> {
        let sim = self.simulator();
        let a = sim.run_batch(model_a, count, &mut seed.fork(0).rng())?;
        let b = sim.run_batch(model_b, count, &mut seed.fork(1).rng())?;
        Ok(compare_models_with(
            &a,
            &b,
            self.config.stats.p_value_method,
        )?)
    }

    /// Build a baseline from healthy runs and check a drifted run against it
    ///
    /// Baseline run `i` uses `seed.split(i)`; the current run uses the next
    /// split, with the model's accuracy range lowered by `plan.degrade_by`.
    ///
    /// # Errors
    ///
    /// Returns `LabError::InvalidArgument` for an empty `run_size`,
    /// `LabError::NotFound` for unknown models and
    /// `LabError::InsufficientData` for fewer than two baseline runs.
    pub fn monitor(&self, model: &str, plan: MonitorPlan, seed: Seed) -> Result<DegradationReport> {
        if plan.run_size == 0 {
            return Err(LabError::InvalidArgument(
                "monitoring needs at least one query per run".to_string(),
            )
            .into());
        }
        let sim = self.simulator();
        let spec = self.catalog.get(model)?;

        let baseline = (0..plan.baseline_runs as u64)
            .map(|i| {
                sim.run_batch_spec(spec, plan.run_size, &mut seed.split(i).rng())
                    .map(|samples| samples.observation())
            })
            .collect::<std::result::Result<Vec<Observation>, LabError>>()?;

        let drifted = spec.with_accuracy_shift(-plan.degrade_by);
        let current = sim
            .run_batch_spec(
                &drifted,
                plan.run_size,
                &mut seed.split(plan.baseline_runs as u64).rng(),
            )?
            .observation();

        let tracked = [
            TrackedMetric::higher_is_better("accuracy"),
            TrackedMetric::lower_is_better("latency_ms"),
            TrackedMetric::lower_is_better("cost"),
        ];
        let report =
            DegradationDetector::new(self.config.monitoring).detect(&baseline, &current, &tracked)?;
        Ok(report)
    }

    /// Evaluate an ensemble of catalog models
    ///
    /// # Errors
    ///
    /// Propagates [`Ensemble::evaluate`] errors.
    pub fn ensemble(
        &self,
        members: Vec<String>,
        strategy: VotingStrategy,
        trials: usize,
        seed: Seed,
    ) -> Result<EnsembleReport> {
        let ensemble = Ensemble::new(members, strategy)?;
        Ok(ensemble.evaluate(&self.simulator(), trials, seed)?)
    }

    /// Run every scenario over the whole configuration
    ///
    /// Each section draws from its own split of `seed`.
    ///
    /// # Errors
    ///
    /// Propagates the first scenario error.
    pub fn full_report(&self, plan: &ReportPlan, seed: Seed) -> Result<LabReport> {
        let mut builder = ReportBuilder::new("Reliability Lab Report")
            .with_seed(seed)
            .with_p_value_method(self.config.stats.p_value_method);

        let latency_seed = seed.split(0);
        let hedge_seed = seed.split(1);
        for (i, profile) in self.profiles.names().enumerate() {
            let samples = self.latency_model().simulate_batch(
                profile,
                plan.samples,
                &mut latency_seed.fork(i as u64).rng(),
            )?;
            builder.add_latency(profile, &samples, self.config.stats.histogram_buckets);

            let policy = HedgePolicy::Percentile {
                quantile: plan.hedge_quantile,
            };
            builder.add_hedging(self.hedge(
                profile,
                policy,
                plan.samples,
                hedge_seed.fork(i as u64),
            )?);
        }

        let models: Vec<&str> = self.catalog.names().collect();
        let compare_seed = seed.split(2);
        let mut pair = 0_u64;
        for (i, a) in models.iter().enumerate() {
            for b in &models[i + 1..] {
                builder.add_comparison(self.compare(
                    a,
                    b,
                    plan.samples,
                    compare_seed.split(pair),
                )?);
                pair += 1;
            }
        }

        if !models.is_empty() {
            let members: Vec<String> = models.iter().map(ToString::to_string).collect();
            let ensemble_seed = seed.split(3);
            for (i, strategy) in [VotingStrategy::Majority, VotingStrategy::FirstResponse]
                .into_iter()
                .enumerate()
            {
                builder.add_ensemble(self.ensemble(
                    members.clone(),
                    strategy,
                    plan.ensemble_trials,
                    ensemble_seed.split(i as u64),
                )?);
            }
        }

        let monitor_seed = seed.split(4);
        for (i, model) in models.iter().enumerate() {
            let report = self.monitor(model, plan.monitor, monitor_seed.split(i as u64))?;
            builder.add_degradation(model, report);
        }

        let report = builder.build();
        tracing::info!(
            profiles = report.latency.len(),
            comparisons = report.comparisons.len(),
            ensembles = report.ensembles.len(),
            "full report generated"
        );
        Ok(report)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::degradation::AlertStatus;

    fn lab() -> Lab {
        Lab::new(LabConfig::default()).unwrap()
    }

    #[test]
    fn test_lab_new_rejects_invalid_config() {
        let mut config = LabConfig::default();
        config.profiles[0].p95 = config.profiles[0].p50 - 1.0;
        assert!(matches!(Lab::new(config), Err(RunnerError::Config(_))));
    }

    #[test]
    fn test_seed_override() {
        let lab = lab();
        assert_eq!(lab.seed(Some(5)), Seed::new(5));

        let mut config = LabConfig::default();
        config.stats.seed = Some(9);
        assert_eq!(Lab::new(config).unwrap().seed(None), Seed::new(9));
    }

    #[test]
    fn test_unseeded_runs_differ() {
        let lab = lab();
        let first = lab.seed(None);
        let second = lab.seed(None);
        assert_ne!(first, second);
        let a = lab.latency("fast", 50, first).unwrap();
        let b = lab.latency("fast", 50, second).unwrap();
        assert_ne!(a.summary, b.summary);
        // the drawn seed replays the run
        assert_eq!(lab.latency("fast", 50, first).unwrap().summary, a.summary);
    }

    #[test]
    fn test_latency_section() {
        let section = lab().latency("fast", 2_000, Seed::new(1)).unwrap();
        assert_eq!(section.summary.count, 2_000);
        assert_eq!(section.histogram.len(), 10);
        assert!(section.summary.p50 <= section.summary.p99);
    }

    #[test]
    fn test_unknown_profile_is_not_found() {
        let err = lab().latency("warp", 10, Seed::new(1)).unwrap_err();
        assert!(matches!(err, RunnerError::Lab(LabError::NotFound(_))));
    }

    #[test]
    fn test_compare_is_reproducible() {
        let lab = lab();
        let first = lab.compare("large", "small", 300, Seed::new(2)).unwrap();
        let second = lab.compare("large", "small", 300, Seed::new(2)).unwrap();
        let acc = |c: &ModelComparison| c.metric("accuracy").unwrap().result.p_value;
        assert_eq!(acc(&first), acc(&second));
    }

    #[test]
    fn test_compare_prefers_more_accurate_model() {
        let comparison = lab().compare("large", "small", 500, Seed::new(2)).unwrap();
        let accuracy = comparison.metric("accuracy").unwrap();
        assert_eq!(accuracy.preferred.as_deref(), Some("large"));
        let cost = comparison.metric("cost").unwrap();
        assert_eq!(cost.preferred.as_deref(), Some("small"));
    }

    #[test]
    fn test_monitor_flags_large_drop() {
        let plan = MonitorPlan {
            degrade_by: 0.1,
            ..MonitorPlan::default()
        };
        let report = lab().monitor("medium", plan, Seed::new(11)).unwrap();
        assert_eq!(report.alert_status, AlertStatus::Critical);
        assert!(report.needs_retraining);
        assert!(report.metric("accuracy").unwrap().degraded);
    }

    #[test]
    fn test_monitor_needs_two_baseline_runs() {
        let plan = MonitorPlan {
            baseline_runs: 1,
            ..MonitorPlan::default()
        };
        let err = lab().monitor("medium", plan, Seed::new(11)).unwrap_err();
        assert!(matches!(
            err,
            RunnerError::Lab(LabError::InsufficientData { .. })
        ));
    }

    #[test]
    fn test_monitor_rejects_empty_runs() {
        let plan = MonitorPlan {
            run_size: 0,
            degrade_by: 0.5,
            ..MonitorPlan::default()
        };
        let err = lab().monitor("medium", plan, Seed::new(11)).unwrap_err();
        assert!(matches!(err, RunnerError::Lab(LabError::InvalidArgument(_))));
    }

    #[test]
    fn test_full_report_covers_configuration() {
        let plan = ReportPlan {
            samples: 200,
            ensemble_trials: 20,
            ..ReportPlan::default()
        };
        let report = lab().full_report(&plan, Seed::new(9)).unwrap();
        assert_eq!(report.latency.len(), 3);
        assert_eq!(report.hedging.len(), 3);
        assert_eq!(report.comparisons.len(), 6);
        assert_eq!(report.ensembles.len(), 2);
        assert_eq!(report.degradation.len(), 4);
    }
}

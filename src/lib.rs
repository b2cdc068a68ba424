//! # Reliability Lab
//!
//! Statistics and simulation engine for LLM serving reliability.
//!
//! ## Components
//!
//! - **Latency**: piecewise-uniform sampling from p50/p95/p99 anchors
//!   with a rare extreme tail
//! - **Hedging**: backup-request races, firing rates and policy evaluation
//! - **Statistics**: mean, standard deviation, nearest-rank percentiles,
//!   histograms
//! - **Comparison**: Welch-style two-sample test with Cohen's d and a
//!   plain-language verdict
//! - **Degradation**: z-score drift detection against a baseline
//!   population with warning/critical tiers
//!
//! Simulated models, ensembles and reports sit on top of these.
//!
//! ## Pipeline
//!
//! ```text
//! LabConfig (YAML)
//!        ↓
//! ProfileRegistry + ModelCatalog (immutable)
//!        ↓
//! LatencyModel / QuerySimulator  ← Seed → ChaCha8Rng
//!        ↓
//! Hedging · Comparison · Degradation · Ensembles
//!        ↓
//! LabReport (JSON | markdown)
//! ```
//!
//! Every randomised operation takes its generator explicitly, so runs are
//! reproducible from a [`Seed`].

pub mod compare;
pub mod config;
pub mod degradation;
pub mod ensemble;
pub mod error;
pub mod hedging;
pub mod latency;
pub mod report;
pub mod rng;
pub mod runner;
pub mod simulator;
pub mod stats;

pub use compare::{
    approximate_p_value, compare, compare_models, compare_models_with, compare_with,
    critical_value, ComparisonResult, EffectMagnitude, MetricComparison, ModelComparison,
    PValueMethod, ALPHA, PRACTICAL_EFFECT,
};
pub use config::{ConfigError, LabConfig, StatSettings};
pub use degradation::{
    detect, AlertStatus, BaselineStats, DegradationDetector, DegradationReport, MetricAssessment,
    MetricDirection, MonitoringThresholds, Observation, TrackedMetric,
};
pub use ensemble::{Ensemble, EnsembleOutcome, EnsembleReport, VotingStrategy};
pub use error::{LabError, Result};
pub use hedging::{
    resolve_race, HedgeOutcome, HedgePolicy, HedgeReport, HedgeWinner, HedgingSimulator,
};
pub use latency::{
    builtin_profiles, LatencyDistribution, LatencyModel, LatencyProfile, ProfileRegistry,
};
pub use report::{DegradationSection, LabReport, LatencySection, ReportBuilder, ReportMetadata};
pub use rng::Seed;
pub use runner::{Lab, MonitorPlan, ReportPlan, RunnerError};
pub use simulator::{
    builtin_models, ModelCatalog, ModelSamples, ModelSpec, QueryResult, QuerySimulator,
};
pub use stats::{
    analyze, histogram, mean, mean_ci, percentile, std_dev, variance, HistogramBucket,
    SampleSummary,
};

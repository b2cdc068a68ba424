//! Integration tests for the reliability-lab CLI and library.
//!
//! These tests verify end-to-end functionality including:
//! - CLI commands work correctly
//! - Library components compose through the public API
//! - Configuration files load and drive the lab

#![allow(clippy::unwrap_used)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::float_cmp)]

use reliability_lab::{
    analyze, compare, detect, AlertStatus, Ensemble, HedgePolicy, HedgingSimulator, Lab,
    LabConfig, LatencyModel, ModelCatalog, Observation, ProfileRegistry, QuerySimulator,
    ReportPlan, Seed, TrackedMetric, VotingStrategy,
};
use std::process::Command;

// ============================================================================
// CLI Integration Tests
// ============================================================================

#[test]
fn test_cli_help_command() {
    let output = Command::new("cargo")
        .args(["run", "--quiet", "--", "--help"])
        .output()
        .expect("Failed to execute CLI");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.contains("reliability-lab"),
        "Help should mention binary name"
    );
    for command in ["latency", "hedge", "compare", "monitor", "ensemble", "report"] {
        assert!(stdout.contains(command), "Help should list {command}");
    }
}

#[test]
fn test_cli_latency_json() {
    let output = Command::new("cargo")
        .args([
            "run", "--quiet", "--", "--format", "json", "latency", "--profile", "fast",
            "--count", "500", "--seed", "7",
        ])
        .output()
        .expect("Failed to execute CLI");

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["latency"][0]["profile"], "fast");
    assert_eq!(value["latency"][0]["summary"]["count"], 500);
    assert_eq!(value["metadata"]["seed"]["base"], 7);
}

#[test]
fn test_cli_hedge_requires_trigger() {
    let output = Command::new("cargo")
        .args(["run", "--quiet", "--", "hedge", "--profile", "fast"])
        .output()
        .expect("Failed to execute CLI");
    assert!(!output.status.success());
}

#[test]
fn test_cli_unknown_profile_fails() {
    let output = Command::new("cargo")
        .args(["run", "--quiet", "--", "latency", "--profile", "nope"])
        .output()
        .expect("Failed to execute CLI");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("nope"), "stderr: {stderr}");
}

// ============================================================================
// Library End-to-End
// ============================================================================

#[test]
fn test_degradation_end_to_end_scenario() {
    let baseline: Vec<Observation> = [0.90, 0.91, 0.92, 0.93, 0.94]
        .iter()
        .cycle()
        .take(30)
        .map(|&v| Observation::new().with("accuracy", v))
        .collect();
    let tracked = [TrackedMetric::higher_is_better("accuracy")];

    let mild = detect(&baseline, &Observation::new().with("accuracy", 0.90), &tracked).unwrap();
    assert_eq!(mild.alert_status, AlertStatus::Normal);
    assert!(!mild.needs_retraining);

    let dip = detect(&baseline, &Observation::new().with("accuracy", 0.895), &tracked).unwrap();
    assert_eq!(dip.alert_status, AlertStatus::Warning);
    assert!(!dip.needs_retraining);

    let crash = detect(&baseline, &Observation::new().with("accuracy", 0.80), &tracked).unwrap();
    assert_eq!(crash.alert_status, AlertStatus::Critical);
    assert!(crash.needs_retraining);
    assert!(crash.message.contains("accuracy"));
}

#[test]
fn test_hedging_reduces_tail_latency() {
    let profiles = ProfileRegistry::builtin();
    let hedging = HedgingSimulator::new(LatencyModel::new(&profiles));
    let mut rng = Seed::new(21).rng();

    let report = hedging
        .evaluate("slow", HedgePolicy::Percentile { quantile: 0.95 }, 20_000, &mut rng)
        .unwrap();
    assert!(report.hedged.p99 < report.baseline.p99);
    assert!(report.firing_rate > 0.0 && report.firing_rate < 0.1);
    assert_eq!(report.extra_load_pct, report.firing_rate * 100.0);
}

#[test]
fn test_simulated_models_compare_consistently() {
    let profiles = ProfileRegistry::builtin();
    let catalog = ModelCatalog::builtin();
    let sim = QuerySimulator::new(&catalog, &profiles);

    let large = sim.run_batch("large", 400, &mut Seed::new(1).rng()).unwrap();
    let small = sim.run_batch("small", 400, &mut Seed::new(2).rng()).unwrap();

    let accuracy = compare(&large.accuracy, &small.accuracy).unwrap();
    assert!(accuracy.statistically_significant);
    assert!(accuracy.practically_significant);
    assert!(accuracy.difference > 0.0);

    let latency = compare(&large.latency_ms, &small.latency_ms).unwrap();
    assert!(latency.difference > 0.0);
    assert!(analyze(&large.latency_ms).p50 > analyze(&small.latency_ms).p50);
}

#[test]
fn test_ensemble_runs_are_reproducible() {
    let profiles = ProfileRegistry::builtin();
    let catalog = ModelCatalog::builtin();
    let sim = QuerySimulator::new(&catalog, &profiles);
    let ensemble = Ensemble::new(
        vec!["medium".to_string(), "small".to_string(), "distilled".to_string()],
        VotingStrategy::Majority,
    )
    .unwrap();

    let first = ensemble.evaluate(&sim, 100, Seed::new(77)).unwrap();
    let second = ensemble.evaluate(&sim, 100, Seed::new(77)).unwrap();
    assert_eq!(first, second);
}

// ============================================================================
// Configuration
// ============================================================================

#[test]
fn test_shipped_config_drives_lab() {
    let config = LabConfig::load("config/lab.yaml").unwrap();
    let lab = Lab::new(config).unwrap();
    assert!(lab.profiles().get("regional").is_ok());
    assert!(lab.catalog().get("regional-small").is_ok());

    let section = lab.latency("regional", 1_000, lab.seed(None)).unwrap();
    assert_eq!(section.summary.count, 1_000);
}

#[test]
fn test_config_file_overrides_profile() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("lab.yaml");
    std::fs::write(
        &path,
        "profiles:\n  - { name: fast, p50: 10, p95: 20, p99: 30, tail_probability: 0.0 }\n",
    )
    .unwrap();

    let lab = Lab::new(LabConfig::load(&path).unwrap()).unwrap();
    let section = lab.latency("fast", 2_000, Seed::new(3)).unwrap();
    assert!(section.summary.max <= 30.0);
    assert!(section.summary.min >= 5.0);
}

#[test]
fn test_full_report_renders() {
    let lab = Lab::new(LabConfig::default()).unwrap();
    let plan = ReportPlan {
        samples: 200,
        ensemble_trials: 20,
        ..ReportPlan::default()
    };
    let report = lab.full_report(&plan, Seed::new(5)).unwrap();

    let markdown = report.to_markdown();
    assert!(markdown.contains("# Reliability Lab Report"));
    assert!(markdown.contains("## Hedging"));
    assert!(markdown.contains("## Degradation"));

    let json = report.to_json().unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["comparisons"].as_array().unwrap().len(), 6);
}

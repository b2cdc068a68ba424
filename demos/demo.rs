//! Demo: reliability-lab library in action
use reliability_lab::{
    analyze, compare, detect, histogram, DegradationDetector, Ensemble, HedgePolicy,
    HedgingSimulator, LatencyModel, ModelCatalog, MonitoringThresholds, Observation,
    ProfileRegistry, QuerySimulator, ReportBuilder, Seed, TrackedMetric, VotingStrategy,
};

#[allow(clippy::too_many_lines)]
fn main() -> reliability_lab::Result<()> {
    println!("=== Reliability Lab Demo ===\n");

    let profiles = ProfileRegistry::builtin();
    let catalog = ModelCatalog::builtin();
    let latency = LatencyModel::new(&profiles);
    let seed = Seed::new(2024);

    // 1. Latency profiles
    println!("⏱  Latency Profiles...\n");
    for name in profiles.names() {
        let d = latency.distribution(name)?;
        println!(
            "  {name:<8} p50={:>6.0}ms  p90={:>6.0}ms  p99={:>6.0}ms  max≈{:>6.0}ms",
            d.p50, d.p90, d.p99, d.p100
        );
    }

    // Unseeded sampling uses the thread-local generator
    let mut thread_rng = rand::thread_rng();
    let one = latency.sample("fast", &mut thread_rng)?;
    println!("\n  One unseeded 'fast' sample: {one:.0}ms");

    let samples = latency.simulate_batch("medium", 10_000, &mut seed.rng())?;
    let summary = analyze(&samples);
    println!(
        "  10k 'medium' samples: mean={:.0}ms p50={:.0}ms p99={:.0}ms",
        summary.mean, summary.p50, summary.p99
    );
    let buckets = histogram(&samples, 8);
    let peak = buckets.iter().map(|b| b.count).max().unwrap_or(1).max(1);
    for bucket in &buckets {
        println!(
            "    {:>6.0}-{:>6.0} {}",
            bucket.start,
            bucket.end,
            "▇".repeat(bucket.count * 30 / peak)
        );
    }

    // 2. Hedging
    println!("\n🪃 Hedging...\n");
    let hedging = HedgingSimulator::new(latency);
    for quantile in [0.75, 0.9, 0.95, 0.99] {
        let report = hedging.evaluate(
            "slow",
            HedgePolicy::Percentile { quantile },
            10_000,
            &mut seed.fork(1).rng(),
        )?;
        println!(
            "  {:<4} trigger={:>6.0}ms  extra load={:>5.1}%  p99 {:>6.0} → {:>6.0}ms ({:+.1}%)",
            report.policy.to_string(),
            report.trigger_delay_ms.unwrap_or(0.0),
            report.extra_load_pct,
            report.baseline.p99,
            report.hedged.p99,
            -report.p99_improvement_pct
        );
    }

    // 3. Model comparison
    println!("\n📊 A/B Comparison...\n");
    let sim = QuerySimulator::new(&catalog, &profiles);
    let medium = sim.run_batch("medium", 500, &mut seed.fork(2).rng())?;
    let distilled = sim.run_batch("distilled", 500, &mut seed.fork(3).rng())?;
    let accuracy = compare(&medium.accuracy, &distilled.accuracy)?;
    println!("  accuracy: {}", accuracy.summary);
    let speed = compare(&medium.latency_ms, &distilled.latency_ms)?;
    println!("  latency:  {}", speed.summary);

    // 4. Ensembles
    println!("\n🗳  Ensembles...\n");
    let members = vec![
        "medium".to_string(),
        "small".to_string(),
        "distilled".to_string(),
    ];
    for strategy in [
        VotingStrategy::Majority,
        VotingStrategy::Unanimous,
        VotingStrategy::FirstResponse,
    ] {
        let ensemble = Ensemble::new(members.clone(), strategy)?;
        let report = ensemble.evaluate(&sim, 300, seed.fork(4))?;
        println!(
            "  {:<15} accuracy={:>5.1}%  p50={:>5.0}ms  cost=${:.4}",
            strategy.to_string(),
            report.accuracy_rate * 100.0,
            report.latency.p50,
            report.mean_cost
        );
    }

    // 5. Degradation
    println!("\n🩺 Degradation Detection...\n");
    let baseline: Vec<Observation> = [0.90, 0.91, 0.92, 0.93, 0.94]
        .iter()
        .cycle()
        .take(30)
        .map(|&accuracy| Observation::new().with("accuracy", accuracy))
        .collect();
    let tracked = [TrackedMetric::higher_is_better("accuracy")];
    for current in [0.92, 0.895, 0.80] {
        let report = detect(&baseline, &Observation::new().with("accuracy", current), &tracked)?;
        println!(
            "  accuracy={current:.3} → {} (retrain: {}) {}",
            report.alert_status, report.needs_retraining, report.message
        );
    }

    let strict = DegradationDetector::new(MonitoringThresholds {
        warning_z: 1.0,
        critical_z: 1.5,
    });
    let report = strict.detect(
        &baseline,
        &Observation::new().with("accuracy", 0.90),
        &tracked,
    )?;
    println!("  strict thresholds, accuracy=0.900 → {}", report.alert_status);

    // 6. Report
    println!("\n📝 Generating Report...\n");
    let mut builder = ReportBuilder::new("Demo Report").with_seed(seed);
    builder.add_latency("medium", &samples, 10);
    builder.add_degradation("demo", report);
    let md = builder.build().to_markdown();
    let preview: String = md.chars().take(800).collect();
    println!("{preview}");
    println!("...\n");

    println!("✅ Demo complete!");
    Ok(())
}

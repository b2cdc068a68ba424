//! Property-based tests for the statistics and simulation engine
//!
//! Covers:
//! 1. Latency profile ordering and sample ranges
//! 2. Hedge race resolution
//! 3. Percentile and summary edge cases
//! 4. Two-sample comparison symmetry
//! 5. Degradation thresholds

#![allow(clippy::unwrap_used)]
#![allow(clippy::float_cmp)]

use proptest::prelude::*;
use reliability_lab::{
    analyze, compare, detect, mean, percentile, resolve_race, std_dev, AlertStatus,
    HedgingSimulator, LatencyModel, LatencyProfile, Observation, ProfileRegistry, Seed,
    TrackedMetric,
};

fn profile_strategy() -> impl Strategy<Value = LatencyProfile> {
    (1.0f64..5_000.0, 1.0f64..5_000.0, 1.0f64..10_000.0, 0.0f64..0.05).prop_map(
        |(p50, d95, d99, tail)| {
            LatencyProfile::new("prop", p50, p50 + d95, p50 + d95 + d99)
                .unwrap()
                .with_tail_probability(tail)
                .unwrap()
        },
    )
}

fn samples_strategy() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(-1_000.0f64..1_000.0, 2..60)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_distribution_ordered_and_samples_non_negative(
        profile in profile_strategy(),
        seed in any::<u64>(),
    ) {
        let d = profile.distribution();
        prop_assert!(d.p50 <= d.p95);
        prop_assert!(d.p95 <= d.p99);

        let mut rng = Seed::new(seed).rng();
        for _ in 0..10_000 {
            prop_assert!(profile.sample(&mut rng) >= 0.0);
        }
    }

    #[test]
    fn prop_batch_median_below_p99(profile in profile_strategy(), seed in any::<u64>()) {
        let registry = ProfileRegistry::new(vec![profile]).unwrap();
        let model = LatencyModel::new(&registry);
        let samples = model.simulate_batch("prop", 1_000, &mut Seed::new(seed).rng()).unwrap();
        let summary = analyze(&samples);
        prop_assert!(summary.p50 < summary.p99);
    }

    #[test]
    fn prop_same_seed_same_batch(profile in profile_strategy(), seed in any::<u64>()) {
        let registry = ProfileRegistry::new(vec![profile]).unwrap();
        let model = LatencyModel::new(&registry);
        let a = model.simulate_batch("prop", 200, &mut Seed::new(seed).rng()).unwrap();
        let b = model.simulate_batch("prop", 200, &mut Seed::new(seed).rng()).unwrap();
        prop_assert_eq!(a, b);
    }

    #[test]
    fn prop_zero_delay_always_fires(profile in profile_strategy(), seed in any::<u64>()) {
        let registry = ProfileRegistry::new(vec![profile]).unwrap();
        let hedging = HedgingSimulator::new(LatencyModel::new(&registry));
        let rate = hedging.firing_rate("prop", 0.0, 500, &mut Seed::new(seed).rng()).unwrap();
        prop_assert_eq!(rate, 1.0);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_fast_primary_never_fires(
        primary in 0.0f64..10_000.0,
        extra in 0.0f64..10_000.0,
        hedge in 0.0f64..10_000.0,
    ) {
        let trigger = primary + extra;
        let outcome = resolve_race(primary, trigger, || hedge);
        prop_assert!(!outcome.fired);
        prop_assert_eq!(outcome.total_latency, primary);
        prop_assert!(outcome.hedge_latency.is_none());
    }

    #[test]
    fn prop_fired_race_takes_minimum(
        trigger in 0.0f64..10_000.0,
        extra in 0.001f64..10_000.0,
        hedge in 0.0f64..10_000.0,
    ) {
        let primary = trigger + extra;
        let outcome = resolve_race(primary, trigger, || hedge);
        prop_assert!(outcome.fired);
        prop_assert_eq!(outcome.total_latency, primary.min(trigger + hedge));
        prop_assert_eq!(outcome.hedge_latency, Some(hedge));
    }

    #[test]
    fn prop_empty_percentile_is_zero(p in -1.0f64..2.0) {
        prop_assert_eq!(percentile(&[], p), 0.0);
        prop_assert_eq!(analyze(&[]).count, 0);
    }

    #[test]
    fn prop_percentile_is_a_sample(samples in samples_strategy(), p in 0.0f64..=1.0) {
        let value = percentile(&samples, p);
        prop_assert!(samples.contains(&value));
    }

    #[test]
    fn prop_compare_identical_is_null(samples in samples_strategy()) {
        let result = compare(&samples, &samples).unwrap();
        prop_assert_eq!(result.difference, 0.0);
        prop_assert_eq!(result.cohens_d, 0.0);
        prop_assert_eq!(result.p_value, 1.0);
        prop_assert!(!result.statistically_significant);
    }

    #[test]
    fn prop_compare_antisymmetric(a in samples_strategy(), b in samples_strategy()) {
        let ab = compare(&a, &b).unwrap();
        let ba = compare(&b, &a).unwrap();
        prop_assert_eq!(ab.difference, -ba.difference);
        prop_assert_eq!(ab.t_statistic, -ba.t_statistic);
        prop_assert_eq!(ab.cohens_d, -ba.cohens_d);
        prop_assert_eq!(ab.p_value, ba.p_value);
    }

    #[test]
    fn prop_baseline_mean_is_normal(values in samples_strategy()) {
        let baseline: Vec<Observation> = values
            .iter()
            .map(|&v| Observation::new().with("latency_ms", v))
            .collect();
        let current = Observation::new().with("latency_ms", mean(&values));
        let report = detect(
            &baseline,
            &current,
            &[TrackedMetric::lower_is_better("latency_ms")],
        )
        .unwrap();
        prop_assert_eq!(report.alert_status, AlertStatus::Normal);
        prop_assert!(!report.needs_retraining);
    }

    #[test]
    fn prop_three_sigma_in_bad_direction_is_critical(values in samples_strategy()) {
        let sigma = std_dev(&values);
        prop_assume!(sigma > 1e-6);
        let baseline: Vec<Observation> = values
            .iter()
            .map(|&v| Observation::new().with("accuracy", v).with("latency_ms", v))
            .collect();
        let centre = mean(&values);

        let accuracy_drop = Observation::new()
            .with("accuracy", centre - 3.0 * sigma)
            .with("latency_ms", centre);
        let report = detect(
            &baseline,
            &accuracy_drop,
            &[
                TrackedMetric::higher_is_better("accuracy"),
                TrackedMetric::lower_is_better("latency_ms"),
            ],
        )
        .unwrap();
        prop_assert_eq!(report.alert_status, AlertStatus::Critical);
        prop_assert!(report.needs_retraining);

        let accuracy_gain = Observation::new()
            .with("accuracy", centre + 3.0 * sigma)
            .with("latency_ms", centre);
        let report = detect(
            &baseline,
            &accuracy_gain,
            &[
                TrackedMetric::higher_is_better("accuracy"),
                TrackedMetric::lower_is_better("latency_ms"),
            ],
        )
        .unwrap();
        prop_assert_eq!(report.alert_status, AlertStatus::Critical);
        prop_assert!(!report.needs_retraining);
    }
}

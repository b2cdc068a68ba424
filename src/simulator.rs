//! Mock model queries.
//!
//! Stands in for real inference endpoints: every model is described by
//! an accuracy range, a latency profile and a per-query price, and each
//! simulated query draws from those. Batches produce the per-query
//! accuracy/latency/cost arrays consumed by [`crate::compare`] and
//! [`crate::degradation`].

use crate::degradation::Observation;
use crate::error::{LabError, Result};
use crate::latency::{LatencyModel, ProfileRegistry};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Simulated model definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSpec {
    /// Model identifier
    pub name: String,
    /// Lowest per-query accuracy
    pub accuracy_min: f64,
    /// Highest per-query accuracy
    pub accuracy_max: f64,
    /// Latency profile name
    pub latency_profile: String,
    /// Base price per query in dollars
    pub cost_per_query: f64,
}

impl ModelSpec {
    /// Check ranges
    ///
    /// # Errors
    ///
    /// Returns `LabError::InvalidArgument` for an accuracy range outside
    /// `[0, 1]`, an inverted range, or a negative price.
    pub fn validate(&self) -> Result<()> {
        let in_unit = |v: f64| (0.0..=1.0).contains(&v);
        if !in_unit(self.accuracy_min)
            || !in_unit(self.accuracy_max)
            || self.accuracy_min > self.accuracy_max
        {
            return Err(LabError::InvalidArgument(format!(
                "model '{}' accuracy range [{}, {}] must be ordered within [0, 1]",
                self.name, self.accuracy_min, self.accuracy_max
            )));
        }
        if !(self.cost_per_query.is_finite() && self.cost_per_query >= 0.0) {
            return Err(LabError::InvalidArgument(format!(
                "model '{}' cost must be non-negative",
                self.name
            )));
        }
        Ok(())
    }

    /// Copy of this model with the accuracy range shifted by `delta`
    ///
    /// The range is clamped into `[0, 1]`. Used to simulate a model that
    /// has drifted in production.
    #[must_use]
    pub fn with_accuracy_shift(&self, delta: f64) -> Self {
        Self {
            accuracy_min: (self.accuracy_min + delta).clamp(0.0, 1.0),
            accuracy_max: (self.accuracy_max + delta).clamp(0.0, 1.0),
            ..self.clone()
        }
    }
}

/// Built-in demo models
#[must_use]
pub fn builtin_models() -> Vec<ModelSpec> {
    let make = |name: &str, min: f64, max: f64, profile: &str, cost: f64| ModelSpec {
        name: name.to_string(),
        accuracy_min: min,
        accuracy_max: max,
        latency_profile: profile.to_string(),
        cost_per_query: cost,
    };
    vec![
        make("large", 0.92, 0.97, "slow", 0.03),
        make("medium", 0.88, 0.94, "medium", 0.01),
        make("small", 0.80, 0.90, "fast", 0.002),
        make("distilled", 0.85, 0.92, "fast", 0.001),
    ]
}

/// Immutable set of simulated models
#[derive(Debug, Clone, Default)]
pub struct ModelCatalog {
    models: BTreeMap<String, ModelSpec>,
}

impl ModelCatalog {
    /// Build a catalog, checking every model against the profile registry
    ///
    /// # Errors
    ///
    /// Returns `LabError::InvalidArgument` for invalid or duplicate
    /// models and `LabError::NotFound` for unknown latency profiles.
    pub fn new(
        models: impl IntoIterator<Item = ModelSpec>,
        profiles: &ProfileRegistry,
    ) -> Result<Self> {
        let mut map = BTreeMap::new();
        for model in models {
            model.validate()?;
            profiles.get(&model.latency_profile)?;
            let name = model.name.clone();
            if map.insert(name.clone(), model).is_some() {
                return Err(LabError::InvalidArgument(format!(
                    "duplicate model '{name}'"
                )));
            }
        }
        Ok(Self { models: map })
    }

    /// Catalog of [`builtin_models`] over the built-in profiles
    #[must_use]
    pub fn builtin() -> Self {
        let models = builtin_models()
            .into_iter()
            .map(|m| (m.name.clone(), m))
            .collect();
        Self { models }
    }

    /// Resolve a model by name
    ///
    /// # Errors
    ///
    /// Returns `LabError::NotFound` for unknown models.
    pub fn get(&self, name: &str) -> Result<&ModelSpec> {
        self.models
            .get(name)
            .ok_or_else(|| LabError::NotFound(format!("model '{name}'")))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ModelSpec> {
        self.models.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.models.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

/// One simulated query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub model: String,
    /// Accuracy drawn for this query
    pub accuracy: f64,
    /// Whether the answer was correct
    pub correct: bool,
    pub latency_ms: f64,
    pub cost: f64,
}

/// Per-query metric arrays for one model
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelSamples {
    pub model: String,
    pub accuracy: Vec<f64>,
    pub latency_ms: Vec<f64>,
    pub cost: Vec<f64>,
}

impl ModelSamples {
    #[must_use]
    pub fn len(&self) -> usize {
        self.accuracy.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.accuracy.is_empty()
    }

    /// Collapse the batch into one monitoring observation of means
    #[must_use]
    pub fn observation(&self) -> Observation {
        use crate::stats::mean;
        Observation::new()
            .with("accuracy", mean(&self.accuracy))
            .with("latency_ms", mean(&self.latency_ms))
            .with("cost", mean(&self.cost))
    }
}

/// Simulated query generator
#[derive(Debug, Clone, Copy)]
pub struct QuerySimulator<'a> {
    catalog: &'a ModelCatalog,
    latency: LatencyModel<'a>,
}

impl<'a> QuerySimulator<'a> {
    #[must_use]
    pub const fn new(catalog: &'a ModelCatalog, profiles: &'a ProfileRegistry) -> Self {
        Self {
            catalog,
            latency: LatencyModel::new(profiles),
        }
    }

    #[must_use]
    pub const fn catalog(&self) -> &'a ModelCatalog {
        self.catalog
    }

    #[must_use]
    pub const fn latency_model(&self) -> LatencyModel<'a> {
        self.latency
    }

    /// Simulate one query against a catalog model
    ///
    /// # Errors
    ///
    /// Returns `LabError::NotFound` for unknown models or profiles.
    pub fn query<R: Rng + ?Sized>(&self, model: &str, rng: &mut R) -> Result<QueryResult> {
        let spec = self.catalog.get(model)?;
        self.query_spec(spec, rng)
    }

    /// Simulate one query against an explicit `ModelSpec`
    ///
    /// # Errors
    ///
    /// Returns `LabError::NotFound` when the model's latency profile is unknown.
    pub fn query_spec<R: Rng + ?Sized>(&self, spec: &ModelSpec, rng: &mut R) -> Result<QueryResult> {
        let profile = self.latency.profile(&spec.latency_profile)?;
        let accuracy = if spec.accuracy_max > spec.accuracy_min {
            rng.gen_range(spec.accuracy_min..=spec.accuracy_max)
        } else {
            spec.accuracy_min
        };
        let correct = rng.gen::<f64>() < accuracy;
        let latency_ms = profile.sample(rng);
        let cost = spec.cost_per_query * (1.0 + latency_ms / 10_000.0);

        Ok(QueryResult {
            model: spec.name.clone(),
            accuracy,
            correct,
            latency_ms,
            cost,
        })
    }

    /// Simulate `count` queries against a catalog model
    ///
    /// # Errors
    ///
    /// Returns `LabError::NotFound` for unknown models or profiles.
    pub fn run_batch<R: Rng + ?Sized>(
        &self,
        model: &str,
        count: usize,
        rng: &mut R,
    ) -> Result<ModelSamples> {
        let spec = self.catalog.get(model)?;
        self.run_batch_spec(spec, count, rng)
    }

    /// Simulate `count` queries against an explicit `ModelSpec`
    ///
    /// # Errors
    ///
    /// Returns `LabError::NotFound` when the model's latency profile is unknown.
    pub fn run_batch_spec<R: Rng + ?Sized>(
        &self,
        spec: &ModelSpec,
        count: usize,
        rng: &mut R,
    ) -> Result<ModelSamples> {
        let mut samples = ModelSamples {
            model: spec.name.clone(),
            accuracy: Vec::with_capacity(count),
            latency_ms: Vec::with_capacity(count),
            cost: Vec::with_capacity(count),
        };
        for _ in 0..count {
            let result = self.query_spec(spec, rng)?;
            samples.accuracy.push(result.accuracy);
            samples.latency_ms.push(result.latency_ms);
            samples.cost.push(result.cost);
        }
        tracing::debug!(model = %spec.name, count, "simulated query batch");
        Ok(samples)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::rng::Seed;
    use crate::stats::mean;

    #[test]
    fn test_builtin_catalog_consistent_with_profiles() {
        let profiles = ProfileRegistry::builtin();
        let catalog = ModelCatalog::new(builtin_models(), &profiles).unwrap();
        assert_eq!(catalog.len(), ModelCatalog::builtin().len());
        assert!(catalog.get("large").is_ok());
    }

    #[test]
    fn test_catalog_rejects_unknown_profile() {
        let profiles = ProfileRegistry::builtin();
        let mut spec = builtin_models().remove(0);
        spec.latency_profile = "glacial".to_string();
        assert!(matches!(
            ModelCatalog::new(vec![spec], &profiles),
            Err(LabError::NotFound(_))
        ));
    }

    #[test]
    fn test_spec_validation() {
        let mut spec = builtin_models().remove(0);
        spec.accuracy_min = 0.99;
        spec.accuracy_max = 0.5;
        assert!(spec.validate().is_err());

        let mut spec = builtin_models().remove(0);
        spec.cost_per_query = -1.0;
        assert!(spec.validate().is_err());
    }

    #[test]
    fn test_accuracy_shift_clamps() {
        let spec = builtin_models().remove(0).with_accuracy_shift(0.5);
        assert_eq!(spec.accuracy_max, 1.0);
        assert_eq!(spec.accuracy_min, 1.0);
        let spec = builtin_models().remove(0).with_accuracy_shift(-0.1);
        assert!((spec.accuracy_min - 0.82).abs() < 1e-12);
    }

    #[test]
    fn test_query_within_ranges() {
        let profiles = ProfileRegistry::builtin();
        let catalog = ModelCatalog::builtin();
        let sim = QuerySimulator::new(&catalog, &profiles);
        let mut rng = Seed::new(8).rng();
        for _ in 0..500 {
            let q = sim.query("small", &mut rng).unwrap();
            assert!((0.80..=0.90).contains(&q.accuracy));
            assert!(q.latency_ms >= 100.0);
            assert!(q.cost >= 0.002);
        }
    }

    #[test]
    fn test_unknown_model() {
        let profiles = ProfileRegistry::builtin();
        let catalog = ModelCatalog::builtin();
        let sim = QuerySimulator::new(&catalog, &profiles);
        let mut rng = Seed::new(8).rng();
        assert!(matches!(sim.query("huge", &mut rng), Err(LabError::NotFound(_))));
    }

    #[test]
    fn test_run_batch_shapes_and_determinism() {
        let profiles = ProfileRegistry::builtin();
        let catalog = ModelCatalog::builtin();
        let sim = QuerySimulator::new(&catalog, &profiles);
        let a = sim.run_batch("medium", 200, &mut Seed::new(1).rng()).unwrap();
        let b = sim.run_batch("medium", 200, &mut Seed::new(1).rng()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 200);
        assert_eq!(a.latency_ms.len(), 200);
        assert_eq!(a.cost.len(), 200);
        let m = mean(&a.accuracy);
        assert!((0.88..=0.94).contains(&m));
    }

    #[test]
    fn test_observation_uses_means() {
        let samples = ModelSamples {
            model: "m".to_string(),
            accuracy: vec![0.8, 1.0],
            latency_ms: vec![100.0, 300.0],
            cost: vec![0.01, 0.03],
        };
        let obs = samples.observation();
        assert!((obs.get("accuracy").unwrap() - 0.9).abs() < 1e-12);
        assert_eq!(obs.get("latency_ms"), Some(200.0));
        assert!((obs.get("cost").unwrap() - 0.02).abs() < 1e-12);
    }
}

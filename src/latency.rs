//! Latency profiles and the piecewise-uniform latency sampler.
//!
//! A profile is defined by three percentile anchors. Sampling draws a
//! uniform `u` and picks one of four bands:
//!
//! ```text
//! u > 1 - tail      extreme tail   p99 * (2 + 2r)
//! u > 0.95          slow           [p95, p99]
//! u > 0.50          typical        [p50, p95]
//! otherwise         fast half      [0.5 * p50, p50]
//! ```
//!
//! This reproduces a right-skewed latency distribution without fitting
//! a parametric model.

use crate::error::{LabError, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const fn default_tail_probability() -> f64 {
    0.01
}

/// Named latency profile with percentile anchors in milliseconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatencyProfile {
    /// Profile name
    pub name: String,
    /// Median latency
    pub p50: f64,
    /// 95th percentile latency
    pub p95: f64,
    /// 99th percentile latency
    pub p99: f64,
    /// Probability of an extreme-tail event
    #[serde(default = "default_tail_probability")]
    pub tail_probability: f64,
}

/// Approximate percentile map derived from a profile's anchors
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatencyDistribution {
    pub p0: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p90: f64,
    pub p95: f64,
    pub p99: f64,
    pub p100: f64,
}

impl LatencyDistribution {
    /// Look up one of the tabulated quantiles
    #[must_use]
    pub fn quantile(&self, q: f64) -> Option<f64> {
        let table = [
            (0.0, self.p0),
            (0.25, self.p25),
            (0.50, self.p50),
            (0.75, self.p75),
            (0.90, self.p90),
            (0.95, self.p95),
            (0.99, self.p99),
            (1.0, self.p100),
        ];
        table
            .iter()
            .find(|(key, _)| (key - q).abs() < 1e-9)
            .map(|(_, value)| *value)
    }
}

impl LatencyProfile {
    /// Create a validated profile
    ///
    /// # Errors
    ///
    /// Returns `LabError::InvalidArgument` unless `0 <= p50 <= p95 <= p99`
    /// and `tail_probability` is in `[0, 1)`.
    pub fn new(name: &str, p50: f64, p95: f64, p99: f64) -> Result<Self> {
        let profile = Self {
            name: name.to_string(),
            p50,
            p95,
            p99,
            tail_probability: default_tail_probability(),
        };
        profile.validate()?;
        Ok(profile)
    }

    /// Override the extreme-tail probability
    ///
    /// # Errors
    ///
    /// Returns `LabError::InvalidArgument` if the probability is outside `[0, 1)`.
    pub fn with_tail_probability(mut self, tail_probability: f64) -> Result<Self> {
        self.tail_probability = tail_probability;
        self.validate()?;
        Ok(self)
    }

    /// Check the anchor ordering invariant
    ///
    /// # Errors
    ///
    /// Returns `LabError::InvalidArgument` describing the first violation.
    pub fn validate(&self) -> Result<()> {
        let anchors = [self.p50, self.p95, self.p99];
        if anchors.iter().any(|v| !v.is_finite()) {
            return Err(LabError::InvalidArgument(format!(
                "profile '{}' has non-finite anchors",
                self.name
            )));
        }
        if !(0.0 <= self.p50 && self.p50 <= self.p95 && self.p95 <= self.p99) {
            return Err(LabError::InvalidArgument(format!(
                "profile '{}' must satisfy 0 <= p50 <= p95 <= p99 (got {}/{}/{})",
                self.name, self.p50, self.p95, self.p99
            )));
        }
        if !(0.0..1.0).contains(&self.tail_probability) {
            return Err(LabError::InvalidArgument(format!(
                "profile '{}' tail probability {} outside [0, 1)",
                self.name, self.tail_probability
            )));
        }
        Ok(())
    }

    /// Draw one latency sample in milliseconds
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        let u: f64 = rng.gen();
        let r: f64 = rng.gen();

        if u > 1.0 - self.tail_probability {
            self.p99 * 2.0f64.mul_add(r, 2.0)
        } else if u > 0.95 {
            (self.p99 - self.p95).mul_add(r, self.p95)
        } else if u > 0.50 {
            (self.p95 - self.p50).mul_add(r, self.p50)
        } else {
            (0.5 * self.p50).mul_add(r, 0.5 * self.p50)
        }
    }

    /// Percentile map computed from the anchors rather than by sampling
    ///
    /// Quantiles inside each band are placed by linear interpolation,
    /// so `p25` and `p75` sit where the sampler actually puts them.
    #[must_use]
    pub fn distribution(&self) -> LatencyDistribution {
        let typical_span = self.p95 - self.p50;
        LatencyDistribution {
            p0: 0.5 * self.p50,
            p25: 0.75 * self.p50,
            p50: self.p50,
            p75: (0.25 / 0.45f64).mul_add(typical_span, self.p50),
            p90: (0.40 / 0.45f64).mul_add(typical_span, self.p50),
            p95: self.p95,
            p99: self.p99,
            p100: 4.0 * self.p99,
        }
    }
}

/// Immutable set of named latency profiles
///
/// Built once (usually from [`crate::config::LabConfig`]) and shared by
/// reference; there is no way to mutate it after construction.
#[derive(Debug, Clone, Default)]
pub struct ProfileRegistry {
    profiles: BTreeMap<String, LatencyProfile>,
}

impl ProfileRegistry {
    /// Build a registry from validated profiles
    ///
    /// # Errors
    ///
    /// Returns `LabError::InvalidArgument` if a profile is invalid or a
    /// name appears twice.
    pub fn new(profiles: impl IntoIterator<Item = LatencyProfile>) -> Result<Self> {
        let mut map = BTreeMap::new();
        for profile in profiles {
            profile.validate()?;
            let name = profile.name.clone();
            if map.insert(name.clone(), profile).is_some() {
                return Err(LabError::InvalidArgument(format!(
                    "duplicate latency profile '{name}'"
                )));
            }
        }
        Ok(Self { profiles: map })
    }

    /// Registry with the built-in `fast`, `medium` and `slow` profiles
    #[must_use]
    pub fn builtin() -> Self {
        let profiles = builtin_profiles()
            .into_iter()
            .map(|p| (p.name.clone(), p))
            .collect();
        Self { profiles }
    }

    /// Resolve a profile by name
    ///
    /// # Errors
    ///
    /// Returns `LabError::NotFound` for unknown names.
    pub fn get(&self, name: &str) -> Result<&LatencyProfile> {
        self.profiles
            .get(name)
            .ok_or_else(|| LabError::NotFound(format!("latency profile '{name}'")))
    }

    /// Profile names in sorted order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.profiles.keys().map(String::as_str)
    }

    /// Iterate over profiles
    pub fn iter(&self) -> impl Iterator<Item = &LatencyProfile> {
        self.profiles.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

/// Built-in profile anchors
#[must_use]
pub fn builtin_profiles() -> Vec<LatencyProfile> {
    let make = |name: &str, p50: f64, p95: f64, p99: f64| LatencyProfile {
        name: name.to_string(),
        p50,
        p95,
        p99,
        tail_probability: default_tail_probability(),
    };
    vec![
        make("fast", 200.0, 500.0, 1000.0),
        make("medium", 800.0, 2000.0, 4000.0),
        make("slow", 2000.0, 5000.0, 10000.0),
    ]
}

/// Name-addressed latency sampling over a profile registry
#[derive(Debug, Clone, Copy)]
pub struct LatencyModel<'a> {
    profiles: &'a ProfileRegistry,
}

impl<'a> LatencyModel<'a> {
    #[must_use]
    pub const fn new(profiles: &'a ProfileRegistry) -> Self {
        Self { profiles }
    }

    /// Underlying registry
    #[must_use]
    pub const fn profiles(&self) -> &'a ProfileRegistry {
        self.profiles
    }

    /// Resolve a profile by name
    ///
    /// # Errors
    ///
    /// Returns `LabError::NotFound` for unknown names.
    pub fn profile(&self, name: &str) -> Result<&'a LatencyProfile> {
        self.profiles.get(name)
    }

    /// Draw one latency sample for a named profile
    ///
    /// # Errors
    ///
    /// Returns `LabError::NotFound` for unknown profile names.
    pub fn sample<R: Rng + ?Sized>(&self, name: &str, rng: &mut R) -> Result<f64> {
        Ok(self.profile(name)?.sample(rng))
    }

    /// Approximate percentile map for a named profile
    ///
    /// # Errors
    ///
    /// Returns `LabError::NotFound` for unknown profile names.
    pub fn distribution(&self, name: &str) -> Result<LatencyDistribution> {
        Ok(self.profile(name)?.distribution())
    }

    /// Draw `count` independent samples
    ///
    /// # Errors
    ///
    /// Returns `LabError::NotFound` for unknown profile names.
    pub fn simulate_batch<R: Rng + ?Sized>(
        &self,
        name: &str,
        count: usize,
        rng: &mut R,
    ) -> Result<Vec<f64>> {
        let profile = self.profile(name)?;
        let samples: Vec<f64> = (0..count).map(|_| profile.sample(rng)).collect();
        tracing::debug!(profile = %name, count, "simulated latency batch");
        Ok(samples)
    }
}

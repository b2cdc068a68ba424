//! Model ensembles.
//!
//! Members are queried in parallel, each on its own forked seed stream,
//! and their answers are combined by a [`VotingStrategy`].

use crate::error::{LabError, Result};
use crate::rng::Seed;
use crate::simulator::{QueryResult, QuerySimulator};
use crate::stats::{analyze, mean, SampleSummary};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How member answers are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VotingStrategy {
    /// Correct when more than half the members are correct
    #[default]
    Majority,
    /// Correct only when every member is correct
    Unanimous,
    /// Take the fastest member's answer
    FirstResponse,
}

impl fmt::Display for VotingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Majority => "majority",
            Self::Unanimous => "unanimous",
            Self::FirstResponse => "first_response",
        };
        write!(f, "{name}")
    }
}

impl FromStr for VotingStrategy {
    type Err = LabError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "majority" => Ok(Self::Majority),
            "unanimous" => Ok(Self::Unanimous),
            "first_response" | "first-response" => Ok(Self::FirstResponse),
            other => Err(LabError::NotFound(format!("voting strategy '{other}'"))),
        }
    }
}

/// Combined answer of one ensemble query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsembleOutcome {
    /// Members that answered correctly
    pub votes: usize,
    pub correct: bool,
    /// Perceived latency of the combined answer
    pub latency_ms: f64,
    /// Sum over all members, including ones whose answer was not used
    pub cost: f64,
}

/// Aggregate over many ensemble queries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsembleReport {
    pub members: Vec<String>,
    pub strategy: VotingStrategy,
    pub trials: usize,
    pub accuracy_rate: f64,
    pub latency: SampleSummary,
    pub mean_cost: f64,
}

/// Set of models answering together
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ensemble {
    pub members: Vec<String>,
    pub strategy: VotingStrategy,
}

impl Ensemble {
    /// Create an ensemble
    ///
    /// # Errors
    ///
    /// Returns `LabError::InvalidArgument` when `members` is empty.
    pub fn new(members: Vec<String>, strategy: VotingStrategy) -> Result<Self> {
        if members.is_empty() {
            return Err(LabError::InvalidArgument(
                "ensemble needs at least one member".to_string(),
            ));
        }
        Ok(Self { members, strategy })
    }

    /// Query every member once and combine the answers
    ///
    /// # Errors
    ///
    /// Returns `LabError::InvalidArgument` for an empty ensemble and
    /// `LabError::NotFound` for unknown members.
    pub fn query(&self, sim: &QuerySimulator<'_>, seed: Seed) -> Result<EnsembleOutcome> {
        if self.members.is_empty() {
            return Err(LabError::InvalidArgument(
                "ensemble needs at least one member".to_string(),
            ));
        }

        let answers = self
            .members
            .par_iter()
            .enumerate()
            .map(|(i, member)| {
                let mut rng = seed.fork(i as u64).rng();
                sim.query(member, &mut rng)
            })
            .collect::<Result<Vec<QueryResult>>>()?;

        Ok(self.combine(&answers))
    }

    fn combine(&self, answers: &[QueryResult]) -> EnsembleOutcome {
        let votes = answers.iter().filter(|a| a.correct).count();
        let cost: f64 = answers.iter().map(|a| a.cost).sum();
        let slowest = answers.iter().map(|a| a.latency_ms).fold(0.0, f64::max);

        match self.strategy {
            VotingStrategy::Majority => EnsembleOutcome {
                votes,
                correct: votes * 2 > answers.len(),
                latency_ms: slowest,
                cost,
            },
            VotingStrategy::Unanimous => EnsembleOutcome {
                votes,
                correct: !answers.is_empty() && votes == answers.len(),
                latency_ms: slowest,
                cost,
            },
            VotingStrategy::FirstResponse => {
                let first = answers
                    .iter()
                    .min_by(|a, b| a.latency_ms.total_cmp(&b.latency_ms));
                EnsembleOutcome {
                    votes,
                    correct: first.is_some_and(|a| a.correct),
                    latency_ms: first.map_or(0.0, |a| a.latency_ms),
                    cost,
                }
            }
        }
    }

    /// Run `trials` ensemble queries and summarise them
    ///
    /// Trial `t` uses `seed.split(t)`, so the member streams of different
    /// trials never coincide.
    ///
    /// # Errors
    ///
    /// Returns `LabError::InvalidArgument` for zero trials or an empty
    /// ensemble and `LabError::NotFound` for unknown members.
    #[allow(clippy::cast_precision_loss)]
    pub fn evaluate(
        &self,
        sim: &QuerySimulator<'_>,
        trials: usize,
        seed: Seed,
    ) -> Result<EnsembleReport> {
        if trials == 0 {
            return Err(LabError::InvalidArgument(
                "ensemble evaluation needs at least one trial".to_string(),
            ));
        }

        let outcomes = (0..trials as u64)
            .map(|t| self.query(sim, seed.split(t)))
            .collect::<Result<Vec<_>>>()?;

        let correct = outcomes.iter().filter(|o| o.correct).count();
        let latencies: Vec<f64> = outcomes.iter().map(|o| o.latency_ms).collect();
        let costs: Vec<f64> = outcomes.iter().map(|o| o.cost).collect();
        let accuracy_rate = correct as f64 / trials as f64;

        tracing::info!(
            members = ?self.members,
            strategy = %self.strategy,
            trials,
            accuracy_rate,
            "ensemble evaluated"
        );

        Ok(EnsembleReport {
            members: self.members.clone(),
            strategy: self.strategy,
            trials,
            accuracy_rate,
            latency: analyze(&latencies),
            mean_cost: mean(&costs),
        })
    }
}

//! Request hedging simulation.
//!
//! A hedge sends a duplicate ("backup") request once the primary has been
//! outstanding for `trigger_delay_ms`, and the caller takes whichever
//! answer arrives first. The backup only starts after the trigger fires,
//! so its perceived completion time is `trigger_delay_ms + hedge_latency`.

use crate::error::{LabError, Result};
use crate::latency::LatencyModel;
use crate::stats::{analyze, SampleSummary};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Which path produced the response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HedgeWinner {
    /// Primary answered before the trigger; no backup was sent
    PrimaryFast,
    /// Backup was sent but the primary still answered first
    PrimaryWon,
    /// Backup answered first
    HedgeWon,
}

/// Result of one primary-vs-backup race
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HedgeOutcome {
    /// Latency of the primary request
    pub primary_latency: f64,
    /// Latency of the backup request, measured from when it was sent
    pub hedge_latency: Option<f64>,
    /// Winning path
    pub winner: HedgeWinner,
    /// Latency perceived by the caller
    pub total_latency: f64,
    /// Whether the backup request was sent
    pub fired: bool,
}

/// Decide a race given the primary latency
///
/// `draw_hedge` is only invoked when the backup fires, so callers that
/// sample from an RNG consume randomness only for fired hedges.
pub fn resolve_race<F>(primary_latency: f64, trigger_delay_ms: f64, draw_hedge: F) -> HedgeOutcome
where
    F: FnOnce() -> f64,
{
    if primary_latency <= trigger_delay_ms {
        return HedgeOutcome {
            primary_latency,
            hedge_latency: None,
            winner: HedgeWinner::PrimaryFast,
            total_latency: primary_latency,
            fired: false,
        };
    }

    let hedge_latency = draw_hedge();
    let hedge_total = trigger_delay_ms + hedge_latency;
    let winner = if hedge_total < primary_latency {
        HedgeWinner::HedgeWon
    } else {
        HedgeWinner::PrimaryWon
    };

    HedgeOutcome {
        primary_latency,
        hedge_latency: Some(hedge_latency),
        winner,
        total_latency: primary_latency.min(hedge_total),
        fired: true,
    }
}

fn validate_delay(trigger_delay_ms: f64) -> Result<()> {
    if trigger_delay_ms.is_finite() && trigger_delay_ms >= 0.0 {
        Ok(())
    } else {
        Err(LabError::InvalidArgument(format!(
            "trigger delay must be a non-negative number of milliseconds, got {trigger_delay_ms}"
        )))
    }
}

/// How the backup request is triggered
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HedgePolicy {
    /// Never send a backup
    Disabled,
    /// Send a backup after a fixed delay
    FixedDelay { delay_ms: f64 },
    /// Send a backup once the primary exceeds a profile quantile
    Percentile { quantile: f64 },
}

impl std::fmt::Display for HedgePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disabled => write!(f, "disabled"),
            Self::FixedDelay { delay_ms } => write!(f, "fixed {delay_ms:.0}ms"),
            Self::Percentile { quantile } => write!(f, "p{:.0}", quantile * 100.0),
        }
    }
}

/// Aggregate effect of a hedging policy over many races
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HedgeReport {
    /// Profile the races were drawn from
    pub profile: String,
    /// Policy under evaluation
    pub policy: HedgePolicy,
    /// Resolved trigger delay (`None` when hedging is disabled)
    pub trigger_delay_ms: Option<f64>,
    /// Latency of the primary requests alone
    pub baseline: SampleSummary,
    /// Latency perceived with hedging
    pub hedged: SampleSummary,
    /// Fraction of races where the backup fired
    pub firing_rate: f64,
    /// Fraction of races won by the backup
    pub hedge_win_rate: f64,
    /// Additional requests sent, as a percentage of primaries
    pub extra_load_pct: f64,
    /// Relative p99 reduction, in percent
    pub p99_improvement_pct: f64,
}

/// Hedging simulator over a latency model
#[derive(Debug, Clone, Copy)]
pub struct HedgingSimulator<'a> {
    model: LatencyModel<'a>,
}

impl<'a> HedgingSimulator<'a> {
    #[must_use]
    pub const fn new(model: LatencyModel<'a>) -> Self {
        Self { model }
    }

    /// Race a primary against a delayed backup
    ///
    /// # Errors
    ///
    /// Returns `LabError::InvalidArgument` for a negative or non-finite
    /// delay and `LabError::NotFound` for an unknown profile.
    pub fn race<R: Rng + ?Sized>(
        &self,
        profile: &str,
        trigger_delay_ms: f64,
        rng: &mut R,
    ) -> Result<HedgeOutcome> {
        validate_delay(trigger_delay_ms)?;
        let profile = self.model.profile(profile)?;
        let primary = profile.sample(rng);
        Ok(resolve_race(primary, trigger_delay_ms, || profile.sample(rng)))
    }

    /// Monte-Carlo estimate of `P(primary > trigger_delay_ms)`
    ///
    /// # Errors
    ///
    /// Returns `LabError::InvalidArgument` for a bad delay or `n == 0`,
    /// and `LabError::NotFound` for an unknown profile.
    #[allow(clippy::cast_precision_loss)]
    pub fn firing_rate<R: Rng + ?Sized>(
        &self,
        profile: &str,
        trigger_delay_ms: f64,
        n: usize,
        rng: &mut R,
    ) -> Result<f64> {
        validate_delay(trigger_delay_ms)?;
        if n == 0 {
            return Err(LabError::InvalidArgument(
                "firing rate needs at least one draw".to_string(),
            ));
        }
        let profile = self.model.profile(profile)?;
        let fired = (0..n)
            .filter(|_| profile.sample(rng) > trigger_delay_ms)
            .count();
        Ok(fired as f64 / n as f64)
    }

    /// Resolve a policy into a concrete trigger delay for a profile
    ///
    /// # Errors
    ///
    /// Returns `LabError::InvalidArgument` for a bad fixed delay or a
    /// quantile the profile distribution does not tabulate.
    pub fn trigger_delay(&self, profile: &str, policy: HedgePolicy) -> Result<Option<f64>> {
        match policy {
            HedgePolicy::Disabled => Ok(None),
            HedgePolicy::FixedDelay { delay_ms } => {
                validate_delay(delay_ms)?;
                Ok(Some(delay_ms))
            }
            HedgePolicy::Percentile { quantile } => {
                let distribution = self.model.distribution(profile)?;
                match distribution.quantile(quantile) {
                    Some(delay) if quantile > 0.0 && quantile < 1.0 => Ok(Some(delay)),
                    _ => Err(LabError::InvalidArgument(format!(
                        "unsupported hedge quantile {quantile}; use 0.5, 0.75, 0.9, 0.95 or 0.99"
                    ))),
                }
            }
        }
    }

    /// Run `n` races under a policy and compare against no hedging
    ///
    /// # Errors
    ///
    /// Returns `LabError::InvalidArgument` for `n == 0` or an invalid
    /// policy, and `LabError::NotFound` for an unknown profile.
    #[allow(clippy::cast_precision_loss)]
    pub fn evaluate<R: Rng + ?Sized>(
        &self,
        profile_name: &str,
        policy: HedgePolicy,
        n: usize,
        rng: &mut R,
    ) -> Result<HedgeReport> {
        if n == 0 {
            return Err(LabError::InvalidArgument(
                "hedge evaluation needs at least one race".to_string(),
            ));
        }
        let profile = self.model.profile(profile_name)?;
        let trigger = self.trigger_delay(profile_name, policy)?;

        let mut primaries = Vec::with_capacity(n);
        let mut totals = Vec::with_capacity(n);
        let mut fired = 0_usize;
        let mut hedge_wins = 0_usize;

        for _ in 0..n {
            let primary = profile.sample(rng);
            let outcome = match trigger {
                Some(delay) => resolve_race(primary, delay, || profile.sample(rng)),
                None => resolve_race(primary, f64::INFINITY, || 0.0),
            };
            if outcome.fired {
                fired += 1;
            }
            if outcome.winner == HedgeWinner::HedgeWon {
                hedge_wins += 1;
            }
            primaries.push(outcome.primary_latency);
            totals.push(outcome.total_latency);
        }

        let baseline = analyze(&primaries);
        let hedged = analyze(&totals);
        let firing_rate = fired as f64 / n as f64;
        let p99_improvement_pct = if baseline.p99 > 0.0 {
            (baseline.p99 - hedged.p99) / baseline.p99 * 100.0
        } else {
            0.0
        };

        tracing::info!(
            profile = %profile_name,
            trigger_delay_ms = ?trigger,
            firing_rate,
            p99_before = baseline.p99,
            p99_after = hedged.p99,
            "hedging policy evaluated"
        );

        Ok(HedgeReport {
            profile: profile_name.to_string(),
            policy,
            trigger_delay_ms: trigger,
            baseline,
            hedged,
            firing_rate,
            hedge_win_rate: hedge_wins as f64 / n as f64,
            extra_load_pct: firing_rate * 100.0,
            p99_improvement_pct,
        })
    }
}

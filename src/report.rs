//! Report generation for lab runs.
//!
//! Collects latency summaries, hedging evaluations, model comparisons,
//! ensemble results and degradation checks into one [`LabReport`] that
//! renders to JSON or markdown.

use crate::compare::{ModelComparison, PValueMethod};
use crate::degradation::{DegradationReport, MetricDirection};
use crate::ensemble::EnsembleReport;
use crate::hedging::HedgeReport;
use crate::rng::Seed;
use crate::stats::{analyze, histogram, HistogramBucket, SampleSummary};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write as FmtWrite;
use tabled::settings::Style;
use tabled::{Table, Tabled};

/// Full lab report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabReport {
    /// Report metadata
    pub metadata: ReportMetadata,
    /// Per-profile latency summaries
    pub latency: Vec<LatencySection>,
    /// Hedging policy evaluations
    pub hedging: Vec<HedgeReport>,
    /// Pairwise model comparisons
    pub comparisons: Vec<ModelComparison>,
    /// Ensemble evaluations
    pub ensembles: Vec<EnsembleReport>,
    /// Degradation checks
    pub degradation: Vec<DegradationSection>,
}

/// Report metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// Report title
    pub title: String,
    /// Report generation timestamp
    pub generated_at: DateTime<Utc>,
    /// Crate version
    pub framework_version: String,
    /// Seed the simulations ran with
    pub seed: Seed,
    /// p-value method used for comparisons
    pub p_value_method: PValueMethod,
}

/// Latency summary and histogram for one profile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LatencySection {
    pub profile: String,
    pub summary: SampleSummary,
    pub histogram: Vec<HistogramBucket>,
}

/// Degradation check for one model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DegradationSection {
    pub model: String,
    pub report: DegradationReport,
}

/// Report builder for constructing lab reports
pub struct ReportBuilder {
    title: String,
    seed: Seed,
    p_value_method: PValueMethod,
    latency: Vec<LatencySection>,
    hedging: Vec<HedgeReport>,
    comparisons: Vec<ModelComparison>,
    ensembles: Vec<EnsembleReport>,
    degradation: Vec<DegradationSection>,
}

impl ReportBuilder {
    /// Create a new report builder
    #[must_use]
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            seed: Seed::default(),
            p_value_method: PValueMethod::default(),
            latency: Vec::new(),
            hedging: Vec::new(),
            comparisons: Vec::new(),
            ensembles: Vec::new(),
            degradation: Vec::new(),
        }
    }

    /// Record the seed the simulations used
    #[must_use]
    pub const fn with_seed(mut self, seed: Seed) -> Self {
        self.seed = seed;
        self
    }

    /// Record the comparison p-value method
    #[must_use]
    pub const fn with_p_value_method(mut self, method: PValueMethod) -> Self {
        self.p_value_method = method;
        self
    }

    /// Summarise raw latency samples for a profile
    pub fn add_latency(&mut self, profile: &str, samples: &[f64], buckets: usize) {
        self.latency.push(LatencySection {
            profile: profile.to_string(),
            summary: analyze(samples),
            histogram: histogram(samples, buckets),
        });
    }

    /// Add an already summarised latency section
    pub fn add_latency_section(&mut self, section: LatencySection) {
        self.latency.push(section);
    }

    pub fn add_hedging(&mut self, report: HedgeReport) {
        self.hedging.push(report);
    }

    pub fn add_comparison(&mut self, comparison: ModelComparison) {
        self.comparisons.push(comparison);
    }

    pub fn add_ensemble(&mut self, report: EnsembleReport) {
        self.ensembles.push(report);
    }

    pub fn add_degradation(&mut self, model: &str, report: DegradationReport) {
        self.degradation.push(DegradationSection {
            model: model.to_string(),
            report,
        });
    }

    /// Build the full report
    #[must_use]
    pub fn build(self) -> LabReport {
        LabReport {
            metadata: ReportMetadata {
                title: self.title,
                generated_at: Utc::now(),
                framework_version: env!("CARGO_PKG_VERSION").to_string(),
                seed: self.seed,
                p_value_method: self.p_value_method,
            },
            latency: self.latency,
            hedging: self.hedging,
            comparisons: self.comparisons,
            ensembles: self.ensembles,
            degradation: self.degradation,
        }
    }
}

#[derive(Tabled)]
struct LatencyRow {
    #[tabled(rename = "Profile")]
    profile: String,
    #[tabled(rename = "Count")]
    count: usize,
    #[tabled(rename = "Mean")]
    mean: String,
    #[tabled(rename = "p50")]
    p50: String,
    #[tabled(rename = "p90")]
    p90: String,
    #[tabled(rename = "p95")]
    p95: String,
    #[tabled(rename = "p99")]
    p99: String,
    #[tabled(rename = "Max")]
    max: String,
}

#[derive(Tabled)]
struct HedgeRow {
    #[tabled(rename = "Profile")]
    profile: String,
    #[tabled(rename = "Policy")]
    policy: String,
    #[tabled(rename = "Trigger")]
    trigger: String,
    #[tabled(rename = "Extra Load")]
    extra_load: String,
    #[tabled(rename = "Hedge Wins")]
    hedge_wins: String,
    #[tabled(rename = "p99 Before")]
    p99_before: String,
    #[tabled(rename = "p99 After")]
    p99_after: String,
    #[tabled(rename = "p99 Gain")]
    gain: String,
}

#[derive(Tabled)]
struct ComparisonRow {
    #[tabled(rename = "Metric")]
    metric: String,
    #[tabled(rename = "Mean A")]
    mean_a: String,
    #[tabled(rename = "Mean B")]
    mean_b: String,
    #[tabled(rename = "Diff [95% CI]")]
    difference: String,
    #[tabled(rename = "p-value")]
    p_value: String,
    #[tabled(rename = "Effect")]
    effect: String,
    #[tabled(rename = "Preferred")]
    preferred: String,
}

#[derive(Tabled)]
struct EnsembleRow {
    #[tabled(rename = "Members")]
    members: String,
    #[tabled(rename = "Strategy")]
    strategy: String,
    #[tabled(rename = "Trials")]
    trials: usize,
    #[tabled(rename = "Accuracy")]
    accuracy: String,
    #[tabled(rename = "Latency p50")]
    p50: String,
    #[tabled(rename = "Latency p99")]
    p99: String,
    #[tabled(rename = "Mean Cost")]
    cost: String,
}

#[derive(Tabled)]
struct DegradationRow {
    #[tabled(rename = "Metric")]
    metric: String,
    #[tabled(rename = "Direction")]
    direction: String,
    #[tabled(rename = "Baseline")]
    baseline: String,
    #[tabled(rename = "Current")]
    current: String,
    #[tabled(rename = "z")]
    z_score: String,
    #[tabled(rename = "Change")]
    change: String,
    #[tabled(rename = "Severity")]
    severity: String,
}

fn markdown_table<T: Tabled>(rows: Vec<T>) -> String {
    Table::new(rows).with(Style::markdown()).to_string()
}

impl LabReport {
    /// Render report as JSON
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Render report as markdown
    #[must_use]
    pub fn to_markdown(&self) -> String {
        let mut output = String::new();

        writeln!(output, "# {}", self.metadata.title).ok();
        writeln!(output).ok();
        writeln!(
            output,
            "**Generated:** {}",
            self.metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
        )
        .ok();
        writeln!(output, "**Version:** {}", self.metadata.framework_version).ok();
        writeln!(
            output,
            "**Seed:** {} (stream {})",
            self.metadata.seed.base, self.metadata.seed.stream
        )
        .ok();
        writeln!(output).ok();

        self.write_latency(&mut output);
        self.write_hedging(&mut output);
        self.write_comparisons(&mut output);
        self.write_ensembles(&mut output);
        self.write_degradation(&mut output);

        output
    }

    fn write_latency(&self, output: &mut String) {
        if self.latency.is_empty() {
            return;
        }
        writeln!(output, "## Latency").ok();
        writeln!(output).ok();
        let rows: Vec<LatencyRow> = self
            .latency
            .iter()
            .map(|s| LatencyRow {
                profile: s.profile.clone(),
                count: s.summary.count,
                mean: ms(s.summary.mean),
                p50: ms(s.summary.p50),
                p90: ms(s.summary.p90),
                p95: ms(s.summary.p95),
                p99: ms(s.summary.p99),
                max: ms(s.summary.max),
            })
            .collect();
        writeln!(output, "{}", markdown_table(rows)).ok();
        writeln!(output).ok();

        for section in &self.latency {
            let peak = section.histogram.iter().map(|b| b.count).max().unwrap_or(0);
            if peak == 0 {
                continue;
            }
            writeln!(output, "### {} histogram", section.profile).ok();
            writeln!(output).ok();
            writeln!(output, "```text").ok();
            for bucket in &section.histogram {
                let width = bucket.count * 40 / peak;
                writeln!(
                    output,
                    "{:>9.0} - {:>9.0} | {:<40} {}",
                    bucket.start,
                    bucket.end,
                    "#".repeat(width),
                    bucket.count
                )
                .ok();
            }
            writeln!(output, "```").ok();
            writeln!(output).ok();
        }
    }

    fn write_hedging(&self, output: &mut String) {
        if self.hedging.is_empty() {
            return;
        }
        writeln!(output, "## Hedging").ok();
        writeln!(output).ok();
        let rows: Vec<HedgeRow> = self
            .hedging
            .iter()
            .map(|h| HedgeRow {
                profile: h.profile.clone(),
                policy: h.policy.to_string(),
                trigger: h.trigger_delay_ms.map_or_else(|| "-".to_string(), ms),
                extra_load: format!("{:.1}%", h.extra_load_pct),
                hedge_wins: format!("{:.1}%", h.hedge_win_rate * 100.0),
                p99_before: ms(h.baseline.p99),
                p99_after: ms(h.hedged.p99),
                gain: format!("{:.1}%", h.p99_improvement_pct),
            })
            .collect();
        writeln!(output, "{}", markdown_table(rows)).ok();
        writeln!(output).ok();
    }

    fn write_comparisons(&self, output: &mut String) {
        if self.comparisons.is_empty() {
            return;
        }
        writeln!(output, "## Model Comparisons").ok();
        writeln!(output).ok();
        for comparison in &self.comparisons {
            writeln!(
                output,
                "### {} (A) vs {} (B)",
                comparison.model_a, comparison.model_b
            )
            .ok();
            writeln!(output).ok();
            let rows: Vec<ComparisonRow> = comparison
                .metrics
                .iter()
                .map(|m| {
                    let r = &m.result;
                    ComparisonRow {
                        metric: m.metric.clone(),
                        mean_a: format!("{:.4}", r.mean_a),
                        mean_b: format!("{:.4}", r.mean_b),
                        difference: format!(
                            "{:+.4} [{:.4}, {:.4}]",
                            r.difference, r.ci_lower, r.ci_upper
                        ),
                        p_value: format!("{:.3}", r.p_value),
                        effect: format!("{} ({:.2})", r.effect_magnitude, r.cohens_d),
                        preferred: m.preferred.clone().unwrap_or_else(|| "-".to_string()),
                    }
                })
                .collect();
            writeln!(output, "{}", markdown_table(rows)).ok();
            writeln!(output).ok();
            writeln!(output, "**Recommendation:** {}", comparison.recommendation).ok();
            writeln!(output).ok();
        }
    }

    fn write_ensembles(&self, output: &mut String) {
        if self.ensembles.is_empty() {
            return;
        }
        writeln!(output, "## Ensembles").ok();
        writeln!(output).ok();
        let rows: Vec<EnsembleRow> = self
            .ensembles
            .iter()
            .map(|e| EnsembleRow {
                members: e.members.join(", "),
                strategy: e.strategy.to_string(),
                trials: e.trials,
                accuracy: format!("{:.1}%", e.accuracy_rate * 100.0),
                p50: ms(e.latency.p50),
                p99: ms(e.latency.p99),
                cost: format!("${:.5}", e.mean_cost),
            })
            .collect();
        writeln!(output, "{}", markdown_table(rows)).ok();
        writeln!(output).ok();
    }

    fn write_degradation(&self, output: &mut String) {
        if self.degradation.is_empty() {
            return;
        }
        writeln!(output, "## Degradation").ok();
        writeln!(output).ok();
        for section in &self.degradation {
            let report = &section.report;
            writeln!(
                output,
                "### {}: {}{}",
                section.model,
                report.alert_status,
                if report.needs_retraining {
                    " (retraining recommended)"
                } else {
                    ""
                }
            )
            .ok();
            writeln!(output).ok();
            writeln!(output, "{}", report.message).ok();
            writeln!(output).ok();
            let rows: Vec<DegradationRow> = report
                .metrics
                .iter()
                .map(|m| DegradationRow {
                    metric: m.name.clone(),
                    direction: match m.direction {
                        MetricDirection::HigherIsBetter => "higher is better",
                        MetricDirection::LowerIsBetter => "lower is better",
                    }
                    .to_string(),
                    baseline: format!("{:.4} ± {:.4}", m.baseline.mean, m.baseline.std_dev),
                    current: format!("{:.4}", m.current),
                    z_score: format!("{:+.2}", m.z_score),
                    change: format!("{:+.1}%", m.percent_change),
                    severity: m.severity.to_string(),
                })
                .collect();
            writeln!(output, "{}", markdown_table(rows)).ok();
            writeln!(output).ok();
        }
    }
}

fn ms(value: f64) -> String {
    format!("{value:.0}ms")
}

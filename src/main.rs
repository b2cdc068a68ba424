//! Reliability Lab CLI
//!
//! Latency, hedging, comparison, monitoring and ensemble simulations

use anyhow::{Context, Result};
use clap::{ArgGroup, Parser, Subcommand, ValueEnum};
use reliability_lab::{
    HedgePolicy, Lab, LabConfig, LabReport, MonitorPlan, ReportBuilder, ReportPlan, Seed,
    VotingStrategy,
};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "reliability-lab")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (YAML)
    #[arg(long, global = true, conflicts_with = "config_glob")]
    config: Option<PathBuf>,

    /// Layer every configuration file matching a glob pattern
    #[arg(long, global = true)]
    config_glob: Option<String>,

    /// Output format
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Markdown)]
    format: OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Markdown,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Sample a latency profile and summarise it
    Latency {
        /// Profile name
        #[arg(long)]
        profile: String,

        /// Number of samples
        #[arg(long, default_value = "10000")]
        count: usize,

        /// Random seed (overrides config)
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Evaluate a hedging policy
    #[command(group(ArgGroup::new("trigger").required(true).args(["delay", "percentile"])))]
    Hedge {
        /// Profile name
        #[arg(long)]
        profile: String,

        /// Fixed trigger delay in milliseconds
        #[arg(long)]
        delay: Option<f64>,

        /// Trigger at a profile quantile (0.5, 0.75, 0.9, 0.95, 0.99)
        #[arg(long)]
        percentile: Option<f64>,

        /// Number of races
        #[arg(long, default_value = "10000")]
        count: usize,

        /// Random seed (overrides config)
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Compare two simulated models
    Compare {
        /// First model
        #[arg(long)]
        model_a: String,

        /// Second model
        #[arg(long)]
        model_b: String,

        /// Queries per model
        #[arg(long, default_value = "1000")]
        count: usize,

        /// Random seed (overrides config)
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Check a drifted model run against a healthy baseline
    Monitor {
        /// Model name
        #[arg(long)]
        model: String,

        /// Healthy runs in the baseline
        #[arg(long, default_value = "20")]
        baseline_runs: usize,

        /// Queries per run
        #[arg(long, default_value = "50")]
        run_size: usize,

        /// Accuracy drop applied to the current run
        #[arg(long, default_value = "0.0")]
        degrade_by: f64,

        /// Random seed (overrides config)
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Evaluate an ensemble of models
    Ensemble {
        /// Member models (comma separated)
        #[arg(long, value_delimiter = ',', required = true)]
        members: Vec<String>,

        /// Voting strategy (majority, unanimous, first_response)
        #[arg(long, default_value = "majority")]
        strategy: VotingStrategy,

        /// Number of ensemble queries
        #[arg(long, default_value = "500")]
        trials: usize,

        /// Random seed (overrides config)
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Run every scenario and print a full report
    Report {
        /// Samples per scenario
        #[arg(long, default_value = "1000")]
        samples: usize,

        /// Random seed (overrides config)
        #[arg(long)]
        seed: Option<u64>,
    },
}

fn load_config(cli: &Cli) -> Result<LabConfig> {
    if let Some(path) = &cli.config {
        return LabConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()));
    }
    if let Some(pattern) = &cli.config_glob {
        return LabConfig::load_glob(pattern)
            .with_context(|| format!("Failed to load configs matching {pattern}"));
    }
    Ok(LabConfig::default())
}

fn render(report: &LabReport, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Markdown => Ok(report.to_markdown()),
        OutputFormat::Json => report.to_json().context("Failed to serialize report"),
    }
}

fn single(lab: &Lab, title: &str, seed: Seed, fill: impl FnOnce(&mut ReportBuilder)) -> LabReport {
    let mut builder = ReportBuilder::new(title)
        .with_seed(seed)
        .with_p_value_method(lab.config().stats.p_value_method);
    fill(&mut builder);
    builder.build()
}

#[allow(clippy::too_many_lines)]
fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = load_config(&cli)?;
    let lab = Lab::new(config).context("Invalid configuration")?;

    let report = match cli.command {
        Commands::Latency {
            ref profile,
            count,
            seed,
        } => {
            let seed = lab.seed(seed);
            tracing::info!(profile = %profile, count, seed = seed.base, "Sampling latency");
            let section = lab.latency(profile, count, seed)?;
            single(&lab, "Latency Profile", seed, |b| b.add_latency_section(section))
        }
        Commands::Hedge {
            ref profile,
            delay,
            percentile,
            count,
            seed,
        } => {
            let seed = lab.seed(seed);
            let policy = match (delay, percentile) {
                (Some(delay_ms), _) => HedgePolicy::FixedDelay { delay_ms },
                (None, Some(quantile)) => HedgePolicy::Percentile { quantile },
                (None, None) => HedgePolicy::Disabled,
            };
            tracing::info!(profile = %profile, %policy, count, "Evaluating hedging policy");
            let hedge = lab.hedge(profile, policy, count, seed)?;
            single(&lab, "Hedging Evaluation", seed, |b| b.add_hedging(hedge))
        }
        Commands::Compare {
            ref model_a,
            ref model_b,
            count,
            seed,
        } => {
            let seed = lab.seed(seed);
            tracing::info!(model_a = %model_a, model_b = %model_b, count, "Comparing models");
            let comparison = lab.compare(model_a, model_b, count, seed)?;
            single(&lab, "Model Comparison", seed, |b| b.add_comparison(comparison))
        }
        Commands::Monitor {
            ref model,
            baseline_runs,
            run_size,
            degrade_by,
            seed,
        } => {
            let seed = lab.seed(seed);
            let plan = MonitorPlan {
                baseline_runs,
                run_size,
                degrade_by,
            };
            tracing::info!(model = %model, baseline_runs, degrade_by, "Monitoring model");
            let degradation = lab.monitor(model, plan, seed)?;
            single(&lab, "Degradation Check", seed, |b| {
                b.add_degradation(model, degradation);
            })
        }
        Commands::Ensemble {
            ref members,
            strategy,
            trials,
            seed,
        } => {
            let seed = lab.seed(seed);
            tracing::info!(members = ?members, %strategy, trials, "Evaluating ensemble");
            let ensemble = lab.ensemble(members.clone(), strategy, trials, seed)?;
            single(&lab, "Ensemble Evaluation", seed, |b| b.add_ensemble(ensemble))
        }
        Commands::Report { samples, seed } => {
            let seed = lab.seed(seed);
            let plan = ReportPlan {
                samples,
                ..ReportPlan::default()
            };
            tracing::info!(samples, seed = seed.base, "Running all scenarios");
            lab.full_report(&plan, seed)?
        }
    };

    println!("{}", render(&report, cli.format)?);
    Ok(())
}

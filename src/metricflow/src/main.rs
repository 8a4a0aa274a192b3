//! metricflow — lead/lag correlation analysis over monthly business metrics.
//!
//! Reads a JSON array of metric series, runs the requested analysis, and
//! prints the result as JSON on stdout. Logs go to stderr.

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use metricflow_causation::{
    calculate_growth_rates, strongest_correlations, ClusterOptions, CorrelationEngine,
    CorrelationOptions, ExplainedCorrelation, PredictorOptions,
};
use metricflow_core::config::AnalysisConfig;
use metricflow_core::types::MetricSeries;
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "metricflow")]
#[command(about = "Lead/lag correlation analysis for monthly business metrics")]
#[command(version)]
struct Cli {
    /// JSON file holding an array of metric series
    #[arg(long, short, env = "METRICFLOW_INPUT")]
    input: PathBuf,

    /// TOML config file (METRICFLOW__* environment variables take precedence)
    #[arg(long, env = "METRICFLOW_CONFIG")]
    config: Option<PathBuf>,

    /// Maximum lag in months (overrides config)
    #[arg(long)]
    max_lag: Option<u32>,

    /// Minimum aligned months per pair (overrides config)
    #[arg(long)]
    min_shared_months: Option<usize>,

    /// Evaluate pairs on the calling thread only
    #[arg(long, default_value_t = false)]
    sequential: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Pairwise correlations at or above the display threshold
    Correlations {
        /// Minimum |r| to list (overrides config)
        #[arg(long)]
        threshold: Option<f64>,

        /// Compare every pair at lag 0 only
        #[arg(long, default_value_t = false)]
        no_lag_search: bool,
    },
    /// Leading indicators for a target metric
    Predictors {
        /// Id of the target metric
        #[arg(long)]
        target: String,

        #[arg(long)]
        min_correlation: Option<f64>,

        #[arg(long)]
        max_results: Option<usize>,
    },
    /// Groups of metrics that move together in the same month
    Clusters {
        #[arg(long)]
        threshold: Option<f64>,
    },
    /// Compound monthly growth rate per metric
    Growth,
    /// Every analysis in one document
    Report {
        /// Also rank predictors for this metric id
        #[arg(long)]
        target: Option<String>,
    },
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Command::Correlations { .. } => "correlations",
            Command::Predictors { .. } => "predictors",
            Command::Clusters { .. } => "clusters",
            Command::Growth => "growth",
            Command::Report { .. } => "report",
        }
    }
}

#[derive(Serialize)]
struct Output {
    command: &'static str,
    generated_at: DateTime<Utc>,
    data: serde_json::Value,
}

fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "metricflow=info,metricflow_causation=info".into()),
        )
        .with_writer(std::io::stderr)
        .json()
        .init();

    let cli = Cli::parse();

    // Load configuration
    let mut config = match AnalysisConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) if cli.config.is_some() => {
            return Err(e).context("Failed to load config file");
        }
        Err(e) => {
            warn!(error = %e, "Failed to load config, using defaults");
            AnalysisConfig::default()
        }
    };
    apply_overrides(&cli, &mut config);

    info!(
        max_lag = config.correlation.max_lag,
        min_shared_months = config.correlation.min_shared_months,
        parallel = config.correlation.parallel,
        "Configuration loaded"
    );

    let entities = load_entities(&cli.input)?;
    info!(metrics = entities.len(), input = %cli.input.display(), "Metric series loaded");

    let output = Output {
        command: cli.command.name(),
        generated_at: Utc::now(),
        data: run(&cli.command, &config, &entities)?,
    };
    println!("{}", serde_json::to_string_pretty(&output)?);

    info!(command = output.command, "Analysis complete");
    Ok(())
}

fn apply_overrides(cli: &Cli, config: &mut AnalysisConfig) {
    if let Some(max_lag) = cli.max_lag {
        config.correlation.max_lag = max_lag;
        config.predictors.max_lag = max_lag;
    }
    if let Some(min_shared) = cli.min_shared_months {
        config.correlation.min_shared_months = min_shared;
    }
    if cli.sequential {
        config.correlation.parallel = false;
    }

    match &cli.command {
        Command::Correlations {
            threshold,
            no_lag_search,
        } => {
            if let Some(threshold) = threshold {
                config.correlation.display_threshold = *threshold;
            }
            if *no_lag_search {
                config.correlation.find_optimal_lag = false;
            }
        }
        Command::Predictors {
            min_correlation,
            max_results,
            ..
        } => {
            if let Some(min_correlation) = min_correlation {
                config.predictors.min_correlation = *min_correlation;
            }
            if let Some(max_results) = max_results {
                config.predictors.max_results = *max_results;
            }
        }
        Command::Clusters {
            threshold: Some(threshold),
        } => {
            config.clusters.threshold = *threshold;
        }
        _ => {}
    }
}

fn load_entities(path: &Path) -> anyhow::Result<Vec<MetricSeries>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let entities: Vec<MetricSeries> = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse metric series from {}", path.display()))?;

    let mut seen = HashSet::new();
    for entity in &entities {
        if !seen.insert(entity.id.as_str()) {
            warn!(metric = %entity.id, "Duplicate metric id in input");
        }
        if entity.is_empty() {
            warn!(metric = %entity.id, "Metric has no monthly values");
        }
    }

    Ok(entities)
}

fn run(
    command: &Command,
    config: &AnalysisConfig,
    entities: &[MetricSeries],
) -> anyhow::Result<serde_json::Value> {
    let engine = CorrelationEngine::new().parallel(config.correlation.parallel);

    let data = match command {
        Command::Correlations { .. } => {
            let all = engine.analyze_all_correlations(
                entities,
                &CorrelationOptions::from(&config.correlation),
            );
            let shown: Vec<ExplainedCorrelation> =
                strongest_correlations(&all, config.correlation.display_threshold)
                    .into_iter()
                    .map(ExplainedCorrelation::from)
                    .collect();
            serde_json::to_value(shown)?
        }
        Command::Predictors { target, .. } => {
            let options = PredictorOptions::from_config(&config.predictors, &config.correlation);
            let ranked: Vec<ExplainedCorrelation> = engine
                .find_predictors(target, entities, &options)?
                .into_iter()
                .map(ExplainedCorrelation::from)
                .collect();
            serde_json::to_value(ranked)?
        }
        Command::Clusters { .. } => serde_json::to_value(engine.find_correlation_clusters(
            entities,
            &ClusterOptions::from_config(&config.clusters, &config.correlation),
        ))?,
        Command::Growth => serde_json::to_value(calculate_growth_rates(entities))?,
        Command::Report { target } => {
            serde_json::to_value(engine.build_report(entities, config, target.as_deref())?)?
        }
    };

    Ok(data)
}

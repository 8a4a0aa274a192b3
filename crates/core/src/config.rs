use serde::Deserialize;
use std::path::Path;

/// Root analysis configuration. Loaded from an optional TOML file and
/// environment variables with the prefix `METRICFLOW__`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default)]
    pub correlation: CorrelationConfig,
    #[serde(default)]
    pub predictors: PredictorConfig,
    #[serde(default)]
    pub clusters: ClusterConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CorrelationConfig {
    #[serde(default = "default_find_optimal_lag")]
    pub find_optimal_lag: bool,
    #[serde(default = "default_max_lag")]
    pub max_lag: u32,
    #[serde(default = "default_min_shared_months")]
    pub min_shared_months: usize,
    /// Minimum |r| a pair needs to be listed in reports.
    #[serde(default = "default_display_threshold")]
    pub display_threshold: f64,
    #[serde(default = "default_parallel")]
    pub parallel: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PredictorConfig {
    #[serde(default = "default_max_lag")]
    pub max_lag: u32,
    #[serde(default = "default_min_correlation")]
    pub min_correlation: f64,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClusterConfig {
    #[serde(default = "default_cluster_threshold")]
    pub threshold: f64,
}

// Default functions
fn default_find_optimal_lag() -> bool {
    true
}
fn default_max_lag() -> u32 {
    3
}
fn default_min_shared_months() -> usize {
    6
}
fn default_display_threshold() -> f64 {
    0.3
}
fn default_parallel() -> bool {
    true
}
fn default_min_correlation() -> f64 {
    0.3
}
fn default_max_results() -> usize {
    10
}
fn default_cluster_threshold() -> f64 {
    0.7
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            find_optimal_lag: default_find_optimal_lag(),
            max_lag: default_max_lag(),
            min_shared_months: default_min_shared_months(),
            display_threshold: default_display_threshold(),
            parallel: default_parallel(),
        }
    }
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            max_lag: default_max_lag(),
            min_correlation: default_min_correlation(),
            max_results: default_max_results(),
        }
    }
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            threshold: default_cluster_threshold(),
        }
    }
}

impl AnalysisConfig {
    /// Load configuration from an optional config file, then environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let config = builder
            .add_source(
                config::Environment::with_prefix("METRICFLOW")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AnalysisConfig::default();
        assert!(config.correlation.find_optimal_lag);
        assert_eq!(config.correlation.max_lag, 3);
        assert_eq!(config.correlation.min_shared_months, 6);
        assert_eq!(config.predictors.max_results, 10);
        assert!((config.clusters.threshold - 0.7).abs() < f64::EPSILON);
    }

    #[test]
    fn test_partial_file_falls_back_to_defaults() {
        let raw = r#"
            [correlation]
            max_lag = 6

            [clusters]
            threshold = 0.5
        "#;
        let config: AnalysisConfig = config::Config::builder()
            .add_source(config::File::from_str(raw, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.correlation.max_lag, 6);
        assert_eq!(config.correlation.min_shared_months, 6);
        assert!((config.clusters.threshold - 0.5).abs() < f64::EPSILON);
        assert_eq!(config.predictors.max_results, 10);
    }
}

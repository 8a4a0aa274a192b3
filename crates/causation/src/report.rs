//! Combined analysis report: every analysis over one snapshot, shaped for
//! the presentation layer.

use crate::clusters::{Cluster, ClusterOptions};
use crate::correlation::{strongest_correlations, CorrelationOptions, CorrelationResult};
use crate::engine::CorrelationEngine;
use crate::explain::get_correlation_explanation;
use crate::growth::{calculate_growth_rates, GrowthResult};
use crate::predictors::PredictorOptions;
use metricflow_core::config::AnalysisConfig;
use metricflow_core::error::{AnalysisError, AnalysisResult};
use metricflow_core::types::{MetricRef, MetricSeries};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplainedCorrelation {
    #[serde(flatten)]
    pub result: CorrelationResult,
    pub explanation: String,
}

impl From<CorrelationResult> for ExplainedCorrelation {
    fn from(result: CorrelationResult) -> Self {
        Self {
            explanation: get_correlation_explanation(&result),
            result,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictorReport {
    pub target: MetricRef,
    pub predictors: Vec<ExplainedCorrelation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub metrics_analyzed: usize,
    /// Correlations at or above the display threshold, strongest first.
    pub correlations: Vec<ExplainedCorrelation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub predictors: Option<PredictorReport>,
    pub clusters: Vec<Cluster>,
    pub growth: Vec<GrowthResult>,
}

impl CorrelationEngine<'_> {
    pub fn build_report(
        &self,
        entities: &[MetricSeries],
        config: &AnalysisConfig,
        target: Option<&str>,
    ) -> AnalysisResult<AnalysisReport> {
        let predictors = match target {
            Some(target_id) => {
                let options = PredictorOptions::from_config(&config.predictors, &config.correlation);
                let ranked = self.find_predictors(target_id, entities, &options)?;
                let target = entities
                    .iter()
                    .find(|e| e.id == target_id)
                    .ok_or_else(|| AnalysisError::TargetNotFound(target_id.to_string()))?;
                Some(PredictorReport {
                    target: target.metric_ref(),
                    predictors: ranked.into_iter().map(ExplainedCorrelation::from).collect(),
                })
            }
            None => None,
        };

        let all = self
            .analyze_all_correlations(entities, &CorrelationOptions::from(&config.correlation));
        let correlations = strongest_correlations(&all, config.correlation.display_threshold)
            .into_iter()
            .map(ExplainedCorrelation::from)
            .collect::<Vec<_>>();

        let clusters = self.find_correlation_clusters(
            entities,
            &ClusterOptions::from_config(&config.clusters, &config.correlation),
        );

        debug!(
            metrics = entities.len(),
            correlations = correlations.len(),
            clusters = clusters.len(),
            "Analysis report assembled"
        );

        Ok(AnalysisReport {
            metrics_analyzed: entities.len(),
            correlations,
            predictors,
            clusters,
            growth: calculate_growth_rates(entities),
        })
    }
}

/// Run every analysis with settings from `config`. Predictors are only
/// ranked when a `target` id is given.
pub fn build_report(
    entities: &[MetricSeries],
    config: &AnalysisConfig,
    target: Option<&str>,
) -> AnalysisResult<AnalysisReport> {
    CorrelationEngine::new()
        .parallel(config.correlation.parallel)
        .build_report(entities, config, target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::growth::Trend;
    use metricflow_core::types::{MetricType, MonthKey};

    fn series(id: &str, name: &str, values: &[f64]) -> MetricSeries {
        MetricSeries::new(id, name, "test", MetricType::Currency)
            .with_values("2023-01".parse::<MonthKey>().unwrap(), values)
    }

    fn entities() -> Vec<MetricSeries> {
        vec![
            series("mrr", "MRR", &[10.0, 12.0, 15.0, 19.0, 24.0, 30.0, 37.0, 46.0]),
            series("customers", "Customers", &[5.0, 6.0, 7.5, 9.5, 12.0, 15.0, 18.5, 23.0]),
            series("churn", "Churn", &[4.0, 1.0, 3.0, 1.0, 5.0, 9.0, 2.0, 6.0]),
        ]
    }

    #[test]
    fn test_report_without_target() {
        let report = build_report(&entities(), &AnalysisConfig::default(), None).unwrap();

        assert_eq!(report.metrics_analyzed, 3);
        assert!(report.predictors.is_none());
        assert_eq!(report.growth.len(), 3);
        assert_eq!(report.growth[0].trend, Trend::Growing);

        assert!(!report.correlations.is_empty());
        assert!(report
            .correlations
            .iter()
            .all(|c| c.result.abs_coefficient() >= 0.3 && !c.explanation.is_empty()));

        assert_eq!(report.clusters.len(), 1);
        assert!(report.clusters[0].contains("mrr"));
        assert!(report.clusters[0].contains("customers"));
        assert!(!report.clusters[0].contains("churn"));
    }

    #[test]
    fn test_report_with_target() {
        let report = build_report(&entities(), &AnalysisConfig::default(), Some("mrr")).unwrap();
        let predictors = report.predictors.unwrap();

        assert_eq!(predictors.target.id, "mrr");
        assert!(predictors
            .predictors
            .iter()
            .all(|p| p.result.metric_a.id != "mrr" && p.result.lag >= 0));
    }

    #[test]
    fn test_report_unknown_target() {
        let err = build_report(&entities(), &AnalysisConfig::default(), Some("nope")).unwrap_err();
        assert!(matches!(err, AnalysisError::TargetNotFound(_)));
    }

    #[test]
    fn test_report_serializes_flat_correlations() {
        let report = build_report(&entities(), &AnalysisConfig::default(), None).unwrap();
        let json = serde_json::to_value(&report).unwrap();

        let first = &json["correlations"][0];
        assert!(first["coefficient"].is_number());
        assert!(first["explanation"].is_string());
        assert!(json.get("predictors").is_none());
    }
}

//! Predictor ranking: which metrics lead a chosen target metric.

use crate::correlation::CorrelationResult;
use crate::engine::{effective_max_lag, CorrelationEngine};
use metricflow_core::config::{CorrelationConfig, PredictorConfig};
use metricflow_core::error::{AnalysisError, AnalysisResult};
use metricflow_core::types::MetricSeries;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictorOptions {
    /// Largest lead (in months) a candidate may have over the target.
    pub max_lag: u32,
    pub min_correlation: f64,
    pub max_results: usize,
    pub min_shared_months: usize,
}

impl PredictorOptions {
    pub fn from_config(predictors: &PredictorConfig, correlation: &CorrelationConfig) -> Self {
        Self {
            max_lag: predictors.max_lag,
            min_correlation: predictors.min_correlation,
            max_results: predictors.max_results,
            min_shared_months: correlation.min_shared_months,
        }
    }
}

impl Default for PredictorOptions {
    fn default() -> Self {
        Self::from_config(&PredictorConfig::default(), &CorrelationConfig::default())
    }
}

impl CorrelationEngine<'_> {
    /// Rank every other entity as a leading indicator of `target_id`.
    ///
    /// Each candidate is series A and only lags `0..=max_lag` are searched,
    /// so a predictor's past is always compared with the target's present or
    /// future. The window is capped where the two series stop overlapping. Results are sorted by `|r|` descending.
    pub fn find_predictors(
        &self,
        target_id: &str,
        entities: &[MetricSeries],
        options: &PredictorOptions,
    ) -> AnalysisResult<Vec<CorrelationResult>> {
        if !options.min_correlation.is_finite() {
            return Err(AnalysisError::InvalidOptions(format!(
                "min_correlation must be finite, got {}",
                options.min_correlation
            )));
        }

        let target = entities
            .iter()
            .find(|e| e.id == target_id)
            .ok_or_else(|| AnalysisError::TargetNotFound(target_id.to_string()))?;

        let candidates: Vec<&MetricSeries> =
            entities.iter().filter(|e| e.id != target.id).collect();
        let evaluate = |candidate: &&MetricSeries| {
            let reach = effective_max_lag(candidate, target, options.max_lag);
            self.search_lags(candidate, target, 0..=reach, options.min_shared_months)
                .map(|best| CorrelationResult::from_candidate(candidate, target, &best))
                .filter(|result| result.abs_coefficient() >= options.min_correlation)
        };

        let mut predictors: Vec<CorrelationResult> = if self.is_parallel() {
            candidates.par_iter().filter_map(evaluate).collect()
        } else {
            candidates.iter().filter_map(evaluate).collect()
        };

        predictors.sort_by(|a, b| b.abs_coefficient().total_cmp(&a.abs_coefficient()));
        predictors.truncate(options.max_results);

        debug!(
            target = %target_id,
            candidates = candidates.len(),
            predictors = predictors.len(),
            "Predictor ranking complete"
        );
        Ok(predictors)
    }
}

/// Rank leading indicators for `target_id` among `entities`.
///
/// Errors with [`AnalysisError::TargetNotFound`] when the target is not part
/// of the supplied collection.
pub fn find_predictors(
    target_id: &str,
    entities: &[MetricSeries],
    options: &PredictorOptions,
) -> AnalysisResult<Vec<CorrelationResult>> {
    CorrelationEngine::new().find_predictors(target_id, entities, options)
}

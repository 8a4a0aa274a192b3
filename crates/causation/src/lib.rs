//! Causation/correlation analysis engine — lead/lag correlation between
//! monthly business metrics, leading-indicator ranking, correlation
//! clusters, and compound growth rates.

pub mod align;
pub mod cache;
pub mod clusters;
pub mod correlation;
pub mod engine;
pub mod explain;
pub mod growth;
pub mod predictors;
pub mod report;

pub use align::{align, AlignedPairs};
pub use cache::{CorrelationCache, InMemoryCorrelationCache, PairKey};
pub use clusters::{
    find_correlation_clusters, find_correlation_clusters_with, Cluster, ClusterOptions,
};
pub use correlation::{
    analyze_all_correlations, classify_strength, find_optimal_lag, pearson, significance,
    strongest_correlations, CorrelationDirection, CorrelationOptions, CorrelationResult,
    CorrelationStrength, LagCandidate, PearsonOutcome,
};
pub use engine::CorrelationEngine;
pub use explain::get_correlation_explanation;
pub use growth::{calculate_growth_rate, calculate_growth_rates, GrowthResult, Trend};
pub use predictors::{find_predictors, PredictorOptions};
pub use report::{build_report, AnalysisReport, ExplainedCorrelation, PredictorReport};

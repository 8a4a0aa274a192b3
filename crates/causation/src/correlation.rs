//! Correlation statistics: Pearson correlation, Student-t significance,
//! strength classification, and the lead/lag search.

use crate::engine::CorrelationEngine;
use metricflow_core::config::CorrelationConfig;
use metricflow_core::types::{MetricRef, MetricSeries};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, StudentsT};
use std::fmt;

/// `|r|` at or above this is a strong relationship.
pub const STRONG_THRESHOLD: f64 = 0.7;
/// `|r|` at or above this (and below strong) is moderate.
pub const MODERATE_THRESHOLD: f64 = 0.4;

/// Two `|r|` values closer than this are treated as a tie.
pub(crate) const TIE_TOLERANCE: f64 = 1e-9;

// ─── Result Types ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrelationStrength {
    Strong,
    Moderate,
    Weak,
}

impl CorrelationStrength {
    pub fn as_str(&self) -> &'static str {
        match self {
            CorrelationStrength::Strong => "strong",
            CorrelationStrength::Moderate => "moderate",
            CorrelationStrength::Weak => "weak",
        }
    }
}

impl fmt::Display for CorrelationStrength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrelationDirection {
    Positive,
    Negative,
    None,
}

/// Outcome of [`pearson`]. `degenerate` is set when either side had no
/// variance and `r` was forced to zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PearsonOutcome {
    pub r: f64,
    pub degenerate: bool,
}

/// Correlation of one pair at one lag, before the minimum-sample filter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LagCandidate {
    pub lag: i32,
    pub r: f64,
    pub n: usize,
    pub degenerate: bool,
    /// Uncentered similarity of the aligned values, used to break `|r|` ties.
    pub cosine_similarity: f64,
}

/// Outcome of comparing two metric series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationResult {
    pub metric_a: MetricRef,
    pub metric_b: MetricRef,
    pub coefficient: f64,
    /// Months by which `metric_a` leads `metric_b` (negative: `metric_b` leads).
    pub lag: i32,
    pub strength: CorrelationStrength,
    pub direction: CorrelationDirection,
    pub shared_months: usize,
    pub p_value: f64,
    /// One side of the aligned sample had zero variance.
    pub low_confidence: bool,
}

impl CorrelationResult {
    pub fn from_candidate(a: &MetricSeries, b: &MetricSeries, candidate: &LagCandidate) -> Self {
        let direction = if candidate.degenerate || candidate.r == 0.0 {
            CorrelationDirection::None
        } else if candidate.r > 0.0 {
            CorrelationDirection::Positive
        } else {
            CorrelationDirection::Negative
        };

        Self {
            metric_a: a.metric_ref(),
            metric_b: b.metric_ref(),
            coefficient: candidate.r,
            lag: candidate.lag,
            strength: classify_strength(candidate.r),
            direction,
            shared_months: candidate.n,
            p_value: significance(candidate.r, candidate.n),
            low_confidence: candidate.degenerate,
        }
    }

    pub fn abs_coefficient(&self) -> f64 {
        self.coefficient.abs()
    }

    pub fn is_significant(&self, alpha: f64) -> bool {
        !self.low_confidence && self.p_value < alpha
    }

    pub fn involves(&self, metric_id: &str) -> bool {
        self.metric_a.id == metric_id || self.metric_b.id == metric_id
    }
}

// ─── Options ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationOptions {
    /// Search `[-max_lag, max_lag]`; when false every pair is compared at lag 0.
    pub find_optimal_lag: bool,
    pub max_lag: u32,
    pub min_shared_months: usize,
}

impl Default for CorrelationOptions {
    fn default() -> Self {
        CorrelationConfig::default().into()
    }
}

impl From<&CorrelationConfig> for CorrelationOptions {
    fn from(config: &CorrelationConfig) -> Self {
        Self {
            find_optimal_lag: config.find_optimal_lag,
            max_lag: config.max_lag,
            min_shared_months: config.min_shared_months,
        }
    }
}

impl From<CorrelationConfig> for CorrelationOptions {
    fn from(config: CorrelationConfig) -> Self {
        (&config).into()
    }
}

// ─── Statistics ─────────────────────────────────────────────────────

/// Pearson product-moment correlation of the pairs.
///
/// Zero variance on either side (or fewer than two pairs) yields `r = 0`
/// with `degenerate` set instead of NaN.
pub fn pearson(pairs: &[(f64, f64)]) -> PearsonOutcome {
    const DEGENERATE: PearsonOutcome = PearsonOutcome {
        r: 0.0,
        degenerate: true,
    };

    let Some(&(x0, y0)) = pairs.first() else {
        return DEGENERATE;
    };
    if pairs.len() < 2
        || pairs.iter().all(|(x, _)| *x == x0)
        || pairs.iter().all(|(_, y)| *y == y0)
    {
        return DEGENERATE;
    }

    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|(_, y)| y).sum::<f64>() / n;

    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (x, y) in pairs {
        let dx = x - mean_x;
        let dy = y - mean_y;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }

    if sxx <= 0.0 || syy <= 0.0 {
        return DEGENERATE;
    }

    let r = sxy / (sxx.sqrt() * syy.sqrt());
    if !r.is_finite() {
        return DEGENERATE;
    }

    PearsonOutcome {
        r: r.clamp(-1.0, 1.0),
        degenerate: false,
    }
}

/// Two-tailed p-value of `r` over `n` samples via Student's t with `n - 2`
/// degrees of freedom. Undersized samples report `1.0`.
pub fn significance(r: f64, n: usize) -> f64 {
    if n < 3 || !r.is_finite() {
        return 1.0;
    }

    let r2 = r * r;
    if r2 >= 1.0 {
        return 0.0;
    }

    let df = (n - 2) as f64;
    let t = r * (df / (1.0 - r2)).sqrt();

    let p = match StudentsT::new(0.0, 1.0, df) {
        Ok(dist) => 2.0 * (1.0 - dist.cdf(t.abs())),
        Err(_) => return 1.0,
    };

    if p.is_finite() {
        p.clamp(0.0, 1.0)
    } else {
        1.0
    }
}

pub fn classify_strength(r: f64) -> CorrelationStrength {
    let magnitude = r.abs();
    if magnitude >= STRONG_THRESHOLD {
        CorrelationStrength::Strong
    } else if magnitude >= MODERATE_THRESHOLD {
        CorrelationStrength::Moderate
    } else {
        CorrelationStrength::Weak
    }
}

/// Cosine of the angle between the raw aligned vectors.
pub(crate) fn cosine_similarity(pairs: &[(f64, f64)]) -> f64 {
    let (mut dot, mut xx, mut yy) = (0.0, 0.0, 0.0);
    for (x, y) in pairs {
        dot += x * y;
        xx += x * x;
        yy += y * y;
    }
    let denom = xx.sqrt() * yy.sqrt();
    if denom > 0.0 && denom.is_finite() {
        (dot / denom).clamp(-1.0, 1.0)
    } else {
        0.0
    }
}

/// Whether `candidate` should replace `incumbent` during a lag search that
/// visits lags in ascending order.
///
/// Larger `|r|` wins. On a tie between two measurable candidates the pair
/// whose raw values line up more closely (cosine similarity) wins. Past that
/// the smaller `|lag|` wins; otherwise the earlier lag is kept. Degenerate
/// candidates skip the similarity step, so a flat series settles on lag 0.
pub(crate) fn outranks(candidate: &LagCandidate, incumbent: &LagCandidate) -> bool {
    let diff = candidate.r.abs() - incumbent.r.abs();
    if diff.abs() > TIE_TOLERANCE {
        return diff > 0.0;
    }

    if candidate.degenerate || incumbent.degenerate {
        return candidate.lag.unsigned_abs() < incumbent.lag.unsigned_abs();
    }

    let similarity = candidate.cosine_similarity.abs() - incumbent.cosine_similarity.abs();
    if similarity.abs() > TIE_TOLERANCE {
        return similarity > 0.0;
    }

    candidate.lag.unsigned_abs() < incumbent.lag.unsigned_abs()
}

// ─── Entry Points ───────────────────────────────────────────────────

/// Strongest lag in `[-max_lag, max_lag]` with at least `min_shared_months`
/// aligned months, or `None` when no lag has enough data.
pub fn find_optimal_lag(
    series_a: &MetricSeries,
    series_b: &MetricSeries,
    max_lag: u32,
    min_shared_months: usize,
) -> Option<LagCandidate> {
    CorrelationEngine::new().find_optimal_lag(series_a, series_b, max_lag, min_shared_months)
}

/// Correlate every unordered pair of distinct entities.
pub fn analyze_all_correlations(
    entities: &[MetricSeries],
    options: &CorrelationOptions,
) -> Vec<CorrelationResult> {
    CorrelationEngine::new().analyze_all_correlations(entities, options)
}

/// Results with `|r| >= threshold`, strongest first.
pub fn strongest_correlations(
    results: &[CorrelationResult],
    threshold: f64,
) -> Vec<CorrelationResult> {
    let mut kept: Vec<CorrelationResult> = results
        .iter()
        .filter(|r| r.abs_coefficient() >= threshold)
        .cloned()
        .collect();
    kept.sort_by(|a, b| b.abs_coefficient().total_cmp(&a.abs_coefficient()));
    kept
}

//! Compound monthly growth rate (CMGR) and trend classification.

use metricflow_core::types::{MetricRef, MetricSeries};
use serde::{Deserialize, Serialize};
use std::fmt;

/// CMGR beyond ±1% per month counts as a trend.
pub const TREND_BAND: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Growing,
    Declining,
    Stable,
}

impl Trend {
    pub fn from_cmgr(cmgr: f64) -> Self {
        if cmgr > TREND_BAND {
            Trend::Growing
        } else if cmgr < -TREND_BAND {
            Trend::Declining
        } else {
            Trend::Stable
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Trend::Growing => "growing",
            Trend::Declining => "declining",
            Trend::Stable => "stable",
        }
    }
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrowthResult {
    pub metric: MetricRef,
    /// Compound monthly growth rate as a fraction (0.05 = 5% per month).
    pub cmgr: f64,
    pub trend: Trend,
}

/// CMGR between the first and last non-zero months of the series.
///
/// The exponent is the calendar distance in months between those two
/// points, so gaps in between still count as elapsed months. Non-positive
/// endpoints or a single data point yield a stable zero rate.
pub fn calculate_growth_rate(entity: &MetricSeries) -> GrowthResult {
    let stable = GrowthResult {
        metric: entity.metric_ref(),
        cmgr: 0.0,
        trend: Trend::Stable,
    };

    let mut non_zero = entity
        .values
        .iter()
        .filter(|(_, value)| **value != 0.0 && value.is_finite());

    let Some((first_month, first)) = non_zero.next() else {
        return stable;
    };
    let (last_month, last) = non_zero.next_back().unwrap_or((first_month, first));

    let steps = first_month.months_until(last_month);
    if *first <= 0.0 || *last <= 0.0 || steps < 1 {
        return stable;
    }

    let cmgr = (last / first).powf(1.0 / steps as f64) - 1.0;
    if !cmgr.is_finite() {
        return stable;
    }

    GrowthResult {
        trend: Trend::from_cmgr(cmgr),
        cmgr,
        ..stable
    }
}

/// Growth for every entity, in input order.
pub fn calculate_growth_rates(entities: &[MetricSeries]) -> Vec<GrowthResult> {
    entities.iter().map(calculate_growth_rate).collect()
}

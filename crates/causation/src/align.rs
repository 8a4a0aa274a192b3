//! Series alignment: pairs up two sparse monthly series under a lag.

use metricflow_core::types::MetricSeries;
use serde::{Deserialize, Serialize};

/// Paired samples produced by [`align`], ordered by A's month.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlignedPairs {
    pub pairs: Vec<(f64, f64)>,
    pub n: usize,
}

impl AlignedPairs {
    pub fn xs(&self) -> impl Iterator<Item = f64> + '_ {
        self.pairs.iter().map(|(x, _)| *x)
    }

    pub fn ys(&self) -> impl Iterator<Item = f64> + '_ {
        self.pairs.iter().map(|(_, y)| *y)
    }
}

/// Compare A's month `m` with B's month `m + lag`.
///
/// A positive lag means A leads B. Months missing on either side are
/// dropped; nothing is interpolated.
pub fn align(series_a: &MetricSeries, series_b: &MetricSeries, lag: i32) -> AlignedPairs {
    let pairs: Vec<(f64, f64)> = series_a
        .values
        .iter()
        .filter_map(|(month, a)| series_b.get(&month.shift(lag)).map(|b| (*a, b)))
        .collect();

    AlignedPairs {
        n: pairs.len(),
        pairs,
    }
}

//! Correlation engine: evaluates pairs of series, optionally through an
//! injected cache, and fans pairwise work out across the rayon pool.

use crate::align::align;
use crate::cache::{CorrelationCache, PairKey};
use crate::correlation::{
    cosine_similarity, outranks, pearson, CorrelationOptions, CorrelationResult, LagCandidate,
};
use metricflow_core::types::MetricSeries;
use rayon::prelude::*;
use std::ops::RangeInclusive;
use tracing::debug;

/// Stateless correlation engine. Holds only an optional borrowed cache and
/// the fan-out switch; every call is a pure function of its arguments.
#[derive(Clone, Copy)]
pub struct CorrelationEngine<'c> {
    cache: Option<&'c dyn CorrelationCache>,
    parallel: bool,
}

impl<'c> CorrelationEngine<'c> {
    pub fn new() -> Self {
        Self {
            cache: None,
            parallel: true,
        }
    }

    /// Memoize fixed-lag correlations in `cache`.
    pub fn with_cache(mut self, cache: &'c dyn CorrelationCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Toggle rayon fan-out of pairwise work. Results are identical either way.
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn is_parallel(&self) -> bool {
        self.parallel
    }

    /// Correlation of `series_a` against `series_b` at a single lag, with no
    /// minimum-sample filter applied.
    pub fn evaluate_lag(
        &self,
        series_a: &MetricSeries,
        series_b: &MetricSeries,
        lag: i32,
    ) -> LagCandidate {
        let key = self.cache.map(|_| PairKey::new(&series_a.id, &series_b.id, lag));

        if let (Some(cache), Some(key)) = (self.cache, key.as_ref()) {
            if let Some(hit) = cache.get(key) {
                metrics::counter!("causation.cache_hits").increment(1);
                return hit;
            }
        }

        let aligned = align(series_a, series_b, lag);
        let outcome = pearson(&aligned.pairs);
        let candidate = LagCandidate {
            lag,
            r: outcome.r,
            n: aligned.n,
            degenerate: outcome.degenerate,
            cosine_similarity: cosine_similarity(&aligned.pairs),
        };

        if let (Some(cache), Some(key)) = (self.cache, key) {
            cache.insert(key, candidate);
        }
        candidate
    }

    /// Best candidate over `lags` (visited in ascending order) among those
    /// with at least `min_shared_months` aligned months.
    pub fn search_lags(
        &self,
        series_a: &MetricSeries,
        series_b: &MetricSeries,
        lags: RangeInclusive<i32>,
        min_shared_months: usize,
    ) -> Option<LagCandidate> {
        let mut best: Option<LagCandidate> = None;

        for lag in lags {
            let candidate = self.evaluate_lag(series_a, series_b, lag);
            if candidate.n < min_shared_months {
                continue;
            }
            best = match best {
                Some(incumbent) if !outranks(&candidate, &incumbent) => Some(incumbent),
                _ => Some(candidate),
            };
        }

        best
    }

    pub fn find_optimal_lag(
        &self,
        series_a: &MetricSeries,
        series_b: &MetricSeries,
        max_lag: u32,
        min_shared_months: usize,
    ) -> Option<LagCandidate> {
        let reach = effective_max_lag(series_a, series_b, max_lag);
        self.search_lags(series_a, series_b, -reach..=reach, min_shared_months)
    }

    /// Fixed-lag correlation, omitted when the pair shares too few months.
    pub fn correlate(
        &self,
        series_a: &MetricSeries,
        series_b: &MetricSeries,
        lag: i32,
        min_shared_months: usize,
    ) -> Option<CorrelationResult> {
        let candidate = self.evaluate_lag(series_a, series_b, lag);
        (candidate.n >= min_shared_months)
            .then(|| CorrelationResult::from_candidate(series_a, series_b, &candidate))
    }

    pub fn analyze_all_correlations(
        &self,
        entities: &[MetricSeries],
        options: &CorrelationOptions,
    ) -> Vec<CorrelationResult> {
        let results: Vec<CorrelationResult> = self
            .pairwise(entities, options)
            .into_iter()
            .map(|(_, _, result)| result)
            .collect();

        debug!(
            entities = entities.len(),
            results = results.len(),
            find_optimal_lag = options.find_optimal_lag,
            max_lag = options.max_lag,
            "Pairwise correlation analysis complete"
        );
        results
    }

    /// Correlate every unordered pair `(i, j)` with `i < j`, keeping the
    /// entity indices alongside each emitted result. Output is in pair order.
    pub(crate) fn pairwise(
        &self,
        entities: &[MetricSeries],
        options: &CorrelationOptions,
    ) -> Vec<(usize, usize, CorrelationResult)> {
        let pairs: Vec<(usize, usize)> = (0..entities.len())
            .flat_map(|i| ((i + 1)..entities.len()).map(move |j| (i, j)))
            .collect();

        let evaluate = |&(i, j): &(usize, usize)| {
            let (a, b) = (&entities[i], &entities[j]);
            let candidate = if options.find_optimal_lag {
                self.find_optimal_lag(a, b, options.max_lag, options.min_shared_months)
            } else {
                let candidate = self.evaluate_lag(a, b, 0);
                (candidate.n >= options.min_shared_months).then_some(candidate)
            };

            match candidate {
                Some(candidate) => {
                    metrics::counter!("causation.pairs_evaluated").increment(1);
                    Some((i, j, CorrelationResult::from_candidate(a, b, &candidate)))
                }
                None => {
                    metrics::counter!("causation.pairs_skipped").increment(1);
                    None
                }
            }
        };

        if self.parallel {
            pairs.par_iter().filter_map(evaluate).collect()
        } else {
            pairs.iter().filter_map(evaluate).collect()
        }
    }
}

impl Default for CorrelationEngine<'_> {
    fn default() -> Self {
        Self::new()
    }
}

/// `max_lag` capped to the widest offset at which the two series can still
/// overlap; lags beyond it align zero months.
pub(crate) fn effective_max_lag(
    series_a: &MetricSeries,
    series_b: &MetricSeries,
    max_lag: u32,
) -> i32 {
    let requested = i32::try_from(max_lag).unwrap_or(i32::MAX);

    let span = match (
        series_a.first_month(),
        series_a.last_month(),
        series_b.first_month(),
        series_b.last_month(),
    ) {
        (Some(a_first), Some(a_last), Some(b_first), Some(b_last)) => a_first
            .months_until(&b_last)
            .abs()
            .max(a_last.months_until(&b_first).abs()),
        _ => 0,
    };

    requested.min(i32::try_from(span).unwrap_or(i32::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryCorrelationCache;
    use metricflow_core::types::{MetricType, MonthKey};

    fn series(id: &str, start: &str, values: &[f64]) -> MetricSeries {
        MetricSeries::new(id, id, "test", MetricType::Count)
            .with_values(start.parse::<MonthKey>().unwrap(), values)
    }

    fn sample_entities() -> Vec<MetricSeries> {
        vec![
            series("a", "2023-01", &[3.0, 5.0, 4.0, 8.0, 9.0, 7.0, 12.0, 11.0]),
            series("b", "2023-01", &[1.0, 3.0, 5.0, 4.0, 8.0, 9.0, 7.0, 12.0]),
            series("c", "2023-03", &[9.0, 2.0, 6.0, 1.0, 5.0, 3.0]),
            series("d", "2023-01", &[2.0, 2.5, 2.2, 3.1, 3.0, 3.4, 4.0, 3.9]),
        ]
    }

    #[test]
    fn test_parallel_and_sequential_agree() {
        let entities = sample_entities();
        let options = CorrelationOptions {
            find_optimal_lag: true,
            max_lag: 3,
            min_shared_months: 3,
        };

        let parallel = CorrelationEngine::new().analyze_all_correlations(&entities, &options);
        let sequential = CorrelationEngine::new()
            .parallel(false)
            .analyze_all_correlations(&entities, &options);

        assert_eq!(parallel, sequential);
        assert_eq!(parallel.len(), 6);
    }

    #[test]
    fn test_cache_is_populated_and_reused() {
        let entities = sample_entities();
        let cache = InMemoryCorrelationCache::new();
        let engine = CorrelationEngine::new().with_cache(&cache);
        let options = CorrelationOptions {
            find_optimal_lag: true,
            max_lag: 2,
            min_shared_months: 3,
        };

        let first = engine.analyze_all_correlations(&entities, &options);
        let cached_entries = cache.len();
        assert!(cached_entries > 0);

        let second = engine.analyze_all_correlations(&entities, &options);
        assert_eq!(first, second);
        assert_eq!(cache.len(), cached_entries);

        let uncached = CorrelationEngine::new().analyze_all_correlations(&entities, &options);
        assert_eq!(first, uncached);
    }

    #[test]
    fn test_evaluate_lag_reports_sample_size_below_minimum() {
        let a = series("a", "2024-01", &[1.0, 2.0]);
        let b = series("b", "2024-01", &[2.0, 4.0]);
        let engine = CorrelationEngine::new();

        assert_eq!(engine.evaluate_lag(&a, &b, 0).n, 2);
        assert!(engine.correlate(&a, &b, 0, 3).is_none());
        assert!(engine.correlate(&a, &b, 0, 2).is_some());
    }

    #[test]
    fn test_search_lags_respects_range() {
        let a = series("a", "2024-01", &[1.0, 5.0, 2.0, 8.0, 3.0, 9.0]);
        let b = series("b", "2024-02", &[1.0, 5.0, 2.0, 8.0, 3.0, 9.0]);
        let engine = CorrelationEngine::new();

        // True lead is +1, but only non-positive lags are allowed here.
        let best = engine.search_lags(&a, &b, -2..=0, 3).unwrap();
        assert!(best.lag <= 0);

        let best = engine.search_lags(&a, &b, 0..=2, 3).unwrap();
        assert_eq!(best.lag, 1);
    }

    #[test]
    fn test_effective_max_lag_caps_to_overlap() {
        let a = series("a", "2024-01", &[1.0, 2.0, 3.0]);
        let b = series("b", "2024-01", &[1.0, 2.0, 3.0]);
        assert_eq!(effective_max_lag(&a, &b, 12), 2);
        assert_eq!(effective_max_lag(&a, &b, 1), 1);
        assert_eq!(effective_max_lag(&a, &b, u32::MAX), 2);
    }
}

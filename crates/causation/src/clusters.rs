//! Cluster builder: groups metrics that move together in the same month.
//!
//! Builds an undirected graph with an edge wherever the lag-0 correlation
//! reaches the threshold and reports its connected components (single-link).

use crate::correlation::CorrelationOptions;
use crate::engine::CorrelationEngine;
use metricflow_core::config::{ClusterConfig, CorrelationConfig};
use metricflow_core::types::{MetricRef, MetricSeries};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    /// Members in the order they appear in the analyzed collection.
    pub members: Vec<MetricRef>,
    /// Mean `|r|` over every correlated pair of members.
    pub avg_correlation: f64,
}

impl Cluster {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, metric_id: &str) -> bool {
        self.members.iter().any(|m| m.id == metric_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterOptions {
    pub threshold: f64,
    pub min_shared_months: usize,
}

impl ClusterOptions {
    pub fn from_config(clusters: &ClusterConfig, correlation: &CorrelationConfig) -> Self {
        Self {
            threshold: clusters.threshold,
            min_shared_months: correlation.min_shared_months,
        }
    }
}

impl Default for ClusterOptions {
    fn default() -> Self {
        Self::from_config(&ClusterConfig::default(), &CorrelationConfig::default())
    }
}

// ─── Union-Find ─────────────────────────────────────────────────────

struct DisjointSet {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl DisjointSet {
    fn new(size: usize) -> Self {
        Self {
            parent: (0..size).collect(),
            rank: vec![0; size],
        }
    }

    fn find(&mut self, mut node: usize) -> usize {
        while self.parent[node] != node {
            self.parent[node] = self.parent[self.parent[node]];
            node = self.parent[node];
        }
        node
    }

    fn union(&mut self, a: usize, b: usize) {
        let (root_a, root_b) = (self.find(a), self.find(b));
        if root_a == root_b {
            return;
        }
        match self.rank[root_a].cmp(&self.rank[root_b]) {
            std::cmp::Ordering::Less => self.parent[root_a] = root_b,
            std::cmp::Ordering::Greater => self.parent[root_b] = root_a,
            std::cmp::Ordering::Equal => {
                self.parent[root_b] = root_a;
                self.rank[root_a] += 1;
            }
        }
    }
}

// ─── Clustering ─────────────────────────────────────────────────────

impl CorrelationEngine<'_> {
    pub fn find_correlation_clusters(
        &self,
        entities: &[MetricSeries],
        options: &ClusterOptions,
    ) -> Vec<Cluster> {
        let contemporaneous = CorrelationOptions {
            find_optimal_lag: false,
            max_lag: 0,
            min_shared_months: options.min_shared_months,
        };
        let pairs = self.pairwise(entities, &contemporaneous);

        let mut components = DisjointSet::new(entities.len());
        for (i, j, result) in &pairs {
            if result.abs_coefficient() >= options.threshold {
                components.union(*i, *j);
            }
        }

        // Group members by root, keeping first-appearance order.
        let mut groups: Vec<Vec<usize>> = Vec::new();
        let mut group_of_root: HashMap<usize, usize> = HashMap::new();
        for index in 0..entities.len() {
            let root = components.find(index);
            let slot = *group_of_root.entry(root).or_insert_with(|| {
                groups.push(Vec::new());
                groups.len() - 1
            });
            groups[slot].push(index);
        }

        let mut sums = vec![(0.0_f64, 0_usize); groups.len()];
        for (i, j, result) in &pairs {
            let (root_i, root_j) = (components.find(*i), components.find(*j));
            if root_i == root_j {
                let slot = group_of_root[&root_i];
                sums[slot].0 += result.abs_coefficient();
                sums[slot].1 += 1;
            }
        }

        let mut clusters: Vec<Cluster> = groups
            .into_iter()
            .zip(sums)
            .filter(|(members, (_, count))| members.len() >= 2 && *count > 0)
            .map(|(members, (sum, count))| Cluster {
                members: members.iter().map(|&i| entities[i].metric_ref()).collect(),
                avg_correlation: sum / count as f64,
            })
            .collect();

        clusters.sort_by(|a, b| {
            b.len()
                .cmp(&a.len())
                .then_with(|| b.avg_correlation.total_cmp(&a.avg_correlation))
        });

        debug!(
            entities = entities.len(),
            threshold = options.threshold,
            clusters = clusters.len(),
            "Correlation clustering complete"
        );
        clusters
    }
}

/// Cluster with the default minimum of 6 shared months
/// ([`ClusterOptions::default`]). Pairs overlapping for fewer months are never
/// linked, so series shorter than that form no clusters; use
/// [`find_correlation_clusters_with`] to lower the minimum.
pub fn find_correlation_clusters(entities: &[MetricSeries], threshold: f64) -> Vec<Cluster> {
    let options = ClusterOptions {
        threshold,
        ..ClusterOptions::default()
    };
    find_correlation_clusters_with(entities, &options)
}

pub fn find_correlation_clusters_with(
    entities: &[MetricSeries],
    options: &ClusterOptions,
) -> Vec<Cluster> {
    CorrelationEngine::new().find_correlation_clusters(entities, options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use metricflow_core::types::{MetricType, MonthKey};

    fn series(id: &str, values: &[f64]) -> MetricSeries {
        MetricSeries::new(id, id, "test", MetricType::Count)
            .with_values("2023-01".parse::<MonthKey>().unwrap(), values)
    }

    fn options(threshold: f64) -> ClusterOptions {
        ClusterOptions {
            threshold,
            min_shared_months: 3,
        }
    }

    #[test]
    fn test_disjoint_set_union_find() {
        let mut set = DisjointSet::new(5);
        set.union(0, 1);
        set.union(3, 4);
        set.union(1, 4);
        assert_eq!(set.find(0), set.find(3));
        assert_ne!(set.find(0), set.find(2));
    }

    #[test]
    fn test_chain_is_single_link() {
        // a~b and b~c clear the threshold, a~c (0.886) does not
        let entities = vec![
            series("a", &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]),
            series("b", &[1.0, 2.0, 3.0, 5.0, 4.0, 6.0]),
            series("c", &[1.0, 3.0, 2.0, 5.0, 4.0, 6.0]),
        ];
        let clusters = CorrelationEngine::new().find_correlation_clusters(&entities, &options(0.9));

        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].len(), 3);
        assert!(clusters[0].avg_correlation <= 1.0);
    }

    #[test]
    fn test_two_separate_clusters_sorted_by_size() {
        let up = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let zigzag = [5.0, 1.0, 6.0, 2.0, 7.0, 3.0];
        let entities = vec![
            series("z1", &zigzag),
            series("u1", &up),
            series("z2", &zigzag.map(|v| v * 2.0)),
            series("u2", &up.map(|v| v + 10.0)),
            series("u3", &up.map(|v| v * 3.0)),
        ];

        let clusters = find_correlation_clusters_with(&entities, &options(0.9));
        assert_eq!(clusters.len(), 2);

        let ids: Vec<&str> = clusters[0].members.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["u1", "u2", "u3"]);
        assert!((clusters[0].avg_correlation - 1.0).abs() < 1e-9);

        let ids: Vec<&str> = clusters[1].members.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["z1", "z2"]);
    }

    #[test]
    fn test_negative_correlation_links() {
        let entities = vec![
            series("a", &[1.0, 2.0, 3.0, 4.0]),
            series("b", &[8.0, 6.0, 4.0, 2.0]),
        ];
        let clusters = find_correlation_clusters_with(&entities, &options(0.9));
        assert_eq!(clusters.len(), 1);
        assert!((clusters[0].avg_correlation - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_unreachable_threshold() {
        let entities = vec![
            series("a", &[1.0, 2.0, 3.0, 4.0]),
            series("b", &[1.0, 2.0, 3.0, 4.0]),
        ];
        assert!(find_correlation_clusters_with(&entities, &options(1.01)).is_empty());
        assert!(find_correlation_clusters_with(&entities, &options(f64::NAN)).is_empty());
    }

    #[test]
    fn test_default_minimum_excludes_short_series() {
        let entities = vec![
            series("a", &[10.0, 20.0, 30.0, 40.0]),
            series("b", &[0.0, 10.0, 20.0, 30.0]),
        ];

        assert!(find_correlation_clusters(&entities, 0.5).is_empty());
        assert_eq!(find_correlation_clusters_with(&entities, &options(0.5)).len(), 1);
    }

    #[test]
    fn test_empty_input() {
        assert!(find_correlation_clusters(&[], 0.5).is_empty());
    }
}

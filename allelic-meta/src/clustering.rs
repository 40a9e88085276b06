//! Variant count clustering.
//!
//! Samples are profiled by how many variants were called on each feature. The
//! resulting sample x feature matrix is clustered twice, independently: rows
//! (samples across features) and columns (features across samples), both with
//! Ward-linkage agglomerative clustering on Euclidean distances.

use std::collections::BTreeMap;
use std::time::Instant;

use allelic_core::StorageView;
use log::{debug, info, warn};
use ndarray::{Array2, ArrayView1, ArrayView2};
use serde::Serialize;

/// Sparse view of the count matrix and the cluster label of every row and column.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct VariantCountClustering {
    /// `(sample, feature, count)` for every pair.
    pub counts: Vec<(String, String, u32)>,
    pub sample_labels: BTreeMap<String, usize>,
    pub feature_labels: BTreeMap<String, usize>,
}

///
/// Dense sample x feature matrix of called-variant counts. Rows and columns follow
/// the (sorted) sample and feature order of the snapshot.
///
pub fn variant_count_matrix(storage: &StorageView) -> Array2<u32> {
    let features: Vec<&str> = storage.feature_names().collect();
    let mut counts = Array2::<u32>::zeros((storage.sample_count(), features.len()));

    for (row, sample) in storage.samples.values().enumerate() {
        for (col, feature) in features.iter().enumerate() {
            counts[[row, col]] = sample.called_variant_count(feature);
        }
    }

    counts
}

///
/// Cluster samples into `ceil(log2(samples))` and features into `ceil(features / 2)`
/// groups by their variant counts. A dimension with a single entry is not clustered
/// and its entry is labelled 0.
///
pub fn variant_counts_clustering(storage: &StorageView) -> VariantCountClustering {
    let start = Instant::now();

    let sample_names: Vec<&str> = storage.sample_names().collect();
    let feature_names: Vec<&str> = storage.feature_names().collect();
    let counts = variant_count_matrix(storage);
    let values = counts.mapv(f64::from);

    let sample_targets = if sample_names.len() > 1 {
        (sample_names.len() as f64).log2().ceil() as usize
    } else {
        1
    };
    let feature_targets = feature_names.len().div_ceil(2);

    let sample_labels = label_dimension(values.view(), sample_targets);
    let feature_labels = label_dimension(values.t(), feature_targets);

    let triples = sample_names
        .iter()
        .enumerate()
        .flat_map(|(row, sample)| {
            let counts = &counts;
            feature_names.iter().enumerate().map(move |(col, feature)| {
                (sample.to_string(), feature.to_string(), counts[[row, col]])
            })
        })
        .collect();

    info!(
        "Variant counts clustering of {} samples x {} features done in {:?}",
        sample_names.len(),
        feature_names.len(),
        start.elapsed()
    );

    VariantCountClustering {
        counts: triples,
        sample_labels: zip_labels(&sample_names, sample_labels),
        feature_labels: zip_labels(&feature_names, feature_labels),
    }
}

fn label_dimension(rows: ArrayView2<f64>, n_clusters: usize) -> Vec<usize> {
    match rows.nrows() {
        0 => Vec::new(),
        1 => {
            warn!("Single entry, clustering skipped");
            vec![0]
        }
        _ => ward_clustering(rows, n_clusters),
    }
}

fn zip_labels(names: &[&str], labels: Vec<usize>) -> BTreeMap<String, usize> {
    names
        .iter()
        .map(|name| name.to_string())
        .zip(labels)
        .collect()
}

///
/// Agglomerative clustering of the rows of `data` with Ward linkage.
///
/// Starting from singletons, the pair of clusters whose merge increases the total
/// within-cluster variance the least is merged until `n_clusters` remain (clamped
/// to `1..=rows`). Equal costs resolve to the lowest index pair. Labels are numbered
/// in order of first appearance along the rows.
///
/// Merge costs are kept in a pairwise matrix updated with the Lance-Williams
/// recurrence, and every row caches its cheapest partner with a higher index.
///
pub fn ward_clustering(data: ArrayView2<f64>, n_clusters: usize) -> Vec<usize> {
    let n = data.nrows();
    if n == 0 {
        return Vec::new();
    }
    let target = n_clusters.clamp(1, n);

    // upper triangle only: cost[[i, j]] with i < j
    let mut cost = Array2::from_shape_fn((n, n), |(i, j)| {
        if i < j {
            0.5 * squared_distance(data.row(i), data.row(j))
        } else {
            0.0
        }
    });
    let mut size = vec![1usize; n];
    let mut active = vec![true; n];
    let mut cluster_of: Vec<usize> = (0..n).collect();
    let mut nearest: Vec<Option<(usize, f64)>> =
        (0..n).map(|i| nearest_partner(&cost, &active, i)).collect();

    let mut remaining = n;
    while remaining > target {
        let mut best: Option<(usize, usize, f64)> = None;
        for (i, partner) in nearest.iter().enumerate() {
            let Some((j, merge_cost)) = *partner else { continue };
            if best.is_none_or(|(_, _, lowest)| merge_cost < lowest) {
                best = Some((i, j, merge_cost));
            }
        }

        let Some((i, j, merge_cost)) = best else { break };
        debug!("Ward merge of clusters {} and {} at cost {:.4}", i, j, merge_cost);

        let (size_i, size_j) = (size[i] as f64, size[j] as f64);
        for k in (0..n).filter(|&k| active[k] && k != i && k != j) {
            let size_k = size[k] as f64;
            let merged = ((size_k + size_i) * cost[ordered(k, i)]
                + (size_k + size_j) * cost[ordered(k, j)]
                - size_k * merge_cost)
                / (size_k + size_i + size_j);
            cost[ordered(k, i)] = merged;
        }

        size[i] += size[j];
        active[j] = false;
        nearest[j] = None;
        for cluster in cluster_of.iter_mut().filter(|cluster| **cluster == j) {
            *cluster = i;
        }
        remaining -= 1;

        for k in (0..n).filter(|&k| active[k]) {
            match nearest[k] {
                Some((m, _)) if k == i || m == i || m == j => {
                    nearest[k] = nearest_partner(&cost, &active, k);
                }
                Some((m, lowest)) if k < i => {
                    let candidate = cost[[k, i]];
                    if candidate < lowest || (candidate == lowest && i < m) {
                        nearest[k] = Some((i, candidate));
                    }
                }
                None if k == i => nearest[k] = nearest_partner(&cost, &active, k),
                _ => {}
            }
        }
    }

    let mut numbering: BTreeMap<usize, usize> = BTreeMap::new();
    cluster_of
        .iter()
        .map(|cluster| {
            let next = numbering.len();
            *numbering.entry(*cluster).or_insert(next)
        })
        .collect()
}

fn ordered(a: usize, b: usize) -> [usize; 2] {
    [a.min(b), a.max(b)]
}

/// Cheapest active partner of `i` with a higher index, lowest index on ties.
fn nearest_partner(cost: &Array2<f64>, active: &[bool], i: usize) -> Option<(usize, f64)> {
    let mut best: Option<(usize, f64)> = None;
    for j in ((i + 1)..active.len()).filter(|&j| active[j]) {
        let candidate = cost[[i, j]];
        if best.is_none_or(|(_, lowest)| candidate < lowest) {
            best = Some((j, candidate));
        }
    }
    best
}

fn squared_distance(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use pretty_assertions::assert_eq;
    use rstest::*;
    use serde_json::json;

    fn storage_from(value: serde_json::Value) -> StorageView {
        StorageView::from_json(&value.to_string()).unwrap()
    }

    #[rstest]
    fn test_ward_separates_obvious_groups() {
        let data = array![[0.0, 0.0], [10.0, 10.0], [0.5, 0.0], [10.0, 9.5], [0.0, 0.4]];
        let labels = ward_clustering(data.view(), 2);
        assert_eq!(labels, vec![0, 1, 0, 1, 0]);
    }

    #[rstest]
    fn test_ward_single_target_merges_everything() {
        let data = array![[1.0], [2.0], [30.0]];
        assert_eq!(ward_clustering(data.view(), 1), vec![0, 0, 0]);
    }

    #[rstest]
    fn test_ward_target_is_clamped() {
        let data = array![[1.0], [2.0]];
        assert_eq!(ward_clustering(data.view(), 5), vec![0, 1]);
        assert_eq!(ward_clustering(data.view(), 0), vec![0, 0]);
    }

    #[rstest]
    fn test_ward_prefers_balanced_merge() {
        // {0,1} merge first; then 2 joins them (cost 2/3*4.0^2) rather than pairing with 3
        let data = array![[0.0], [0.0], [4.0], [100.0]];
        assert_eq!(ward_clustering(data.view(), 2), vec![0, 0, 0, 1]);
    }

    /// Direct Ward merge loop recomputing centroids, for cross-checking.
    fn ward_by_centroids(data: ArrayView2<f64>, n_clusters: usize) -> Vec<usize> {
        let mut clusters: Vec<Vec<usize>> = (0..data.nrows()).map(|i| vec![i]).collect();
        let centroid = |members: &[usize]| {
            members.iter().map(|&m| data.row(m).to_owned()).fold(
                ndarray::Array1::<f64>::zeros(data.ncols()),
                |sum, row| sum + row,
            ) / members.len() as f64
        };
        while clusters.len() > n_clusters {
            let mut best = (0, 1, f64::INFINITY);
            for a in 0..clusters.len() {
                for b in (a + 1)..clusters.len() {
                    let (na, nb) = (clusters[a].len() as f64, clusters[b].len() as f64);
                    let cost = na * nb / (na + nb)
                        * squared_distance(centroid(&clusters[a]).view(), centroid(&clusters[b]).view());
                    if cost < best.2 {
                        best = (a, b, cost);
                    }
                }
            }
            let merged = clusters.remove(best.1);
            clusters[best.0].extend(merged);
        }
        let mut labels = vec![0; data.nrows()];
        for (label, members) in clusters.iter().enumerate() {
            for &m in members {
                labels[m] = label;
            }
        }
        let mut numbering: BTreeMap<usize, usize> = BTreeMap::new();
        labels
            .iter()
            .map(|label| {
                let next = numbering.len();
                *numbering.entry(*label).or_insert(next)
            })
            .collect()
    }

    #[rstest]
    #[case(2)]
    #[case(5)]
    #[case(9)]
    fn test_ward_matches_centroid_merges(#[case] n_clusters: usize) {
        let data = Array2::from_shape_fn((40, 3), |(i, j)| ((i * 7 + j * 3) as f64).sin() * (j + 1) as f64);
        assert_eq!(
            ward_clustering(data.view(), n_clusters),
            ward_by_centroids(data.view(), n_clusters)
        );
    }

    #[rstest]
    fn test_ward_handles_many_rows() {
        let data = Array2::from_shape_fn((600, 4), |(i, j)| ((i * 13 + j) as f64).cos() + (i % 5) as f64 * 10.0);
        let labels = ward_clustering(data.view(), 5);
        assert_eq!(labels.len(), 600);
        assert_eq!(labels.iter().max(), Some(&4));
        // rows i and i + 5 share the same offset group
        assert_eq!(labels[0], labels[5]);
    }

    #[rstest]
    fn test_count_matrix_skips_reference_and_unresolved_calls() {
        let storage = storage_from(json!({
            "samples": {
                "s1": { "calls": { "g1": ["1,0.9", "0,1.0", "?,0.1"], "g9": ["1"] } },
                "s2": { "calls": {} }
            },
            "features": { "g1": {}, "g2": {} }
        }));

        let counts = variant_count_matrix(&storage);
        assert_eq!(counts, array![[1, 0], [0, 0]]);
    }

    #[rstest]
    fn test_single_sample_is_not_clustered() {
        let storage = storage_from(json!({
            "samples": { "only": { "calls": { "g1": ["1"], "g2": ["0"] } } },
            "features": { "g1": {}, "g2": {} }
        }));

        let result = variant_counts_clustering(&storage);
        assert_eq!(result.sample_labels, BTreeMap::from([("only".to_string(), 0)]));
        assert_eq!(result.feature_labels.len(), 2);
    }

    #[rstest]
    fn test_single_feature_is_not_clustered() {
        let storage = storage_from(json!({
            "samples": {
                "s1": { "calls": { "g1": ["1"] } },
                "s2": { "calls": { "g1": ["0"] } },
                "s3": { "calls": { "g1": ["1", "1", "1"] } }
            },
            "features": { "g1": {} }
        }));

        let result = variant_counts_clustering(&storage);
        assert_eq!(result.feature_labels, BTreeMap::from([("g1".to_string(), 0)]));
        assert_eq!(result.sample_labels.len(), 3);
    }

    #[rstest]
    fn test_counts_are_dense_triples() {
        let storage = storage_from(json!({
            "samples": {
                "s1": { "calls": { "g1": ["1"] } },
                "s2": { "calls": { "g2": ["1", "1"] } }
            },
            "features": { "g1": {}, "g2": {} }
        }));

        let result = variant_counts_clustering(&storage);
        assert_eq!(
            result.counts,
            vec![
                ("s1".to_string(), "g1".to_string(), 1),
                ("s1".to_string(), "g2".to_string(), 0),
                ("s2".to_string(), "g1".to_string(), 0),
                ("s2".to_string(), "g2".to_string(), 2),
            ]
        );
        // two samples -> ceil(log2(2)) = 1 cluster; two features -> 1 cluster
        assert!(result.sample_labels.values().all(|label| *label == 0));
        assert!(result.feature_labels.values().all(|label| *label == 0));
    }

    #[rstest]
    fn test_empty_snapshot() {
        let storage = storage_from(json!({ "samples": {}, "features": {} }));
        let result = variant_counts_clustering(&storage);
        assert!(result.counts.is_empty());
        assert!(result.sample_labels.is_empty());
        assert!(result.feature_labels.is_empty());
    }
}

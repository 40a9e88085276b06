//! Sample distance manifold: a 2D embedding of allele profile distances,
//! expanded to samples, with embedding quality diagnostics.

use std::collections::BTreeMap;
use std::time::Instant;

use allelic_core::StorageView;
use log::{debug, info};
use ndarray::ArrayView2;
use serde::Serialize;

use crate::config::MetaConfig;
use crate::distance::{AlleleDistanceEngine, AlleleProfile, allele_profiles};
use crate::errors::{MetaError, MetaResult};
use crate::tsne::{TsneParams, embed_precomputed};

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct SampleProjection {
    pub projection: [f64; 2],
    pub profile_index: usize,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct SampleDistanceManifold {
    pub samples: BTreeMap<String, SampleProjection>,
    /// `None` when fewer than two profiles exist.
    pub mean_nearest_neighbor_distance: Option<f64>,
    /// `None` when the neighborhood is too large for the number of profiles.
    pub trustworthiness: Option<f64>,
}

///
/// Group samples into allele profiles, embed the profile distance matrix and
/// project every sample onto the point of its profile.
///
pub fn sample_distance_manifold(
    storage: &StorageView,
    config: &MetaConfig,
) -> MetaResult<SampleDistanceManifold> {
    let start = Instant::now();

    let profiles = allele_profiles(storage);
    let distances = AlleleDistanceEngine::new(storage).distance_matrix(&profiles)?;
    let manifold = project_profiles(&profiles, distances.view(), config)?;

    info!(
        "Sample distance manifold of {} samples ({} profiles) done in {:?}",
        storage.sample_count(),
        profiles.len(),
        start.elapsed()
    );
    Ok(manifold)
}

///
/// Embed a precomputed profile distance matrix and expand it to sample level.
///
pub fn project_profiles(
    profiles: &[AlleleProfile],
    distances: ArrayView2<f64>,
    config: &MetaConfig,
) -> MetaResult<SampleDistanceManifold> {
    let n = profiles.len();
    if distances.dim() != (n, n) {
        return Err(MetaError::Embedding(format!(
            "expected a {}x{} distance matrix for {} profiles, got {}x{}",
            n,
            n,
            n,
            distances.nrows(),
            distances.ncols()
        )));
    }
    let params = TsneParams {
        perplexity: n.div_ceil(config.perplexity_divisor.max(1)) as f64,
        early_exaggeration: config.early_exaggeration,
        max_iter: config.max_iter,
        seed: config.seed,
    };
    debug!("Embedding {} profiles with perplexity {}", n, params.perplexity);
    let embedding = embed_precomputed(distances, &params)?;

    let mut samples = BTreeMap::new();
    for (profile_index, profile) in profiles.iter().enumerate() {
        let point = [embedding[[profile_index, 0]], embedding[[profile_index, 1]]];
        for sample in &profile.samples {
            samples.entry(sample.clone()).or_insert(SampleProjection {
                projection: point,
                profile_index,
            });
        }
    }

    let n_neighbors = n.div_ceil(config.trustworthiness_divisor.max(1));
    Ok(SampleDistanceManifold {
        samples,
        mean_nearest_neighbor_distance: mean_nearest_neighbor_distance(embedding.view()),
        trustworthiness: trustworthiness(distances, embedding.view(), n_neighbors)?,
    })
}

fn euclidean(points: ArrayView2<f64>, a: usize, b: usize) -> f64 {
    points
        .row(a)
        .iter()
        .zip(points.row(b).iter())
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f64>()
        .sqrt()
}

///
/// Mean over all points of the distance to their single nearest other point.
///
pub fn mean_nearest_neighbor_distance(points: ArrayView2<f64>) -> Option<f64> {
    let n = points.nrows();
    if n < 2 {
        return None;
    }

    let total: f64 = (0..n)
        .map(|i| {
            (0..n)
                .filter(|&j| j != i)
                .map(|j| euclidean(points, i, j))
                .fold(f64::INFINITY, f64::min)
        })
        .sum();
    Some(total / n as f64)
}

/// Neighbors of `i` ordered by distance, ties by index, excluding `i` itself.
fn ranked_neighbors(n: usize, i: usize, distance: impl Fn(usize) -> f64) -> Vec<usize> {
    let mut neighbors: Vec<usize> = (0..n).filter(|&j| j != i).collect();
    neighbors.sort_by(|&a, &b| distance(a).total_cmp(&distance(b)).then(a.cmp(&b)));
    neighbors
}

///
/// Trustworthiness of an embedding with respect to precomputed input distances.
///
/// Every point's `k` nearest neighbors in the embedding that are not among its `k`
/// nearest input neighbors are penalized by how far beyond rank `k` they sit in the
/// input ranking. The score is 1 for a perfect neighborhood preservation and is
/// undefined (`None`) when `k == 0` or `k >= n / 2`. The distance matrix must be
/// square with one embedded point per row.
///
pub fn trustworthiness(
    distances: ArrayView2<f64>,
    embedding: ArrayView2<f64>,
    k: usize,
) -> MetaResult<Option<f64>> {
    let n = distances.nrows();
    if distances.ncols() != n || embedding.nrows() != n {
        return Err(MetaError::Embedding(format!(
            "trustworthiness needs a square distance matrix and one point per row, got {}x{} and {} points",
            n,
            distances.ncols(),
            embedding.nrows()
        )));
    }
    if k == 0 || 2 * k >= n {
        return Ok(None);
    }
    let normalizer = (n * k) as f64 * (2.0 * n as f64 - 3.0 * k as f64 - 1.0);

    let mut penalty = 0.0;
    for i in 0..n {
        let input_order = ranked_neighbors(n, i, |j| distances[[i, j]]);
        let mut input_rank = vec![0usize; n];
        for (rank, &j) in input_order.iter().enumerate() {
            input_rank[j] = rank + 1;
        }

        let embedded_order = ranked_neighbors(n, i, |j| euclidean(embedding, i, j));
        for &j in embedded_order.iter().take(k) {
            if input_rank[j] > k {
                penalty += (input_rank[j] - k) as f64;
            }
        }
    }

    Ok(Some(1.0 - penalty * 2.0 / normalizer))
}

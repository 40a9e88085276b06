//! Genetic distance between allele profiles.
//!
//! Samples sharing the same allele on every feature share one profile. The
//! distance between two profiles counts, per differing feature, the variants
//! that separate the two alleles and carry a resolved impact classification.

use std::collections::HashMap;
use std::time::Instant;

use allelic_core::{REFERENCE_ALLELE, StorageResult, StorageView};
use log::{debug, info};
use ndarray::Array2;

/// One distinct combination of per-feature allele assignments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlleleProfile {
    /// Allele name per feature, in snapshot feature order.
    pub alleles: Vec<String>,
    /// Samples carrying this profile; may be empty for the reference profile.
    pub samples: Vec<String>,
}

impl AlleleProfile {
    pub fn is_reference(&self) -> bool {
        self.alleles.iter().all(|allele| allele == REFERENCE_ALLELE)
    }
}

///
/// Group samples by allele profile. The all-reference profile always comes first,
/// even when no sample carries it; the others follow in order of first appearance.
///
pub fn allele_profiles(storage: &StorageView) -> Vec<AlleleProfile> {
    let reference = AlleleProfile {
        alleles: vec![REFERENCE_ALLELE.to_string(); storage.feature_count()],
        samples: Vec::new(),
    };

    let mut profiles = vec![reference];
    let mut index_of: HashMap<Vec<String>, usize> = HashMap::new();
    index_of.insert(profiles[0].alleles.clone(), 0);

    for sample in storage.samples.values() {
        let alleles: Vec<String> = storage
            .feature_names()
            .map(|feature| sample.allele_of(feature).to_string())
            .collect();

        let index = *index_of.entry(alleles.clone()).or_insert_with(|| {
            profiles.push(AlleleProfile {
                alleles,
                samples: Vec::new(),
            });
            profiles.len() - 1
        });
        profiles[index].samples.push(sample.name.clone());
    }

    debug!(
        "Grouped {} samples into {} allele profiles",
        storage.sample_count(),
        profiles.len()
    );

    profiles
}

///
/// Memoizing evaluator of allele and profile distances over one snapshot.
///
pub struct AlleleDistanceEngine<'a> {
    storage: &'a StorageView,
    features: Vec<&'a str>,
    cache: HashMap<(usize, String, String), u32>,
}

impl<'a> AlleleDistanceEngine<'a> {
    pub fn new(storage: &'a StorageView) -> Self {
        AlleleDistanceEngine {
            storage,
            features: storage.feature_names().collect(),
            cache: HashMap::new(),
        }
    }

    ///
    /// Number of impact-annotated variants in the symmetric difference of two alleles
    /// of the feature at `feature_index`.
    ///
    pub fn allele_distance(
        &mut self,
        feature_index: usize,
        first: &str,
        second: &str,
    ) -> StorageResult<u32> {
        if first == second {
            return Ok(0);
        }
        let (low, high) = if first < second {
            (first, second)
        } else {
            (second, first)
        };
        let key = (feature_index, low.to_string(), high.to_string());
        if let Some(score) = self.cache.get(&key) {
            return Ok(*score);
        }

        let feature = self.storage.feature(self.features[feature_index])?;
        let low_variants = feature.variant_set(low)?;
        let high_variants = feature.variant_set(high)?;
        let score = low_variants
            .symmetric_difference(high_variants)
            .filter(|token| feature.impact_of(token).is_some())
            .count() as u32;

        self.cache.insert(key, score);
        Ok(score)
    }

    ///
    /// Sum of allele distances over the features on which the profiles disagree.
    ///
    pub fn profile_distance(
        &mut self,
        first: &AlleleProfile,
        second: &AlleleProfile,
    ) -> StorageResult<u32> {
        let mut score = 0;
        for (index, (a, b)) in first.alleles.iter().zip(second.alleles.iter()).enumerate() {
            if a != b {
                score += self.allele_distance(index, a, b)?;
            }
        }
        Ok(score)
    }

    ///
    /// Symmetric, zero-diagonal matrix of pairwise profile distances. Each unordered
    /// pair of distinct profiles is evaluated once.
    ///
    pub fn distance_matrix(&mut self, profiles: &[AlleleProfile]) -> StorageResult<Array2<f64>> {
        let start = Instant::now();
        let n = profiles.len();
        let mut matrix = Array2::<f64>::zeros((n, n));

        for i in 0..n {
            for j in (i + 1)..n {
                let distance = f64::from(self.profile_distance(&profiles[i], &profiles[j])?);
                matrix[[i, j]] = distance;
                matrix[[j, i]] = distance;
            }
        }

        info!(
            "Distance matrix over {} allele profiles done in {:?}",
            n,
            start.elapsed()
        );
        Ok(matrix)
    }
}

use std::collections::BTreeMap;
use std::time::Instant;

use allelic_core::{Feature, StorageView};
use log::info;
use serde::Serialize;

use crate::clustering::{VariantCountClustering, variant_counts_clustering};
use crate::config::MetaConfig;
use crate::errors::MetaResult;
use crate::layout::{AlleleNetwork, allele_network};
use crate::manifold::{SampleDistanceManifold, sample_distance_manifold};

///
/// Everything one derivation run reads: the snapshot and the tuning parameters.
/// Built fresh per invocation; nothing is shared between runs.
///
#[derive(Debug, Clone)]
pub struct MetaContext {
    pub storage: StorageView,
    pub config: MetaConfig,
}

impl MetaContext {
    pub fn new(storage: StorageView, config: MetaConfig) -> Self {
        MetaContext { storage, config }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct MetaComponents {
    pub variant_counts_clustering: VariantCountClustering,
    pub sample_distance_manifold: SampleDistanceManifold,
    pub allele_networks: BTreeMap<String, AlleleNetwork>,
}

///
/// Derive all three meta-components of the snapshot. The first failure aborts
/// the whole run.
///
pub fn compute_meta_components(context: &MetaContext) -> MetaResult<MetaComponents> {
    let start = Instant::now();
    let storage = &context.storage;

    let variant_counts_clustering = variant_counts_clustering(storage);
    let sample_distance_manifold = sample_distance_manifold(storage, &context.config)?;
    let allele_networks = allele_networks(storage, &context.config);

    info!(
        "Meta-components of {} samples and {} features done in {:?}",
        storage.sample_count(),
        storage.feature_count(),
        start.elapsed()
    );

    Ok(MetaComponents {
        variant_counts_clustering,
        sample_distance_manifold,
        allele_networks,
    })
}

/// Lineage network of every feature, keyed by feature name.
pub fn allele_networks(storage: &StorageView, config: &MetaConfig) -> BTreeMap<String, AlleleNetwork> {
    let start = Instant::now();
    let features: Vec<&Feature> = storage.features.values().collect();

    #[cfg(feature = "parallel")]
    let networks: BTreeMap<String, AlleleNetwork> = {
        use rayon::prelude::*;

        features
            .par_iter()
            .map(|feature| (feature.name.clone(), allele_network(feature, config)))
            .collect()
    };

    #[cfg(not(feature = "parallel"))]
    let networks: BTreeMap<String, AlleleNetwork> = features
        .iter()
        .map(|feature| (feature.name.clone(), allele_network(feature, config)))
        .collect();

    info!(
        "Allele networks of {} features done in {:?}",
        networks.len(),
        start.elapsed()
    );
    networks
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::*;
    use serde_json::json;

    #[fixture]
    fn context() -> MetaContext {
        let value = json!({
            "samples": {
                "s1": { "calls": { "g1": ["1"] }, "allele": { "g1": "X" } },
                "s2": { "calls": { "g1": ["1", "1"] }, "allele": { "g1": "Y" } },
                "s3": {}
            },
            "features": {
                "g1": {
                    "alleles": {
                        "X": { "variants": "1:A", "occurrence": ["s1"] },
                        "Y": { "variants": "1:A,2:C", "occurrence": ["s2"] }
                    },
                    "nucleotideVariants": {
                        "1": { "A": { "info": { "snpeff_Impact": "HIGH" } } },
                        "2": { "C": { "info": { "snpeff_Impact": "LOW" } } }
                    }
                },
                "g2": {}
            }
        });
        let storage = StorageView::from_json(&value.to_string()).unwrap();
        MetaContext::new(storage, MetaConfig::default())
    }

    #[rstest]
    fn test_all_components_are_present(context: MetaContext) {
        let components = compute_meta_components(&context).unwrap();

        assert_eq!(components.sample_distance_manifold.samples.len(), 3);
        assert_eq!(components.variant_counts_clustering.counts.len(), 6);
        assert_eq!(
            components.allele_networks.keys().collect::<Vec<_>>(),
            vec!["g1", "g2"]
        );
        assert_eq!(components.allele_networks["g2"].nodes.len(), 1);
        assert!(components.allele_networks["g2"].edges.is_empty());

        let value = serde_json::to_value(&components).unwrap();
        let mut keys: Vec<&String> = value.as_object().unwrap().keys().collect();
        keys.sort();
        assert_eq!(
            keys,
            vec![
                "allele_networks",
                "sample_distance_manifold",
                "variant_counts_clustering"
            ]
        );
    }

    #[rstest]
    fn test_runs_are_reproducible(context: MetaContext) {
        let first = compute_meta_components(&context).unwrap();
        let second = compute_meta_components(&context).unwrap();
        assert_eq!(first, second);
    }

    #[rstest]
    fn test_failure_aborts_the_run() {
        let storage = StorageView::from_json(
            r#"{ "samples": { "a": { "allele": { "g": "ghost" } } }, "features": { "g": {} } }"#,
        )
        .unwrap();
        let context = MetaContext::new(storage, MetaConfig::default());
        assert!(compute_meta_components(&context).is_err());
    }
}

use std::collections::{BTreeMap, BTreeSet};
use std::io::Read;
use std::path::Path;

use log::debug;
use serde::Deserialize;

use crate::errors::{StorageError, StorageResult};
use crate::models::{Feature, REFERENCE_ALLELE, Sample};
use crate::utils::get_dynamic_reader;

#[derive(Deserialize)]
struct RawStorage {
    samples: Option<BTreeMap<String, Sample>>,
    features: Option<BTreeMap<String, Feature>>,
}

///
/// Read-only view over one variant-call snapshot.
///
/// Samples and features are keyed (and therefore iterated) by name in sorted
/// order, which fixes the row/column order of every derived matrix.
///
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StorageView {
    pub samples: BTreeMap<String, Sample>,
    pub features: BTreeMap<String, Feature>,
}

impl TryFrom<&Path> for StorageView {
    type Error = StorageError;

    ///
    /// Load a [StorageView] from a `.json` or `.json.gz` snapshot on disk.
    ///
    fn try_from(value: &Path) -> StorageResult<Self> {
        let reader = get_dynamic_reader(value)?;
        StorageView::from_reader(reader)
    }
}

impl TryFrom<&str> for StorageView {
    type Error = StorageError;

    fn try_from(value: &str) -> StorageResult<Self> {
        StorageView::try_from(Path::new(value))
    }
}

impl StorageView {
    ///
    /// Parse a snapshot from any JSON source.
    ///
    pub fn from_reader<R: Read>(reader: R) -> StorageResult<Self> {
        let raw: RawStorage = serde_json::from_reader(reader)?;
        StorageView::from_raw(raw)
    }

    ///
    /// Parse a snapshot from JSON text.
    ///
    pub fn from_json(json: &str) -> StorageResult<Self> {
        let raw: RawStorage = serde_json::from_str(json)?;
        StorageView::from_raw(raw)
    }

    fn from_raw(raw: RawStorage) -> StorageResult<Self> {
        let mut samples = raw.samples.ok_or(StorageError::MissingSection("samples"))?;
        let mut features = raw
            .features
            .ok_or(StorageError::MissingSection("features"))?;

        for (name, sample) in samples.iter_mut() {
            sample.name = name.clone();
        }
        for (name, feature) in features.iter_mut() {
            feature.name = name.clone();
            for (allele_name, allele) in feature.alleles.iter_mut() {
                allele.name = allele_name.clone();
            }
        }

        debug!(
            "Loaded snapshot with {} samples and {} features",
            samples.len(),
            features.len()
        );

        Ok(StorageView { samples, features })
    }

    pub fn sample_names(&self) -> impl Iterator<Item = &str> {
        self.samples.keys().map(String::as_str)
    }

    pub fn feature_names(&self) -> impl Iterator<Item = &str> {
        self.features.keys().map(String::as_str)
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    pub fn feature_count(&self) -> usize {
        self.features.len()
    }

    pub fn feature(&self, name: &str) -> StorageResult<&Feature> {
        self.features
            .get(name)
            .ok_or_else(|| StorageError::UnknownFeature(name.to_string()))
    }

    ///
    /// Allele assigned to `sample` on `feature`; unknown samples carry the reference.
    ///
    pub fn allele_of(&self, sample: &str, feature: &str) -> &str {
        self.samples
            .get(sample)
            .map_or(REFERENCE_ALLELE, |entry| entry.allele_of(feature))
    }

    ///
    /// Variant set of `allele` on `feature`, see [Feature::variant_set].
    ///
    pub fn variant_set(&self, feature: &str, allele: &str) -> StorageResult<&BTreeSet<String>> {
        self.feature(feature)?.variant_set(allele)
    }
}

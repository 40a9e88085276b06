//! Sequence typing: every distinct combination of normalized allele labels over
//! all features is one sequence type.

use std::collections::HashMap;
use std::io::Write;

use allelic_core::{REFERENCE_ALLELE, StorageView};
use log::info;

use crate::errors::MetaResult;

/// Allele label of the reference allele in a typing profile.
pub const REFERENCE_LABEL: &str = "0";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypedSample {
    pub sample: String,
    /// Normalized allele label per feature, in snapshot feature order.
    pub profile: Vec<String>,
    /// Starts at 1.
    pub sequence_type: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceTyping {
    pub features: Vec<String>,
    pub samples: Vec<TypedSample>,
}

/// Typing label of an allele: `0` for the reference, otherwise the name without
/// leading and trailing `A` characters.
pub fn allele_label(allele: &str) -> String {
    if allele == REFERENCE_ALLELE {
        REFERENCE_LABEL.to_string()
    } else {
        allele.trim_matches('A').to_string()
    }
}

///
/// Assign sequence types to all samples. Types are numbered in order of first
/// appearance over the sorted samples.
///
pub fn sequence_typing(storage: &StorageView) -> SequenceTyping {
    let features: Vec<String> = storage.feature_names().map(String::from).collect();
    let mut types: HashMap<Vec<String>, usize> = HashMap::new();

    let samples = storage
        .samples
        .values()
        .map(|sample| {
            let profile: Vec<String> = features
                .iter()
                .map(|feature| allele_label(sample.allele_of(feature)))
                .collect();
            let next = types.len() + 1;
            let sequence_type = *types.entry(profile.clone()).or_insert(next);
            TypedSample {
                sample: sample.name.clone(),
                profile,
                sequence_type,
            }
        })
        .collect();

    info!(
        "Typed {} samples into {} sequence types",
        storage.sample_count(),
        types.len()
    );

    SequenceTyping { features, samples }
}

impl SequenceTyping {
    ///
    /// Write the typing as a tab separated table with a `sample`, one
    /// `allele_<feature>` per feature and a `sequence_type` column.
    ///
    pub fn write_tsv<W: Write>(&self, writer: W) -> MetaResult<()> {
        let mut tsv = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .from_writer(writer);

        let mut header = vec!["sample".to_string()];
        header.extend(self.features.iter().map(|feature| format!("allele_{}", feature)));
        header.push("sequence_type".to_string());
        tsv.write_record(&header)?;

        for typed in &self.samples {
            let mut record = vec![typed.sample.clone()];
            record.extend(typed.profile.iter().cloned());
            record.push(typed.sequence_type.to_string());
            tsv.write_record(&record)?;
        }

        tsv.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::*;
    use serde_json::json;

    #[rstest]
    #[case("reference", "0")]
    #[case("AL1", "L1")]
    #[case("A12A", "12")]
    #[case("B3", "B3")]
    fn test_allele_label(#[case] allele: &str, #[case] expected: &str) {
        assert_eq!(allele_label(allele), expected);
    }

    #[rstest]
    fn test_types_follow_first_appearance() {
        let value = json!({
            "samples": {
                "a": { "allele": { "g1": "AL1", "g2": "reference" } },
                "b": {},
                "c": { "allele": { "g1": "AL1" } },
                "d": { "allele": { "g2": "B2" } }
            },
            "features": { "g1": {}, "g2": {} }
        });
        let storage = StorageView::from_json(&value.to_string()).unwrap();
        let typing = sequence_typing(&storage);

        let types: Vec<(&str, usize)> = typing
            .samples
            .iter()
            .map(|typed| (typed.sample.as_str(), typed.sequence_type))
            .collect();
        assert_eq!(types, vec![("a", 1), ("b", 2), ("c", 1), ("d", 3)]);
        assert_eq!(typing.samples[3].profile, vec!["0", "B2"]);
    }

    #[rstest]
    fn test_write_tsv() {
        let typing = SequenceTyping {
            features: vec!["g1".to_string(), "g2".to_string()],
            samples: vec![TypedSample {
                sample: "a".to_string(),
                profile: vec!["L1".to_string(), "0".to_string()],
                sequence_type: 1,
            }],
        };
        let mut buffer = Vec::new();
        typing.write_tsv(&mut buffer).unwrap();

        assert_eq!(
            String::from_utf8(buffer).unwrap(),
            "sample\tallele_g1\tallele_g2\tsequence_type\na\tL1\t0\t1\n"
        );
    }
}

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::models::REFERENCE_ALLELE;
use crate::utils::leading_call_token;

///
/// Sample struct, one sequenced isolate of the snapshot.
///
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Sample {
    /// Filled from the key of the `samples` section.
    #[serde(default)]
    pub name: String,

    /// Feature name -> ordered call tokens.
    #[serde(default)]
    pub calls: BTreeMap<String, Vec<String>>,

    /// Feature name -> assigned allele name.
    #[serde(default, rename = "allele")]
    pub alleles: BTreeMap<String, String>,
}

impl Sample {
    ///
    /// Allele assigned to this sample for `feature`; the reference allele if none is recorded.
    ///
    pub fn allele_of(&self, feature: &str) -> &str {
        self.alleles
            .get(feature)
            .map(String::as_str)
            .unwrap_or(REFERENCE_ALLELE)
    }

    ///
    /// Number of calls on `feature` whose leading token is neither `0` (reference) nor `?` (unresolved).
    ///
    pub fn called_variant_count(&self, feature: &str) -> u32 {
        self.calls.get(feature).map_or(0, |calls| {
            calls
                .iter()
                .map(|call| leading_call_token(call))
                .filter(|token| *token != "0" && *token != "?")
                .count() as u32
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::*;

    #[fixture]
    fn sample() -> Sample {
        serde_json::from_str(
            r#"{
                "calls": { "geneA": ["1,0.9", "0,1.0", "?,0.2", "2,0.7"], "geneB": [] },
                "allele": { "geneA": "A1" }
            }"#,
        )
        .unwrap()
    }

    #[rstest]
    fn test_allele_defaults_to_reference(sample: Sample) {
        assert_eq!(sample.allele_of("geneA"), "A1");
        assert_eq!(sample.allele_of("geneB"), REFERENCE_ALLELE);
    }

    #[rstest]
    #[case("geneA", 2)]
    #[case("geneB", 0)]
    #[case("geneC", 0)]
    fn test_called_variant_count(sample: Sample, #[case] feature: &str, #[case] expected: u32) {
        assert_eq!(sample.called_variant_count(feature), expected);
    }
}

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{self, Display};
use std::str::FromStr;

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::errors::{StorageError, StorageResult};
use crate::models::REFERENCE_ALLELE;
use crate::utils::split_variant_list;

static NO_VARIANTS: BTreeSet<String> = BTreeSet::new();

/// Info keys that may carry the impact classification of a variant.
const IMPACT_KEYS: [&str; 2] = ["snpeff_Impact", "impact"];

///
/// Four-level severity label attached to a variant by upstream annotation.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Impact {
    High,
    Moderate,
    Low,
    Modifier,
}

impl FromStr for Impact {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "HIGH" => Ok(Impact::High),
            "MODERATE" => Ok(Impact::Moderate),
            "LOW" => Ok(Impact::Low),
            "MODIFIER" => Ok(Impact::Modifier),
            _ => Err(format!("Unknown impact classification: {}", s)),
        }
    }
}

impl Display for Impact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Impact::High => "HIGH",
            Impact::Moderate => "MODERATE",
            Impact::Low => "LOW",
            Impact::Modifier => "MODIFIER",
        };
        write!(f, "{}", label)
    }
}

///
/// Annotation of one nucleotide variant (position + alternative base(s)).
///
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
pub struct VariantInfo {
    #[serde(default)]
    pub info: BTreeMap<String, Value>,
}

impl VariantInfo {
    ///
    /// Impact classification if one of the known info keys holds a valid label.
    ///
    pub fn impact(&self) -> Option<Impact> {
        IMPACT_KEYS
            .iter()
            .filter_map(|key| self.info.get(*key))
            .filter_map(Value::as_str)
            .find_map(|label| label.parse().ok())
    }
}

///
/// Allele struct, one distinct variant combination observed on a feature.
///
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Allele {
    /// Filled from the key of the feature's `alleles` table.
    #[serde(skip)]
    pub name: String,

    /// Tokens of the form `position:alt`.
    #[serde(default, deserialize_with = "deserialize_variant_list")]
    pub variants: BTreeSet<String>,

    /// Names of the samples carrying this allele.
    #[serde(default)]
    pub occurrence: BTreeSet<String>,

    #[serde(default)]
    pub info: BTreeMap<String, Value>,
}

impl Allele {
    pub fn sample_count(&self) -> usize {
        self.occurrence.len()
    }

    pub fn proteoform(&self) -> Option<&str> {
        self.info.get("proteoform").and_then(Value::as_str)
    }
}

///
/// Feature struct, a gene (or other annotated locus) tracked by the snapshot.
///
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Feature {
    /// Filled from the key of the `features` section.
    #[serde(skip)]
    pub name: String,

    #[serde(default)]
    pub alleles: BTreeMap<String, Allele>,

    /// Position -> alternative -> annotation.
    #[serde(default, rename = "nucleotideVariants")]
    pub nucleotide_variants: BTreeMap<String, BTreeMap<String, VariantInfo>>,
}

impl Feature {
    pub fn allele(&self, name: &str) -> Option<&Allele> {
        self.alleles.get(name)
    }

    ///
    /// Variant set of an allele. The reference allele is always empty; any other
    /// allele has to be registered in the feature's allele table.
    ///
    pub fn variant_set(&self, allele: &str) -> StorageResult<&BTreeSet<String>> {
        if allele == REFERENCE_ALLELE {
            return Ok(&NO_VARIANTS);
        }
        self.alleles
            .get(allele)
            .map(|entry| &entry.variants)
            .ok_or_else(|| StorageError::UnknownAllele {
                feature: self.name.clone(),
                allele: allele.to_string(),
            })
    }

    ///
    /// Impact of a `position:alt` token; `None` when the token is malformed, the
    /// variant is not registered, or its impact is unresolved.
    ///
    pub fn impact_of(&self, token: &str) -> Option<Impact> {
        let (position, alt) = token.split_once(':')?;
        self.nucleotide_variants
            .get(position)?
            .get(alt)?
            .impact()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum VariantList {
    Joined(String),
    Listed(Vec<String>),
}

fn deserialize_variant_list<'de, D>(deserializer: D) -> Result<BTreeSet<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let list = Option::<VariantList>::deserialize(deserializer)?;
    Ok(match list {
        Some(VariantList::Joined(joined)) => {
            split_variant_list(&joined).map(str::to_string).collect()
        }
        Some(VariantList::Listed(tokens)) => tokens
            .into_iter()
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty())
            .collect(),
        None => BTreeSet::new(),
    })
}

use std::fs::read_to_string;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::MetaError;

///
/// Tunable parameters of the meta-component derivations. Every field may be
/// omitted from a TOML file; omitted fields keep their default.
///
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct MetaConfig {
    /// Seed of every random number generator used by the derivations.
    pub seed: u64,
    pub early_exaggeration: f64,
    /// Upper bound on t-SNE gradient descent iterations.
    pub max_iter: usize,
    /// Perplexity is `ceil(profiles / perplexity_divisor)`.
    pub perplexity_divisor: usize,
    /// Trustworthiness neighborhood is `ceil(profiles / trustworthiness_divisor)`.
    pub trustworthiness_divisor: usize,
    pub layout_iterations: usize,
    /// Replacement for zero edge attraction strengths in the network layout.
    pub min_attraction: f64,
}

impl Default for MetaConfig {
    fn default() -> Self {
        MetaConfig {
            seed: 0,
            early_exaggeration: 12.0,
            max_iter: 1000,
            perplexity_divisor: 8,
            trustworthiness_divisor: 3,
            layout_iterations: 500,
            min_attraction: 1e-3,
        }
    }
}

impl TryFrom<&Path> for MetaConfig {
    type Error = MetaError;

    fn try_from(path: &Path) -> Result<Self, Self::Error> {
        let toml_str = read_to_string(path)?;
        let config = toml::from_str(&toml_str)?;
        Ok(config)
    }
}

pub mod feature;
pub mod sample;
pub mod storage;

// re-export for cleaner imports
pub use self::feature::{Allele, Feature, Impact, VariantInfo};
pub use self::sample::Sample;
pub use self::storage::StorageView;

/// Name of the allele every sample carries unless told otherwise.
pub const REFERENCE_ALLELE: &str = "reference";

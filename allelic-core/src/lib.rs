//! Typed, read-only views over variant-call storage snapshots.
//!
//! A snapshot holds samples (per-feature call tokens and allele assignments)
//! and features (allele tables and annotated nucleotide variants). This crate
//! turns the nested JSON document into explicit records with presence checks
//! at every lookup, so downstream derivations never index into raw maps.
//!
//! # Example
//!
//! ```no_run
//! use allelic_core::models::StorageView;
//! use std::path::Path;
//!
//! let storage = StorageView::try_from(Path::new("storage.json.gz")).unwrap();
//! for sample in storage.sample_names() {
//!     println!("{sample}");
//! }
//! ```

pub mod errors;
pub mod models;
pub mod utils;

// re-exports
pub use errors::{StorageError, StorageResult};
pub use models::{Allele, Feature, Impact, REFERENCE_ALLELE, Sample, StorageView, VariantInfo};

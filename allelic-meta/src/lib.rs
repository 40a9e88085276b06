//! Meta-components of variant-call snapshots.
//!
//! Three views are derived from a [`allelic_core::StorageView`]:
//!
//! - a variant count clustering of samples and features (Ward linkage),
//! - a 2D manifold of samples built from genetic distances between allele
//!   profiles (exact t-SNE), with nearest-neighbor and trustworthiness diagnostics,
//! - one allele lineage network per feature, laid out with a spring embedder.
//!
//! Sequence typing and column correlation tests are provided alongside.
//!
//! # Example
//!
//! ```no_run
//! use allelic_core::StorageView;
//! use allelic_meta::{MetaConfig, MetaContext, compute_meta_components};
//! use std::path::Path;
//!
//! let storage = StorageView::try_from(Path::new("storage.json")).unwrap();
//! let context = MetaContext::new(storage, MetaConfig::default());
//! let components = compute_meta_components(&context).unwrap();
//! println!("{}", serde_json::to_string(&components).unwrap());
//! ```

pub mod clustering;
pub mod config;
pub mod correlation;
pub mod distance;
pub mod errors;
pub mod layout;
pub mod lineage;
pub mod manifold;
pub mod pipeline;
pub mod tsne;
pub mod typing;

// re-exports
pub use config::MetaConfig;
pub use errors::{MetaError, MetaResult};
pub use pipeline::{MetaComponents, MetaContext, compute_meta_components};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Variant-call snapshot is missing the required `{0}` section")]
    MissingSection(&'static str),

    #[error("Feature `{0}` is not present in the snapshot")]
    UnknownFeature(String),

    #[error("Allele `{allele}` is not registered for feature `{feature}`")]
    UnknownAllele { feature: String, allele: String },

    #[error("Can't parse snapshot: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;

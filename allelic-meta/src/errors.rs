use allelic_core::StorageError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MetaError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Can't embed distance matrix: {0}")]
    Embedding(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),
}

pub type MetaResult<T> = std::result::Result<T, MetaError>;

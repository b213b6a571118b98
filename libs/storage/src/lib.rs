pub mod blob;
pub mod config;
pub mod name;
pub mod operator;


pub use blob::{BlobStore, BlobWriter, StoredBlob};
pub use config::StorageConfig;
pub use name::{sanitize, stored_name, validate_name};
pub use operator::{create_operator, init_operator};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("blob not found: {0}")]
    NotFound(String),

    #[error("invalid blob name: {0}")]
    InvalidName(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage backend error: {0}")]
    Backend(#[from] opendal::Error),
}

impl StorageError {
    /// Classify an OpenDAL failure on `name`, folding `NotFound` into our own variant
    pub(crate) fn from_backend(name: &str, err: opendal::Error) -> Self {
        if err.kind() == opendal::ErrorKind::NotFound {
            Self::NotFound(name.to_string())
        } else {
            Self::Backend(err)
        }
    }
}

pub type Result<T> = std::result::Result<T, StorageError>;

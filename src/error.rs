//! Error types for SongFS

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Read-only location: {0}")]
    ReadOnlyViolation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Malformed song metadata: {0}")]
    MalformedMetadata(String),

    #[error("Name already taken: {0}")]
    NameCollision(String),

    #[error("File too large: {0}")]
    TooLarge(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("State error: {0}")]
    State(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl CatalogError {
    /// The errno reported to the kernel for this error.
    pub fn errno(&self) -> i32 {
        match self {
            CatalogError::ReadOnlyViolation(_) => libc::EROFS,
            CatalogError::NotFound(_) => libc::ENOENT,
            CatalogError::MalformedMetadata(_) => libc::EINVAL,
            CatalogError::NameCollision(_) => libc::EEXIST,
            CatalogError::TooLarge(_) => libc::EFBIG,
            CatalogError::InvalidPath(_) => libc::EINVAL,
            CatalogError::Config(_) => libc::EINVAL,
            CatalogError::State(_) | CatalogError::Io(_) | CatalogError::Other(_) => libc::EIO,
        }
    }
}

pub type Result<T> = std::result::Result<T, CatalogError>;

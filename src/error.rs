use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Project root does not exist: {path}")]
    ProjectRoot { path: PathBuf },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Index blob has unrecognized format: {path}")]
    BlobFormat { path: PathBuf },

    #[error("Index blob version {found} is not supported (expected {expected})")]
    BlobVersion { found: u32, expected: u32 },

    #[error("Failed to encode index: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    #[error("Failed to decode index: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    #[error("Another build is already in progress")]
    BuildInProgress,

    #[error("No index available; run a build first")]
    IndexNotBuilt,
}

pub type Result<T> = std::result::Result<T, Error>;

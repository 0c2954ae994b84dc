// src/utils/error.rs
use std::path::PathBuf;
use thiserror::Error;

/// Failures of the harness itself.
///
/// A plugin declining or failing to process an item is not an error here; that
/// outcome travels as a `ReturnStatus` and ends up in the shard log.
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{component} version mismatch: harness expects {expected}, implementation was built against {found}")]
    VersionMismatch {
        component: &'static str,
        expected: String,
        found: String,
    },

    #[error("Plugin error: {0}")]
    Plugin(String),

    #[error("Malformed work item on line {line}: {reason}")]
    Input { line: usize, reason: String },

    #[error("Failed to load resource {}: {reason}", path.display())]
    ResourceLoad { path: PathBuf, reason: String },

    #[error("Invalid image: {0}")]
    InvalidImage(String),

    #[error("Gallery error: {0}")]
    Gallery(String),

    #[error("Gallery at {} is already finalized", .0.display())]
    AlreadyFinalized(PathBuf),

    #[error("Gallery integrity check failed: {0}")]
    GalleryTampered(String),

    #[error("Process error: {0}")]
    Process(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HarnessError>;

impl From<nix::Error> for HarnessError {
    fn from(error: nix::Error) -> Self {
        HarnessError::Process(error.to_string())
    }
}

impl From<libloading::Error> for HarnessError {
    fn from(error: libloading::Error) -> Self {
        HarnessError::Plugin(error.to_string())
    }
}

impl From<semver::Error> for HarnessError {
    fn from(error: semver::Error) -> Self {
        HarnessError::Plugin(format!("Invalid version descriptor: {}", error))
    }
}

impl From<serde_json::Error> for HarnessError {
    fn from(error: serde_json::Error) -> Self {
        HarnessError::Serialization(error.to_string())
    }
}

impl From<tokio::task::JoinError> for HarnessError {
    fn from(error: tokio::task::JoinError) -> Self {
        HarnessError::Process(format!("Aggregation task failed: {}", error))
    }
}

//! Error taxonomy for the synchronization engine.
//!
//! Every variant is scoped to a single target (class, file or URL). Callers
//! log and move on; nothing here is allowed to halt processing of other
//! targets.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::config::loader::ConfigError;

/// Errors raised while synchronizing configuration resources.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Network level failure (connection refused, reset, timeout).
    #[error("transport failure fetching {url}: {reason}")]
    Transport { url: String, reason: String },

    /// The configuration center does not know the resource.
    #[error("remote resource not found: {0}")]
    NotFound(String),

    /// Malformed payload read from disk or received from the network.
    #[error("failed to parse {resource}: {reason}")]
    Parse { resource: String, reason: String },

    /// Missing directory, permission denial, short read.
    #[error("file system error at {}: {source}", path.display())]
    FileSystem {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Encoded value could not be decoded.
    #[error("codec error: {0}")]
    Codec(String),

    /// File system notification backend failed.
    #[error("watch error: {0}")]
    Watch(#[from] notify::Error),

    /// Engine settings could not be loaded or validated.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// HTTP client could not be built.
    #[error("http client error: {0}")]
    Http(#[from] reqwest::Error),
}

impl SyncError {
    /// Wrap an IO error with the path it occurred on.
    pub fn fs(path: impl Into<PathBuf>, source: io::Error) -> Self {
        SyncError::FileSystem {
            path: path.into(),
            source,
        }
    }

    /// Build a parse error for the given resource.
    pub fn parse(resource: impl Into<String>, reason: impl Into<String>) -> Self {
        SyncError::Parse {
            resource: resource.into(),
            reason: reason.into(),
        }
    }
}

/// Result alias used across the crate.
pub type SyncResult<T> = Result<T, SyncError>;

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::format::ConfigFormat;

/// Unified error type for every Strata crate.
#[derive(Error, Debug)]
pub enum StrataError {
    // ── Path errors ────────────────────────────────────────────
    #[error("config file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("{} is not a regular file", path.display())]
    NotAFile { path: PathBuf },

    #[error("read config file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Decrypt errors ─────────────────────────────────────────
    #[error("decrypt config {}: {reason}", path.display())]
    Decrypt { path: PathBuf, reason: String },

    // ── Parse errors ───────────────────────────────────────────
    #[error("parse {format} config {origin}: {reason}")]
    Parse {
        origin: String,
        format: ConfigFormat,
        reason: String,
    },

    #[error("unsupported config type {extension:?} for {}", path.display())]
    UnsupportedFormat { path: PathBuf, extension: String },

    // ── Remote errors ──────────────────────────────────────────
    #[error("fetch remote config from {url}: {reason}")]
    Remote { url: String, reason: String },

    #[error("remote config from {url} has no key `{key}`")]
    RemoteKeyMissing { url: String, key: String },

    // ── Programmer errors ──────────────────────────────────────
    #[error("invalid option: {0}")]
    InvalidOption(String),

    // ── Store errors ───────────────────────────────────────────
    #[error("unmarshal config: {0}")]
    Unmarshal(String),

    #[error("watch config files: {0}")]
    Watch(String),

    // ── Generic wrappers ───────────────────────────────────────
    #[error("io error: {0}")]
    StdIo(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StrataError {
    /// Attribute an error raised on an in-memory byte stream to the file it
    /// came from. Errors that already name a path are returned unchanged.
    pub fn at(self, path: &Path) -> Self {
        match self {
            StrataError::Parse { format, reason, .. } => StrataError::Parse {
                origin: path.display().to_string(),
                format,
                reason,
            },
            StrataError::Decrypt { reason, .. } => StrataError::Decrypt {
                path: path.to_path_buf(),
                reason,
            },
            StrataError::StdIo(source) => StrataError::from_io(path, source),
            other => other,
        }
    }

    /// Classify an I/O error on `path` into the path-error taxonomy.
    pub fn from_io(path: &Path, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            StrataError::NotFound {
                path: path.to_path_buf(),
            }
        } else {
            StrataError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    }

    /// The file this error is about, when there is one.
    pub fn path(&self) -> Option<&Path> {
        match self {
            StrataError::NotFound { path }
            | StrataError::NotAFile { path }
            | StrataError::Io { path, .. }
            | StrataError::Decrypt { path, .. }
            | StrataError::UnsupportedFormat { path, .. } => Some(path),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, StrataError>;

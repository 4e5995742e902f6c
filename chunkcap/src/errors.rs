//! Error types for chunk output capture.
//!
//! Only a handful of these ever reach a caller: setup failures and misuse of
//! the lifecycle. Everything else is logged where it happens and capture
//! degrades instead of aborting.

use crate::core::ChunkKey;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// The main error type for capture operations.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// The chunk's output directory could not be created.
    #[error("Failed to prepare output directory {}: {source}", path.display())]
    Setup {
        /// The directory that could not be created.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Another execution context is already capturing this chunk.
    #[error("Chunk {0} is already being captured")]
    AlreadyArmed(ChunkKey),

    /// A lifecycle operation was invoked in the wrong phase.
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    /// A document or chunk identifier cannot be used as a path segment.
    #[error("Invalid identifier '{0}'")]
    InvalidIdentifier(String),

    /// The graphics device rejected a command.
    #[error("Graphics device error: {0}")]
    Device(String),

    /// The file monitor could not watch a folder.
    #[error("File monitor error on {}: {message}", path.display())]
    Monitor {
        /// The folder being watched.
        path: PathBuf,
        /// What went wrong.
        message: String,
    },

    /// An artifact or shared asset could not be moved.
    #[error("Failed to relocate {} to {}: {source}", from.display(), to.display())]
    Relocation {
        /// Source path.
        from: PathBuf,
        /// Destination path.
        to: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Console text could not be appended to the chunk log.
    #[error("Failed to persist console output to {}: {source}", path.display())]
    Persistence {
        /// The console log path.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The chunk's ledger no longer accepts records.
    #[error("Output ledger for {0} is sealed")]
    LedgerSealed(ChunkKey),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Where an error sits in the capture failure taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Nowhere to write output; the chunk is not captured.
    Setup,
    /// A capture source could not be armed; capture degrades.
    CaptureArming,
    /// An artifact could not be moved; that artifact is skipped.
    Relocation,
    /// Console text could not be written; listeners are still notified.
    Persistence,
    /// The API was used out of order or with bad input.
    Usage,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Setup => write!(f, "setup"),
            Self::CaptureArming => write!(f, "capture_arming"),
            Self::Relocation => write!(f, "relocation"),
            Self::Persistence => write!(f, "persistence"),
            Self::Usage => write!(f, "usage"),
        }
    }
}

impl CaptureError {
    /// Creates a setup error.
    #[must_use]
    pub fn setup(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Setup {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Creates a device error.
    #[must_use]
    pub fn device(message: impl Into<String>) -> Self {
        Self::Device(message.into())
    }

    /// Creates a monitor error.
    #[must_use]
    pub fn monitor(path: impl AsRef<Path>, message: impl Into<String>) -> Self {
        Self::Monitor {
            path: path.as_ref().to_path_buf(),
            message: message.into(),
        }
    }

    /// Creates a relocation error.
    #[must_use]
    pub fn relocation(
        from: impl AsRef<Path>,
        to: impl AsRef<Path>,
        source: std::io::Error,
    ) -> Self {
        Self::Relocation {
            from: from.as_ref().to_path_buf(),
            to: to.as_ref().to_path_buf(),
            source,
        }
    }

    /// Creates a persistence error.
    #[must_use]
    pub fn persistence(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Persistence {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Classifies the error.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Setup { .. } => ErrorCategory::Setup,
            Self::Device(_) | Self::Monitor { .. } => ErrorCategory::CaptureArming,
            Self::Relocation { .. } => ErrorCategory::Relocation,
            Self::Persistence { .. } | Self::Serialization(_) | Self::Io(_) => {
                ErrorCategory::Persistence
            }
            Self::AlreadyArmed(_)
            | Self::InvalidTransition(_)
            | Self::InvalidIdentifier(_)
            | Self::LedgerSealed(_)
            | Self::Config(_) => ErrorCategory::Usage,
        }
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert(
            "category".to_string(),
            serde_json::json!(self.category().to_string()),
        );
        map.insert("message".to_string(), serde_json::json!(self.to_string()));

        match self {
            Self::Setup { path, .. } | Self::Persistence { path, .. } | Self::Monitor { path, .. } => {
                map.insert("path".to_string(), serde_json::json!(path.display().to_string()));
            }
            Self::Relocation { from, to, .. } => {
                map.insert("from".to_string(), serde_json::json!(from.display().to_string()));
                map.insert("to".to_string(), serde_json::json!(to.display().to_string()));
            }
            Self::AlreadyArmed(key) | Self::LedgerSealed(key) => {
                map.insert("doc_id".to_string(), serde_json::json!(key.doc_id));
                map.insert("chunk_id".to_string(), serde_json::json!(key.chunk_id));
            }
            _ => {}
        }

        map
    }
}

impl From<serde_json::Error> for CaptureError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

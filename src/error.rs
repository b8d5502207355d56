//! Error types for the discovery and reporting boundaries.

use std::path::PathBuf;
use thiserror::Error;

/// Why a single manifest produced no record.
#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("failed to read manifest {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid manifest JSON in {path:?}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("manifest {path:?} is not a JSON object")]
    NotAnObject { path: PathBuf },
}

/// A vendor root that exists but cannot be enumerated.
#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("failed to read extensions root {path:?}: {source}")]
    ReadRoot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// The one failure that aborts a run.
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("failed to create report file {path:?}: {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to write report file {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

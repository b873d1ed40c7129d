//! Loader error kinds. All of them are surfaced to the UI via `on_error`
//! and leave the core usable with whatever is already cached.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("no bundle for domain `{0}`")]
    UnknownDomain(String),
    #[error("failed reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed json in {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

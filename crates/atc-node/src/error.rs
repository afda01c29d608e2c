//! Host-side errors.

use atc_core::AtcError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NodeError {
    #[error(transparent)]
    Engine(#[from] AtcError),

    /// A thread panicked while holding the engine lock.
    #[error("engine lock poisoned")]
    Poisoned,

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

pub type NodeResult<T> = Result<T, NodeError>;

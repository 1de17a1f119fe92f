//! Error taxonomy for fuzz runs.
//!
//! Only corpus, config and output errors end a run. Malformed target rows are
//! skipped by the engine and transport failures are captured into the
//! corresponding `FuzzResult`.

use std::io;

#[derive(Debug, thiserror::Error)]
pub enum FuzzError {
    #[error("Error: Required file not found at '{path}'")]
    CorpusMissing { path: String },

    #[error("Skipping malformed target row: '{row}'. Expected format: 'host_path,parameter'")]
    MalformedTargetRow { row: String },

    #[error("{0}")]
    RequestTransportFailure(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to build HTTP client: {0}")]
    Client(String),

    #[error("Fuzz run already completed")]
    AlreadyCompleted,
}

impl FuzzError {
    pub fn corpus_missing(path: impl Into<String>) -> Self {
        FuzzError::CorpusMissing { path: path.into() }
    }

    pub fn malformed_row(row: impl Into<String>) -> Self {
        FuzzError::MalformedTargetRow { row: row.into() }
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        FuzzError::RequestTransportFailure(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        FuzzError::Config(msg.into())
    }

    pub fn client(msg: impl Into<String>) -> Self {
        FuzzError::Client(msg.into())
    }

    /// Renders an error and its whole `source()` chain as one line.
    pub fn describe(err: &(dyn std::error::Error + 'static)) -> String {
        let mut out = err.to_string();
        let mut source = err.source();
        while let Some(inner) = source {
            let text = inner.to_string();
            if !out.contains(&text) {
                out.push_str(": ");
                out.push_str(&text);
            }
            source = inner.source();
        }
        out
    }
}

pub type Result<T> = std::result::Result<T, FuzzError>;

use std::path::PathBuf;

use pipeline::PitchError;

/// Snapshot load and save failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("snapshot at {path:?} is not valid JSON: {source}")]
    Decode {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("snapshot could not be encoded: {0}")]
    Encode(#[from] serde_json::Error),
}

impl StoreError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<StoreError> for PitchError {
    fn from(err: StoreError) -> Self {
        PitchError::external(err.to_string())
    }
}

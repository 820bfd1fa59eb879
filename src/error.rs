use std::io;
use std::path::PathBuf;

/// Terminal failure of a top-level extract or compress call.
///
/// Skipped entries (unsafe paths, symlinks) never show up here, and neither
/// does cancellation: see [`Outcome`](crate::Outcome).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to open archive '{path}': {source}")]
    OpenFailed {
        path: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to read '{path}': {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to write '{path}': {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to read next entry header of '{archive}': {source}")]
    HeaderFailed {
        archive: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to add '{path}' to archive: {source}")]
    AddFailed {
        path: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("unsupported archive format: {0}")]
    UnsupportedFormat(String),

    #[error("background job failed: {0}")]
    Worker(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    pub(crate) fn write(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Error::WriteFailed {
            path: path.into(),
            source,
        }
    }
}

/// How a top-level operation ended when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Every entry was visited.
    Completed,
    /// The cancellation flag was observed at an entry boundary. Work done up
    /// to that point is left in place.
    Cancelled,
}

impl Outcome {
    pub fn is_cancelled(self) -> bool {
        self == Outcome::Cancelled
    }
}

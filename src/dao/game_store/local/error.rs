//! Error types raised by the single-device file backend.

use std::{io, path::PathBuf};

use thiserror::Error;

/// Convenient result alias returning [`LocalDaoError`] failures.
pub type LocalResult<T> = Result<T, LocalDaoError>;

/// Failures that can occur while reading or writing the local game file.
#[derive(Debug, Error)]
pub enum LocalDaoError {
    /// The data directory could not be created.
    #[error("failed to create data directory `{}`", path.display())]
    CreateDir {
        /// File or directory involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
    /// Reading the game file failed for a reason other than it being absent.
    #[error("failed to read `{}`", path.display())]
    Read {
        /// File or directory involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
    /// Writing or renaming the game file failed.
    #[error("failed to write `{}`", path.display())]
    Write {
        /// File or directory involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
    /// Removing the game file failed.
    #[error("failed to remove `{}`", path.display())]
    Remove {
        /// File or directory involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
    /// The file does not hold a valid game document.
    #[error("failed to decode `{}`", path.display())]
    Decode {
        /// File or directory involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },
    /// The game document could not be serialised.
    #[error("failed to encode the game document")]
    Encode {
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },
}

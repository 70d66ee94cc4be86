//! Custom error types and result handling for Mangaman operations.
//!
//! This module defines the error handling system used throughout the crate.
//! All operations return a [`Result<T>`] which is a type alias for `std::result::Result<T, Error>`.
//!
//! Failures of saves and reconciliation passes never touch the original archive. When such a
//! failure leaves a temporary artifact on disk it is reported as [`Error::Incomplete`], so a
//! caller can tell "nothing was changed" from "something was left behind" via
//! [`Error::left_artifact`].
use std::path::{Path, PathBuf};

/// Type alias for Results with Mangaman errors.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for all Mangaman operations.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// I/O errors from the standard library
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// ZIP container errors
    #[error(transparent)]
    Zip(#[from] zip::result::ZipError),
    /// Image encoding errors (decoding failures are reported as [`Error::Decode`])
    #[error(transparent)]
    Image(#[from] image::ImageError),
    /// Persistence errors from the SQLite store
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
    /// Directory walk errors
    #[error(transparent)]
    Walk(#[from] walkdir::Error),
    /// Async task join errors
    #[error(transparent)]
    Join(#[from] tokio::task::JoinError),
    #[error(transparent)]
    ConfigBuilder(#[from] crate::library::LibraryConfigBuilderError),
    /// An archive, entry or record path does not resolve
    #[error("Not found: {0}")]
    NotFound(String),
    /// The extension is not a recognized archive or image type
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
    /// Image bytes could not be rasterized
    #[error("Could not decode image '{0}': {1}")]
    Decode(String, String),
    /// An edit was attempted on ineligible operands
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
    /// Error for invalid file or directory paths
    #[error("The given path '{0:?}' is invalid: {1}")]
    InvalidPath(PathBuf, String),
    /// A save is already running against the same target
    #[error("A save is already in progress for '{0:?}'")]
    SaveInProgress(PathBuf),
    /// The operation observed its cancellation token
    #[error("Operation cancelled")]
    Cancelled,
    /// The operation failed after producing a temporary artifact; the original is untouched
    #[error("Operation did not complete, temporary artifact left at '{artifact:?}': {source}")]
    Incomplete {
        artifact: PathBuf,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Wraps `self` as [`Error::Incomplete`] if `artifact` still exists on disk.
    pub(crate) fn with_artifact(self, artifact: &Path) -> Self {
        if artifact.exists() && !matches!(self, Error::Incomplete { .. }) {
            Error::Incomplete {
                artifact: artifact.to_path_buf(),
                source: Box::new(self),
            }
        } else {
            self
        }
    }

    /// Path of the temporary artifact left behind by a failed save, if any.
    ///
    /// `None` means the failed operation did not change anything on disk and is safe to retry.
    pub fn left_artifact(&self) -> Option<&Path> {
        match self {
            Error::Incomplete { artifact, .. } => Some(artifact),
            _ => None,
        }
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for Error {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.to_string().as_ref())
    }
}

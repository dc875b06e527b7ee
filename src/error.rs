//! Custom error types and result handling for Tojiru operations.
//!
//! This module defines the error handling system used throughout Tojiru.
//! All operations return a [`Result<T>`] which is a type alias for `std::result::Result<T, Error>`.
//!
//! Errors fall into three scopes:
//! - run-level: [`Error::Discovery`] aborts the whole batch before anything is converted.
//! - item-level: [`Error::Decode`], [`Error::UnsupportedMode`], [`Error::Write`] and the
//!   transparent I/O and archive errors fail one collection only. The execution engine turns
//!   them into an [`ItemOutcome::Failed`](crate::types::ItemOutcome::Failed) and moves on.
//! - pool-level: [`Error::Pool`] switches the engine to sequential execution.
use std::path::PathBuf;

/// Type alias for Results with Tojiru errors.
pub type Result<T> = std::result::Result<T, Error>;

/// Comprehensive error type for all Tojiru operations.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// I/O errors from the standard library
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// Image decoding or encoding errors that were not classified further
    #[error(transparent)]
    Image(#[from] image::ImageError),
    /// ZIP archive errors
    #[error(transparent)]
    Zip(#[from] zip::result::ZipError),
    /// PDF object model errors
    #[error(transparent)]
    Pdf(#[from] lopdf::Error),
    /// Async task join errors
    #[error(transparent)]
    Join(#[from] tokio::task::JoinError),
    #[error(transparent)]
    TojiruBuilder(#[from] crate::tojiru::TojiruConfigBuilderError),
    /// The base directory could not be scanned
    #[error("Cannot scan '{0:?}': {1}")]
    Discovery(PathBuf, String),
    /// An image payload could not be parsed
    #[error("Cannot decode image '{0}': {1}")]
    Decode(String, String),
    /// An image uses a channel layout that cannot be brought to RGB
    #[error("Unsupported color mode in '{0}': {1}")]
    UnsupportedMode(String, String),
    /// The output document could not be persisted
    #[error("Cannot write '{0:?}': {1}")]
    Write(PathBuf, String),
    /// The worker pool could not be created or failed as a whole
    #[error("Worker pool failure: {0}")]
    Pool(String),
    /// Error for invalid file or directory paths
    #[error("The given path '{0:?}' is invalid: {1}")]
    InvalidPath(PathBuf, String),
    /// Error for unsupported operations or inputs (e.g., unknown collection type)
    #[error("Unsupported: {0}")]
    Unsupported(String),
    /// Error for resources that couldn't be found
    #[error("Not found: {0}")]
    NotFound(String),
    /// Other errors that don't fit into specific categories
    #[error("Other error: {0}")]
    Other(String),
}

impl Error {
    /// Maps an `image` decoding failure for the named source onto the taxonomy.
    ///
    /// Unsupported color layouts become [`Error::UnsupportedMode`], everything else
    /// (truncated data, unknown format, limits) is a [`Error::Decode`].
    pub fn from_decode(name: &str, error: image::ImageError) -> Self {
        match error {
            image::ImageError::Unsupported(e)
                if matches!(e.kind(), image::error::UnsupportedErrorKind::Color(_)) =>
            {
                Error::UnsupportedMode(name.to_string(), e.to_string())
            }
            other => Error::Decode(name.to_string(), other.to_string()),
        }
    }

    /// True for failures that belong to the worker pool rather than to one item.
    pub fn is_pool_level(&self) -> bool {
        matches!(self, Error::Pool(_))
    }
}

// Basic From<String> conversion for convenience
impl From<String> for Error {
    fn from(error: String) -> Self {
        Error::Other(error)
    }
}

impl From<&str> for Error {
    fn from(error: &str) -> Self {
        Error::Other(error.to_string())
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

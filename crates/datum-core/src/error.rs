//! Error types for the datum transformer.

use thiserror::Error;

/// Main error type for the datum transformer.
///
/// Every variant describes a pipeline misconfiguration or a broken input.
/// Nothing here is retried: callers are expected to stop the run.
#[derive(Error, Debug)]
pub enum Error {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image decoding error
    #[error("Image processing error: {0}")]
    Image(String),

    /// Conflicting or invalid transformation parameters
    #[error("Configuration error: {0}")]
    Config(String),

    /// Crop or mean geometry does not fit the record or destination
    #[error("Geometry error: {0}")]
    Geometry(String),

    /// Mean file missing or malformed
    #[error("Resource load error: {0}")]
    ResourceLoad(String),

    /// Record with zero dimensions or a buffer of the wrong length
    #[error("Malformed record: {0}")]
    MalformedRecord(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<image::ImageError> for Error {
    fn from(err: image::ImageError) -> Self {
        Error::Image(err.to_string())
    }
}

/// Specialized Result type for datum transformation.
pub type Result<T> = std::result::Result<T, Error>;

use std::sync::Arc;

use crate::validation::ValidationErrors;

/// Represents a result type for operations in this crate.
///
/// This `Result` type is a standard Rust `Result` type where the error variant is defined by the
/// crate-wide [`Error`] enum.
pub type Result<T> = std::result::Result<T, Error>;

/// Enum representing possible errors that can occur in the library.
#[derive(thiserror::Error, Debug, Clone)]
#[non_exhaustive]
pub enum Error {
    /// The requested parameter does not exist in the current configuration snapshot.
    ///
    /// [`Client::get_parameter`](crate::Client::get_parameter) never surfaces this error; it is
    /// converted into an unmatched [`ResolvedValue`](crate::ResolvedValue) at the client boundary.
    #[error("parameter not found: {0}")]
    ParameterNotFound(String),

    /// A fetched configuration failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    /// A configuration document could not be parsed.
    #[error("failed to parse configuration: {0}")]
    Parse(String),

    /// A configuration file has an extension other than `.yaml`, `.yml` or `.json`.
    #[error("unsupported configuration format: {0}")]
    UnsupportedFormat(String),

    /// Indicates that the background sync thread panicked. This should normally never happen.
    #[error("sync thread panicked")]
    SyncThreadPanicked,

    /// An I/O error.
    #[error(transparent)]
    // std::io::Error is not clonable, so we're wrapping it in an Arc.
    Io(Arc<std::io::Error>),
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::Io(Arc::new(value))
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(value: serde_yaml::Error) -> Self {
        Self::Parse(value.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value.to_string())
    }
}

use core::result::Result as CoreResult;
use std::io::Error as IoError;

use thiserror::Error;
use toml::de::Error as TomlError;
use toml::ser::Error as TomlSerError;

/// Result type for core operations.
pub type Result<T> = CoreResult<T, Error>;

/// Errors that can occur in the core library.
#[derive(Debug, Error)]
pub enum Error {
    /// An I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// TOML deserialization failed.
    #[error("TOML deserialization error: {0}")]
    Toml(#[from] TomlError),

    /// TOML serialization failed.
    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] TomlSerError),

    /// Configuration is invalid or missing.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A model variant failed validation.
    #[error("Invalid model variant: {0}")]
    InvalidVariant(String),

    /// The variant catalog could not be read.
    #[error("Catalog error: {0}")]
    Catalog(String),

    /// A general error not covered by other variants.
    #[error("{0}")]
    Other(String),
}

/// Failure reported by a compute tier for a single invocation or health check.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TierError {
    /// The tier is down or refused the request.
    #[error("Tier unavailable: {0}")]
    Unavailable(String),

    /// The call exceeded its time budget.
    #[error("Timed out after {timeout_ms}ms")]
    Timeout {
        /// Budget that was exceeded.
        timeout_ms: u64,
    },

    /// The tier returned an application-level error.
    #[error("Tier error: {0}")]
    Failed(String),
}

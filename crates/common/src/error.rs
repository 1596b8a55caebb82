//! Shared error type for configuration loading and local persistence

use thiserror::Error;

/// Errors raised while resolving configuration or touching local files.
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid base URL {url:?}: {reason}")]
    BaseUrl { url: String, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Result alias using the shared Error
pub type Result<T> = std::result::Result<T, Error>;

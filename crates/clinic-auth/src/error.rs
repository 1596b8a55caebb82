//! Error types for credential storage and auth endpoint calls

/// Errors from credential storage and the auth endpoints.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// The endpoint answered with a non-2xx status. `body` is the raw response text.
    #[error("auth endpoint returned {status}: {body}")]
    Rejected {
        status: u16,
        status_text: String,
        body: String,
    },

    #[error("invalid token response: {0}")]
    InvalidResponse(String),

    #[error("credential parse error: {0}")]
    CredentialParse(String),

    #[error("I/O error: {0}")]
    Io(String),
}

/// Result alias for auth operations.
pub type Result<T> = std::result::Result<T, Error>;

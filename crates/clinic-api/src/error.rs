//! Normalized failure returned by every API call
//!
//! Whatever goes wrong (no response, a non-2xx status, an expired session, a
//! payload of the wrong shape) reaches the caller as one `ApiError`. Raw
//! `reqwest` errors never cross this boundary.

use serde_json::Value;

/// Status code carried by failures that produced no HTTP response.
pub const NO_RESPONSE_STATUS: u16 = 0;

/// Failure taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// A 401 on a call made without any access token.
    NoCredential,
    /// A 401 that survived the refresh attempt, or rejected sign-in credentials.
    AuthenticationExpired,
    /// 403.
    PermissionDenied,
    /// 400 with a structured body.
    ValidationFailure,
    /// 5xx.
    ServerFailure,
    /// No response at all, or a payload that could not be decoded.
    TransportFailure,
    /// Any other non-2xx.
    Unclassified,
}

impl FailureKind {
    /// Kind of a plain non-2xx response (401 handling happens in the dispatcher).
    pub fn from_response(status: u16, body: &FailureBody) -> Self {
        match status {
            401 => FailureKind::AuthenticationExpired,
            403 => FailureKind::PermissionDenied,
            400 if body.as_json().is_some() => FailureKind::ValidationFailure,
            s if s >= 500 => FailureKind::ServerFailure,
            _ => FailureKind::Unclassified,
        }
    }

    /// Label for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            FailureKind::NoCredential => "no_credential",
            FailureKind::AuthenticationExpired => "authentication_expired",
            FailureKind::PermissionDenied => "permission_denied",
            FailureKind::ValidationFailure => "validation_failure",
            FailureKind::ServerFailure => "server_failure",
            FailureKind::TransportFailure => "transport_failure",
            FailureKind::Unclassified => "unclassified",
        }
    }
}

/// Error response body: parsed JSON when possible, raw text otherwise.
#[derive(Debug, Clone, PartialEq)]
pub enum FailureBody {
    Json(Value),
    Text(String),
    Absent,
}

impl FailureBody {
    /// Parse a response body, falling back to the raw text.
    pub fn parse(text: String) -> Self {
        if text.is_empty() {
            return FailureBody::Absent;
        }
        match serde_json::from_str(&text) {
            Ok(value) => FailureBody::Json(value),
            Err(_) => FailureBody::Text(text),
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            FailureBody::Json(value) => Some(value),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message} (status {status_code})")]
pub struct ApiError {
    pub kind: FailureKind,
    pub message: String,
    pub status_code: u16,
    pub body: FailureBody,
}

impl ApiError {
    /// 401 on an unauthenticated call. Nothing to refresh from.
    pub fn no_credential() -> Self {
        Self {
            kind: FailureKind::NoCredential,
            message: "invalid credentials".into(),
            status_code: 401,
            body: FailureBody::Absent,
        }
    }

    /// Sign-in rejected the email/password pair.
    pub fn invalid_credentials() -> Self {
        Self {
            kind: FailureKind::AuthenticationExpired,
            message: "invalid credentials".into(),
            status_code: 401,
            body: FailureBody::Absent,
        }
    }

    /// The session could not be renewed; credentials have been cleared.
    pub fn session_expired() -> Self {
        Self {
            kind: FailureKind::AuthenticationExpired,
            message: "not authorized".into(),
            status_code: 401,
            body: FailureBody::Absent,
        }
    }

    /// A non-2xx response, normalized.
    pub fn from_response(status_code: u16, status_text: impl Into<String>, body: FailureBody) -> Self {
        Self {
            kind: FailureKind::from_response(status_code, &body),
            message: status_text.into(),
            status_code,
            body,
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::TransportFailure,
            message: message.into(),
            status_code: NO_RESPONSE_STATUS,
            body: FailureBody::Absent,
        }
    }
}

impl From<clinic_auth::Error> for ApiError {
    fn from(err: clinic_auth::Error) -> Self {
        match err {
            clinic_auth::Error::Rejected {
                status,
                status_text,
                body,
            } => ApiError::from_response(status, status_text, FailureBody::parse(body)),
            other => ApiError::transport(other.to_string()),
        }
    }
}

/// Result alias for API calls.
pub type Result<T> = std::result::Result<T, ApiError>;

//! User-facing messages for failed calls
//!
//! Turns an `ApiError` into a short sentence a screen can show. Rules are
//! checked in order and the first match wins:
//! - 401 → unauthorized message
//! - 403 → forbidden message
//! - 5xx → server message
//! - 400 → details from the body (`message` list or string, then `errors`
//!   list), else the validation message
//! - anything else → the failure's own message, or the caller's fallback
//!
//! Pure and total: every failure yields a non-empty string.

use serde_json::Value;

use crate::error::ApiError;

pub const DEFAULT_UNAUTHORIZED: &str = "session expired, please sign in again";
pub const DEFAULT_FORBIDDEN: &str = "not permitted for this resource";
pub const DEFAULT_SERVER: &str = "unexpected error, please retry";
pub const DEFAULT_VALIDATION: &str = "invalid data, please check and retry";

/// Coarse category a failure falls into for presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Unauthorized,
    Forbidden,
    ValidationFailure,
    ServerFailure,
    Unclassified,
}

impl ErrorCategory {
    pub fn of(failure: &ApiError) -> Self {
        match failure.status_code {
            401 => ErrorCategory::Unauthorized,
            403 => ErrorCategory::Forbidden,
            s if s >= 500 => ErrorCategory::ServerFailure,
            400 => ErrorCategory::ValidationFailure,
            _ => ErrorCategory::Unclassified,
        }
    }
}

/// Per-screen replacements for the default messages.
///
/// Empty strings count as unset.
#[derive(Debug, Clone, Default)]
pub struct MessageOverrides {
    pub unauthorized: Option<String>,
    pub forbidden: Option<String>,
    pub server: Option<String>,
    pub validation: Option<String>,
}

fn pick(custom: Option<&String>, default: &str) -> String {
    custom
        .filter(|s| !s.is_empty())
        .cloned()
        .unwrap_or_else(|| default.to_string())
}

/// Message for `failure`, falling back to `fallback` when nothing better applies.
pub fn classify(failure: &ApiError, fallback: &str, overrides: Option<&MessageOverrides>) -> String {
    let overrides = overrides.cloned().unwrap_or_default();
    match ErrorCategory::of(failure) {
        ErrorCategory::Unauthorized => pick(overrides.unauthorized.as_ref(), DEFAULT_UNAUTHORIZED),
        ErrorCategory::Forbidden => pick(overrides.forbidden.as_ref(), DEFAULT_FORBIDDEN),
        ErrorCategory::ServerFailure => pick(overrides.server.as_ref(), DEFAULT_SERVER),
        ErrorCategory::ValidationFailure => failure
            .body
            .as_json()
            .and_then(validation_detail)
            .unwrap_or_else(|| pick(overrides.validation.as_ref(), DEFAULT_VALIDATION)),
        ErrorCategory::Unclassified => [failure.message.as_str(), fallback]
            .into_iter()
            .find(|s| !s.is_empty())
            .unwrap_or(DEFAULT_SERVER)
            .to_string(),
    }
}

/// Pull a readable message out of a 400 body.
fn validation_detail(body: &Value) -> Option<String> {
    match body.get("message") {
        Some(Value::Array(items)) => {
            if let Some(joined) = join_items(items) {
                return Some(joined);
            }
        }
        Some(Value::String(s)) if !s.is_empty() => return Some(s.clone()),
        _ => {}
    }
    match body.get("errors") {
        Some(Value::Array(items)) => join_items(items),
        _ => None,
    }
}

fn join_items(items: &[Value]) -> Option<String> {
    let joined = items
        .iter()
        .map(|item| match item {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .collect::<Vec<_>>()
        .join(", ");
    (!joined.is_empty()).then_some(joined)
}

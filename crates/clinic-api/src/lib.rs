//! Authenticated request layer for the clinic API
//!
//! Every call from the admin tools goes through `Dispatcher`, which:
//! 1. attaches the stored access token as a bearer header
//! 2. on a 401 for a credentialed call, refreshes the pair once and replays
//! 3. on an unrecoverable 401, clears credentials and signals expiry once
//! 4. normalizes every failure into an `ApiError`
//!
//! `ApiClient` wraps the dispatcher in typed verbs plus sign-in/sign-out, and
//! `classify` turns failures into sentences a screen can show.

pub mod classify;
pub mod client;
pub mod dispatch;
pub mod error;
pub mod refresh;
pub mod request;
pub mod session;
pub mod state;
mod store;

#[cfg(test)]
mod testing;

pub use classify::{ErrorCategory, MessageOverrides, classify};
pub use client::ApiClient;
pub use dispatch::Dispatcher;
pub use error::{ApiError, FailureBody, FailureKind, NO_RESPONSE_STATUS, Result};
pub use request::{CacheDirective, RequestDescriptor};
pub use session::{SessionGuard, SessionObserver};

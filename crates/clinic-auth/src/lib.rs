//! Session credentials for the clinic API
//!
//! Holds the access/refresh token pair, the raw calls against the remote auth
//! endpoints, and the take-once notice shown after a session expires. This
//! crate knows nothing about request retries; the dispatcher in `clinic-api`
//! composes these pieces.
//!
//! Credential flow:
//! 1. `token::sign_in()` exchanges email/password for a token pair
//! 2. The pair is written via `CredentialStore::set_tokens()`
//! 3. On a 401 the dispatcher calls `token::refresh()` with the refresh token
//! 4. `CredentialStore::clear()` on sign-out or unrecoverable refresh failure

pub mod constants;
pub mod credentials;
pub mod error;
pub mod notice;
pub mod token;

pub use constants::*;
pub use credentials::{
    CredentialEvent, CredentialStore, CredentialWatch, FileCredentialStore,
    MemoryCredentialStore,
};
pub use error::{Error, Result};
pub use notice::SessionNotice;
pub use token::{TokenResponse, endpoint, logout, refresh, sign_in};

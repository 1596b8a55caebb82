//! Raw calls against the remote auth endpoints
//!
//! Three endpoints, all under the API base URL:
//! 1. `POST /auth/signin` with `{email, password}`
//! 2. `POST /auth/refresh` with the refresh token as bearer
//! 3. `POST /auth/logout` with the access token as bearer
//!
//! These functions only talk HTTP. Writing the returned pair into a
//! `CredentialStore`, and deciding what a failure means for the session, is
//! left to the caller.

use std::fmt;

use common::Secret;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::constants::{LOGOUT_PATH, REFRESH_PATH, SIGN_IN_PATH};
use crate::error::{Error, Result};

/// Body returned by sign-in and refresh.
///
/// `access_token` is required for the response to be useful but is parsed as
/// optional so callers can tell "no token" apart from a malformed body.
#[derive(Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct TokenResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

impl fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |t: &Option<String>| t.as_ref().map(|_| "[REDACTED]");
        f.debug_struct("TokenResponse")
            .field("access_token", &redact(&self.access_token))
            .field("refresh_token", &redact(&self.refresh_token))
            .finish()
    }
}

#[derive(Serialize)]
struct SignInRequest<'a> {
    email: &'a str,
    password: &'a str,
}

/// Join the API base URL and an absolute path.
pub fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), path)
}

/// Exchange email and password for a token pair.
pub async fn sign_in(
    client: &reqwest::Client,
    base_url: &str,
    email: &str,
    password: &Secret<String>,
) -> Result<TokenResponse> {
    let response = client
        .post(endpoint(base_url, SIGN_IN_PATH))
        .json(&SignInRequest {
            email,
            password: password.expose(),
        })
        .send()
        .await
        .map_err(|e| Error::Http(format!("sign-in request failed: {e}")))?;

    read_token_response(response).await
}

/// Exchange a refresh token for a new pair.
///
/// The refresh token travels as the bearer credential; no body is sent.
pub async fn refresh(
    client: &reqwest::Client,
    base_url: &str,
    refresh_token: &Secret<String>,
) -> Result<TokenResponse> {
    let response = client
        .post(endpoint(base_url, REFRESH_PATH))
        .header(CONTENT_TYPE, "application/json")
        .header(AUTHORIZATION, refresh_token.bearer())
        .send()
        .await
        .map_err(|e| Error::Http(format!("token refresh request failed: {e}")))?;

    read_token_response(response).await
}

/// Revoke the session server-side.
pub async fn logout(
    client: &reqwest::Client,
    base_url: &str,
    access_token: &Secret<String>,
) -> Result<()> {
    let response = client
        .post(endpoint(base_url, LOGOUT_PATH))
        .header(CONTENT_TYPE, "application/json")
        .header(AUTHORIZATION, access_token.bearer())
        .send()
        .await
        .map_err(|e| Error::Http(format!("logout request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        return Err(rejected(response).await);
    }
    debug!(%status, "logout acknowledged");
    Ok(())
}

async fn read_token_response(response: reqwest::Response) -> Result<TokenResponse> {
    if !response.status().is_success() {
        return Err(rejected(response).await);
    }

    response
        .json::<TokenResponse>()
        .await
        .map_err(|e| Error::InvalidResponse(e.to_string()))
}

async fn rejected(response: reqwest::Response) -> Error {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Error::Rejected {
        status: status.as_u16(),
        status_text: status.canonical_reason().unwrap_or_default().to_string(),
        body,
    }
}

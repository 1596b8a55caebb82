//! Typed facade over the dispatcher
//!
//! Four verbs plus the session operations the admin UI needs. Every call goes
//! through `Dispatcher::dispatch`, so token attachment, refresh and the single
//! retry apply uniformly.

use std::sync::Arc;

use clinic_auth::{CredentialStore, TokenResponse};
use common::Secret;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{info, warn};

use crate::dispatch::Dispatcher;
use crate::error::{ApiError, Result};
use crate::request::RequestDescriptor;
use crate::store;

#[derive(Clone)]
pub struct ApiClient {
    dispatcher: Arc<Dispatcher>,
}

impl ApiClient {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// GET `path` and decode the payload.
    pub async fn fetch<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.send(&RequestDescriptor::get(path)).await
    }

    /// POST `body` (or nothing) to `path`.
    pub async fn create<T, B>(&self, path: &str, body: Option<&B>) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.send(&with_body(RequestDescriptor::post(path), body)?)
            .await
    }

    /// PATCH `body` (or nothing) to `path`.
    pub async fn update<T, B>(&self, path: &str, body: Option<&B>) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.send(&with_body(RequestDescriptor::patch(path), body)?)
            .await
    }

    /// DELETE `path`.
    pub async fn remove<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.send(&RequestDescriptor::delete(path)).await
    }

    /// Dispatch an arbitrary descriptor and decode the payload.
    ///
    /// A success without a JSON payload decodes from `null`, so `()` and
    /// `Option<_>` accept it while a struct target reports a transport failure.
    pub async fn send<T: DeserializeOwned>(&self, descriptor: &RequestDescriptor) -> Result<T> {
        let payload = self.dispatcher.dispatch(descriptor).await?;
        decode(payload.unwrap_or(Value::Null))
    }

    /// Exchange email and password for a session.
    ///
    /// A 401 means the pair was wrong; it fails as `invalid credentials`
    /// without touching the store or the expiry hook. The parsed response is
    /// returned on any 2xx.
    pub async fn sign_in(&self, email: &str, password: &Secret<String>) -> Result<TokenResponse> {
        let tokens = clinic_auth::sign_in(
            self.dispatcher.http_client(),
            self.dispatcher.base_url(),
            email,
            password,
        )
        .await
        .map_err(|e| match e {
            clinic_auth::Error::Rejected { status: 401, .. } => ApiError::invalid_credentials(),
            other => ApiError::from(other),
        })?;

        // A response without an access token is returned as is and installs nothing.
        if let Some(access) = tokens.access_token.clone() {
            let refresh = tokens.refresh_token.clone();
            store::mutate(self.store(), move |s| s.set_tokens(access, refresh)).await?;
            self.dispatcher.session().rearm();
            info!("signed in");
        } else {
            warn!("sign-in response carried no access token");
        }
        Ok(tokens)
    }

    /// End the session. The remote logout is best effort; local credentials
    /// are cleared regardless of its outcome.
    pub async fn sign_out(&self) -> Result<()> {
        if let Some(access) = self.store().access_token() {
            if let Err(e) = clinic_auth::logout(
                self.dispatcher.http_client(),
                self.dispatcher.base_url(),
                &access,
            )
            .await
            {
                warn!(error = %e, "remote logout failed, clearing local session anyway");
            }
        }
        store::mutate(self.store(), |s| s.clear()).await?;
        info!("signed out");
        Ok(())
    }

    pub fn is_authenticated(&self) -> bool {
        self.store().is_authenticated()
    }

    /// Consume the pending session-expired notice, if any.
    pub fn take_notice(&self) -> Option<String> {
        self.dispatcher.session().notice().take()
    }

    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        self.dispatcher.credential_store()
    }
}

fn with_body<B: Serialize + ?Sized>(
    descriptor: RequestDescriptor,
    body: Option<&B>,
) -> Result<RequestDescriptor> {
    match body {
        Some(body) => descriptor.json(body),
        None => Ok(descriptor),
    }
}

fn decode<T: DeserializeOwned>(payload: Value) -> Result<T> {
    serde_json::from_value(payload)
        .map_err(|e| ApiError::transport(format!("unexpected payload shape: {e}")))
}

//! Request dispatcher
//!
//! The single path from application code to the network for authenticated
//! calls. Attaches the stored access token, runs the refresh protocol when a
//! credentialed request gets a 401, replays the request once, and folds every
//! outcome into `Result<Option<Value>, ApiError>`.
//!
//! Control flow lives in `state::handle_event`; this module only performs the
//! I/O each action asks for.

use std::sync::Arc;

use clinic_auth::{CredentialStore, SessionNotice};
use common::Secret;
use reqwest::header::{AUTHORIZATION, CACHE_CONTROL, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::error::{ApiError, FailureBody, Result};
use crate::refresh::refresh_session;
use crate::request::RequestDescriptor;
use crate::session::{SessionGuard, SessionObserver};
use crate::store;
use crate::state::{DispatchAction, DispatchEvent, DispatchState, handle_event};

const JSON_CONTENT_TYPE: &str = "application/json";

pub struct Dispatcher {
    client: reqwest::Client,
    base_url: String,
    store: Arc<dyn CredentialStore>,
    session: SessionGuard,
}

impl Dispatcher {
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        store: Arc<dyn CredentialStore>,
    ) -> Self {
        let session = SessionGuard::new(Arc::new(SessionNotice::new())).watching(store.watch());
        Self {
            client,
            base_url: base_url.into(),
            store,
            session,
        }
    }

    /// Install the UI hook called when a session expires.
    pub fn with_observer(mut self, observer: Arc<dyn SessionObserver>) -> Self {
        self.session = self.session.with_observer(observer);
        self
    }

    /// Share an existing notice slot with the sign-in screen.
    pub fn with_notice(mut self, notice: Arc<SessionNotice>) -> Self {
        self.session = self.session.with_notice(notice);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn http_client(&self) -> &reqwest::Client {
        &self.client
    }

    pub fn credential_store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    pub fn session(&self) -> &SessionGuard {
        &self.session
    }

    /// Send `descriptor` and normalize the outcome.
    ///
    /// `Ok(None)` is a 2xx whose response is not JSON.
    #[instrument(
        skip_all,
        fields(
            request_id = %format!("req_{}", uuid::Uuid::new_v4().as_simple()),
            method = %descriptor.method(),
            path = descriptor.path(),
        )
    )]
    pub async fn dispatch(&self, descriptor: &RequestDescriptor) -> Result<Option<Value>> {
        let result = self.run(descriptor).await;
        let outcome = match &result {
            Ok(_) => "ok",
            Err(e) => e.kind.label(),
        };
        metrics::counter!("api_client_dispatch_total", "outcome" => outcome).increment(1);
        result
    }

    async fn run(&self, descriptor: &RequestDescriptor) -> Result<Option<Value>> {
        let mut state = DispatchState::Initial;
        let mut event = DispatchEvent::Begin {
            access: self.store.access_token(),
        };
        let mut response: Option<reqwest::Response> = None;
        let mut transport_error: Option<ApiError> = None;

        loop {
            let (next, action) = handle_event(state, event);
            debug!(from = ?state, to = ?next, "dispatch transition");
            state = next;

            event = match action {
                DispatchAction::Send { access } => {
                    match self.send(descriptor, access.as_ref()).await {
                        Ok(resp) => {
                            let status = resp.status().as_u16();
                            debug!(status, "response received");
                            response = Some(resp);
                            DispatchEvent::Responded { status }
                        }
                        Err(e) => {
                            transport_error = Some(e);
                            DispatchEvent::TransportFailed
                        }
                    }
                }
                DispatchAction::Refresh => {
                    let refreshed = refresh_session(&self.client, &self.base_url, &self.store).await;
                    DispatchEvent::RefreshFinished {
                        access: if refreshed {
                            self.store.access_token()
                        } else {
                            None
                        },
                    }
                }
                DispatchAction::ReadPayload => {
                    return read_payload(take_response(&mut response)?).await;
                }
                DispatchAction::ReadFailure => {
                    return Err(read_failure(take_response(&mut response)?).await);
                }
                DispatchAction::RejectUnauthenticated => {
                    debug!("401 on an unauthenticated call, not refreshing");
                    return Err(ApiError::no_credential());
                }
                DispatchAction::ExpireSession => {
                    self.expire_session().await;
                    return Err(ApiError::session_expired());
                }
                DispatchAction::Abort => {
                    return Err(transport_error
                        .take()
                        .unwrap_or_else(|| ApiError::transport("request failed")));
                }
                DispatchAction::None => {
                    return Err(ApiError::transport(format!(
                        "dispatch stalled in state {state:?}"
                    )));
                }
            };
        }
    }

    async fn send(
        &self,
        descriptor: &RequestDescriptor,
        access: Option<&Secret<String>>,
    ) -> Result<reqwest::Response> {
        let url = clinic_auth::endpoint(&self.base_url, descriptor.path());
        let mut request = self
            .client
            .request(descriptor.method().clone(), url)
            .headers(build_headers(descriptor, access)?);
        if !descriptor.query_pairs().is_empty() {
            request = request.query(descriptor.query_pairs());
        }
        if let Some(body) = descriptor.body() {
            request = request.body(body.to_vec());
        }

        request.send().await.map_err(|e| {
            warn!(error = %e, "request failed before a response arrived");
            ApiError::transport(format!("request failed: {e}"))
        })
    }

    /// Clear credentials and fire the once-per-session side effects.
    ///
    /// Safe to call from several dispatches for the same expiry: clearing an
    /// empty store is a no-op and the guard fires only once.
    async fn expire_session(&self) {
        if let Err(e) = store::mutate(&self.store, |s| s.clear()).await {
            warn!(error = %e, "failed to persist cleared credentials");
        }
        self.session.expire();
    }
}

/// Default JSON content type, then cache directive, then caller overrides,
/// then the bearer token.
fn build_headers(descriptor: &RequestDescriptor, access: Option<&Secret<String>>) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
    if let Some(cache) = descriptor.cache_directive() {
        headers.insert(CACHE_CONTROL, cache.header_value());
    }
    for (name, value) in descriptor.header_overrides() {
        headers.insert(name.clone(), value.clone());
    }
    if let Some(access) = access {
        let mut value = HeaderValue::from_str(&access.bearer())
            .map_err(|e| ApiError::transport(format!("access token is not a valid header: {e}")))?;
        value.set_sensitive(true);
        headers.insert(AUTHORIZATION, value);
    }
    Ok(headers)
}

fn take_response(slot: &mut Option<reqwest::Response>) -> Result<reqwest::Response> {
    slot.take()
        .ok_or_else(|| ApiError::transport("no response to read"))
}

fn is_json(response: &reqwest::Response) -> bool {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.contains(JSON_CONTENT_TYPE))
}

async fn read_payload(response: reqwest::Response) -> Result<Option<Value>> {
    if !is_json(&response) {
        return Ok(None);
    }
    let bytes = response
        .bytes()
        .await
        .map_err(|e| ApiError::transport(format!("reading response body: {e}")))?;
    if bytes.is_empty() {
        return Ok(None);
    }
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|e| ApiError::transport(format!("invalid JSON payload: {e}")))
}

async fn read_failure(response: reqwest::Response) -> ApiError {
    let status = response.status();
    let body = match response.text().await {
        Ok(text) => FailureBody::parse(text),
        Err(e) => {
            warn!(error = %e, "could not read error body");
            FailureBody::Absent
        }
    };
    let failure = ApiError::from_response(
        status.as_u16(),
        status.canonical_reason().unwrap_or_default(),
        body,
    );
    debug!(status = failure.status_code, kind = failure.kind.label(), "request failed");
    failure
}

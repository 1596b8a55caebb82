//! Refresh protocol
//!
//! Exchanges the stored refresh token for a new pair and installs it. Called
//! by the dispatcher after a credentialed request got a 401, at most once per
//! dispatch.
//!
//! There is no single-flight: two dispatches that hit a 401 at the same time
//! each run their own refresh, and whichever writes last wins the store.

use std::sync::Arc;

use clinic_auth::CredentialStore;
use tracing::{debug, info, warn};

use crate::store;

/// Run one refresh exchange. Returns `true` when a new access token was installed.
///
/// Returns `false` without touching the network when no refresh token is
/// stored. Any rejection, transport error, or response without an access
/// token also yields `false`; the store is left as it was.
pub async fn refresh_session(
    client: &reqwest::Client,
    base_url: &str,
    store: &Arc<dyn CredentialStore>,
) -> bool {
    let Some(refresh_token) = store.refresh_token() else {
        debug!("no refresh token stored, skipping refresh");
        record("skipped");
        return false;
    };

    let response = match clinic_auth::refresh(client, base_url, &refresh_token).await {
        Ok(response) => response,
        Err(clinic_auth::Error::Rejected { status, .. }) => {
            warn!(status, "refresh token rejected");
            record("rejected");
            return false;
        }
        Err(e) => {
            warn!(error = %e, "token refresh failed");
            record("failed");
            return false;
        }
    };

    let Some(access) = response.access_token else {
        warn!("refresh response carried no access token");
        record("empty");
        return false;
    };

    let refresh = response.refresh_token;
    if let Err(e) = store::mutate(store, move |s| s.set_tokens(access, refresh)).await {
        // The in-memory pair is updated before the write; only persistence failed.
        warn!(error = %e, "failed to persist refreshed tokens");
    }
    info!("access token refreshed");
    record("refreshed");
    true
}

fn record(outcome: &'static str) {
    metrics::counter!("api_client_refresh_total", "outcome" => outcome).increment(1);
}

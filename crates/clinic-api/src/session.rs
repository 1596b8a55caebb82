//! Session expiry side effects
//!
//! When a 401 survives the refresh attempt the session is over: credentials
//! are cleared, a notice is left for the sign-in screen, and the UI is told to
//! navigate there. Concurrent dispatches can all reach that point for the same
//! expiry, so the notice and navigation sit behind a latch that fires once per
//! session.
//!
//! A new session is any install of fresh tokens into the store (sign-in, a
//! successful refresh, or a direct `set_tokens`). The guard watches the
//! store's change notifications and re-arms when it sees one. A failed
//! refresh installs nothing, so dispatches racing on the same dead session
//! still fire once.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use clinic_auth::{CredentialWatch, SESSION_EXPIRED_MESSAGE, SessionNotice};
use tracing::{debug, warn};

/// Hook for the UI layer. Called once per expired session.
pub trait SessionObserver: Send + Sync {
    /// Navigate to the sign-in entry point.
    fn session_expired(&self);
}

/// Latch guarding the once-per-session side effects.
pub struct SessionGuard {
    expired: AtomicBool,
    notice: Arc<SessionNotice>,
    observer: Option<Arc<dyn SessionObserver>>,
    watch: Option<Mutex<CredentialWatch>>,
}

impl SessionGuard {
    pub fn new(notice: Arc<SessionNotice>) -> Self {
        Self {
            expired: AtomicBool::new(false),
            notice,
            observer: None,
            watch: None,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn SessionObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn with_notice(mut self, notice: Arc<SessionNotice>) -> Self {
        self.notice = notice;
        self
    }

    /// Re-arm whenever `watch` reports newly installed tokens.
    pub fn watching(mut self, watch: CredentialWatch) -> Self {
        self.watch = Some(Mutex::new(watch));
        self
    }

    /// Post the notice and notify the observer, unless this session already
    /// expired. Returns whether this call fired the side effects.
    pub fn expire(&self) -> bool {
        self.sync_with_store();
        if self
            .expired
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("session already expired, skipping duplicate signal");
            return false;
        }

        warn!("session expired, redirecting to sign-in");
        metrics::counter!("api_client_session_expired_total").increment(1);
        self.notice.post(SESSION_EXPIRED_MESSAGE);
        if let Some(observer) = &self.observer {
            observer.session_expired();
        }
        true
    }

    /// A new session started; the next expiry fires again.
    pub fn rearm(&self) {
        self.expired.store(false, Ordering::Release);
    }

    pub fn is_expired(&self) -> bool {
        self.sync_with_store();
        self.expired.load(Ordering::Acquire)
    }

    pub fn notice(&self) -> &Arc<SessionNotice> {
        &self.notice
    }

    fn sync_with_store(&self) {
        let Some(watch) = &self.watch else {
            return;
        };
        let updated = watch
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .updated_since_last();
        if updated {
            debug!("new tokens installed, session latch re-armed");
            self.rearm();
        }
    }
}

//! Take-once notice for the sign-in screen
//!
//! When a session dies mid-use the dispatcher posts a message here; the
//! sign-in entry point reads it once to explain why the user was sent back.

use std::sync::{Mutex, PoisonError};

#[derive(Debug, Default)]
pub struct SessionNotice {
    message: Mutex<Option<String>>,
}

impl SessionNotice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace any pending notice. Posting the same message twice is harmless.
    pub fn post(&self, message: impl Into<String>) {
        let mut slot = self.message.lock().unwrap_or_else(PoisonError::into_inner);
        *slot = Some(message.into());
    }

    /// Read and clear the pending notice.
    pub fn take(&self) -> Option<String> {
        self.message
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    pub fn is_pending(&self) -> bool {
        self.message
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

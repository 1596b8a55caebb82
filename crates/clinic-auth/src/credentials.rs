//! Credential storage for the access/refresh token pair
//!
//! `CredentialStore` is the seam the dispatcher reads on every outbound call.
//! Two implementations ship here: `MemoryCredentialStore` for tests and
//! embedding, and `FileCredentialStore`, which persists the pair as JSON with
//! atomic temp-file + rename writes.
//!
//! Every mutating call broadcasts a `CredentialEvent` so auth-state observers
//! can react. Stores are plain shared state: there is no transaction spanning
//! a read and a later write, so concurrent refreshes resolve as last write wins.

use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use common::Secret;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Buffered change notifications per subscriber before the oldest are dropped.
const EVENT_CAPACITY: usize = 16;

/// Change notification emitted after every mutating store call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialEvent {
    /// A new access token (and possibly refresh token) was written.
    Updated,
    /// Both tokens were removed.
    Cleared,
}

/// Process-wide holder of the current token pair.
///
/// Getters return `None` when the token is absent. `set_tokens` only
/// overwrites the refresh token when one is supplied.
pub trait CredentialStore: Send + Sync {
    fn access_token(&self) -> Option<Secret<String>>;

    fn refresh_token(&self) -> Option<Secret<String>>;

    fn set_tokens(&self, access: String, refresh: Option<String>) -> Result<()>;

    fn clear(&self) -> Result<()>;

    /// Subscribe to change notifications.
    fn subscribe(&self) -> broadcast::Receiver<CredentialEvent>;

    /// Poll-style view of `subscribe` for callers outside an async context.
    fn watch(&self) -> CredentialWatch {
        CredentialWatch::new(self.subscribe())
    }

    fn is_authenticated(&self) -> bool {
        self.access_token().is_some()
    }
}

/// Non-blocking reader over a store's change notifications.
pub struct CredentialWatch {
    events: broadcast::Receiver<CredentialEvent>,
}

impl CredentialWatch {
    pub fn new(events: broadcast::Receiver<CredentialEvent>) -> Self {
        Self { events }
    }

    /// Drain pending notifications. Returns whether new tokens were installed
    /// since the last call.
    ///
    /// A lagged receiver missed at least `EVENT_CAPACITY` events and counts as
    /// an update.
    pub fn updated_since_last(&mut self) -> bool {
        let mut updated = false;
        loop {
            match self.events.try_recv() {
                Ok(CredentialEvent::Updated) => updated = true,
                Ok(CredentialEvent::Cleared) => {}
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    debug!(skipped, "credential watch lagged");
                    updated = true;
                }
                Err(broadcast::error::TryRecvError::Empty | broadcast::error::TryRecvError::Closed) => {
                    return updated;
                }
            }
        }
    }
}

/// On-disk and in-memory shape of the token pair.
#[derive(Default, Clone, Serialize, Deserialize)]
struct StoredTokens {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    refresh_token: Option<String>,
}

impl StoredTokens {
    fn apply(&mut self, access: String, refresh: Option<String>) {
        self.access_token = Some(access);
        if let Some(refresh) = refresh {
            self.refresh_token = Some(refresh);
        }
    }
}

/// Shared lock + notifier plumbing for both store flavours.
struct TokenCell {
    state: RwLock<StoredTokens>,
    events: broadcast::Sender<CredentialEvent>,
}

impl TokenCell {
    fn new(initial: StoredTokens) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            state: RwLock::new(initial),
            events,
        }
    }

    fn read<T>(&self, f: impl FnOnce(&StoredTokens) -> T) -> T {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        f(&state)
    }

    /// Mutate under the write lock, run `persist` on the new state, then notify.
    ///
    /// The notification fires even when `persist` fails: the in-memory pair
    /// has already changed and observers must see it.
    fn update(
        &self,
        event: CredentialEvent,
        mutate: impl FnOnce(&mut StoredTokens),
        persist: impl FnOnce(&StoredTokens) -> Result<()>,
    ) -> Result<()> {
        let result = {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            mutate(&mut state);
            persist(&state)
        };
        // No subscribers is not an error.
        let _ = self.events.send(event);
        result
    }
}

/// Volatile store. Used by tests and by callers that do not persist sessions.
pub struct MemoryCredentialStore {
    cell: TokenCell,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self {
            cell: TokenCell::new(StoredTokens::default()),
        }
    }

    /// Start with a token pair already in place.
    pub fn with_tokens(access: impl Into<String>, refresh: Option<String>) -> Self {
        let mut initial = StoredTokens::default();
        initial.apply(access.into(), refresh);
        Self {
            cell: TokenCell::new(initial),
        }
    }
}

impl Default for MemoryCredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn access_token(&self) -> Option<Secret<String>> {
        self.cell
            .read(|s| s.access_token.clone().map(Secret::new))
    }

    fn refresh_token(&self) -> Option<Secret<String>> {
        self.cell
            .read(|s| s.refresh_token.clone().map(Secret::new))
    }

    fn set_tokens(&self, access: String, refresh: Option<String>) -> Result<()> {
        self.cell.update(
            CredentialEvent::Updated,
            |s| s.apply(access, refresh),
            |_| Ok(()),
        )
    }

    fn clear(&self) -> Result<()> {
        self.cell.update(
            CredentialEvent::Cleared,
            |s| *s = StoredTokens::default(),
            |_| Ok(()),
        )
    }

    fn subscribe(&self) -> broadcast::Receiver<CredentialEvent> {
        self.cell.events.subscribe()
    }
}

/// JSON-file backed store.
///
/// The file holds `{"access_token": ..., "refresh_token": ...}` and is
/// rewritten on every mutation. Permissions are 0600 on unix.
///
/// `set_tokens` and `clear` write with blocking `std::fs` while holding the
/// write lock, so the in-memory pair and the file never disagree. Async
/// callers run them on the blocking pool.
pub struct FileCredentialStore {
    path: PathBuf,
    cell: TokenCell,
}

impl FileCredentialStore {
    /// Load the token pair from `path`.
    ///
    /// A missing file is a signed-out session: the parent directory and an
    /// empty `{}` file are created so later writes only need the rename.
    pub fn load(path: PathBuf) -> Result<Self> {
        let initial = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| Error::Io(format!("reading credential file: {e}")))?;
            let tokens: StoredTokens = serde_json::from_str(&contents)
                .map_err(|e| Error::CredentialParse(format!("parsing credential file: {e}")))?;
            info!(
                path = %path.display(),
                signed_in = tokens.access_token.is_some(),
                "loaded credentials"
            );
            tokens
        } else {
            info!(path = %path.display(), "credential file not found, starting signed out");
            if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
                std::fs::create_dir_all(dir)
                    .map_err(|e| Error::Io(format!("creating credential directory: {e}")))?;
            }
            let tokens = StoredTokens::default();
            write_atomic(&path, &tokens)?;
            tokens
        };

        Ok(Self {
            path,
            cell: TokenCell::new(initial),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialStore for FileCredentialStore {
    fn access_token(&self) -> Option<Secret<String>> {
        self.cell
            .read(|s| s.access_token.clone().map(Secret::new))
    }

    fn refresh_token(&self) -> Option<Secret<String>> {
        self.cell
            .read(|s| s.refresh_token.clone().map(Secret::new))
    }

    fn set_tokens(&self, access: String, refresh: Option<String>) -> Result<()> {
        self.cell.update(
            CredentialEvent::Updated,
            |s| s.apply(access, refresh),
            |s| write_atomic(&self.path, s),
        )
    }

    fn clear(&self) -> Result<()> {
        self.cell.update(
            CredentialEvent::Cleared,
            |s| *s = StoredTokens::default(),
            |s| write_atomic(&self.path, s),
        )
    }

    fn subscribe(&self) -> broadcast::Receiver<CredentialEvent> {
        self.cell.events.subscribe()
    }
}

/// Write the token pair to `path` via a temp file in the same directory and a
/// rename, so a crash mid-write never leaves a truncated file behind.
fn write_atomic(path: &Path, tokens: &StoredTokens) -> Result<()> {
    let json = serde_json::to_string_pretty(tokens)
        .map_err(|e| Error::CredentialParse(format!("serializing credentials: {e}")))?;

    let dir = match path.parent() {
        Some(d) if !d.as_os_str().is_empty() => d,
        _ => Path::new("."),
    };
    let tmp_path = dir.join(format!(".credentials.tmp.{}", std::process::id()));

    std::fs::write(&tmp_path, json.as_bytes())
        .map_err(|e| Error::Io(format!("writing temp credential file: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&tmp_path, std::fs::Permissions::from_mode(0o600))
            .map_err(|e| Error::Io(format!("setting credential file permissions: {e}")))?;
    }

    std::fs::rename(&tmp_path, path)
        .map_err(|e| Error::Io(format!("renaming temp credential file: {e}")))?;

    debug!(path = %path.display(), "persisted credentials");
    Ok(())
}

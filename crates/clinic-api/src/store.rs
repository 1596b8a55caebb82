//! Store mutations from async code
//!
//! `CredentialStore` is synchronous and the file-backed store writes with
//! blocking I/O, so mutations made from a dispatch run on the blocking pool.

use std::sync::Arc;

use clinic_auth::CredentialStore;

/// Run `op` against `store` on tokio's blocking pool.
pub(crate) async fn mutate<F>(store: &Arc<dyn CredentialStore>, op: F) -> clinic_auth::Result<()>
where
    F: FnOnce(&dyn CredentialStore) -> clinic_auth::Result<()> + Send + 'static,
{
    let store = Arc::clone(store);
    tokio::task::spawn_blocking(move || op(store.as_ref()))
        .await
        .map_err(|e| clinic_auth::Error::Io(format!("credential write task failed: {e}")))?
}

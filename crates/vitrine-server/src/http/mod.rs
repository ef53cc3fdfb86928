pub(crate) mod auth;
pub(crate) mod catalog;
pub(crate) mod orders;
pub(crate) mod respond;
pub(crate) mod system;
pub(crate) mod users;

use vitrine_store::{Store, StoreError};

use crate::AppState;

/// Runs a closure against the store on the blocking pool; rusqlite calls
/// must not block the async workers.
pub(crate) async fn run_store<T, F>(state: &AppState, op: F) -> Result<T, StoreError>
where
    F: FnOnce(Store) -> Result<T, StoreError> + Send + 'static,
    T: Send + 'static,
{
    let store = state.store.clone();
    match tokio::task::spawn_blocking(move || op(store)).await {
        Ok(result) => result,
        Err(err) => Err(StoreError::internal(format!("store task failed: {err}"))),
    }
}

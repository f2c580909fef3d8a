//! Store lookups with bounded retry on transient faults.

use std::future::Future;

use blueprint_exchange_store::Result as StoreResult;

/// Run `op`, retrying up to `retries` extra times while it fails with a
/// transient [`StoreError`](blueprint_exchange_store::StoreError).
///
/// `Ok(None)` is an answer, not a fault, and is returned immediately.
pub(crate) async fn with_retries<T, F, Fut>(what: &str, retries: u32, mut op: F) -> StoreResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = StoreResult<T>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Err(e) if attempt < retries && e.is_transient() => {
                attempt += 1;
                tracing::warn!(lookup = what, attempt, error = %e, "store lookup failed, retrying");
            }
            Err(e) => {
                tracing::debug!(lookup = what, error = %e, "store lookup failed");
                return Err(e);
            }
            ok => return ok,
        }
    }
}

//! Per-signature in-flight fetch sharing.
//!
//! Concurrent cache-reading fetches for the same request signature await one
//! network call. The entry is dropped once the call settles, so a later
//! fetch always goes back to the network.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OnceCell};
use waypost_core::{EdgeRequest, Error, ResponseSnapshot};

use crate::fetch::Transport;

type Shared = Arc<OnceCell<Result<ResponseSnapshot, Arc<Error>>>>;

#[derive(Default)]
pub(crate) struct InflightFetches {
    pending: Mutex<HashMap<String, Shared>>,
}

impl InflightFetches {
    pub(crate) async fn fetch(
        &self, transport: &dyn Transport, request: &EdgeRequest,
    ) -> Result<ResponseSnapshot, Error> {
        let key = request.signature().cache_key();
        let cell = Arc::clone(self.pending.lock().await.entry(key.clone()).or_default());

        let outcome = cell
            .get_or_init(|| async { transport.fetch(request).await.map_err(Arc::new) })
            .await
            .clone();

        let mut pending = self.pending.lock().await;
        if pending.get(&key).is_some_and(|current| Arc::ptr_eq(current, &cell)) {
            pending.remove(&key);
        }
        drop(pending);

        outcome.map_err(|err| replicate(&err))
    }

    #[cfg(test)]
    pub(crate) async fn in_flight(&self) -> usize {
        self.pending.lock().await.len()
    }
}

/// Each waiter gets its own copy of the shared failure.
fn replicate(err: &Error) -> Error {
    match err {
        Error::FetchTimeout(msg) => Error::FetchTimeout(msg.clone()),
        Error::FetchTooLarge(msg) => Error::FetchTooLarge(msg.clone()),
        Error::InvalidUrl(msg) => Error::InvalidUrl(msg.clone()),
        Error::InvalidInput(msg) => Error::InvalidInput(msg.clone()),
        Error::Network(msg) => Error::Network(msg.clone()),
        other => Error::Network(other.to_string()),
    }
}

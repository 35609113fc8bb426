//! Replay of queued mutations on a reconnect/sync trigger.
//!
//! The orchestrator never schedules itself. The host calls [`SyncOrchestrator::drain`]
//! when it believes connectivity is back. Drains are serialized, and each
//! entry is attempted at most once per drain, in insertion order. Delivery is
//! at-least-once: an entry whose replay reached the server but whose removal
//! did not commit is replayed again on the next drain.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use waypost_core::{Error, MutationQueue};

use crate::fetch::Transport;

/// Outcome of one drain cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrainReport {
    /// Entries whose replay was sent this cycle.
    pub attempted: usize,
    /// Entries delivered and removed from the queue.
    pub replayed: usize,
    /// Entries left queued for the next drain.
    pub failed: usize,
    /// Queue length after the drain.
    pub remaining: usize,
    /// Whether the drain stopped early on cancellation.
    pub cancelled: bool,
}

pub struct SyncOrchestrator {
    queue: Arc<dyn MutationQueue>,
    transport: Arc<dyn Transport>,
    gate: Mutex<()>,
}

impl SyncOrchestrator {
    pub fn new(queue: Arc<dyn MutationQueue>, transport: Arc<dyn Transport>) -> Self {
        Self { queue, transport, gate: Mutex::new(()) }
    }

    /// Replay every queued mutation once.
    pub async fn drain(&self) -> Result<DrainReport, Error> {
        self.drain_until(&CancellationToken::new()).await
    }

    /// Like [`Self::drain`], stopping once `cancel` fires.
    ///
    /// A replay cut off mid-flight leaves its entry queued.
    pub async fn drain_until(&self, cancel: &CancellationToken) -> Result<DrainReport, Error> {
        let _drain = self.gate.lock().await;

        let pending = self.queue.list_all().await?;
        let mut report = DrainReport::default();

        for mutation in pending {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }

            let request = match mutation.to_request() {
                Ok(request) => request,
                Err(e) => {
                    tracing::warn!(id = %mutation.id, error = %e, "cannot rebuild queued mutation; leaving it queued");
                    report.failed += 1;
                    continue;
                }
            };

            let outcome = tokio::select! {
                _ = cancel.cancelled() => None,
                result = self.transport.fetch(&request) => Some(result),
            };
            let Some(outcome) = outcome else {
                report.cancelled = true;
                break;
            };
            report.attempted += 1;

            match outcome {
                Ok(response) => match self.queue.remove(&mutation.id).await {
                    Ok(_) => {
                        tracing::info!(
                            id = %mutation.id,
                            method = %mutation.method,
                            url = %mutation.url,
                            status = response.status,
                            "replayed queued mutation"
                        );
                        report.replayed += 1;
                    }
                    Err(e) => {
                        tracing::warn!(
                            id = %mutation.id,
                            error = %e,
                            "replayed but could not dequeue; it will be sent again"
                        );
                        report.failed += 1;
                    }
                },
                Err(e) => {
                    tracing::warn!(
                        id = %mutation.id,
                        url = %mutation.url,
                        error = %e,
                        "replay failed; keeping for next drain"
                    );
                    report.failed += 1;
                }
            }
        }

        report.remaining = self.queue.list_all().await?.len();
        tracing::info!(
            attempted = report.attempted,
            replayed = report.replayed,
            failed = report.failed,
            remaining = report.remaining,
            cancelled = report.cancelled,
            "drain finished"
        );
        Ok(report)
    }
}

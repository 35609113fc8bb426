//! Storage seams for the edge layer.
//!
//! The strategy engine and sync orchestrator only ever see these traits, so
//! the host decides whether they are backed by SQLite ([`crate::EdgeDb`]) or
//! memory ([`crate::MemoryStore`]). Both operations are atomic per key; no
//! cross-key transactions are offered.

use async_trait::async_trait;

use crate::Error;
use crate::cache::{CacheRecord, QueuedMutation, RequestSignature};

/// Named cache containers holding one record per request signature.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Create the container if it does not exist yet.
    async fn open(&self, container: &str) -> Result<(), Error>;

    async fn get(&self, container: &str, key: &RequestSignature) -> Result<Option<CacheRecord>, Error>;

    /// Insert or overwrite; creates the container on first write.
    async fn put(&self, container: &str, record: &CacheRecord) -> Result<(), Error>;

    /// Returns whether a record was removed.
    async fn delete(&self, container: &str, key: &RequestSignature) -> Result<bool, Error>;

    /// All existing container names, sorted.
    async fn container_names(&self) -> Result<Vec<String>, Error>;

    /// Drop a container and every record in it. Returns whether it existed.
    async fn delete_container(&self, container: &str) -> Result<bool, Error>;
}

/// Durable queue of writes awaiting replay.
///
/// Entries are opaque: no validation, no deduplication.
#[async_trait]
pub trait MutationQueue: Send + Sync {
    /// Resolves only once the entry is committed to the backing store.
    async fn enqueue(&self, mutation: &QueuedMutation) -> Result<(), Error>;

    /// Every pending entry in insertion order.
    async fn list_all(&self) -> Result<Vec<QueuedMutation>, Error>;

    /// Returns whether an entry with this id was removed.
    async fn remove(&self, id: &str) -> Result<bool, Error>;
}

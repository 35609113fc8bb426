//! In-memory backend for both storage seams.
//!
//! Uses BTreeMap/Vec behind a tokio RwLock. Nothing survives the process,
//! so hosts that need durable deferral should use [`super::EdgeDb`].

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::containers::CacheRecord;
use super::mutations::QueuedMutation;
use super::signature::RequestSignature;
use crate::Error;
use crate::store::{CacheStore, MutationQueue};

#[derive(Debug, Default)]
struct MemoryState {
    containers: BTreeMap<String, HashMap<String, CacheRecord>>,
    queue: Vec<QueuedMutation>,
}

/// Process-local cache containers and mutation queue.
///
/// Cloning shares the same underlying state.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn open(&self, container: &str) -> Result<(), Error> {
        let mut state = self.state.write().await;
        state.containers.entry(container.to_string()).or_default();
        Ok(())
    }

    async fn get(&self, container: &str, key: &RequestSignature) -> Result<Option<CacheRecord>, Error> {
        let state = self.state.read().await;
        Ok(state
            .containers
            .get(container)
            .and_then(|records| records.get(&key.cache_key()))
            .cloned())
    }

    async fn put(&self, container: &str, record: &CacheRecord) -> Result<(), Error> {
        let mut state = self.state.write().await;
        state
            .containers
            .entry(container.to_string())
            .or_default()
            .insert(record.key.cache_key(), record.clone());
        Ok(())
    }

    async fn delete(&self, container: &str, key: &RequestSignature) -> Result<bool, Error> {
        let mut state = self.state.write().await;
        Ok(state
            .containers
            .get_mut(container)
            .is_some_and(|records| records.remove(&key.cache_key()).is_some()))
    }

    async fn container_names(&self) -> Result<Vec<String>, Error> {
        let state = self.state.read().await;
        Ok(state.containers.keys().cloned().collect())
    }

    async fn delete_container(&self, container: &str) -> Result<bool, Error> {
        let mut state = self.state.write().await;
        Ok(state.containers.remove(container).is_some())
    }
}

#[async_trait]
impl MutationQueue for MemoryStore {
    async fn enqueue(&self, mutation: &QueuedMutation) -> Result<(), Error> {
        let mut state = self.state.write().await;
        if state.queue.iter().any(|m| m.id == mutation.id) {
            return Err(Error::Queue(format!("duplicate mutation id: {}", mutation.id)));
        }
        state.queue.push(mutation.clone());
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<QueuedMutation>, Error> {
        Ok(self.state.read().await.queue.clone())
    }

    async fn remove(&self, id: &str) -> Result<bool, Error> {
        let mut state = self.state.write().await;
        let before = state.queue.len();
        state.queue.retain(|m| m.id != id);
        Ok(state.queue.len() < before)
    }
}

//! Versioned cache containers and their install/activate lifecycle.
//!
//! Containers are named `<kind>-<version>`. Installing a version precaches
//! its `static` container and makes it the active one; activating it evicts
//! every container that does not belong to that version.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};

use super::containers::CacheRecord;
use super::signature::RequestSignature;
use crate::Error;
use crate::store::CacheStore;

/// Partition of the cache a policy reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum CacheKind {
    Static,
    Pages,
    Api,
}

impl CacheKind {
    pub const ALL: [CacheKind; 3] = [CacheKind::Static, CacheKind::Pages, CacheKind::Api];

    pub fn as_str(self) -> &'static str {
        match self {
            CacheKind::Static => "static",
            CacheKind::Pages => "pages",
            CacheKind::Api => "api",
        }
    }

    pub fn container_name(self, version: &str) -> String {
        format!("{}-{version}", self.as_str())
    }
}

impl fmt::Display for CacheKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handle to one named container.
#[derive(Clone)]
pub struct Container {
    name: String,
    store: Arc<dyn CacheStore>,
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container").field("name", &self.name).finish()
    }
}

impl Container {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn get(&self, key: &RequestSignature) -> Result<Option<CacheRecord>, Error> {
        self.store.get(&self.name, key).await
    }

    pub async fn put(&self, record: &CacheRecord) -> Result<(), Error> {
        self.store.put(&self.name, record).await
    }

    pub async fn delete(&self, key: &RequestSignature) -> Result<bool, Error> {
        self.store.delete(&self.name, key).await
    }
}

/// Outcome of [`VersionedStore::activate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct Activation {
    pub version: String,
    /// Containers evicted by this call; empty when nothing was stale.
    pub evicted: Vec<String>,
}

/// Cache containers scoped to one version.
pub struct VersionedStore {
    store: Arc<dyn CacheStore>,
    version: String,
    installed: AtomicBool,
    controlling: AtomicBool,
}

impl VersionedStore {
    pub fn new(store: Arc<dyn CacheStore>, version: impl Into<String>) -> Self {
        Self {
            store,
            version: version.into(),
            installed: AtomicBool::new(false),
            controlling: AtomicBool::new(false),
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn container_name(&self, kind: CacheKind) -> String {
        kind.container_name(&self.version)
    }

    /// The container set owned by this version.
    pub fn current_names(&self) -> Vec<String> {
        CacheKind::ALL.iter().map(|kind| self.container_name(*kind)).collect()
    }

    /// Handle to a container without touching storage; `put` creates it on demand.
    pub fn container(&self, name: &str) -> Container {
        Container { name: name.to_string(), store: Arc::clone(&self.store) }
    }

    /// Handle to the current version's container of the given kind.
    pub fn container_for(&self, kind: CacheKind) -> Container {
        self.container(&self.container_name(kind))
    }

    /// Open (creating if needed) a container by name.
    pub async fn open(&self, name: &str) -> Result<Container, Error> {
        self.store.open(name).await?;
        Ok(self.container(name))
    }

    /// Open the current version's container of the given kind.
    pub async fn open_kind(&self, kind: CacheKind) -> Result<Container, Error> {
        self.open(&self.container_name(kind)).await
    }

    /// Precache `records` into this version's static container and make the
    /// version active for new requests without waiting for old consumers.
    pub async fn install(&self, records: &[CacheRecord]) -> Result<(), Error> {
        let container = self.open_kind(CacheKind::Static).await?;
        for record in records {
            container.put(record).await?;
        }
        self.installed.store(true, Ordering::SeqCst);
        tracing::info!(version = %self.version, precached = records.len(), "installed cache version");
        Ok(())
    }

    /// Evict every container outside this version's set and take control.
    ///
    /// Safe to repeat: a second call finds nothing to evict.
    pub async fn activate(&self) -> Result<Activation, Error> {
        let keep = self.current_names();
        let mut evicted = Vec::new();

        for name in self.store.container_names().await? {
            if keep.contains(&name) {
                continue;
            }
            if self.store.delete_container(&name).await? {
                tracing::info!(container = %name, "evicted stale cache container");
                evicted.push(name);
            }
        }

        self.controlling.store(true, Ordering::SeqCst);
        tracing::info!(version = %self.version, evicted = evicted.len(), "activated cache version");

        Ok(Activation { version: self.version.clone(), evicted })
    }

    pub fn is_installed(&self) -> bool {
        self.installed.load(Ordering::SeqCst)
    }

    /// True once [`Self::activate`] has run; consumers are served by this
    /// version without a reload.
    pub fn is_controlling(&self) -> bool {
        self.controlling.load(Ordering::SeqCst)
    }
}

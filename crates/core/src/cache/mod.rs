//! Versioned cache containers and the durable mutation queue.
//!
//! Two backends implement the [`crate::store`] seams:
//!
//! - [`EdgeDb`]: SQLite via tokio-rusqlite, WAL mode, versioned migrations;
//!   survives restarts
//! - [`MemoryStore`]: process-local maps, for tests and ephemeral hosts
//!
//! [`VersionedStore`] layers the `<kind>-<version>` naming and the
//! install/activate lifecycle on top of either.

pub mod connection;
pub mod containers;
pub mod memory;
pub mod migrations;
pub mod mutations;
pub mod signature;
pub mod versioned;

pub use crate::Error;

pub use connection::EdgeDb;
pub use containers::CacheRecord;
pub use memory::MemoryStore;
pub use mutations::QueuedMutation;
pub use signature::RequestSignature;
pub use versioned::{Activation, CacheKind, Container, VersionedStore};

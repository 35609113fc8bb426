//! Core types and shared functionality for waypost.
//!
//! This crate provides:
//! - Request/response snapshots seen by the edge layer
//! - Storage seams (`CacheStore`, `MutationQueue`) with SQLite and in-memory backends
//! - Versioned cache containers with install/activate lifecycle
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod exchange;
pub mod store;

pub use cache::{
    Activation, CacheKind, CacheRecord, Container, EdgeDb, MemoryStore, QueuedMutation, RequestSignature,
    VersionedStore,
};
pub use config::{AppConfig, ConfigError};
pub use error::Error;
pub use exchange::{Destination, EdgeRequest, EdgeResponse, RequestMode, ResponseSnapshot, ResponseSource};
pub use store::{CacheStore, MutationQueue};

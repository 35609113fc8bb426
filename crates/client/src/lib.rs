//! Client code for waypost.
//!
//! This crate provides the request classifier, the strategy engine, the sync
//! orchestrator and the network transport they share, wired together by
//! [`EdgeWorker`].

pub mod classify;
pub mod fetch;
pub mod strategy;
pub mod sync;
pub mod worker;

#[cfg(test)]
pub(crate) mod testing;

pub use classify::{CachePolicy, Classifier, RoutePattern, Strategy};
pub use fetch::{FetchClient, FetchConfig, Transport};
pub use strategy::{EngineOptions, StrategyEngine};
pub use sync::{DrainReport, SyncOrchestrator};
pub use worker::{EdgeWorker, Installation};

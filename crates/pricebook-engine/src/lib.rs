//! Incremental catalog price-synchronization engine.
//!
//! Pulls provider price feeds (tabular and structured), reconciles
//! them into a normalized catalog of regions, resource types, billing
//! terms and prices, and converges a persisted catalog to the feed
//! content: unchanged entries produce zero writes, vanished entries
//! are purged with consumer references detached first.

pub mod config;
pub mod context;
pub mod feed;
pub mod model;
pub mod offering;
pub mod orchestrator;
pub mod progress;
pub mod purge;
pub mod rate;
pub mod reconcile;
pub mod store;
pub mod tables;
pub mod upsert;

pub use config::SyncConfig;
pub use orchestrator::{SyncStats, Synchronizer};
pub use progress::ProgressSnapshot;
pub use store::memory::MemoryStore;
pub use store::CatalogStore;

//! Incursion watch: polls ESI for active incursions, enriches them with
//! reference data, and broadcasts what changed between polls.
//!
//! Layers, leaves first: `store` (persistent key-value tier), `cache`
//! (two-tier reference data), `snapshot` (staleness-windowed incursion list),
//! `diff` + `render` (change detection and notification text), `watch` (the
//! check job), `scheduler` (drives jobs), `notify` (outbound delivery).

pub mod cache;
pub mod config;
pub mod diff;
pub mod error;
pub mod keepalive;
pub mod notify;
pub mod render;
pub mod scheduler;
pub mod snapshot;
pub mod store;
pub mod telemetry;
pub mod watch;

pub use cache::EntityCache;
pub use diff::{classify, DiffEngine, Reconciliation};
pub use error::{StoreError, StoreResult};
pub use render::{Renderer, Template};
pub use scheduler::Scheduler;
pub use snapshot::{Snapshot, SnapshotService};
pub use store::{KvStore, MemoryStore, PostgresStore, TimedStore};
pub use watch::IncursionWatch;

//! Filtered snapshot production, QUIC push/pull sync, and atomic hot-swap
//! of read-only SQLite replicas.

pub mod error;
pub mod filter;
pub mod publisher;
pub mod snapshot;
pub mod subscriber;
pub mod wire;

#[cfg(test)]
mod tests;

pub use error::DbSyncError;
pub use filter::{FilterSpec, PartialTableSpec};
pub use publisher::{Publisher, StaticTargets, Target, TargetProvider};
pub use snapshot::{produce_snapshot, SnapshotMeta};
pub use subscriber::Subscriber;

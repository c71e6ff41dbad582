//! # occutrack-adapter-storage-sqlite-sqlx
//!
//! `SQLite` persistence adapter using [sqlx](https://docs.rs/sqlx).
//!
//! ## Responsibilities
//! - Implement the [`SnapshotStore`](occutrack_app::ports::SnapshotStore) port
//! - Manage `SQLite` connection pool lifecycle
//! - Run database migrations (using sqlx embedded migrations)
//! - Map between snapshots and database rows
//!
//! ## Dependency rule
//! Depends on `occutrack-app` (for port traits) and `occutrack-domain` (for domain types).
//! The `app` and `domain` crates must never reference this adapter.

pub mod error;
pub mod pool;
pub mod snapshot_store;

pub use pool::{Config, Database};
pub use snapshot_store::SqliteSnapshotStore;

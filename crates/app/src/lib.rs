//! # occutrack-app
//!
//! Application layer: the occupancy engine, use-cases and **port definitions** (traits).
//!
//! ## Responsibilities
//! - Turn sensor events into occupancy transitions (`resolver`), flag anomalies
//!   (`anomaly`) and apply inactivity timeouts (`timeout`)
//! - Record a replayable snapshot before every command (`recorder`) and rebuild or
//!   verify state from that log (`replay`)
//! - Define **port traits** that adapters must implement (driven/outbound ports):
//!   - `SnapshotStore`: append, load and prune persisted snapshots
//! - Define **driving/inbound ports** as use-case structs:
//!   - `OccupancyTracker`: synchronous single-writer tracker
//!   - `TrackerService`: async wrapper persisting each new snapshot
//!
//! ## Dependency rule
//! Depends on `occutrack-domain` only (plus `tokio::sync` for the writer lock).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod anomaly;
pub mod decay;
pub mod pipeline;
pub mod ports;
pub mod recorder;
pub mod replay;
pub mod resolver;
pub mod services;
pub mod settings;
pub mod status;
pub mod timeout;
pub mod tracker;

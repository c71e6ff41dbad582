//! # occutrack-domain
//!
//! Pure domain model for the occutrack occupancy engine.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, error conventions, timestamps
//! - Define the static **Layout** (areas, sensors, adjacency graph)
//! - Define the mutable **State** the engine operates on (area and sensor
//!   state, warning log)
//! - Define **Snapshots** (pre-event copies forming the replay log) and
//!   **State differences** (verification output)
//! - Contain all invariant enforcement that does not need the engine
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod time;

pub mod area;
pub mod difference;
pub mod event;
pub mod layout;
pub mod sensor;
pub mod snapshot;
pub mod state;
pub mod warning;

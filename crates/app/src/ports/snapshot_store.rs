//! Snapshot store port: durable, append-only storage for the replay log.

use std::future::Future;

use occutrack_domain::error::OccupancyError;
use occutrack_domain::snapshot::MapSnapshot;

/// Append-only persistence for [`MapSnapshot`]s.
///
/// Entries are never edited in place. Removal only happens through
/// [`SnapshotStore::delete_before`] (retention) and [`SnapshotStore::clear`].
pub trait SnapshotStore {
    /// Persist one snapshot. Sequences are unique.
    fn append(
        &self,
        snapshot: &MapSnapshot,
    ) -> impl Future<Output = Result<(), OccupancyError>> + Send;

    /// Load every stored snapshot in ascending sequence order.
    fn load_all(&self) -> impl Future<Output = Result<Vec<MapSnapshot>, OccupancyError>> + Send;

    /// Remove every snapshot whose sequence is lower than `sequence`.
    /// Returns how many were removed.
    fn delete_before(
        &self,
        sequence: u64,
    ) -> impl Future<Output = Result<u64, OccupancyError>> + Send;

    /// Remove every snapshot.
    fn clear(&self) -> impl Future<Output = Result<(), OccupancyError>> + Send;
}

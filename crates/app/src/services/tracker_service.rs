//! Tracker service: single-writer access to the tracker plus persistence.
//!
//! The tracker sits behind a `tokio::sync::Mutex` held for the whole of one
//! command, so events, scans and resets are applied strictly one at a time in
//! arrival order. Snapshots recorded by a command are appended to the store
//! before the lock is released. A watermark tracks the newest stored sequence:
//! snapshots left behind by a failed append are retried by the next command,
//! so the stored log never has a gap. Verification clones the tracker and
//! replays outside the lock.

use std::sync::atomic::{AtomicU64, Ordering};

use occutrack_domain::difference::{StateDifference, VerificationSummary};
use occutrack_domain::error::OccupancyError;
use occutrack_domain::id::{SensorId, WarningId};
use occutrack_domain::layout::Layout;
use occutrack_domain::snapshot::MapSnapshot;
use occutrack_domain::time::Timestamp;
use occutrack_domain::warning::Warning;
use tokio::sync::Mutex;

use crate::ports::SnapshotStore;
use crate::settings::TrackerSettings;
use crate::status::{AreaStatus, MotionDiagnosis, SystemStatus};
use crate::tracker::OccupancyTracker;

pub struct TrackerService<S> {
    tracker: Mutex<OccupancyTracker>,
    /// Newest sequence known to be in the store. Only written under `tracker`.
    persisted_through: AtomicU64,
    store: S,
}

impl<S: SnapshotStore> TrackerService<S> {
    /// Wrap an existing tracker. Its in-memory history is assumed to be
    /// persisted already.
    pub fn new(tracker: OccupancyTracker, store: S) -> Self {
        Self {
            persisted_through: AtomicU64::new(tracker.last_sequence()),
            tracker: Mutex::new(tracker),
            store,
        }
    }

    /// Load the persisted log and rebuild the state from it.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the store.
    pub async fn load(
        layout: Layout,
        settings: TrackerSettings,
        store: S,
    ) -> Result<Self, OccupancyError> {
        let snapshots = store.load_all().await?;
        let tracker = OccupancyTracker::from_history(layout, settings, snapshots);
        Ok(Self::new(tracker, store))
    }

    async fn persist(&self, tracker: &OccupancyTracker) -> Result<(), OccupancyError> {
        let after = self.persisted_through.load(Ordering::Acquire);
        for snapshot in tracker.history_since(after) {
            self.store.append(snapshot).await?;
            self.persisted_through.store(snapshot.sequence, Ordering::Release);
        }
        if tracker.settings().history_retention.is_some()
            && let Some(first) = tracker.history().first()
        {
            self.store.delete_before(first.sequence).await?;
        }
        Ok(())
    }

    async fn mutate<T>(
        &self,
        op: impl FnOnce(&mut OccupancyTracker) -> Result<T, OccupancyError> + Send,
    ) -> Result<T, OccupancyError> {
        let mut tracker = self.tracker.lock().await;
        let output = op(&mut *tracker)?;
        if let Err(err) = self.persist(&tracker).await {
            tracing::error!(error = %err, "failed to persist snapshots");
            return Err(err);
        }
        Ok(output)
    }

    /// # Errors
    ///
    /// Returns [`OccupancyError::Validation`] for an unknown sensor or an
    /// out-of-order event, or a storage error from the store.
    #[tracing::instrument(skip(self))]
    pub async fn process_sensor_event(
        &self,
        sensor_id: SensorId,
        active: bool,
        timestamp: Timestamp,
    ) -> Result<Vec<Warning>, OccupancyError> {
        self.mutate(|t| t.process_sensor_event(sensor_id, active, timestamp))
            .await
    }

    /// # Errors
    ///
    /// Returns [`OccupancyError::Validation`] for an out-of-order timestamp,
    /// or a storage error from the store.
    #[tracing::instrument(skip(self))]
    pub async fn check_timeouts(
        &self,
        timestamp: Timestamp,
    ) -> Result<Vec<Warning>, OccupancyError> {
        self.mutate(|t| t.check_timeouts(timestamp)).await
    }

    /// # Errors
    ///
    /// Returns [`OccupancyError::Validation`] for an out-of-order timestamp,
    /// or a storage error from the store.
    #[tracing::instrument(skip(self))]
    pub async fn resolve_warning(
        &self,
        id: WarningId,
        timestamp: Timestamp,
    ) -> Result<bool, OccupancyError> {
        self.mutate(|t| t.resolve_warning(id, timestamp)).await
    }

    /// # Errors
    ///
    /// Returns [`OccupancyError::Validation`] for an out-of-order timestamp,
    /// or a storage error from the store.
    #[tracing::instrument(skip(self))]
    pub async fn reset_warnings(&self, timestamp: Timestamp) -> Result<usize, OccupancyError> {
        self.mutate(|t| t.reset_warnings(timestamp)).await
    }

    /// # Errors
    ///
    /// Returns [`OccupancyError::Validation`] for an unknown sensor or an
    /// out-of-order timestamp, or a storage error from the store.
    #[tracing::instrument(skip(self))]
    pub async fn reset_sensor(
        &self,
        sensor_id: SensorId,
        timestamp: Timestamp,
    ) -> Result<(), OccupancyError> {
        self.mutate(|t| t.reset_sensor(sensor_id, timestamp)).await
    }

    /// # Errors
    ///
    /// Returns [`OccupancyError::Validation`] for an out-of-order timestamp,
    /// or a storage error from the store.
    #[tracing::instrument(skip(self))]
    pub async fn reset_system(&self, timestamp: Timestamp) -> Result<(), OccupancyError> {
        self.mutate(|t| t.reset_system(timestamp)).await
    }

    /// Keep the newest `keep` snapshots in memory and in the store.
    ///
    /// # Errors
    ///
    /// Returns a storage error from the store.
    #[tracing::instrument(skip(self))]
    pub async fn truncate_history(&self, keep: usize) -> Result<usize, OccupancyError> {
        let mut tracker = self.tracker.lock().await;
        let dropped = tracker.truncate_history(keep);
        match tracker.history().first() {
            Some(first) => {
                self.store.delete_before(first.sequence).await?;
            }
            None => self.store.clear().await?,
        }
        Ok(dropped)
    }

    #[tracing::instrument(skip(self))]
    pub async fn rebuild_from_history(&self) {
        self.tracker.lock().await.rebuild_from_history();
    }

    /// Replay on a detached copy; live processing continues meanwhile.
    #[tracing::instrument(skip(self))]
    pub async fn verify_history(&self, include_warnings: bool) -> Vec<StateDifference> {
        let copy = self.tracker.lock().await.clone();
        copy.verify_history(include_warnings)
    }

    #[tracing::instrument(skip(self))]
    pub async fn verify_all_snapshots(&self) -> Vec<StateDifference> {
        let copy = self.tracker.lock().await.clone();
        copy.verify_all_snapshots()
    }

    pub async fn verification_summary(&self, include_warnings: bool) -> VerificationSummary {
        VerificationSummary::from_differences(&self.verify_history(include_warnings).await)
    }

    /// # Errors
    ///
    /// Returns [`OccupancyError::NotFound`] for an unknown area.
    pub async fn area_status(
        &self,
        area_id: &str,
        now: Timestamp,
    ) -> Result<AreaStatus, OccupancyError> {
        self.tracker.lock().await.area_status(area_id, now)
    }

    pub async fn system_status(&self, now: Timestamp) -> SystemStatus {
        self.tracker.lock().await.system_status(now)
    }

    /// # Errors
    ///
    /// Returns [`OccupancyError::NotFound`] for an unknown area.
    pub async fn occupancy_probability(
        &self,
        area_id: &str,
        now: Timestamp,
    ) -> Result<f64, OccupancyError> {
        self.tracker.lock().await.occupancy_probability(area_id, now)
    }

    /// # Errors
    ///
    /// Returns [`OccupancyError::NotFound`] for an unknown sensor.
    pub async fn diagnose_motion_issues(
        &self,
        sensor_id: Option<&str>,
        now: Timestamp,
    ) -> Result<MotionDiagnosis, OccupancyError> {
        self.tracker
            .lock()
            .await
            .diagnose_motion_issues(sensor_id, now)
    }

    pub async fn open_warnings(&self) -> Vec<Warning> {
        self.tracker.lock().await.open_warnings().cloned().collect()
    }

    pub async fn history(&self) -> Vec<MapSnapshot> {
        self.tracker.lock().await.history().to_vec()
    }
}

//! Occupancy tracker: the orchestration surface consumed by hosts.
//!
//! [`OccupancyTracker`] owns the layout, the settings, the live
//! [`TrackerState`] and the [`SnapshotRecorder`]. Every mutation follows the
//! same steps: validate, record a snapshot of the untouched state, apply the
//! event through the [`Engine`]. Read-only projections never record anything.
//!
//! The tracker is a plain value with `&mut self` mutators; serializing access
//! across tasks is the caller's job (see `TrackerService`).

use occutrack_domain::area::AreaState;
use occutrack_domain::difference::{StateDifference, VerificationSummary};
use occutrack_domain::error::{NotFoundError, OccupancyError};
use occutrack_domain::id::{SensorId, WarningId};
use occutrack_domain::layout::Layout;
use occutrack_domain::sensor::Sensor;
use occutrack_domain::snapshot::{MapSnapshot, SnapshotEvent};
use occutrack_domain::state::TrackerState;
use occutrack_domain::time::{Timestamp, seconds_between};
use occutrack_domain::warning::Warning;

use crate::decay;
use crate::pipeline::Engine;
use crate::recorder::SnapshotRecorder;
use crate::replay::HistoryReplayer;
use crate::settings::TrackerSettings;
use crate::status::{AreaDiagnosis, AreaStatus, MotionDiagnosis, SensorDiagnosis, SystemStatus};

#[derive(Debug, Clone)]
pub struct OccupancyTracker {
    layout: Layout,
    settings: TrackerSettings,
    state: TrackerState,
    recorder: SnapshotRecorder,
}

impl OccupancyTracker {
    /// Tracker with a fresh state and an empty log.
    #[must_use]
    pub fn new(layout: Layout, settings: TrackerSettings) -> Self {
        let state = TrackerState::from_layout(&layout);
        Self {
            layout,
            settings,
            state,
            recorder: SnapshotRecorder::default(),
        }
    }

    /// Tracker whose state is rebuilt by replaying a persisted log.
    #[must_use]
    pub fn from_history(
        layout: Layout,
        settings: TrackerSettings,
        snapshots: Vec<MapSnapshot>,
    ) -> Self {
        let recorder = SnapshotRecorder::from_snapshots(snapshots);
        let state = HistoryReplayer::new(&layout, &settings).rebuild(recorder.snapshots());
        tracing::info!(
            snapshots = recorder.len(),
            total_occupancy = state.total_occupancy(),
            "tracker restored from history"
        );
        Self {
            layout,
            settings,
            state,
            recorder,
        }
    }

    #[must_use]
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    #[must_use]
    pub fn settings(&self) -> &TrackerSettings {
        &self.settings
    }

    #[must_use]
    pub fn state(&self) -> &TrackerState {
        &self.state
    }

    #[must_use]
    pub fn history(&self) -> &[MapSnapshot] {
        self.recorder.snapshots()
    }

    /// Snapshots recorded after `sequence`.
    #[must_use]
    pub fn history_since(&self, sequence: u64) -> &[MapSnapshot] {
        self.recorder.since(sequence)
    }

    #[must_use]
    pub fn last_sequence(&self) -> u64 {
        self.recorder.last_sequence()
    }

    fn execute(
        &mut self,
        event: SnapshotEvent,
        timestamp: Timestamp,
    ) -> Result<Vec<Warning>, OccupancyError> {
        let engine = Engine::new(&self.layout, &self.settings);
        if let Err(err) = engine.validate(&self.state, &event, timestamp) {
            tracing::warn!(%event, error = %err, "event rejected");
            return Err(err.into());
        }
        self.recorder.record(event.clone(), &self.state, timestamp);
        let result = engine.apply(&mut self.state, &event, timestamp);
        match &result {
            Ok(_) => {
                if let Some(keep) = self.settings.history_retention {
                    self.recorder.retain_last(keep.max(1));
                }
            }
            Err(err) => {
                tracing::warn!(%event, error = %err, "event rejected");
                self.recorder.discard_last();
            }
        }
        result
    }

    /// Primary entry point: apply one sensor reading.
    ///
    /// # Errors
    ///
    /// Returns [`OccupancyError::Validation`] for an unknown sensor or an event
    /// older than the last applied one. The state and log are unchanged then.
    pub fn process_sensor_event(
        &mut self,
        sensor_id: impl Into<SensorId>,
        active: bool,
        timestamp: Timestamp,
    ) -> Result<Vec<Warning>, OccupancyError> {
        let event = SnapshotEvent::Sensor {
            sensor_id: sensor_id.into(),
            active,
        };
        self.execute(event, timestamp)
    }

    /// Run the timeout and stuck-sensor scan.
    ///
    /// # Errors
    ///
    /// Returns [`OccupancyError::Validation`] when `timestamp` is older than
    /// the last applied event.
    pub fn check_timeouts(
        &mut self,
        timestamp: Timestamp,
    ) -> Result<Vec<Warning>, OccupancyError> {
        self.execute(SnapshotEvent::TimeoutScan, timestamp)
    }

    /// Resolve one open warning. Returns `false` when no open warning has `id`.
    ///
    /// # Errors
    ///
    /// Returns [`OccupancyError::Validation`] when `timestamp` is out of order.
    pub fn resolve_warning(
        &mut self,
        id: WarningId,
        timestamp: Timestamp,
    ) -> Result<bool, OccupancyError> {
        if !self.state.warnings.open_warnings().any(|w| w.id == id) {
            return Ok(false);
        }
        self.execute(SnapshotEvent::WarningResolved { warning_id: id }, timestamp)?;
        Ok(true)
    }

    /// Resolve every open warning. Returns how many were open.
    ///
    /// # Errors
    ///
    /// Returns [`OccupancyError::Validation`] when `timestamp` is out of order.
    pub fn reset_warnings(&mut self, timestamp: Timestamp) -> Result<usize, OccupancyError> {
        let open = self.state.warnings.open_warnings().count();
        self.execute(SnapshotEvent::WarningsReset, timestamp)?;
        Ok(open)
    }

    /// Clear a sensor's unreliable flag and resolve its stuck warning.
    ///
    /// A sensor that is still active past the threshold is flagged again by
    /// the next scan.
    ///
    /// # Errors
    ///
    /// Returns [`OccupancyError::Validation`] for an unknown sensor or an
    /// out-of-order timestamp.
    pub fn reset_sensor(
        &mut self,
        sensor_id: impl Into<SensorId>,
        timestamp: Timestamp,
    ) -> Result<(), OccupancyError> {
        let event = SnapshotEvent::SensorReset {
            sensor_id: sensor_id.into(),
        };
        self.execute(event, timestamp).map(|_| ())
    }

    /// Zero occupancy and sensor mutable fields and drop all warnings.
    ///
    /// The log is kept; truncating it is a separate decision
    /// ([`OccupancyTracker::truncate_history`]).
    ///
    /// # Errors
    ///
    /// Returns [`OccupancyError::Validation`] when `timestamp` is out of order.
    pub fn reset_system(&mut self, timestamp: Timestamp) -> Result<(), OccupancyError> {
        self.execute(SnapshotEvent::SystemReset, timestamp).map(|_| ())
    }

    /// Keep only the newest `keep` snapshots. Returns how many were dropped.
    pub fn truncate_history(&mut self, keep: usize) -> usize {
        let dropped = self.recorder.retain_last(keep);
        tracing::info!(dropped, kept = self.recorder.len(), "history truncated");
        dropped
    }

    /// Replace the live state with the one rebuilt from the log.
    pub fn rebuild_from_history(&mut self) {
        self.state = HistoryReplayer::new(&self.layout, &self.settings).rebuild(self.history());
        tracing::info!(snapshots = self.recorder.len(), "state rebuilt from history");
    }

    /// Replay the log on a copy and compare with the live state.
    #[must_use]
    pub fn verify_history(&self, include_warnings: bool) -> Vec<StateDifference> {
        HistoryReplayer::new(&self.layout, &self.settings).verify(
            self.history(),
            &self.state,
            include_warnings,
        )
    }

    /// Replay the log on a copy, checking every recorded snapshot.
    #[must_use]
    pub fn verify_all_snapshots(&self) -> Vec<StateDifference> {
        HistoryReplayer::new(&self.layout, &self.settings).verify_all_snapshots(self.history())
    }

    #[must_use]
    pub fn verification_summary(&self, include_warnings: bool) -> VerificationSummary {
        VerificationSummary::from_differences(&self.verify_history(include_warnings))
    }

    pub fn open_warnings(&self) -> impl Iterator<Item = &Warning> {
        self.state.warnings.open_warnings()
    }

    pub fn all_warnings(&self) -> impl Iterator<Item = &Warning> {
        self.state.warnings.iter()
    }

    /// # Errors
    ///
    /// Returns [`OccupancyError::NotFound`] for an unknown area.
    pub fn occupancy(&self, area_id: &str) -> Result<u32, OccupancyError> {
        Ok(self.area_state(area_id)?.occupancy)
    }

    /// # Errors
    ///
    /// Returns [`OccupancyError::NotFound`] for an unknown area.
    pub fn occupancy_probability(
        &self,
        area_id: &str,
        now: Timestamp,
    ) -> Result<f64, OccupancyError> {
        let area = self.area_state(area_id)?;
        Ok(decay::occupancy_probability(area, now, self.settings.decay_rate))
    }

    /// # Errors
    ///
    /// Returns [`OccupancyError::NotFound`] for an unknown area.
    pub fn area_status(
        &self,
        area_id: &str,
        now: Timestamp,
    ) -> Result<AreaStatus, OccupancyError> {
        let area = self.area_state(area_id)?;
        let config = self.layout.area(area_id).ok_or_else(|| not_found("Area", area_id))?;
        Ok(AreaStatus {
            id: area.id.clone(),
            name: config.name.clone(),
            occupancy: area.occupancy,
            occupied: area.is_occupied(),
            probability: decay::occupancy_probability(area, now, self.settings.decay_rate),
            last_motion: area.last_motion,
            seconds_since_motion: area.last_motion.map(|at| seconds_between(now, at)),
            exit_capable: area.exit_capable,
            indoors: config.indoors,
            adjacent_areas: self
                .layout
                .adjacency()
                .neighbors(&area.id)
                .cloned()
                .collect(),
            open_warnings: self
                .state
                .warnings
                .open_warnings()
                .filter(|w| w.subject.area_id.as_ref() == Some(&area.id))
                .cloned()
                .collect(),
        })
    }

    #[must_use]
    pub fn system_status(&self, now: Timestamp) -> SystemStatus {
        SystemStatus {
            total_occupancy: self.state.total_occupancy(),
            occupied_areas: self
                .state
                .areas
                .values()
                .filter(|a| a.is_occupied())
                .map(|a| (a.id.clone(), a.occupancy))
                .collect(),
            open_warnings: self.state.warnings.open_warnings().cloned().collect(),
            unreliable_sensors: self
                .state
                .sensors
                .values()
                .filter(|s| s.unreliable)
                .map(|s| s.id.clone())
                .collect(),
            last_event_at: self.state.last_event_at,
            seconds_since_last_event: self.state.last_event_at.map(|at| seconds_between(now, at)),
            snapshot_count: self.recorder.len(),
        }
    }

    /// Explain what each sensor (or one sensor) currently contributes.
    ///
    /// # Errors
    ///
    /// Returns [`OccupancyError::NotFound`] when `sensor_id` names an unknown sensor.
    pub fn diagnose_motion_issues(
        &self,
        sensor_id: Option<&str>,
        now: Timestamp,
    ) -> Result<MotionDiagnosis, OccupancyError> {
        let sensors: Vec<_> = match sensor_id {
            Some(id) => vec![
                self.state
                    .sensors
                    .get(id)
                    .ok_or_else(|| not_found("Sensor", id))?,
            ],
            None => self.state.sensors.values().collect(),
        };

        Ok(sensors
            .into_iter()
            .map(|sensor| {
                let bridging = self
                    .layout
                    .sensor(sensor.id.as_str())
                    .is_some_and(Sensor::is_bridging);
                let areas = sensor
                    .area_ids
                    .iter()
                    .filter_map(|id| self.state.areas.get(id))
                    .map(|area| {
                        let since_motion = area.last_motion.map(|at| seconds_between(now, at));
                        AreaDiagnosis::new(area, since_motion)
                    })
                    .collect();
                let diagnosis = SensorDiagnosis {
                    sensor_id: sensor.id.clone(),
                    kind: sensor.kind,
                    is_motion_sensor: sensor.kind.is_motion(),
                    bridging,
                    active: sensor.active,
                    last_changed: sensor.last_changed,
                    seconds_active: sensor
                        .last_changed
                        .filter(|_| sensor.active)
                        .map(|at| seconds_between(now, at)),
                    unreliable: sensor.unreliable,
                    history_len: sensor.history.len(),
                    areas,
                };
                (sensor.id.clone(), diagnosis)
            })
            .collect())
    }

    fn area_state(&self, area_id: &str) -> Result<&AreaState, OccupancyError> {
        self.state
            .areas
            .get(area_id)
            .ok_or_else(|| not_found("Area", area_id))
    }
}

fn not_found(entity: &'static str, id: &str) -> OccupancyError {
    NotFoundError {
        entity,
        id: id.to_string(),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use occutrack_domain::area::Area;
    use occutrack_domain::error::ValidationError;
    use occutrack_domain::id::AreaId;
    use occutrack_domain::warning::WarningKind;
    use proptest::prelude::*;

    fn ts(secs: i64) -> Timestamp {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    const SENSORS: [&str; 5] = [
        "door_pir",
        "hall_pir",
        "kitchen_pir",
        "bedroom_pir",
        "garden_pir",
    ];

    /// `front_door - hall - kitchen - garden`, with `bedroom` off the hall.
    fn layout() -> Layout {
        Layout::builder()
            .area(Area::builder().id("front_door").exit_capable(true).build().unwrap())
            .area(Area::builder().id("hall").name("Hall").build().unwrap())
            .area(Area::builder().id("kitchen").build().unwrap())
            .area(Area::builder().id("bedroom").build().unwrap())
            .area(
                Area::builder()
                    .id("garden")
                    .exit_capable(true)
                    .indoors(false)
                    .build()
                    .unwrap(),
            )
            .adjacent("front_door", ["hall"])
            .adjacent("hall", ["kitchen", "bedroom"])
            .adjacent("kitchen", ["garden"])
            .sensor(Sensor::builder().id("door_pir").area("front_door").build().unwrap())
            .sensor(Sensor::builder().id("hall_pir").area("hall").build().unwrap())
            .sensor(Sensor::builder().id("kitchen_pir").area("kitchen").build().unwrap())
            .sensor(Sensor::builder().id("bedroom_pir").area("bedroom").build().unwrap())
            .sensor(Sensor::builder().id("garden_pir").area("garden").build().unwrap())
            .build()
            .unwrap()
    }

    fn tracker() -> OccupancyTracker {
        OccupancyTracker::new(layout(), TrackerSettings::default())
    }

    fn walk_in(tracker: &mut OccupancyTracker) {
        tracker.process_sensor_event("door_pir", true, ts(0)).unwrap();
        tracker.process_sensor_event("door_pir", false, ts(5)).unwrap();
        tracker.process_sensor_event("hall_pir", true, ts(30)).unwrap();
        tracker.process_sensor_event("hall_pir", false, ts(40)).unwrap();
    }

    fn open_kinds(tracker: &OccupancyTracker) -> Vec<WarningKind> {
        tracker.open_warnings().map(|w| w.kind).collect()
    }

    #[test]
    fn should_follow_occupant_through_the_house() {
        let mut tracker = tracker();

        walk_in(&mut tracker);
        tracker.process_sensor_event("kitchen_pir", true, ts(60)).unwrap();

        assert_eq!(tracker.occupancy("front_door").unwrap(), 0);
        assert_eq!(tracker.occupancy("hall").unwrap(), 0);
        assert_eq!(tracker.occupancy("kitchen").unwrap(), 1);
        assert_eq!(tracker.state().total_occupancy(), 1);
        assert!(tracker.open_warnings().next().is_none());
        assert_eq!(tracker.history().len(), 5);
        assert_eq!(tracker.last_sequence(), 5);
    }

    #[test]
    fn should_warn_when_motion_appears_without_source() {
        let mut tracker = tracker();

        let warnings = tracker.process_sensor_event("bedroom_pir", true, ts(0)).unwrap();

        assert_eq!(tracker.occupancy("bedroom").unwrap(), 1);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].kind, WarningKind::UnexpectedMotion);
        assert_eq!(
            warnings[0].message,
            "Unexpected motion in bedroom: no adjacent activity"
        );
    }

    #[test]
    fn should_auto_clear_entrance_and_resolve_on_new_motion() {
        let mut tracker = tracker();
        tracker.process_sensor_event("door_pir", true, ts(0)).unwrap();
        tracker.process_sensor_event("door_pir", false, ts(5)).unwrap();

        let warnings = tracker.check_timeouts(ts(305)).unwrap();

        assert_eq!(tracker.occupancy("front_door").unwrap(), 0);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].kind, WarningKind::AutoExitClear);

        tracker.process_sensor_event("door_pir", true, ts(400)).unwrap();

        assert_eq!(tracker.occupancy("front_door").unwrap(), 1);
        assert!(tracker.open_warnings().next().is_none());
    }

    #[test]
    fn should_flag_stuck_sensor_and_clear_it_on_release() {
        let mut tracker = tracker();
        walk_in(&mut tracker);
        tracker.process_sensor_event("kitchen_pir", true, ts(50)).unwrap();

        let warnings = tracker.check_timeouts(ts(350)).unwrap();

        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].kind, WarningKind::StuckSensor);
        assert!(tracker.state().sensors["kitchen_pir"].unreliable);
        assert_eq!(
            tracker.system_status(ts(350)).unreliable_sensors,
            vec![SensorId::new("kitchen_pir")]
        );

        tracker.process_sensor_event("kitchen_pir", false, ts(360)).unwrap();

        assert!(!tracker.state().sensors["kitchen_pir"].unreliable);
        assert!(tracker.open_warnings().next().is_none());
    }

    #[test]
    fn should_flag_motion_too_far_from_recent_activity() {
        let mut tracker = tracker();
        tracker.process_sensor_event("bedroom_pir", true, ts(0)).unwrap();

        let warnings = tracker.process_sensor_event("garden_pir", true, ts(5)).unwrap();

        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].kind, WarningKind::SuspiciousTransition);
        assert_eq!(warnings[0].subject.area_id, Some(AreaId::new("garden")));
        assert_eq!(tracker.occupancy("garden").unwrap(), 1);
    }

    #[test]
    fn should_reject_out_of_order_event_without_recording() {
        let mut tracker = tracker();
        tracker.process_sensor_event("door_pir", true, ts(100)).unwrap();
        let before = tracker.state().clone();

        let err = tracker
            .process_sensor_event("hall_pir", true, ts(50))
            .unwrap_err();

        assert!(matches!(
            err,
            OccupancyError::Validation(ValidationError::OutOfOrderEvent { .. })
        ));
        assert_eq!(tracker.state(), &before);
        assert_eq!(tracker.history().len(), 1);
    }

    #[test]
    fn should_reject_unknown_sensor_without_recording() {
        let mut tracker = tracker();

        let err = tracker
            .process_sensor_event("attic_pir", true, ts(0))
            .unwrap_err();

        assert!(matches!(
            err,
            OccupancyError::Validation(ValidationError::UnknownSensor(_))
        ));
        assert!(tracker.history().is_empty());
    }

    #[test]
    fn should_resolve_open_warning_once() {
        let mut tracker = tracker();
        let warnings = tracker.process_sensor_event("bedroom_pir", true, ts(0)).unwrap();
        let id = warnings[0].id;

        assert!(tracker.resolve_warning(id, ts(10)).unwrap());
        assert!(!tracker.resolve_warning(id, ts(20)).unwrap());
        assert!(tracker.open_warnings().next().is_none());
        assert_eq!(tracker.all_warnings().count(), 1);
        assert_eq!(tracker.history().len(), 2);
    }

    #[test]
    fn should_count_warnings_closed_by_reset() {
        let mut tracker = tracker();
        tracker.process_sensor_event("bedroom_pir", true, ts(0)).unwrap();
        tracker.process_sensor_event("garden_pir", true, ts(5)).unwrap();

        assert_eq!(tracker.reset_warnings(ts(10)).unwrap(), 2);
        assert!(open_kinds(&tracker).is_empty());
        assert_eq!(tracker.occupancy("bedroom").unwrap(), 1);
    }

    #[test]
    fn should_flag_reset_sensor_again_while_still_stuck() {
        let mut tracker = tracker();
        tracker.process_sensor_event("bedroom_pir", true, ts(0)).unwrap();
        tracker.check_timeouts(ts(300)).unwrap();
        assert!(tracker.state().sensors["bedroom_pir"].unreliable);

        tracker.reset_sensor("bedroom_pir", ts(301)).unwrap();

        assert!(!tracker.state().sensors["bedroom_pir"].unreliable);
        assert_eq!(open_kinds(&tracker), vec![WarningKind::UnexpectedMotion]);

        tracker.check_timeouts(ts(302)).unwrap();

        assert!(tracker.state().sensors["bedroom_pir"].unreliable);
    }

    #[test]
    fn should_zero_state_but_keep_log_on_system_reset() {
        let mut tracker = tracker();
        walk_in(&mut tracker);
        tracker.process_sensor_event("bedroom_pir", true, ts(500)).unwrap();

        tracker.reset_system(ts(600)).unwrap();

        assert_eq!(tracker.state().total_occupancy(), 0);
        assert_eq!(tracker.all_warnings().count(), 0);
        assert_eq!(tracker.state().last_event_at, Some(ts(600)));
        assert_eq!(tracker.history().len(), 6);
        assert!(tracker.verify_history(true).is_empty());
    }

    #[test]
    fn should_describe_area_status() {
        let mut tracker = tracker();
        walk_in(&mut tracker);

        let status = tracker.area_status("hall", ts(90)).unwrap();

        assert_eq!(status.name, "Hall");
        assert_eq!(status.occupancy, 1);
        assert!(status.occupied);
        assert!((status.probability - 1.0).abs() < f64::EPSILON);
        assert_eq!(status.seconds_since_motion, Some(60.0));
        assert!(!status.exit_capable);
        assert!(status.indoors);
        assert_eq!(
            status.adjacent_areas,
            vec![
                AreaId::new("bedroom"),
                AreaId::new("front_door"),
                AreaId::new("kitchen")
            ]
        );
        assert!(status.open_warnings.is_empty());
    }

    #[test]
    fn should_return_not_found_for_unknown_area() {
        let tracker = tracker();

        let err = tracker.area_status("attic", ts(0)).unwrap_err();

        assert!(matches!(err, OccupancyError::NotFound(ref e) if e.entity == "Area"));
        assert!(tracker.occupancy("attic").is_err());
        assert!(tracker.occupancy_probability("attic", ts(0)).is_err());
    }

    #[test]
    fn should_decay_probability_with_inactivity() {
        let mut tracker = tracker();
        walk_in(&mut tracker);

        let fresh = tracker.occupancy_probability("hall", ts(60)).unwrap();
        let stale = tracker.occupancy_probability("hall", ts(3_600)).unwrap();
        let empty = tracker.occupancy_probability("kitchen", ts(60)).unwrap();

        assert!((fresh - 1.0).abs() < f64::EPSILON);
        assert!(stale < 0.9 && stale >= 0.1);
        assert!(empty.abs() < f64::EPSILON);
    }

    #[test]
    fn should_summarize_system_status() {
        let mut tracker = tracker();
        walk_in(&mut tracker);
        tracker.process_sensor_event("bedroom_pir", true, ts(500)).unwrap();

        let status = tracker.system_status(ts(510));

        assert_eq!(status.total_occupancy, 2);
        assert_eq!(status.occupied_areas.len(), 2);
        assert_eq!(status.occupied_areas.get("hall"), Some(&1));
        assert_eq!(status.occupied_areas.get("bedroom"), Some(&1));
        assert_eq!(status.open_warnings.len(), 1);
        assert_eq!(status.open_warnings[0].kind, WarningKind::UnexpectedMotion);
        assert_eq!(status.last_event_at, Some(ts(500)));
        assert_eq!(status.seconds_since_last_event, Some(10.0));
        assert_eq!(status.snapshot_count, 5);
    }

    #[test]
    fn should_diagnose_single_sensor() {
        let mut tracker = tracker();
        walk_in(&mut tracker);
        tracker.process_sensor_event("kitchen_pir", true, ts(60)).unwrap();

        let diagnosis = tracker
            .diagnose_motion_issues(Some("kitchen_pir"), ts(90))
            .unwrap();

        assert_eq!(diagnosis.len(), 1);
        let kitchen = &diagnosis["kitchen_pir"];
        assert!(kitchen.active);
        assert!(kitchen.is_motion_sensor);
        assert!(!kitchen.bridging);
        assert_eq!(kitchen.seconds_active, Some(30.0));
        assert_eq!(kitchen.areas.len(), 1);
        assert_eq!(kitchen.areas[0].occupancy, 1);
    }

    #[test]
    fn should_diagnose_every_sensor_and_reject_unknown_one() {
        let tracker = tracker();

        assert_eq!(
            tracker.diagnose_motion_issues(None, ts(0)).unwrap().len(),
            SENSORS.len()
        );
        let err = tracker
            .diagnose_motion_issues(Some("attic_pir"), ts(0))
            .unwrap_err();
        assert!(matches!(err, OccupancyError::NotFound(ref e) if e.entity == "Sensor"));
    }

    #[test]
    fn should_restore_same_state_from_history() {
        let mut tracker = tracker();
        walk_in(&mut tracker);
        tracker.process_sensor_event("bedroom_pir", true, ts(500)).unwrap();
        tracker.check_timeouts(ts(900)).unwrap();

        let restored = OccupancyTracker::from_history(
            layout(),
            TrackerSettings::default(),
            tracker.history().to_vec(),
        );

        assert_eq!(restored.state(), tracker.state());
        assert_eq!(restored.last_sequence(), tracker.last_sequence());
        assert!(tracker.verify_history(true).is_empty());
        assert!(tracker.verify_all_snapshots().is_empty());
        assert!(tracker.verification_summary(true).passed);
    }

    #[test]
    fn should_verify_truncated_history() {
        let mut tracker = tracker();
        walk_in(&mut tracker);
        tracker.process_sensor_event("kitchen_pir", true, ts(60)).unwrap();

        assert_eq!(tracker.truncate_history(2), 3);
        assert_eq!(tracker.history()[0].sequence, 4);
        assert!(tracker.verify_history(false).is_empty());

        let before = tracker.state().clone();
        tracker.rebuild_from_history();
        assert_eq!(tracker.state().areas, before.areas);
    }

    #[test]
    fn should_apply_history_retention() {
        let settings = TrackerSettings {
            history_retention: Some(3),
            ..TrackerSettings::default()
        };
        let mut tracker = OccupancyTracker::new(layout(), settings);

        walk_in(&mut tracker);
        tracker.check_timeouts(ts(50)).unwrap();

        assert_eq!(tracker.history().len(), 3);
        assert_eq!(tracker.history()[0].sequence, 3);
        assert_eq!(tracker.history_since(4).len(), 1);
    }

    #[derive(Debug, Clone)]
    enum Step {
        Sensor(usize, bool),
        Scan,
    }

    fn step() -> impl Strategy<Value = (Step, i64)> {
        let action = prop_oneof![
            4 => (0..SENSORS.len(), any::<bool>()).prop_map(|(i, on)| Step::Sensor(i, on)),
            1 => Just(Step::Scan),
        ];
        (action, 0..400_i64)
    }

    proptest! {
        #[test]
        fn should_replay_any_event_sequence_to_live_state(
            steps in proptest::collection::vec(step(), 1..60),
        ) {
            let mut tracker = tracker();
            let mut now = 0;
            for (step, delay) in steps {
                now += delay;
                match step {
                    Step::Sensor(i, on) => {
                        tracker.process_sensor_event(SENSORS[i], on, ts(now)).unwrap();
                    }
                    Step::Scan => {
                        tracker.check_timeouts(ts(now)).unwrap();
                    }
                }
                let status = tracker.system_status(ts(now));
                prop_assert_eq!(
                    status.total_occupancy,
                    status.occupied_areas.values().sum::<u32>()
                );
            }

            let rebuilt = HistoryReplayer::new(tracker.layout(), tracker.settings())
                .rebuild(tracker.history());
            prop_assert_eq!(&rebuilt, tracker.state());
            prop_assert!(tracker.verify_history(true).is_empty());
            prop_assert!(tracker.verify_all_snapshots().is_empty());
        }
    }
}

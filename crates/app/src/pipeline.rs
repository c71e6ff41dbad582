//! Engine pipeline: the single path every state mutation goes through.
//!
//! Live processing and history replay both call [`Engine::apply`], so a log
//! replayed against the same layout and settings reproduces the live state.

use occutrack_domain::error::{OccupancyError, ValidationError};
use occutrack_domain::event::SensorEvent;
use occutrack_domain::layout::Layout;
use occutrack_domain::snapshot::SnapshotEvent;
use occutrack_domain::state::TrackerState;
use occutrack_domain::time::Timestamp;
use occutrack_domain::warning::{Warning, WarningKind, WarningSubject};

use crate::anomaly::AnomalyDetector;
use crate::resolver::TransitionResolver;
use crate::settings::TrackerSettings;
use crate::timeout::check_timeouts;

#[derive(Debug, Clone, Copy)]
pub struct Engine<'a> {
    layout: &'a Layout,
    settings: &'a TrackerSettings,
}

impl<'a> Engine<'a> {
    #[must_use]
    pub fn new(layout: &'a Layout, settings: &'a TrackerSettings) -> Self {
        Self { layout, settings }
    }

    /// Check that `event` can be applied to `state` at `timestamp`.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::OutOfOrderEvent`] when `timestamp` precedes
    /// the last applied timestamp, and [`ValidationError::UnknownSensor`] when
    /// the event names a sensor the state does not know.
    pub fn validate(
        &self,
        state: &TrackerState,
        event: &SnapshotEvent,
        timestamp: Timestamp,
    ) -> Result<(), ValidationError> {
        if let Some(last_applied) = state.last_event_at
            && timestamp < last_applied
        {
            return Err(ValidationError::OutOfOrderEvent {
                received: timestamp,
                last_applied,
            });
        }
        if let Some(sensor_id) = event.sensor_id()
            && !state.sensors.contains_key(sensor_id)
        {
            return Err(ValidationError::UnknownSensor(sensor_id.to_string()));
        }
        Ok(())
    }

    /// Validate and apply one logged event. Returns the warnings it opened.
    ///
    /// # Errors
    ///
    /// Returns [`OccupancyError::Validation`] as described in [`Engine::validate`];
    /// the state is untouched on error.
    pub fn apply(
        &self,
        state: &mut TrackerState,
        event: &SnapshotEvent,
        timestamp: Timestamp,
    ) -> Result<Vec<Warning>, OccupancyError> {
        self.validate(state, event, timestamp)?;
        let detector = AnomalyDetector::new(self.layout, self.settings);

        let warnings = match event {
            SnapshotEvent::Sensor { sensor_id, active } => {
                let event = SensorEvent::new(sensor_id.clone(), *active, timestamp);
                let resolution =
                    TransitionResolver::new(self.layout, self.settings).resolve(state, &event)?;
                let mut warnings = resolution.warnings.clone();
                for area_id in resolution.motion_areas() {
                    warnings.extend(detector.check_simultaneous_motion(state, area_id, timestamp));
                }
                warnings.extend(detector.scan_stuck_sensors(state, timestamp));
                warnings
            }
            SnapshotEvent::TimeoutScan => {
                let mut warnings = check_timeouts(state, self.settings, timestamp);
                warnings.extend(detector.scan_stuck_sensors(state, timestamp));
                warnings
            }
            SnapshotEvent::WarningResolved { warning_id } => {
                state.warnings.resolve(*warning_id, timestamp);
                Vec::new()
            }
            SnapshotEvent::WarningsReset => {
                let resolved = state.warnings.resolve_all(timestamp);
                tracing::info!(resolved, "open warnings reset");
                Vec::new()
            }
            SnapshotEvent::SensorReset { sensor_id } => {
                if let Some(sensor) = state.sensors.get_mut(sensor_id) {
                    sensor.unreliable = false;
                }
                state.warnings.resolve_matching(
                    WarningKind::StuckSensor,
                    &WarningSubject::sensor(sensor_id.clone()),
                    timestamp,
                );
                Vec::new()
            }
            SnapshotEvent::SystemReset => {
                state.reset();
                tracing::info!("system reset");
                Vec::new()
            }
        };

        state.last_event_at = Some(timestamp);
        Ok(warnings)
    }
}

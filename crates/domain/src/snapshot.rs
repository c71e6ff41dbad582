//! Snapshot: immutable record of the map immediately before an event.
//!
//! The recorder appends one [`MapSnapshot`] per applied event, scan, or
//! operator action. Together they form an append-only log that can be
//! replayed to rebuild, and verify, the live state.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::area::AreaState;
use crate::event::SensorEvent;
use crate::id::{AreaId, SensorId, WarningId};
use crate::sensor::SensorState;
use crate::state::TrackerState;
use crate::time::Timestamp;
use crate::warning::WarningLog;

/// What was applied after the snapshot was taken.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SnapshotEvent {
    /// A sensor reading.
    Sensor { sensor_id: SensorId, active: bool },
    /// A periodic timeout and anomaly scan.
    TimeoutScan,
    /// An operator resolved one warning.
    WarningResolved { warning_id: WarningId },
    /// An operator cleared every open warning.
    WarningsReset,
    /// An operator cleared a sensor's unreliable flag.
    SensorReset { sensor_id: SensorId },
    /// An operator reset the whole system.
    SystemReset,
}

impl SnapshotEvent {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sensor { .. } => "sensor",
            Self::TimeoutScan => "timeout_scan",
            Self::WarningResolved { .. } => "warning_resolved",
            Self::WarningsReset => "warnings_reset",
            Self::SensorReset { .. } => "sensor_reset",
            Self::SystemReset => "system_reset",
        }
    }

    /// Sensor concerned by the event, if any.
    #[must_use]
    pub fn sensor_id(&self) -> Option<&SensorId> {
        match self {
            Self::Sensor { sensor_id, .. } | Self::SensorReset { sensor_id } => Some(sensor_id),
            _ => None,
        }
    }

    /// Reported sensor state, for sensor readings only.
    #[must_use]
    pub fn new_state(&self) -> Option<bool> {
        match self {
            Self::Sensor { active, .. } => Some(*active),
            _ => None,
        }
    }
}

impl From<&SensorEvent> for SnapshotEvent {
    fn from(event: &SensorEvent) -> Self {
        Self::Sensor {
            sensor_id: event.sensor_id.clone(),
            active: event.active,
        }
    }
}

impl std::fmt::Display for SnapshotEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sensor { sensor_id, active } => {
                let state = if *active { "on" } else { "off" };
                write!(f, "sensor:{sensor_id}:{state}")
            }
            Self::WarningResolved { warning_id } => write!(f, "warning_resolved:{warning_id}"),
            Self::SensorReset { sensor_id } => write!(f, "sensor_reset:{sensor_id}"),
            other => f.write_str(other.as_str()),
        }
    }
}

/// Pre-event copy of the map. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapSnapshot {
    /// Starts at 1, strictly increasing.
    pub sequence: u64,
    pub timestamp: Timestamp,
    pub event: SnapshotEvent,
    pub areas_before: BTreeMap<AreaId, AreaState>,
    pub sensors_before: BTreeMap<SensorId, SensorState>,
}

impl MapSnapshot {
    /// Deep-copy the map part of `state`.
    #[must_use]
    pub fn capture(
        sequence: u64,
        timestamp: Timestamp,
        event: SnapshotEvent,
        state: &TrackerState,
    ) -> Self {
        Self {
            sequence,
            timestamp,
            event,
            areas_before: state.areas.clone(),
            sensors_before: state.sensors.clone(),
        }
    }

    /// Rehydrate a state handle from the recorded copy. Warnings are not
    /// part of a snapshot and start empty.
    #[must_use]
    pub fn state_before(&self) -> TrackerState {
        TrackerState {
            areas: self.areas_before.clone(),
            sensors: self.sensors_before.clone(),
            warnings: WarningLog::default(),
            last_event_at: None,
        }
    }
}

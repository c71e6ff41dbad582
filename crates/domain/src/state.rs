//! Tracker state: the single mutable handle the engine operates on.
//!
//! The caller owns it and lends it `&mut` to the engine for the duration of
//! one event or scan. Collections are ordered by id so that iteration order
//! never depends on hashing.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::area::AreaState;
use crate::id::{AreaId, SensorId};
use crate::layout::Layout;
use crate::sensor::SensorState;
use crate::time::Timestamp;
use crate::warning::WarningLog;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerState {
    pub areas: BTreeMap<AreaId, AreaState>,
    pub sensors: BTreeMap<SensorId, SensorState>,
    pub warnings: WarningLog,
    /// Timestamp of the last applied event or scan.
    pub last_event_at: Option<Timestamp>,
}

impl TrackerState {
    /// Fresh state for every area and sensor of `layout`.
    #[must_use]
    pub fn from_layout(layout: &Layout) -> Self {
        Self {
            areas: layout
                .areas()
                .map(|area| (area.id.clone(), AreaState::new(area)))
                .collect(),
            sensors: layout
                .sensors()
                .map(|sensor| (sensor.id.clone(), SensorState::new(sensor)))
                .collect(),
            warnings: WarningLog::default(),
            last_event_at: None,
        }
    }

    /// Zero occupancy and sensor mutable fields, drop all warnings.
    pub fn reset(&mut self) {
        self.areas.values_mut().for_each(AreaState::reset);
        self.sensors.values_mut().for_each(SensorState::reset);
        self.warnings.clear();
        self.last_event_at = None;
    }

    #[must_use]
    pub fn total_occupancy(&self) -> u32 {
        self.areas.values().map(|a| a.occupancy).sum()
    }
}

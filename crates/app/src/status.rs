//! Read-only projections of the tracker state for operators and automations.

use std::collections::BTreeMap;

use serde::Serialize;

use occutrack_domain::area::AreaState;
use occutrack_domain::id::{AreaId, SensorId};
use occutrack_domain::sensor::SensorKind;
use occutrack_domain::time::Timestamp;
use occutrack_domain::warning::Warning;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AreaStatus {
    pub id: AreaId,
    pub name: String,
    pub occupancy: u32,
    pub occupied: bool,
    pub probability: f64,
    pub last_motion: Option<Timestamp>,
    pub seconds_since_motion: Option<f64>,
    pub exit_capable: bool,
    pub indoors: bool,
    pub adjacent_areas: Vec<AreaId>,
    pub open_warnings: Vec<Warning>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SystemStatus {
    pub total_occupancy: u32,
    pub occupied_areas: BTreeMap<AreaId, u32>,
    pub open_warnings: Vec<Warning>,
    pub unreliable_sensors: Vec<SensorId>,
    pub last_event_at: Option<Timestamp>,
    pub seconds_since_last_event: Option<f64>,
    pub snapshot_count: usize,
}

/// Area as seen from one of its sensors.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AreaDiagnosis {
    pub area_id: AreaId,
    pub occupancy: u32,
    pub last_motion: Option<Timestamp>,
    pub seconds_since_motion: Option<f64>,
    pub recent_deactivations: usize,
}

impl AreaDiagnosis {
    pub(crate) fn new(area: &AreaState, seconds_since_motion: Option<f64>) -> Self {
        Self {
            area_id: area.id.clone(),
            occupancy: area.occupancy,
            last_motion: area.last_motion,
            seconds_since_motion,
            recent_deactivations: area.deactivations.len(),
        }
    }
}

/// Why a sensor may or may not be producing occupancy.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorDiagnosis {
    pub sensor_id: SensorId,
    pub kind: SensorKind,
    pub is_motion_sensor: bool,
    pub bridging: bool,
    pub active: bool,
    pub last_changed: Option<Timestamp>,
    pub seconds_active: Option<f64>,
    pub unreliable: bool,
    pub history_len: usize,
    pub areas: Vec<AreaDiagnosis>,
}

/// Diagnoses keyed by sensor id.
pub type MotionDiagnosis = BTreeMap<SensorId, SensorDiagnosis>;

//! State differences: diagnostic output of history verification.
//!
//! A [`StateDifference`] says that one field of one area, sensor, or the
//! warning set holds a different value in the recorded state than in the
//! state rebuilt by replay. Differences are never stored as domain state.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::area::AreaState;
use crate::id::{AreaId, SensorId};
use crate::sensor::SensorState;
use crate::time::Timestamp;
use crate::warning::{WarningKind, WarningLog, WarningSubject};

/// Which field diverged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DifferenceField {
    /// The entity exists on one side only.
    Missing,
    Occupancy,
    LastMotion,
    Deactivations,
    SensorActive,
    LastChanged,
    Unreliable,
    OpenWarning,
}

impl DifferenceField {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Missing => "missing",
            Self::Occupancy => "occupancy",
            Self::LastMotion => "last_motion",
            Self::Deactivations => "deactivations",
            Self::SensorActive => "sensor_active",
            Self::LastChanged => "last_changed",
            Self::Unreliable => "unreliable",
            Self::OpenWarning => "open_warning",
        }
    }
}

impl std::fmt::Display for DifferenceField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point of the log a comparison was made at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Sequence of the snapshot compared against, or of the last replayed
    /// snapshot when comparing final states.
    pub sequence: u64,
    pub timestamp: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateDifference {
    pub checkpoint: Option<Checkpoint>,
    pub field: DifferenceField,
    pub area_id: Option<AreaId>,
    pub sensor_id: Option<SensorId>,
    pub recorded: Value,
    pub replayed: Value,
}

impl std::fmt::Display for StateDifference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(checkpoint) = &self.checkpoint {
            write!(f, "[{}] ", checkpoint.sequence)?;
        }
        let location = match (&self.area_id, &self.sensor_id) {
            (Some(area), _) => area.as_str(),
            (None, Some(sensor)) => sensor.as_str(),
            (None, None) => "system",
        };
        write!(
            f,
            "{} mismatch in {location}: recorded={}, replayed={}",
            self.field, self.recorded, self.replayed
        )
    }
}

/// Compare two copies of the area and sensor maps field by field.
///
/// Entities are visited in id order, so the output is deterministic.
#[must_use]
pub fn compare_maps(
    checkpoint: Option<Checkpoint>,
    recorded_areas: &BTreeMap<AreaId, AreaState>,
    recorded_sensors: &BTreeMap<SensorId, SensorState>,
    replayed_areas: &BTreeMap<AreaId, AreaState>,
    replayed_sensors: &BTreeMap<SensorId, SensorState>,
) -> Vec<StateDifference> {
    let mut out = Vec::new();

    let area_ids: BTreeSet<&AreaId> = recorded_areas.keys().chain(replayed_areas.keys()).collect();
    for id in area_ids {
        let area = |field, recorded, replayed| StateDifference {
            checkpoint,
            field,
            area_id: Some(id.clone()),
            sensor_id: None,
            recorded,
            replayed,
        };
        match (recorded_areas.get(id), replayed_areas.get(id)) {
            (Some(rec), Some(rep)) => {
                if rec.occupancy != rep.occupancy {
                    out.push(area(
                        DifferenceField::Occupancy,
                        json!(rec.occupancy),
                        json!(rep.occupancy),
                    ));
                }
                if rec.last_motion != rep.last_motion {
                    out.push(area(
                        DifferenceField::LastMotion,
                        json!(rec.last_motion),
                        json!(rep.last_motion),
                    ));
                }
                if rec.deactivations != rep.deactivations {
                    out.push(area(
                        DifferenceField::Deactivations,
                        json!(rec.deactivations),
                        json!(rep.deactivations),
                    ));
                }
            }
            (rec, rep) => out.push(area(
                DifferenceField::Missing,
                json!(rec.is_some()),
                json!(rep.is_some()),
            )),
        }
    }

    let sensor_ids: BTreeSet<&SensorId> = recorded_sensors
        .keys()
        .chain(replayed_sensors.keys())
        .collect();
    for id in sensor_ids {
        let sensor = |field, recorded, replayed| StateDifference {
            checkpoint,
            field,
            area_id: None,
            sensor_id: Some(id.clone()),
            recorded,
            replayed,
        };
        match (recorded_sensors.get(id), replayed_sensors.get(id)) {
            (Some(rec), Some(rep)) => {
                if rec.active != rep.active {
                    out.push(sensor(
                        DifferenceField::SensorActive,
                        json!(rec.active),
                        json!(rep.active),
                    ));
                }
                if rec.last_changed != rep.last_changed {
                    out.push(sensor(
                        DifferenceField::LastChanged,
                        json!(rec.last_changed),
                        json!(rep.last_changed),
                    ));
                }
                if rec.unreliable != rep.unreliable {
                    out.push(sensor(
                        DifferenceField::Unreliable,
                        json!(rec.unreliable),
                        json!(rep.unreliable),
                    ));
                }
            }
            (rec, rep) => out.push(sensor(
                DifferenceField::Missing,
                json!(rec.is_some()),
                json!(rep.is_some()),
            )),
        }
    }

    out
}

/// Compare the sets of open warnings, keyed by kind and subject.
///
/// Ids and messages are not compared: only whether the same conditions are open.
#[must_use]
pub fn compare_open_warnings(
    checkpoint: Option<Checkpoint>,
    recorded: &WarningLog,
    replayed: &WarningLog,
) -> Vec<StateDifference> {
    let keys = |log: &WarningLog| -> BTreeSet<(WarningKind, WarningSubject)> {
        log.open_warnings()
            .map(|w| (w.kind, w.subject.clone()))
            .collect()
    };
    let recorded = keys(recorded);
    let replayed = keys(replayed);

    recorded
        .symmetric_difference(&replayed)
        .map(|(kind, subject)| StateDifference {
            checkpoint,
            field: DifferenceField::OpenWarning,
            area_id: subject.area_id.clone(),
            sensor_id: subject.sensor_id.clone(),
            recorded: json!(recorded.contains(&(*kind, subject.clone())).then_some(kind)),
            replayed: json!(replayed.contains(&(*kind, subject.clone())).then_some(kind)),
        })
        .collect()
}

/// Aggregated view over a verification run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationSummary {
    pub total_differences: usize,
    pub passed: bool,
    pub by_field: BTreeMap<DifferenceField, usize>,
    pub affected_areas: BTreeSet<AreaId>,
    pub affected_sensors: BTreeSet<SensorId>,
}

impl VerificationSummary {
    #[must_use]
    pub fn from_differences(differences: &[StateDifference]) -> Self {
        let mut summary = Self {
            total_differences: differences.len(),
            passed: differences.is_empty(),
            ..Self::default()
        };
        for diff in differences {
            *summary.by_field.entry(diff.field).or_default() += 1;
            if let Some(area_id) = &diff.area_id {
                summary.affected_areas.insert(area_id.clone());
            }
            if let Some(sensor_id) = &diff.sensor_id {
                summary.affected_sensors.insert(sensor_id.clone());
            }
        }
        summary
    }
}

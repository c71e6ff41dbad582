//! Sensor: a binary presence source reporting into one or more areas.

use std::collections::{BTreeSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::error::{OccupancyError, ValidationError};
use crate::id::{AreaId, SensorId};
use crate::time::Timestamp;

/// Number of readings retained per sensor.
pub const SENSOR_HISTORY_LEN: usize = 10;

/// Kind of binary sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorKind {
    Motion,
    Magnetic,
    CameraMotion,
    CameraPerson,
}

impl SensorKind {
    /// Motion-style sensors (PIR and camera detections), as opposed to contacts.
    #[must_use]
    pub fn is_motion(self) -> bool {
        matches!(self, Self::Motion | Self::CameraMotion | Self::CameraPerson)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Motion => "motion",
            Self::Magnetic => "magnetic",
            Self::CameraMotion => "camera_motion",
            Self::CameraPerson => "camera_person",
        }
    }
}

impl std::fmt::Display for SensorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A configured sensor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sensor {
    pub id: SensorId,
    pub kind: SensorKind,
    pub area_ids: BTreeSet<AreaId>,
}

impl Sensor {
    /// Create a builder for constructing a [`Sensor`].
    #[must_use]
    pub fn builder() -> SensorBuilder {
        SensorBuilder::default()
    }

    /// A sensor that reports into more than one area, e.g. a door contact.
    #[must_use]
    pub fn is_bridging(&self) -> bool {
        self.kind == SensorKind::Magnetic || self.area_ids.len() > 1
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`OccupancyError::Validation`] when:
    /// - `id` is empty ([`ValidationError::EmptyId`])
    /// - no area is mapped ([`ValidationError::SensorWithoutArea`])
    pub fn validate(&self) -> Result<(), OccupancyError> {
        if self.id.as_str().trim().is_empty() {
            return Err(ValidationError::EmptyId.into());
        }
        if self.area_ids.is_empty() {
            return Err(ValidationError::SensorWithoutArea(self.id.to_string()).into());
        }
        Ok(())
    }
}

/// Step-by-step builder for [`Sensor`].
#[derive(Debug, Default)]
pub struct SensorBuilder {
    id: Option<SensorId>,
    kind: Option<SensorKind>,
    area_ids: BTreeSet<AreaId>,
}

impl SensorBuilder {
    #[must_use]
    pub fn id(mut self, id: impl Into<SensorId>) -> Self {
        self.id = Some(id.into());
        self
    }

    #[must_use]
    pub fn kind(mut self, kind: SensorKind) -> Self {
        self.kind = Some(kind);
        self
    }

    #[must_use]
    pub fn area(mut self, area_id: impl Into<AreaId>) -> Self {
        self.area_ids.insert(area_id.into());
        self
    }

    /// Consume the builder, validate, and return a [`Sensor`].
    ///
    /// The kind defaults to [`SensorKind::Motion`].
    ///
    /// # Errors
    ///
    /// Returns [`OccupancyError::Validation`] if the id is missing or no area is mapped.
    pub fn build(self) -> Result<Sensor, OccupancyError> {
        let sensor = Sensor {
            id: self.id.unwrap_or_else(|| SensorId::new("")),
            kind: self.kind.unwrap_or(SensorKind::Motion),
            area_ids: self.area_ids,
        };
        sensor.validate()?;
        Ok(sensor)
    }
}

/// One reported reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorReading {
    pub active: bool,
    pub timestamp: Timestamp,
}

/// Mutable runtime state of one sensor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorState {
    pub id: SensorId,
    pub kind: SensorKind,
    pub active: bool,
    /// Last time `active` flipped. `None` until the first transition.
    pub last_changed: Option<Timestamp>,
    pub area_ids: BTreeSet<AreaId>,
    pub unreliable: bool,
    /// Newest last; never longer than [`SENSOR_HISTORY_LEN`].
    pub history: VecDeque<SensorReading>,
}

impl SensorState {
    /// Fresh, inactive state for a configured sensor.
    #[must_use]
    pub fn new(sensor: &Sensor) -> Self {
        Self {
            id: sensor.id.clone(),
            kind: sensor.kind,
            active: false,
            last_changed: None,
            area_ids: sensor.area_ids.clone(),
            unreliable: false,
            history: VecDeque::with_capacity(SENSOR_HISTORY_LEN),
        }
    }

    /// Apply a reading. Returns whether the boolean state actually changed.
    pub fn update(&mut self, active: bool, timestamp: Timestamp) -> bool {
        self.history.push_back(SensorReading { active, timestamp });
        while self.history.len() > SENSOR_HISTORY_LEN {
            self.history.pop_front();
        }
        if self.active == active {
            return false;
        }
        self.active = active;
        self.last_changed = Some(timestamp);
        true
    }

    /// How long the sensor has been continuously active, `None` when inactive.
    #[must_use]
    pub fn active_for(&self, now: Timestamp) -> Option<chrono::TimeDelta> {
        if !self.active {
            return None;
        }
        self.last_changed.map(|since| now - since)
    }

    /// Reinitialize mutable fields, keeping identity, kind and area mapping.
    pub fn reset(&mut self) {
        self.active = false;
        self.last_changed = None;
        self.unreliable = false;
        self.history.clear();
    }
}

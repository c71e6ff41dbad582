//! Event: one binary sensor reading delivered to the engine.

use serde::{Deserialize, Serialize};

use crate::id::SensorId;
use crate::time::Timestamp;

/// A sensor reported `active` at `timestamp`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorEvent {
    pub sensor_id: SensorId,
    pub active: bool,
    pub timestamp: Timestamp,
}

impl SensorEvent {
    #[must_use]
    pub fn new(sensor_id: impl Into<SensorId>, active: bool, timestamp: Timestamp) -> Self {
        Self {
            sensor_id: sensor_id.into(),
            active,
            timestamp,
        }
    }
}

impl std::fmt::Display for SensorEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = if self.active { "on" } else { "off" };
        write!(f, "sensor:{}:{state}", self.sensor_id)
    }
}

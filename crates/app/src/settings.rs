//! Engine tuning knobs.
//!
//! Every threshold the resolver, timeout engine and anomaly detector use is
//! read from [`TrackerSettings`]. Durations are whole seconds so the struct
//! maps directly onto the `[engine]` table of the configuration file.

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};

use occutrack_domain::time::secs;

const DEFAULT_ACTIVITY_WINDOW_SECS: u64 = 120;
const DEFAULT_EXIT_TIMEOUT_SECS: u64 = 300;
const DEFAULT_EXTENDED_OCCUPANCY_SECS: u64 = 12 * 3600;
const DEFAULT_HARD_RESET_SECS: u64 = 24 * 3600;
const DEFAULT_STUCK_SENSOR_SECS: u64 = 300;
const DEFAULT_SIMULTANEITY_WINDOW_SECS: u64 = 10;
const DEFAULT_MAX_PLAUSIBLE_HOPS: usize = 2;
const DEFAULT_DECAY_RATE: f64 = 0.000_21;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerSettings {
    /// How recent neighbour motion or deactivation must be to explain an entry.
    pub activity_window_secs: u64,
    /// Inactivity after which an exit-capable area is emptied.
    pub exit_timeout_secs: u64,
    /// Inactivity after which an occupied area gets an `extended_occupancy` warning.
    pub extended_occupancy_secs: u64,
    /// Inactivity after which an occupied area is forcibly emptied.
    pub hard_reset_secs: u64,
    /// Continuous activation after which a sensor is considered stuck.
    pub stuck_sensor_secs: u64,
    /// Two motions closer than this are treated as simultaneous.
    pub simultaneity_window_secs: u64,
    /// Simultaneous motion further apart than this many hops is suspicious.
    pub max_plausible_hops: usize,
    /// Exponential decay rate of the occupancy probability, per second.
    pub decay_rate: f64,
    /// Keep only this many snapshots in memory. `None` keeps everything.
    pub history_retention: Option<usize>,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            activity_window_secs: DEFAULT_ACTIVITY_WINDOW_SECS,
            exit_timeout_secs: DEFAULT_EXIT_TIMEOUT_SECS,
            extended_occupancy_secs: DEFAULT_EXTENDED_OCCUPANCY_SECS,
            hard_reset_secs: DEFAULT_HARD_RESET_SECS,
            stuck_sensor_secs: DEFAULT_STUCK_SENSOR_SECS,
            simultaneity_window_secs: DEFAULT_SIMULTANEITY_WINDOW_SECS,
            max_plausible_hops: DEFAULT_MAX_PLAUSIBLE_HOPS,
            decay_rate: DEFAULT_DECAY_RATE,
            history_retention: None,
        }
    }
}

impl TrackerSettings {
    #[must_use]
    pub fn activity_window(&self) -> TimeDelta {
        secs(self.activity_window_secs)
    }

    #[must_use]
    pub fn exit_timeout(&self) -> TimeDelta {
        secs(self.exit_timeout_secs)
    }

    #[must_use]
    pub fn extended_occupancy(&self) -> TimeDelta {
        secs(self.extended_occupancy_secs)
    }

    #[must_use]
    pub fn hard_reset(&self) -> TimeDelta {
        secs(self.hard_reset_secs)
    }

    #[must_use]
    pub fn stuck_sensor(&self) -> TimeDelta {
        secs(self.stuck_sensor_secs)
    }

    #[must_use]
    pub fn simultaneity_window(&self) -> TimeDelta {
        secs(self.simultaneity_window_secs)
    }
}

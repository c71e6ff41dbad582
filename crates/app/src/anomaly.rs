//! Anomaly detector: scanning passes over the state.
//!
//! The detector observes; it never changes occupancy. It may flag sensors as
//! unreliable and open warnings.

use occutrack_domain::id::AreaId;
use occutrack_domain::layout::Layout;
use occutrack_domain::state::TrackerState;
use occutrack_domain::time::{Timestamp, seconds_between};
use occutrack_domain::warning::{Warning, WarningKind, WarningSubject};

use crate::settings::TrackerSettings;

#[derive(Debug, Clone, Copy)]
pub struct AnomalyDetector<'a> {
    layout: &'a Layout,
    settings: &'a TrackerSettings,
}

impl<'a> AnomalyDetector<'a> {
    #[must_use]
    pub fn new(layout: &'a Layout, settings: &'a TrackerSettings) -> Self {
        Self { layout, settings }
    }

    /// Flag every sensor active for at least the stuck threshold.
    ///
    /// Sensors already flagged are skipped, so repeated scans open nothing new.
    pub fn scan_stuck_sensors(&self, state: &mut TrackerState, now: Timestamp) -> Vec<Warning> {
        let threshold = self.settings.stuck_sensor();
        let mut warnings = Vec::new();
        for sensor in state.sensors.values_mut() {
            if sensor.unreliable {
                continue;
            }
            let Some(active_for) = sensor.active_for(now) else {
                continue;
            };
            if active_for < threshold {
                continue;
            }
            sensor.unreliable = true;
            let areas = sensor
                .area_ids
                .iter()
                .map(AreaId::as_str)
                .collect::<Vec<_>>()
                .join(", ");
            let message = format!(
                "Sensor {} in {areas} may be stuck: active for {}s",
                sensor.id,
                active_for.num_seconds()
            );
            if let Some(warning) = state.warnings.open(
                WarningKind::StuckSensor,
                WarningSubject::sensor(sensor.id.clone()),
                message,
                now,
            ) {
                tracing::warn!(sensor = %sensor.id, %warning, "sensor marked unreliable");
                warnings.push(warning);
            }
        }
        warnings
    }

    /// Check motion in `trigger` against motion elsewhere inside the
    /// simultaneity window. Areas further apart than the hop limit cannot be
    /// explained by a single occupant and yield a `suspicious_transition`.
    pub fn check_simultaneous_motion(
        &self,
        state: &mut TrackerState,
        trigger: &AreaId,
        now: Timestamp,
    ) -> Vec<Warning> {
        let window = self.settings.simultaneity_window();
        let graph = self.layout.adjacency();
        let distant: Vec<String> = state
            .areas
            .values()
            .filter(|area| &area.id != trigger && area.has_recent_motion(now, window))
            .filter(|area| !graph.within_hops(trigger, &area.id, self.settings.max_plausible_hops))
            .map(|area| {
                let age = area.last_motion.map_or(0.0, |at| seconds_between(now, at));
                format!("{} ({age:.0}s ago)", area.id)
            })
            .collect();
        if distant.is_empty() {
            return Vec::new();
        }

        let message = format!(
            "Motion in {trigger} while non-adjacent areas were active: {}",
            distant.join(", ")
        );
        state
            .warnings
            .open(
                WarningKind::SuspiciousTransition,
                WarningSubject::area(trigger.clone()),
                message,
                now,
            )
            .inspect(|warning| tracing::warn!(area = %trigger, %warning, "suspicious transition"))
            .into_iter()
            .collect()
    }
}

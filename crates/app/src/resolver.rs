//! Transition resolver: turns one sensor reading into occupancy changes.
//!
//! The resolver is a pure function of the layout, the settings, the mutable
//! [`TrackerState`] and the event: the event timestamp is the only clock.
//!
//! ## Motion on, per target area `T`
//! 1. `T` already occupied: refresh `T.last_motion`.
//! 2. Otherwise look for a *qualifying* neighbour `N` (occupied, with motion or
//!    a deactivation inside the activity window). The one with the most recent
//!    activity wins, ties broken by the smallest area id, and one occupant
//!    moves from `N` to `T`.
//! 3. No qualifying neighbour and `T` is exit-capable: someone entered.
//! 4. Otherwise the occupant is added anyway and an `unexpected_motion`
//!    warning is opened for `T`.
//!
//! ## Motion off, per target area
//! Occupancy is untouched; the deactivation is pushed into the area history.
//!
//! Bridging sensors fan the same logic out to every mapped area in id order.

use occutrack_domain::error::{OccupancyError, ValidationError};
use occutrack_domain::event::SensorEvent;
use occutrack_domain::id::AreaId;
use occutrack_domain::layout::Layout;
use occutrack_domain::state::TrackerState;
use occutrack_domain::time::{Timestamp, seconds_between};
use occutrack_domain::warning::{Warning, WarningKind, WarningSubject};

use crate::settings::TrackerSettings;

/// What happened to one target area.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Area was already occupied; motion refreshed.
    Refreshed,
    /// One occupant moved in from a neighbour.
    Moved { from: AreaId },
    /// One occupant entered from outside through an exit-capable area.
    Entered,
    /// Occupant added without a plausible source.
    Unexpected,
    /// Sensor turned off; deactivation recorded.
    Deactivated,
}

/// Result of resolving one event.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub transitions: Vec<(AreaId, Transition)>,
    pub warnings: Vec<Warning>,
}

impl Resolution {
    /// Areas that received motion.
    pub fn motion_areas(&self) -> impl Iterator<Item = &AreaId> {
        self.transitions
            .iter()
            .filter(|(_, t)| *t != Transition::Deactivated)
            .map(|(area_id, _)| area_id)
    }
}

/// Resolver bound to a layout and settings.
#[derive(Debug, Clone, Copy)]
pub struct TransitionResolver<'a> {
    layout: &'a Layout,
    settings: &'a TrackerSettings,
}

impl<'a> TransitionResolver<'a> {
    #[must_use]
    pub fn new(layout: &'a Layout, settings: &'a TrackerSettings) -> Self {
        Self { layout, settings }
    }

    /// Apply `event` to `state`.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::UnknownSensor`] when the sensor is not part
    /// of the state. The state is left untouched in that case.
    pub fn resolve(
        &self,
        state: &mut TrackerState,
        event: &SensorEvent,
    ) -> Result<Resolution, OccupancyError> {
        let sensor = state
            .sensors
            .get_mut(&event.sensor_id)
            .ok_or_else(|| ValidationError::UnknownSensor(event.sensor_id.to_string()))?;

        sensor.update(event.active, event.timestamp);
        let targets: Vec<AreaId> = sensor.area_ids.iter().cloned().collect();

        let mut resolution = Resolution::default();
        if event.active {
            for area_id in targets {
                let transition = self.motion_on(state, &area_id, event.timestamp, &mut resolution);
                resolution.transitions.push((area_id, transition));
            }
        } else {
            if let Some(sensor) = state.sensors.get_mut(&event.sensor_id) {
                sensor.unreliable = false;
            }
            state.warnings.resolve_matching(
                WarningKind::StuckSensor,
                &WarningSubject::sensor(event.sensor_id.clone()),
                event.timestamp,
            );
            for area_id in targets {
                if let Some(area) = state.areas.get_mut(&area_id) {
                    area.record_deactivation(event.timestamp);
                    tracing::debug!(area = %area_id, "deactivation recorded");
                    resolution.transitions.push((area_id, Transition::Deactivated));
                }
            }
        }
        Ok(resolution)
    }

    fn motion_on(
        &self,
        state: &mut TrackerState,
        area_id: &AreaId,
        now: Timestamp,
        resolution: &mut Resolution,
    ) -> Transition {
        let Some(target) = state.areas.get(area_id) else {
            return Transition::Refreshed;
        };
        let occupied = target.is_occupied();
        let exit_capable = target.exit_capable;

        let transition = if occupied {
            Transition::Refreshed
        } else if let Some(source) = self.qualifying_neighbor(state, area_id, now) {
            if let Some(neighbor) = state.areas.get_mut(&source) {
                neighbor.record_exit();
            }
            tracing::info!(from = %source, to = %area_id, "occupant moved");
            Transition::Moved { from: source }
        } else if exit_capable {
            tracing::info!(area = %area_id, "occupant entered from outside");
            Transition::Entered
        } else {
            let message = self.unexpected_motion_message(state, area_id, now);
            if let Some(warning) = state.warnings.open(
                WarningKind::UnexpectedMotion,
                WarningSubject::area(area_id.clone()),
                message,
                now,
            ) {
                tracing::warn!(area = %area_id, %warning, "unexpected motion");
                resolution.warnings.push(warning);
            }
            Transition::Unexpected
        };

        if let Some(target) = state.areas.get_mut(area_id) {
            if occupied {
                target.record_motion(now);
            } else {
                target.record_entry(now);
            }
        }

        let subject = WarningSubject::area(area_id.clone());
        for kind in [
            WarningKind::ExtendedOccupancy,
            WarningKind::AutoExitClear,
            WarningKind::HardReset,
        ] {
            state.warnings.resolve_matching(kind, &subject, now);
        }

        tracing::debug!(area = %area_id, ?transition, "motion resolved");
        transition
    }

    /// Occupied neighbour with activity inside the window, most recent first,
    /// then smallest id.
    fn qualifying_neighbor(
        &self,
        state: &TrackerState,
        area_id: &AreaId,
        now: Timestamp,
    ) -> Option<AreaId> {
        let window = self.settings.activity_window();
        self.layout
            .adjacency()
            .neighbors(area_id)
            .filter_map(|id| state.areas.get(id))
            .filter(|n| {
                n.is_occupied()
                    && (n.has_recent_motion(now, window) || n.has_recent_deactivation(now, window))
            })
            // Ascending id order: only a strictly newer activity replaces the pick.
            .fold(None, |best: Option<(&AreaId, Option<Timestamp>)>, n| {
                let activity = n.last_activity();
                match best {
                    Some((_, best_activity)) if best_activity >= activity => best,
                    _ => Some((&n.id, activity)),
                }
            })
            .map(|(id, _)| id.clone())
    }

    fn unexpected_motion_message(
        &self,
        state: &TrackerState,
        area_id: &AreaId,
        now: Timestamp,
    ) -> String {
        let window = self.settings.activity_window();
        // Only activity that fell outside the window explains a rejected source.
        let latest = self
            .layout
            .adjacency()
            .neighbors(area_id)
            .filter_map(|id| state.areas.get(id))
            .filter_map(|n| n.last_activity().map(|at| (&n.id, at)))
            .filter(|(_, at)| now - *at > window)
            .fold(None, |best: Option<(&AreaId, Timestamp)>, (id, at)| match best {
                Some((_, best_at)) if best_at >= at => best,
                _ => Some((id, at)),
            });
        match latest {
            Some((neighbor, at)) => format!(
                "Unexpected motion in {area_id}: last adjacent activity was in {neighbor} {:.0}s ago",
                seconds_between(now, at)
            ),
            None => format!("Unexpected motion in {area_id}: no adjacent activity"),
        }
    }
}

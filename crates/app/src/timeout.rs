//! Timeout engine: ages occupancy that is no longer backed by motion.
//!
//! Thresholds, all measured from the last motion of an occupied area:
//! - exit-capable areas are emptied after the exit timeout (`auto_exit_clear`)
//! - any area gets an `extended_occupancy` warning after the extended threshold
//! - any area is emptied after the hard reset threshold (`hard_reset`), which
//!   also resolves its `extended_occupancy` warning
//!
//! Running the scan twice with the same `now` changes nothing the second time.

use occutrack_domain::state::TrackerState;
use occutrack_domain::time::Timestamp;
use occutrack_domain::warning::{Warning, WarningKind, WarningSubject};

use crate::settings::TrackerSettings;

#[allow(clippy::cast_precision_loss)]
fn minutes(seconds: i64) -> f64 {
    seconds as f64 / 60.0
}

fn hours(seconds: i64) -> f64 {
    minutes(seconds) / 60.0
}

/// Scan every area in id order and apply the timeout policy.
pub fn check_timeouts(
    state: &mut TrackerState,
    settings: &TrackerSettings,
    now: Timestamp,
) -> Vec<Warning> {
    let mut warnings = Vec::new();
    for area in state.areas.values_mut() {
        if !area.is_occupied() {
            continue;
        }
        let Some(inactive) = area.inactivity(now) else {
            continue;
        };
        let subject = WarningSubject::area(area.id.clone());

        if area.exit_capable && inactive >= settings.exit_timeout() {
            area.occupancy = 0;
            tracing::info!(
                area = %area.id,
                inactive_secs = inactive.num_seconds(),
                "exit-capable area auto-cleared"
            );
            let message = format!(
                "Exit-capable area {} was auto-cleared after {:.1} minutes of inactivity",
                area.id,
                minutes(inactive.num_seconds())
            );
            warnings.extend(state.warnings.open(WarningKind::AutoExitClear, subject, message, now));
            continue;
        }

        if inactive >= settings.hard_reset() {
            area.occupancy = 0;
            tracing::warn!(
                area = %area.id,
                inactive_secs = inactive.num_seconds(),
                "area hard reset"
            );
            state
                .warnings
                .resolve_matching(WarningKind::ExtendedOccupancy, &subject, now);
            let message = format!(
                "Area {} was reset after {:.1} hours of inactivity",
                area.id,
                hours(inactive.num_seconds())
            );
            warnings.extend(state.warnings.open(WarningKind::HardReset, subject, message, now));
        } else if inactive >= settings.extended_occupancy() {
            let message = format!(
                "Area {} has been occupied for {:.1} hours without motion",
                area.id,
                hours(inactive.num_seconds())
            );
            warnings.extend(state.warnings.open(
                WarningKind::ExtendedOccupancy,
                subject,
                message,
                now,
            ));
        }
    }
    for warning in &warnings {
        tracing::warn!(%warning, "timeout warning opened");
    }
    warnings
}

//! Occupancy probability decay.
//!
//! Confidence stays at 1.0 for the first minute after motion, holds a 0.9
//! plateau until five minutes, then decays exponentially toward 0.1. The
//! curve is continuous at the plateau boundary and non-increasing in time.

use occutrack_domain::area::AreaState;
use occutrack_domain::time::{Timestamp, seconds_between};

const FULL_CONFIDENCE_SECS: f64 = 60.0;
const PLATEAU_END_SECS: f64 = 300.0;
const PLATEAU: f64 = 0.9;
const FLOOR: f64 = 0.1;

/// Confidence in `[0, 1]` that `area` is still occupied at `now`.
#[must_use]
pub fn occupancy_probability(area: &AreaState, now: Timestamp, decay_rate: f64) -> f64 {
    if !area.is_occupied() {
        return 0.0;
    }
    let Some(last_motion) = area.last_motion else {
        return 1.0;
    };
    probability_after(seconds_between(now, last_motion), decay_rate)
}

/// The decay curve itself, as a function of seconds since the last motion.
#[must_use]
pub fn probability_after(elapsed: f64, decay_rate: f64) -> f64 {
    if elapsed <= FULL_CONFIDENCE_SECS {
        1.0
    } else if elapsed <= PLATEAU_END_SECS {
        PLATEAU
    } else {
        FLOOR + (PLATEAU - FLOOR) * (-decay_rate * (elapsed - PLATEAU_END_SECS)).exp()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeDelta};
    use occutrack_domain::area::Area;
    use proptest::prelude::*;

    const RATE: f64 = 0.000_21;

    fn ts(secs: i64) -> Timestamp {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    fn occupied(last_motion: Timestamp) -> AreaState {
        let mut state = AreaState::new(&Area::builder().id("kitchen").build().unwrap());
        state.record_entry(last_motion);
        state
    }

    #[test]
    fn should_return_zero_when_area_is_empty() {
        let state = AreaState::new(&Area::builder().id("kitchen").build().unwrap());
        assert!(occupancy_probability(&state, ts(0), RATE).abs() < f64::EPSILON);
    }

    #[test]
    fn should_return_one_when_occupied_without_motion() {
        let mut state = occupied(ts(0));
        state.last_motion = None;
        assert!((occupancy_probability(&state, ts(1000), RATE) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn should_follow_curve_at_boundaries() {
        let state = occupied(ts(0));
        let at = |secs| occupancy_probability(&state, ts(secs), RATE);
        assert!((at(0) - 1.0).abs() < f64::EPSILON);
        assert!((at(60) - 1.0).abs() < f64::EPSILON);
        assert!((at(61) - 0.9).abs() < f64::EPSILON);
        assert!((at(300) - 0.9).abs() < f64::EPSILON);
        assert!(at(301) < 0.9);
    }

    #[test]
    fn should_approach_floor_after_long_inactivity() {
        let state = occupied(ts(0));
        let later = ts(0) + TimeDelta::days(30);
        let value = occupancy_probability(&state, later, RATE);
        assert!(value > 0.1);
        assert!(value - 0.1 < 1e-6);
    }

    proptest! {
        #[test]
        fn should_never_increase_with_elapsed_time(a in 0.0f64..1e7, b in 0.0f64..1e7) {
            let (early, late) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(probability_after(late, RATE) <= probability_after(early, RATE));
        }

        #[test]
        fn should_stay_within_unit_interval(t in -1e3f64..1e9) {
            let p = probability_after(t, RATE);
            prop_assert!((0.1..=1.0).contains(&p));
        }
    }
}

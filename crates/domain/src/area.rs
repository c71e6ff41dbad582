//! Area: a tracked region of the building (room, hallway, entrance).
//!
//! [`Area`] is the static registry entry from configuration.
//! [`AreaState`] is the mutable occupancy record the engine works on.

use std::collections::VecDeque;

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};

use crate::error::{OccupancyError, ValidationError};
use crate::id::AreaId;
use crate::time::Timestamp;

/// Number of deactivation timestamps retained per area.
pub const DEACTIVATION_HISTORY_LEN: usize = 3;

/// A configured area.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Area {
    pub id: AreaId,
    pub name: String,
    /// Boundary of the tracked space (e.g. front door): occupants may appear
    /// or vanish here without an adjacent source.
    pub exit_capable: bool,
    pub indoors: bool,
}

impl Area {
    /// Create a builder for constructing an [`Area`].
    #[must_use]
    pub fn builder() -> AreaBuilder {
        AreaBuilder::default()
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`OccupancyError::Validation`] when `id` is empty.
    pub fn validate(&self) -> Result<(), OccupancyError> {
        if self.id.as_str().trim().is_empty() {
            return Err(ValidationError::EmptyId.into());
        }
        Ok(())
    }
}

/// Step-by-step builder for [`Area`].
#[derive(Debug, Default)]
pub struct AreaBuilder {
    id: Option<AreaId>,
    name: Option<String>,
    exit_capable: bool,
    indoors: Option<bool>,
}

impl AreaBuilder {
    #[must_use]
    pub fn id(mut self, id: impl Into<AreaId>) -> Self {
        self.id = Some(id.into());
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn exit_capable(mut self, exit_capable: bool) -> Self {
        self.exit_capable = exit_capable;
        self
    }

    #[must_use]
    pub fn indoors(mut self, indoors: bool) -> Self {
        self.indoors = Some(indoors);
        self
    }

    /// Consume the builder, validate, and return an [`Area`].
    ///
    /// The display name defaults to the id.
    ///
    /// # Errors
    ///
    /// Returns [`OccupancyError::Validation`] if `id` is missing or empty.
    pub fn build(self) -> Result<Area, OccupancyError> {
        let id = self.id.unwrap_or_else(|| AreaId::new(""));
        let area = Area {
            name: self.name.unwrap_or_else(|| id.to_string()),
            id,
            exit_capable: self.exit_capable,
            indoors: self.indoors.unwrap_or(true),
        };
        area.validate()?;
        Ok(area)
    }
}

/// Mutable occupancy state of one area.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AreaState {
    pub id: AreaId,
    /// Occupant units, not individuals.
    pub occupancy: u32,
    pub last_motion: Option<Timestamp>,
    pub exit_capable: bool,
    /// Newest last; never longer than [`DEACTIVATION_HISTORY_LEN`].
    pub deactivations: VecDeque<Timestamp>,
}

impl AreaState {
    /// Fresh, empty state for a configured area.
    #[must_use]
    pub fn new(area: &Area) -> Self {
        Self {
            id: area.id.clone(),
            occupancy: 0,
            last_motion: None,
            exit_capable: area.exit_capable,
            deactivations: VecDeque::with_capacity(DEACTIVATION_HISTORY_LEN),
        }
    }

    #[must_use]
    pub fn is_occupied(&self) -> bool {
        self.occupancy > 0
    }

    pub fn record_motion(&mut self, timestamp: Timestamp) {
        self.last_motion = Some(timestamp);
    }

    pub fn record_entry(&mut self, timestamp: Timestamp) {
        self.occupancy = self.occupancy.saturating_add(1);
        self.last_motion = Some(timestamp);
    }

    /// Remove one occupant. Returns `false` when the area was already empty.
    pub fn record_exit(&mut self) -> bool {
        if self.occupancy == 0 {
            return false;
        }
        self.occupancy -= 1;
        true
    }

    pub fn record_deactivation(&mut self, timestamp: Timestamp) {
        self.deactivations.push_back(timestamp);
        while self.deactivations.len() > DEACTIVATION_HISTORY_LEN {
            self.deactivations.pop_front();
        }
    }

    /// Time since the last motion, `None` when no motion was ever recorded.
    #[must_use]
    pub fn inactivity(&self, now: Timestamp) -> Option<TimeDelta> {
        self.last_motion.map(|last| now - last)
    }

    /// Whether motion was recorded no more than `window` before `now`.
    #[must_use]
    pub fn has_recent_motion(&self, now: Timestamp, window: TimeDelta) -> bool {
        self.inactivity(now).is_some_and(|elapsed| elapsed <= window)
    }

    /// Whether any retained deactivation lies no more than `window` before `now`.
    #[must_use]
    pub fn has_recent_deactivation(&self, now: Timestamp, window: TimeDelta) -> bool {
        self.deactivations.iter().any(|d| now - *d <= window)
    }

    /// Most recent recorded activity: motion or deactivation, whichever is newer.
    #[must_use]
    pub fn last_activity(&self) -> Option<Timestamp> {
        let newest_deactivation = self.deactivations.iter().max().copied();
        match (self.last_motion, newest_deactivation) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        }
    }

    /// Reinitialize mutable fields, keeping identity and configuration.
    pub fn reset(&mut self) {
        self.occupancy = 0;
        self.last_motion = None;
        self.deactivations.clear();
    }
}

//! Warning: an operator-facing notice about an anomaly or automatic action.
//!
//! Warnings are owned by a [`WarningLog`], which enforces the lifecycle
//! (open → resolved) and deduplication: at most one *open* warning exists for
//! a given kind and subject (area and/or sensor).

use serde::{Deserialize, Serialize};

use crate::id::{AreaId, SensorId, WarningId};
use crate::time::Timestamp;

/// Category of a [`Warning`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// Motion in an empty, non-exit area with no plausible source.
    UnexpectedMotion,
    /// A sensor reported active for longer than the stuck threshold.
    StuckSensor,
    /// An occupied area saw no motion for a very long time.
    ExtendedOccupancy,
    /// An exit-capable area was emptied after inactivity.
    AutoExitClear,
    /// An area was forcibly emptied after prolonged inactivity.
    HardReset,
    /// Motion in areas too far apart to be explained by one move.
    SuspiciousTransition,
}

impl WarningKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::UnexpectedMotion => "unexpected_motion",
            Self::StuckSensor => "stuck_sensor",
            Self::ExtendedOccupancy => "extended_occupancy",
            Self::AutoExitClear => "auto_exit_clear",
            Self::HardReset => "hard_reset",
            Self::SuspiciousTransition => "suspicious_transition",
        }
    }
}

impl std::fmt::Display for WarningKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a warning is about. Used as part of the deduplication key.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WarningSubject {
    pub area_id: Option<AreaId>,
    pub sensor_id: Option<SensorId>,
}

impl WarningSubject {
    #[must_use]
    pub fn area(area_id: AreaId) -> Self {
        Self {
            area_id: Some(area_id),
            sensor_id: None,
        }
    }

    #[must_use]
    pub fn sensor(sensor_id: SensorId) -> Self {
        Self {
            area_id: None,
            sensor_id: Some(sensor_id),
        }
    }
}

impl std::fmt::Display for WarningSubject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.area_id, &self.sensor_id) {
            (Some(area), Some(sensor)) => write!(f, "{area}/{sensor}"),
            (Some(area), None) => write!(f, "{area}"),
            (None, Some(sensor)) => write!(f, "{sensor}"),
            (None, None) => f.write_str("system"),
        }
    }
}

/// A single warning record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warning {
    pub id: WarningId,
    pub kind: WarningKind,
    pub message: String,
    pub subject: WarningSubject,
    pub created_at: Timestamp,
    pub resolved_at: Option<Timestamp>,
}

impl Warning {
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.resolved_at.is_none()
    }

    /// Mark resolved. Returns `false` when it was already resolved.
    pub fn resolve(&mut self, timestamp: Timestamp) -> bool {
        if self.resolved_at.is_some() {
            return false;
        }
        self.resolved_at = Some(timestamp);
        true
    }
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Warning[{}]: {}", self.kind, self.message)
    }
}

/// Resolved warnings kept for inspection; open warnings are never dropped.
pub const RESOLVED_HISTORY_LEN: usize = 100;

/// Collection of warnings with deduplication of open entries.
///
/// Only the newest [`RESOLVED_HISTORY_LEN`] resolved warnings are kept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarningLog {
    warnings: Vec<Warning>,
    next_id: u64,
}

impl WarningLog {
    /// Open a warning unless one of the same kind and subject is already open.
    ///
    /// Returns the new warning, or `None` when deduplicated.
    pub fn open(
        &mut self,
        kind: WarningKind,
        subject: WarningSubject,
        message: impl Into<String>,
        timestamp: Timestamp,
    ) -> Option<Warning> {
        if self.find_open(kind, &subject).is_some() {
            return None;
        }
        self.next_id += 1;
        let warning = Warning {
            id: WarningId::from_raw(self.next_id),
            kind,
            message: message.into(),
            subject,
            created_at: timestamp,
            resolved_at: None,
        };
        self.warnings.push(warning.clone());
        Some(warning)
    }

    #[must_use]
    pub fn find_open(&self, kind: WarningKind, subject: &WarningSubject) -> Option<&Warning> {
        self.warnings
            .iter()
            .find(|w| w.is_open() && w.kind == kind && &w.subject == subject)
    }

    /// Resolve the open warning of `kind` for `subject`, if any.
    pub fn resolve_matching(
        &mut self,
        kind: WarningKind,
        subject: &WarningSubject,
        timestamp: Timestamp,
    ) -> bool {
        let resolved = self
            .warnings
            .iter_mut()
            .find(|w| w.is_open() && w.kind == kind && &w.subject == subject)
            .is_some_and(|w| w.resolve(timestamp));
        self.prune_resolved();
        resolved
    }

    /// Resolve a warning by id. Returns `false` if unknown or already resolved.
    pub fn resolve(&mut self, id: WarningId, timestamp: Timestamp) -> bool {
        let resolved = self
            .warnings
            .iter_mut()
            .find(|w| w.id == id)
            .is_some_and(|w| w.resolve(timestamp));
        self.prune_resolved();
        resolved
    }

    /// Resolve every open warning. Returns how many were resolved.
    pub fn resolve_all(&mut self, timestamp: Timestamp) -> usize {
        let count = self
            .warnings
            .iter_mut()
            .filter(|w| w.is_open())
            .map(|w| w.resolve(timestamp))
            .filter(|resolved| *resolved)
            .count();
        self.prune_resolved();
        count
    }

    fn prune_resolved(&mut self) {
        let resolved = self.warnings.iter().filter(|w| !w.is_open()).count();
        let mut excess = resolved.saturating_sub(RESOLVED_HISTORY_LEN);
        if excess == 0 {
            return;
        }
        self.warnings.retain(|w| {
            if excess > 0 && !w.is_open() {
                excess -= 1;
                return false;
            }
            true
        });
    }

    pub fn open_warnings(&self) -> impl Iterator<Item = &Warning> {
        self.warnings.iter().filter(|w| w.is_open())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Warning> {
        self.warnings.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.warnings.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }

    /// Drop every warning and restart id allocation.
    pub fn clear(&mut self) {
        self.warnings.clear();
        self.next_id = 0;
    }
}

//! Common error types used across the workspace.
//!
//! Each layer defines its own typed errors and converts into
//! [`OccupancyError`] via `#[from]`. Anomalies are never errors: they are
//! surfaced as [`Warning`](crate::warning::Warning)s instead.

/// Top-level error returned by domain and application operations.
#[derive(Debug, thiserror::Error)]
pub enum OccupancyError {
    #[error("validation error")]
    Validation(#[from] ValidationError),

    #[error("not found")]
    NotFound(#[from] NotFoundError),

    #[error("storage error")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Rejected input: malformed events at the boundary or an inconsistent layout.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("identifier must not be empty")]
    EmptyId,

    #[error("unknown sensor `{0}`")]
    UnknownSensor(String),

    #[error("`{referenced_by}` references unknown area `{area_id}`")]
    UnknownArea {
        area_id: String,
        referenced_by: String,
    },

    #[error("duplicate identifier `{0}`")]
    DuplicateId(String),

    #[error("sensor `{0}` is not mapped to any area")]
    SensorWithoutArea(String),

    #[error("event at {received} is older than the last applied event at {last_applied}")]
    OutOfOrderEvent {
        received: crate::time::Timestamp,
        last_applied: crate::time::Timestamp,
    },
}

/// A lookup by identifier matched nothing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{entity} `{id}` not found")]
pub struct NotFoundError {
    pub entity: &'static str,
    pub id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_convert_validation_error_into_occupancy_error() {
        let err: OccupancyError = ValidationError::UnknownSensor("pir".to_string()).into();
        assert!(matches!(
            err,
            OccupancyError::Validation(ValidationError::UnknownSensor(_))
        ));
    }

    #[test]
    fn should_display_not_found_with_entity_and_id() {
        let err = NotFoundError {
            entity: "Area",
            id: "kitchen".to_string(),
        };
        assert_eq!(err.to_string(), "Area `kitchen` not found");
    }

    #[test]
    fn should_display_unknown_area_reference() {
        let err = ValidationError::UnknownArea {
            area_id: "attic".to_string(),
            referenced_by: "sensor hall_pir".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "`sensor hall_pir` references unknown area `attic`"
        );
    }
}

//! Storage-specific error type wrapping sqlx errors.

use occutrack_domain::error::OccupancyError;

/// Errors originating from the `SQLite` storage layer.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// A query or connection failed.
    #[error("database error")]
    Database(#[from] sqlx::Error),

    /// Failed to serialize or deserialize a stored JSON column.
    #[error("JSON serialization error")]
    Json(#[from] serde_json::Error),

    /// Failed to run migrations.
    #[error("migration error")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A sequence does not fit the `SQLite` integer type.
    #[error("sequence {0} out of range")]
    SequenceOutOfRange(u64),
}

impl From<StorageError> for OccupancyError {
    fn from(err: StorageError) -> Self {
        Self::Storage(Box::new(err))
    }
}

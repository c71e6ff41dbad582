//! `SQLite` implementation of [`SnapshotStore`].

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use occutrack_app::ports::SnapshotStore;
use occutrack_domain::error::OccupancyError;
use occutrack_domain::snapshot::MapSnapshot;

use crate::error::StorageError;

struct Wrapper(MapSnapshot);

fn decode_json<T: serde::de::DeserializeOwned>(raw: &str) -> Result<T, sqlx::Error> {
    serde_json::from_str(raw).map_err(|err| sqlx::Error::Decode(Box::new(err)))
}

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let sequence: i64 = row.try_get("sequence")?;
        let timestamp_str: String = row.try_get("timestamp")?;
        let event_json: String = row.try_get("event")?;
        let areas_json: String = row.try_get("areas_before")?;
        let sensors_json: String = row.try_get("sensors_before")?;

        let sequence =
            u64::try_from(sequence).map_err(|err| sqlx::Error::Decode(Box::new(err)))?;
        let timestamp = chrono::DateTime::parse_from_rfc3339(&timestamp_str)
            .map_err(|err| sqlx::Error::Decode(Box::new(err)))?
            .to_utc();

        Ok(Self(MapSnapshot {
            sequence,
            timestamp,
            event: decode_json(&event_json)?,
            areas_before: decode_json(&areas_json)?,
            sensors_before: decode_json(&sensors_json)?,
        }))
    }
}

const INSERT: &str = r"
    INSERT INTO snapshots (sequence, timestamp, event_kind, sensor_id, new_state, event, areas_before, sensors_before)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?)
";

const SELECT_ALL: &str = "SELECT * FROM snapshots ORDER BY sequence ASC";
const DELETE_BEFORE: &str = "DELETE FROM snapshots WHERE sequence < ?";
const DELETE_ALL: &str = "DELETE FROM snapshots";

fn to_sql_sequence(sequence: u64) -> Result<i64, StorageError> {
    i64::try_from(sequence).map_err(|_| StorageError::SequenceOutOfRange(sequence))
}

/// `SQLite`-backed snapshot log.
#[derive(Debug, Clone)]
pub struct SqliteSnapshotStore {
    pool: SqlitePool,
}

impl SqliteSnapshotStore {
    /// Create a new snapshot store using the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl SnapshotStore for SqliteSnapshotStore {
    async fn append(&self, snapshot: &MapSnapshot) -> Result<(), OccupancyError> {
        let event_json = serde_json::to_string(&snapshot.event).map_err(StorageError::from)?;
        let areas_json =
            serde_json::to_string(&snapshot.areas_before).map_err(StorageError::from)?;
        let sensors_json =
            serde_json::to_string(&snapshot.sensors_before).map_err(StorageError::from)?;

        sqlx::query(INSERT)
            .bind(to_sql_sequence(snapshot.sequence)?)
            .bind(snapshot.timestamp.to_rfc3339())
            .bind(snapshot.event.as_str())
            .bind(snapshot.event.sensor_id().map(|id| id.as_str().to_string()))
            .bind(snapshot.event.new_state())
            .bind(&event_json)
            .bind(&areas_json)
            .bind(&sensors_json)
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(())
    }

    async fn load_all(&self) -> Result<Vec<MapSnapshot>, OccupancyError> {
        let rows: Vec<Wrapper> = sqlx::query_as(SELECT_ALL)
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(rows.into_iter().map(|w| w.0).collect())
    }

    async fn delete_before(&self, sequence: u64) -> Result<u64, OccupancyError> {
        let result = sqlx::query(DELETE_BEFORE)
            .bind(to_sql_sequence(sequence)?)
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(result.rows_affected())
    }

    async fn clear(&self) -> Result<(), OccupancyError> {
        let result = sqlx::query(DELETE_ALL)
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;
        tracing::info!(removed = result.rows_affected(), "snapshot log cleared");

        Ok(())
    }
}

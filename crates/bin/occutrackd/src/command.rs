//! JSON-lines command protocol.
//!
//! One JSON object per input line, tagged by `command`:
//!
//! ```text
//! {"command":"sensor","sensor_id":"hall_pir","active":true,"timestamp":"2024-01-01T08:00:00Z"}
//! {"command":"tick"}
//! {"command":"status"}
//! {"command":"area","area_id":"hall"}
//! ```
//!
//! Timestamps are optional and default to the wall clock. Every input line
//! yields exactly one output line: `{"ok":true,"result":...}` or
//! `{"ok":false,"error":"..."}`.

use serde::Deserialize;
use serde_json::{Value, json};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use occutrack_app::ports::SnapshotStore;
use occutrack_app::services::tracker_service::TrackerService;
use occutrack_domain::difference::VerificationSummary;
use occutrack_domain::error::OccupancyError;
use occutrack_domain::id::{SensorId, WarningId};
use occutrack_domain::time::{self, Timestamp};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    Sensor {
        sensor_id: SensorId,
        active: bool,
        #[serde(default)]
        timestamp: Option<Timestamp>,
    },
    Tick {
        #[serde(default)]
        timestamp: Option<Timestamp>,
    },
    Status {
        #[serde(default)]
        now: Option<Timestamp>,
    },
    Area {
        area_id: String,
        #[serde(default)]
        now: Option<Timestamp>,
    },
    Diagnose {
        #[serde(default)]
        sensor_id: Option<String>,
        #[serde(default)]
        now: Option<Timestamp>,
    },
    Warnings,
    Verify {
        #[serde(default)]
        include_warnings: bool,
        #[serde(default)]
        all_snapshots: bool,
    },
    Rebuild,
    ResolveWarning {
        warning_id: WarningId,
        #[serde(default)]
        timestamp: Option<Timestamp>,
    },
    ResetWarnings {
        #[serde(default)]
        timestamp: Option<Timestamp>,
    },
    ResetSensor {
        sensor_id: SensorId,
        #[serde(default)]
        timestamp: Option<Timestamp>,
    },
    ResetSystem {
        #[serde(default)]
        timestamp: Option<Timestamp>,
    },
    Truncate {
        keep: usize,
    },
}

impl Command {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sensor { .. } => "sensor",
            Self::Tick { .. } => "tick",
            Self::Status { .. } => "status",
            Self::Area { .. } => "area",
            Self::Diagnose { .. } => "diagnose",
            Self::Warnings => "warnings",
            Self::Verify { .. } => "verify",
            Self::Rebuild => "rebuild",
            Self::ResolveWarning { .. } => "resolve_warning",
            Self::ResetWarnings { .. } => "reset_warnings",
            Self::ResetSensor { .. } => "reset_sensor",
            Self::ResetSystem { .. } => "reset_system",
            Self::Truncate { .. } => "truncate",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("invalid command: {0}")]
    Parse(serde_json::Error),
    #[error("failed to encode result")]
    Encode(#[from] serde_json::Error),
    #[error(transparent)]
    Occupancy(#[from] OccupancyError),
}

fn or_now(timestamp: Option<Timestamp>) -> Timestamp {
    timestamp.unwrap_or_else(time::now)
}

/// Run one command against the service.
///
/// # Errors
///
/// Returns [`CommandError::Occupancy`] when the tracker rejects the command
/// and [`CommandError::Encode`] when the result cannot be serialized.
pub async fn dispatch<S: SnapshotStore>(
    service: &TrackerService<S>,
    command: Command,
) -> Result<Value, CommandError> {
    let value = match command {
        Command::Sensor {
            sensor_id,
            active,
            timestamp,
        } => {
            let warnings = service
                .process_sensor_event(sensor_id, active, or_now(timestamp))
                .await?;
            json!({ "warnings": warnings })
        }
        Command::Tick { timestamp } => {
            let warnings = service.check_timeouts(or_now(timestamp)).await?;
            json!({ "warnings": warnings })
        }
        Command::Status { now } => serde_json::to_value(service.system_status(or_now(now)).await)?,
        Command::Area { area_id, now } => {
            serde_json::to_value(service.area_status(&area_id, or_now(now)).await?)?
        }
        Command::Diagnose { sensor_id, now } => serde_json::to_value(
            service
                .diagnose_motion_issues(sensor_id.as_deref(), or_now(now))
                .await?,
        )?,
        Command::Warnings => serde_json::to_value(service.open_warnings().await)?,
        Command::Verify {
            include_warnings,
            all_snapshots,
        } => {
            let differences = if all_snapshots {
                service.verify_all_snapshots().await
            } else {
                service.verify_history(include_warnings).await
            };
            let summary = VerificationSummary::from_differences(&differences);
            json!({ "summary": summary, "differences": differences })
        }
        Command::Rebuild => {
            service.rebuild_from_history().await;
            json!({ "rebuilt": true })
        }
        Command::ResolveWarning {
            warning_id,
            timestamp,
        } => {
            let resolved = service
                .resolve_warning(warning_id, or_now(timestamp))
                .await?;
            json!({ "resolved": resolved })
        }
        Command::ResetWarnings { timestamp } => {
            let resolved = service.reset_warnings(or_now(timestamp)).await?;
            json!({ "resolved": resolved })
        }
        Command::ResetSensor {
            sensor_id,
            timestamp,
        } => {
            service.reset_sensor(sensor_id, or_now(timestamp)).await?;
            json!({ "reset": true })
        }
        Command::ResetSystem { timestamp } => {
            service.reset_system(or_now(timestamp)).await?;
            json!({ "reset": true })
        }
        Command::Truncate { keep } => {
            let dropped = service.truncate_history(keep).await?;
            json!({ "dropped": dropped })
        }
    };
    Ok(value)
}

/// Parse and run one input line, returning the response line.
pub async fn handle_line<S: SnapshotStore>(service: &TrackerService<S>, line: &str) -> String {
    let result = match serde_json::from_str::<Command>(line) {
        Ok(command) => {
            tracing::debug!(command = command.as_str(), "command received");
            dispatch(service, command).await
        }
        Err(err) => Err(CommandError::Parse(err)),
    };
    let response = match result {
        Ok(result) => json!({ "ok": true, "result": result }),
        Err(err) => {
            let message = format!("{:#}", anyhow::Error::from(err));
            tracing::warn!(error = %message, "command failed");
            json!({ "ok": false, "error": message })
        }
    };
    response.to_string()
}

/// Serve commands from `reader` until end of input.
///
/// # Errors
///
/// Returns an I/O error when reading a line or writing a response fails.
pub async fn serve<S, R, W>(
    service: &TrackerService<S>,
    reader: R,
    mut writer: W,
) -> std::io::Result<()>
where
    S: SnapshotStore,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let response = handle_line(service, &line).await;
        writer.write_all(response.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
    }
    Ok(())
}

//! End-to-end tests for the full occutrackd stack.
//!
//! Each test wires the complete application (in-memory `SQLite`, real snapshot
//! store, real tracker service, real command protocol) and drives it through
//! JSON lines, exactly as the daemon does on stdin/stdout.

use serde_json::{Value, json};

use occutrack_adapter_storage_sqlite_sqlx::{Config, SqliteSnapshotStore};
use occutrack_app::ports::SnapshotStore;
use occutrack_app::services::tracker_service::TrackerService;
use occutrackd::command::{handle_line, serve};
use occutrackd::config::Config as DaemonConfig;

const HOUSE: &str = "
    [[areas]]
    id = 'front_door'
    exit_capable = true

    [[areas]]
    id = 'hall'

    [[areas]]
    id = 'kitchen'

    [[areas]]
    id = 'bedroom'

    [adjacency]
    hall = ['front_door', 'kitchen', 'bedroom']

    [[sensors]]
    id = 'door_pir'
    areas = ['front_door']

    [[sensors]]
    id = 'hall_pir'
    areas = ['hall']

    [[sensors]]
    id = 'kitchen_pir'
    areas = ['kitchen']

    [[sensors]]
    id = 'bedroom_pir'
    areas = ['bedroom']
";

fn config() -> DaemonConfig {
    toml::from_str(HOUSE).expect("test house should parse")
}

async fn store() -> SqliteSnapshotStore {
    let db = Config {
        database_url: "sqlite::memory:".to_string(),
    }
    .build()
    .await
    .expect("in-memory database should initialise");
    SqliteSnapshotStore::new(db.pool().clone())
}

async fn service(store: SqliteSnapshotStore) -> TrackerService<SqliteSnapshotStore> {
    let config = config();
    let layout = config.to_layout().expect("test house should be valid");
    TrackerService::load(layout, config.engine, store)
        .await
        .expect("tracker should load")
}

async fn send(service: &TrackerService<SqliteSnapshotStore>, command: Value) -> Value {
    let line = handle_line(service, &command.to_string()).await;
    serde_json::from_str(&line).expect("response should be JSON")
}

fn at(secs: u32) -> String {
    format!("2024-01-01T08:{:02}:{:02}Z", secs / 60, secs % 60)
}

fn sensor(id: &str, active: bool, secs: u32) -> Value {
    json!({ "command": "sensor", "sensor_id": id, "active": active, "timestamp": at(secs) })
}

// ---------------------------------------------------------------------------
// Sensor events
// ---------------------------------------------------------------------------

#[tokio::test]
async fn should_follow_occupant_from_door_to_kitchen() {
    let service = service(store().await).await;

    for command in [
        sensor("door_pir", true, 0),
        sensor("door_pir", false, 5),
        sensor("hall_pir", true, 30),
        sensor("kitchen_pir", true, 60),
    ] {
        let response = send(&service, command).await;
        assert_eq!(response["ok"], true, "{response}");
    }

    let status = send(&service, json!({ "command": "status", "now": at(90) })).await;
    assert_eq!(status["result"]["total_occupancy"], 1);
    assert_eq!(status["result"]["occupied_areas"], json!({ "kitchen": 1 }));
    assert_eq!(status["result"]["snapshot_count"], 4);

    let kitchen = send(
        &service,
        json!({ "command": "area", "area_id": "kitchen", "now": at(90) }),
    )
    .await;
    assert_eq!(kitchen["result"]["occupancy"], 1);
    assert_eq!(kitchen["result"]["probability"], 1.0);
    assert_eq!(kitchen["result"]["adjacent_areas"], json!(["hall"]));
}

#[tokio::test]
async fn should_return_warning_for_unexpected_motion() {
    let service = service(store().await).await;

    let response = send(&service, sensor("bedroom_pir", true, 0)).await;

    assert_eq!(response["ok"], true);
    let warnings = response["result"]["warnings"].as_array().unwrap();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0]["kind"], "unexpected_motion");
    assert_eq!(
        warnings[0]["message"],
        "Unexpected motion in bedroom: no adjacent activity"
    );

    let open = send(&service, json!({ "command": "warnings" })).await;
    assert_eq!(open["result"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn should_auto_clear_entrance_on_tick() {
    let service = service(store().await).await;
    send(&service, sensor("door_pir", true, 0)).await;
    send(&service, sensor("door_pir", false, 5)).await;

    let response = send(&service, json!({ "command": "tick", "timestamp": at(305) })).await;

    let warnings = response["result"]["warnings"].as_array().unwrap();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0]["kind"], "auto_exit_clear");
    let status = send(&service, json!({ "command": "status", "now": at(305) })).await;
    assert_eq!(status["result"]["total_occupancy"], 0);
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[tokio::test]
async fn should_report_unknown_sensor() {
    let service = service(store().await).await;

    let response = send(&service, sensor("attic_pir", true, 0)).await;

    assert_eq!(response["ok"], false);
    assert_eq!(
        response["error"],
        "validation error: unknown sensor `attic_pir`"
    );
}

#[tokio::test]
async fn should_report_out_of_order_event_without_persisting_it() {
    let store = store().await;
    let service = service(store.clone()).await;
    send(&service, sensor("door_pir", true, 60)).await;

    let response = send(&service, sensor("hall_pir", true, 30)).await;

    assert_eq!(response["ok"], false);
    assert_eq!(store.load_all().await.unwrap().len(), 1);
}

#[tokio::test]
async fn should_report_unknown_area_as_not_found() {
    let service = service(store().await).await;

    let response = send(&service, json!({ "command": "area", "area_id": "attic" })).await;

    assert_eq!(response["ok"], false);
    assert_eq!(response["error"], "not found: Area `attic` not found");
}

#[tokio::test]
async fn should_report_malformed_line() {
    let service = service(store().await).await;

    let line = handle_line(&service, "{not json").await;
    let response: Value = serde_json::from_str(&line).unwrap();

    assert_eq!(response["ok"], false);
    assert!(
        response["error"]
            .as_str()
            .unwrap()
            .starts_with("invalid command")
    );
}

// ---------------------------------------------------------------------------
// Persistence & verification
// ---------------------------------------------------------------------------

#[tokio::test]
async fn should_restore_state_after_restart() {
    let store = store().await;
    let first = service(store.clone()).await;
    send(&first, sensor("door_pir", true, 0)).await;
    send(&first, sensor("hall_pir", true, 30)).await;
    send(&first, sensor("bedroom_pir", true, 400)).await;
    let before = send(&first, json!({ "command": "status", "now": at(500) })).await;
    drop(first);

    let second = service(store).await;
    let after = send(&second, json!({ "command": "status", "now": at(500) })).await;

    assert_eq!(after, before);
    assert_eq!(after["result"]["total_occupancy"], 2);
}

#[tokio::test]
async fn should_verify_history_after_commands() {
    let service = service(store().await).await;
    send(&service, sensor("door_pir", true, 0)).await;
    send(&service, sensor("hall_pir", true, 30)).await;
    send(&service, json!({ "command": "tick", "timestamp": at(400) })).await;
    send(&service, json!({ "command": "reset_warnings", "timestamp": at(410) })).await;

    let response = send(
        &service,
        json!({ "command": "verify", "include_warnings": true }),
    )
    .await;
    assert_eq!(response["result"]["summary"]["passed"], true);
    assert_eq!(response["result"]["differences"], json!([]));

    let response = send(&service, json!({ "command": "verify", "all_snapshots": true })).await;
    assert_eq!(response["result"]["summary"]["passed"], true);

    let response = send(&service, json!({ "command": "rebuild" })).await;
    assert_eq!(response["result"]["rebuilt"], true);
}

#[tokio::test]
async fn should_truncate_persisted_history() {
    let store = store().await;
    let service = service(store.clone()).await;
    send(&service, sensor("door_pir", true, 0)).await;
    send(&service, sensor("door_pir", false, 5)).await;
    send(&service, sensor("hall_pir", true, 30)).await;

    let response = send(&service, json!({ "command": "truncate", "keep": 1 })).await;

    assert_eq!(response["result"]["dropped"], 2);
    let persisted = store.load_all().await.unwrap();
    assert_eq!(persisted.len(), 1);
    assert_eq!(persisted[0].sequence, 3);
}

#[tokio::test]
async fn should_zero_occupancy_on_reset_system() {
    let service = service(store().await).await;
    send(&service, sensor("bedroom_pir", true, 0)).await;

    let response = send(
        &service,
        json!({ "command": "reset_system", "timestamp": at(10) }),
    )
    .await;

    assert_eq!(response["ok"], true);
    let status = send(&service, json!({ "command": "status", "now": at(10) })).await;
    assert_eq!(status["result"]["total_occupancy"], 0);
    assert_eq!(status["result"]["open_warnings"], json!([]));
}

// ---------------------------------------------------------------------------
// Line protocol
// ---------------------------------------------------------------------------

#[tokio::test]
async fn should_answer_every_non_empty_line() {
    let service = service(store().await).await;
    let input = format!(
        "{}\n\n{}\n{}\n",
        sensor("door_pir", true, 0),
        json!({ "command": "diagnose", "sensor_id": "door_pir", "now": at(10) }),
        json!({ "command": "reset_sensor", "sensor_id": "door_pir", "timestamp": at(20) }),
    );
    let mut output = Vec::new();

    serve(&service, input.as_bytes(), &mut output).await.unwrap();

    let lines: Vec<Value> = String::from_utf8(output)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(lines.len(), 3);
    assert!(lines.iter().all(|line| line["ok"] == true));
    assert_eq!(lines[1]["result"]["door_pir"]["active"], true);
    assert_eq!(lines[1]["result"]["door_pir"]["seconds_active"], 10.0);
}

#![cfg(test)]

use super::web::*;
use crate::config::Config;
use crate::engine::{CompanionEngine, EngineStores};
use crate::vehicle::VehicleState;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

fn test_config() -> Config {
    let mut config = Config::default();
    config.commands.success_rate = 1.0;
    config.commands.min_delay_ms = 100;
    config.commands.max_delay_ms = 100;
    config.commands.seed = Some(7);
    config.charging.location = Some("Home Charger".to_string());
    config.charging.seed = Some(7);
    config
}

fn test_state(vehicle: VehicleState) -> AppState {
    let engine =
        CompanionEngine::with_vehicle(&test_config(), EngineStores::in_memory(), vehicle).unwrap();
    AppState {
        engine: Arc::new(engine),
    }
}

fn plugged(soc: f64) -> VehicleState {
    let mut state = VehicleState::new(soc);
    state.climate_settings.is_plugged_in = true;
    state
}

async fn call(state: &AppState, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let router = build_router(state.clone());
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    let request = match body {
        Some(v) => request.body(Body::from(v.to_string())).unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn health_ok() {
    let state = test_state(VehicleState::new(50.0));
    let (status, body) = call(&state, "GET", "/api/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert!(body["version"].as_str().is_some());
}

#[tokio::test]
async fn vehicle_status_reports_warnings() {
    let state = test_state(VehicleState::new(4.0));
    let (status, body) = call(&state, "GET", "/api/vehicle/status", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["warnings"]["low_battery"], json!(true));
    assert_eq!(body["warnings"]["critical_battery"], json!(true));
    assert_eq!(body["data"]["lock_status"], json!("locked"));
}

#[tokio::test(start_paused = true)]
async fn unlock_then_poll_command() {
    let state = test_state(VehicleState::new(50.0));
    let (status, body) = call(&state, "POST", "/api/vehicle/unlock", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], json!("PENDING"));
    let id = body["command_id"].as_str().unwrap().to_string();

    tokio::time::sleep(Duration::from_millis(500)).await;

    let (status, body) = call(&state, "GET", &format!("/api/vehicle/commands/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], json!("SUCCESS"));
    assert_eq!(body["data"]["command"]["type"], json!("UNLOCK"));
}

#[tokio::test]
async fn lock_when_locked_is_rejected() {
    let state = test_state(VehicleState::new(50.0));
    let (status, body) = call(&state, "POST", "/api/vehicle/lock", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["error"], json!("Vehicle is already locked"));
}

#[tokio::test]
async fn climate_rejections() {
    let state = test_state(VehicleState::new(5.0));
    let (status, body) = call(
        &state,
        "POST",
        "/api/vehicle/climate",
        Some(json!({"action": "start", "temperature": 22.0})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], json!("Battery too low (<10%) for climate control"));

    let state = test_state(VehicleState::new(50.0));
    let (status, _) = call(
        &state,
        "POST",
        "/api/vehicle/climate",
        Some(json!({"action": "start", "temperature": 35.0})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(
        &state,
        "POST",
        "/api/vehicle/climate",
        Some(json!({"action": "blast"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn climate_start_reports_drain_estimate() {
    let state = test_state(VehicleState::new(50.0));
    let (status, body) = call(
        &state,
        "POST",
        "/api/vehicle/climate",
        Some(json!({"action": "start"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["battery_drain_estimate"].as_f64().is_some());
    assert_eq!(body["is_plugged_in"], json!(false));
}

#[tokio::test]
async fn seat_heat_rejects_unknown_seat() {
    let state = test_state(VehicleState::new(50.0));
    let (status, body) = call(
        &state,
        "POST",
        "/api/vehicle/seat-heat",
        Some(json!({"seat": "driver", "level": "high"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], json!(false));
}

#[tokio::test]
async fn trunk_rejected_while_moving() {
    let mut vehicle = VehicleState::new(50.0);
    vehicle.set_speed(40.0);
    let state = test_state(vehicle);
    let (status, body) = call(&state, "POST", "/api/vehicle/trunk/open", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["error"],
        json!("Cannot open trunk/frunk while vehicle is moving")
    );
}

#[tokio::test]
async fn unknown_and_malformed_command_ids() {
    let state = test_state(VehicleState::new(50.0));
    let (status, _) = call(&state, "GET", "/api/vehicle/commands/not-a-uuid", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let missing = uuid::Uuid::new_v4();
    let (status, body) = call(
        &state,
        "GET",
        &format!("/api/vehicle/commands/{}", missing),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], json!("Command not found"));
}

#[tokio::test(start_paused = true)]
async fn cancel_queued_command() {
    let state = test_state(VehicleState::new(50.0));
    let (_, first) = call(&state, "POST", "/api/vehicle/honk-flash", None).await;
    let (_, second) = call(&state, "POST", "/api/vehicle/honk-flash", None).await;
    let first_id = first["command_id"].as_str().unwrap().to_string();
    let second_id = second["command_id"].as_str().unwrap().to_string();

    // Let the worker pick up the first command
    tokio::time::sleep(Duration::from_millis(10)).await;

    let uri = format!("/api/vehicle/commands/{}", first_id);
    let (_, body) = call(&state, "DELETE", &uri, None).await;
    assert_eq!(body["cancelled"], json!(false));

    let uri = format!("/api/vehicle/commands/{}", second_id);
    let (_, body) = call(&state, "DELETE", &uri, None).await;
    assert_eq!(body["cancelled"], json!(true));
}

#[tokio::test(start_paused = true)]
async fn charging_start_status_stop() {
    let state = test_state(plugged(50.0));

    let (status, body) = call(
        &state,
        "POST",
        "/api/charging/start",
        Some(json!({"target_soc": 90.0})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["session"]["target_soc"], json!(90.0));
    assert_eq!(body["session"]["location"], json!("Home Charger"));

    let (status, body) = call(
        &state,
        "POST",
        "/api/charging/start",
        Some(json!({"target_soc": 95.0})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], json!("Charging session already active"));

    let (_, body) = call(&state, "GET", "/api/charging/status", None).await;
    assert_eq!(body["is_charging"], json!(true));
    assert_eq!(body["charge_limit"], json!(80));

    let (status, body) = call(&state, "POST", "/api/charging/stop", Some(json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["session"]["status"], json!("Interrupted"));

    let (status, _) = call(&state, "POST", "/api/charging/stop", Some(json!({}))).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, body) = call(&state, "GET", "/api/charging/history?limit=5", None).await;
    assert_eq!(body["sessions"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn charging_start_requires_plug() {
    let state = test_state(VehicleState::new(50.0));
    let (status, body) = call(
        &state,
        "POST",
        "/api/charging/start",
        Some(json!({"target_soc": 80.0})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["error"],
        json!("Vehicle must be plugged in to start charging")
    );
}

#[tokio::test]
async fn charge_limit_round_trip() {
    let state = test_state(VehicleState::new(50.0));
    let (status, body) = call(
        &state,
        "PUT",
        "/api/charging/limit",
        Some(json!({"limit": 90})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["charge_limit"], json!(90));

    let (_, body) = call(&state, "GET", "/api/charging/limit", None).await;
    assert_eq!(body["charge_limit"], json!(90));

    let (status, _) = call(&state, "PUT", "/api/charging/limit", Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(
        &state,
        "PUT",
        "/api/charging/limit",
        Some(json!({"limit": 150})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn schedule_crud() {
    let state = test_state(VehicleState::new(50.0));
    let (status, body) = call(
        &state,
        "POST",
        "/api/charging/schedules",
        Some(json!({
            "name": "Weeknights",
            "days_of_week": [0, 1, 2, 3, 4],
            "start_time": "23:00",
            "target_soc": 80
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = body["schedule"]["id"].as_str().unwrap().to_string();

    let uri = format!("/api/charging/schedules/{}", id);
    let (status, body) = call(
        &state,
        "PUT",
        &uri,
        Some(json!({"ready_by_time": "07:30"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["schedule"]["ready_by_time"], json!("07:30"));
    assert_eq!(body["schedule"]["start_time"], Value::Null);

    let (_, body) = call(&state, "GET", "/api/charging/schedules", None).await;
    assert_eq!(body["schedules"].as_array().unwrap().len(), 1);

    let (status, _) = call(&state, "DELETE", &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = call(&state, "DELETE", &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = call(&state, "PUT", &uri, Some(json!({"name": "x"}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn schedule_validation_error() {
    let state = test_state(VehicleState::new(50.0));
    let (status, body) = call(
        &state,
        "POST",
        "/api/charging/schedules",
        Some(json!({
            "name": "Broken",
            "days_of_week": [9],
            "start_time": "23:00",
            "target_soc": 80
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], json!(false));
}

#[tokio::test]
async fn stations_filtering() {
    let state = test_state(VehicleState::new(50.0));
    let (status, body) = call(
        &state,
        "GET",
        "/api/charging/stations?max_distance_km=100&connector_types=ccs",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let stations = body["stations"].as_array().unwrap();
    assert_eq!(body["count"], json!(stations.len()));
    for station in stations {
        let connectors = station["connector_types"].as_array().unwrap();
        assert!(connectors.contains(&json!("ccs")));
    }

    let (status, _) = call(
        &state,
        "GET",
        "/api/charging/stations?connector_types=warp",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

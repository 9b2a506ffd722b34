//! Axum-based HTTP API

use crate::charging::ConnectorType;
use crate::command::CommandKind;
use crate::engine::CompanionEngine;
use crate::error::LandauError;
use crate::safety;
use crate::schedule::ChargingSchedule;
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use serde::Deserialize;
use serde_json::{Value, json};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use uuid::Uuid;

/// Seconds after which a vehicle snapshot is reported stale
pub const STALE_AFTER_SECS: i64 = 60;

/// Minutes after which an unlocked vehicle raises a warning
pub const UNLOCKED_WARNING_MINS: i64 = 10;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<CompanionEngine>,
}

/// Error response in the `{"success": false, "error": ...}` envelope
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request<S: Into<String>>(message: S) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn not_found<S: Into<String>>(message: S) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }
}

/// HTTP status for an engine error
pub fn status_for(err: &LandauError) -> StatusCode {
    match err {
        LandauError::InvalidCommand { .. }
        | LandauError::InvalidCharging { .. }
        | LandauError::Validation { .. } => StatusCode::BAD_REQUEST,
        LandauError::NotFound { .. } => StatusCode::NOT_FOUND,
        LandauError::NoActiveSession | LandauError::Conflict { .. } => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<LandauError> for ApiError {
    fn from(err: LandauError) -> Self {
        let message = match &err {
            LandauError::InvalidCommand { reason } => reason.to_string(),
            LandauError::InvalidCharging { message } => message.clone(),
            other => other.to_string(),
        };
        Self {
            status: status_for(&err),
            message,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(json!({"success": false, "error": self.message})),
        )
            .into_response()
    }
}

type ApiResult = Result<Json<Value>, ApiError>;

fn parse_command_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::bad_request("Invalid command ID"))
}

/// Queue a command and report its id and initial status
fn submit(state: &AppState, kind: CommandKind) -> Result<Value, ApiError> {
    let handle = state.engine.submit_command(kind)?;
    let command = state.engine.command_status(handle.id())?;
    Ok(json!({
        "success": true,
        "command_id": command.id.to_string(),
        "status": command.status,
    }))
}

async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("APP_VERSION"),
    }))
}

async fn vehicle_status(State(state): State<AppState>) -> impl IntoResponse {
    let vehicle = state.engine.vehicle_snapshot();
    Json(json!({
        "success": true,
        "is_stale": vehicle.is_stale(STALE_AFTER_SECS),
        "warnings": {
            "low_battery": vehicle.is_low_battery(),
            "critical_battery": vehicle.is_critical_battery(),
            "unlocked_too_long": vehicle.is_unlocked_too_long(UNLOCKED_WARNING_MINS),
        },
        "data": vehicle,
    }))
}

async fn lock(State(state): State<AppState>) -> ApiResult {
    let body = submit(&state, CommandKind::Lock)?;
    Ok(Json(body))
}

async fn unlock(State(state): State<AppState>) -> ApiResult {
    let body = submit(&state, CommandKind::Unlock)?;
    Ok(Json(body))
}

#[derive(Debug, Deserialize)]
pub struct ClimateBody {
    #[serde(default = "default_climate_action")]
    pub action: String,
    pub temperature: Option<f64>,
}

fn default_climate_action() -> String {
    "start".to_string()
}

async fn climate(State(state): State<AppState>, Json(body): Json<ClimateBody>) -> ApiResult {
    match body.action.as_str() {
        "start" => {
            let mut resp = submit(
                &state,
                CommandKind::ClimateOn {
                    target_temp: body.temperature,
                },
            )?;
            let vehicle = state.engine.vehicle_snapshot();
            resp["battery_drain_estimate"] = json!(
                vehicle
                    .climate_settings
                    .estimate_battery_drain_per_10min(vehicle.cabin_temp_celsius)
            );
            resp["is_plugged_in"] = json!(vehicle.is_plugged_in());
            Ok(Json(resp))
        }
        "stop" => {
            let resp = submit(&state, CommandKind::ClimateOff)?;
            Ok(Json(resp))
        }
        other => Err(ApiError::bad_request(format!(
            "Invalid action '{}'. Use: start, stop",
            other
        ))),
    }
}

#[derive(Debug, Deserialize)]
pub struct TemperatureBody {
    pub temperature: f64,
}

async fn set_temperature(
    State(state): State<AppState>,
    Json(body): Json<TemperatureBody>,
) -> ApiResult {
    let resp = submit(
        &state,
        CommandKind::SetTemp {
            target_temp: body.temperature,
        },
    )?;
    Ok(Json(resp))
}

#[derive(Debug, Deserialize)]
pub struct SeatHeatBody {
    pub seat: String,
    pub level: String,
}

async fn seat_heat(State(state): State<AppState>, Json(body): Json<SeatHeatBody>) -> ApiResult {
    let seat = safety::parse_seat(&body.seat).map_err(LandauError::invalid_command)?;
    let level = safety::parse_heat_level(&body.level).map_err(LandauError::invalid_command)?;
    let resp = submit(&state, CommandKind::SeatHeat { seat, level })?;
    Ok(Json(resp))
}

#[derive(Debug, Deserialize)]
pub struct SteeringHeatBody {
    pub enabled: bool,
}

async fn steering_heat(
    State(state): State<AppState>,
    Json(body): Json<SteeringHeatBody>,
) -> ApiResult {
    let resp = submit(
        &state,
        CommandKind::SteeringHeat {
            enabled: body.enabled,
        },
    )?;
    Ok(Json(resp))
}

#[derive(Debug, Deserialize)]
pub struct DefrostBody {
    pub position: String,
    pub enabled: bool,
}

async fn defrost(State(state): State<AppState>, Json(body): Json<DefrostBody>) -> ApiResult {
    let position =
        safety::parse_defrost_position(&body.position).map_err(LandauError::invalid_command)?;
    let resp = submit(
        &state,
        CommandKind::Defrost {
            position,
            enabled: body.enabled,
        },
    )?;
    Ok(Json(resp))
}

async fn trunk_open(State(state): State<AppState>) -> ApiResult {
    let resp = submit(&state, CommandKind::TrunkOpen)?;
    Ok(Json(resp))
}

async fn frunk_open(State(state): State<AppState>) -> ApiResult {
    let resp = submit(&state, CommandKind::FrunkOpen)?;
    Ok(Json(resp))
}

async fn honk_flash(State(state): State<AppState>) -> ApiResult {
    let resp = submit(&state, CommandKind::HonkFlash)?;
    Ok(Json(resp))
}

async fn command_status(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult {
    let id = parse_command_id(&id)?;
    let command = state
        .engine
        .command_status(id)
        .map_err(|_| ApiError::not_found("Command not found"))?;
    Ok(Json(json!({"success": true, "data": command})))
}

async fn cancel_command(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult {
    let id = parse_command_id(&id)?;
    let cancelled = state.engine.cancel_command(id);
    Ok(Json(json!({"success": cancelled, "cancelled": cancelled})))
}

#[derive(Debug, Deserialize)]
pub struct StartChargingBody {
    pub target_soc: Option<f64>,
}

async fn start_charging(
    State(state): State<AppState>,
    Json(body): Json<StartChargingBody>,
) -> ApiResult {
    let target = body
        .target_soc
        .unwrap_or_else(|| f64::from(state.engine.charge_limit()));
    let session = state.engine.start_charging(target)?;
    Ok(Json(json!({"success": true, "session": session})))
}

async fn stop_charging(State(state): State<AppState>) -> ApiResult {
    let session = state.engine.stop_charging().await?;
    Ok(Json(json!({"success": true, "session": session})))
}

async fn charging_status(State(state): State<AppState>) -> impl IntoResponse {
    let session = state.engine.current_session();
    Json(json!({
        "success": true,
        "is_charging": session.as_ref().is_some_and(|s| s.is_active),
        "session": session,
        "charge_limit": state.engine.charge_limit(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    pub limit: Option<usize>,
}

async fn charging_history(
    State(state): State<AppState>,
    Query(params): Query<HistoryParams>,
) -> impl IntoResponse {
    let sessions = state.engine.charging_history(params.limit.unwrap_or(10));
    Json(json!({
        "success": true,
        "sessions": sessions,
        "stats": state.engine.charging_stats(),
    }))
}

async fn get_charge_limit(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({"success": true, "charge_limit": state.engine.charge_limit()}))
}

#[derive(Debug, Deserialize)]
pub struct ChargeLimitBody {
    pub limit: Option<i64>,
}

async fn set_charge_limit(
    State(state): State<AppState>,
    Json(body): Json<ChargeLimitBody>,
) -> ApiResult {
    let limit = body
        .limit
        .ok_or_else(|| ApiError::bad_request("Missing required field: limit"))?;
    let limit = u8::try_from(limit)
        .map_err(|_| ApiError::bad_request("Charge limit must be between 1 and 100"))?;
    let applied = state.engine.set_charge_limit(limit)?;
    Ok(Json(json!({"success": true, "charge_limit": applied})))
}

async fn list_schedules(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({"success": true, "schedules": state.engine.list_schedules()}))
}

async fn create_schedule(
    State(state): State<AppState>,
    Json(schedule): Json<ChargingSchedule>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let created = state.engine.create_schedule(schedule)?;
    Ok((
        StatusCode::CREATED,
        Json(json!({"success": true, "schedule": created})),
    ))
}

/// Partial schedule update; setting one time field clears the other
#[derive(Debug, Default, Deserialize)]
pub struct ScheduleUpdate {
    pub name: Option<String>,
    pub enabled: Option<bool>,
    pub days_of_week: Option<Vec<u8>>,
    pub start_time: Option<String>,
    pub ready_by_time: Option<String>,
    pub target_soc: Option<u8>,
}

impl ScheduleUpdate {
    pub fn apply_to(self, schedule: &mut ChargingSchedule) {
        if let Some(name) = self.name {
            schedule.name = name;
        }
        if let Some(enabled) = self.enabled {
            schedule.enabled = enabled;
        }
        if let Some(days) = self.days_of_week {
            schedule.days_of_week = days;
        }
        if let Some(start) = self.start_time {
            schedule.start_time = Some(start);
            schedule.ready_by_time = None;
        }
        if let Some(ready_by) = self.ready_by_time {
            schedule.ready_by_time = Some(ready_by);
            schedule.start_time = None;
        }
        if let Some(target) = self.target_soc {
            schedule.target_soc = target;
        }
    }
}

async fn update_schedule(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(update): Json<ScheduleUpdate>,
) -> ApiResult {
    let mut schedule = state
        .engine
        .schedule(&id)
        .ok_or_else(|| ApiError::not_found("Schedule not found"))?;
    update.apply_to(&mut schedule);
    let updated = state.engine.update_schedule(schedule)?;
    Ok(Json(json!({"success": true, "schedule": updated})))
}

async fn delete_schedule(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult {
    if !state.engine.delete_schedule(&id)? {
        return Err(ApiError::not_found("Schedule not found"));
    }
    Ok(Json(json!({"success": true})))
}

#[derive(Debug, Deserialize)]
pub struct StationParams {
    pub max_distance_km: Option<f64>,
    /// Comma-separated connector list, e.g. `ccs,tesla`
    pub connector_types: Option<String>,
    pub min_power_kw: Option<u32>,
}

async fn stations(
    State(state): State<AppState>,
    Query(params): Query<StationParams>,
) -> ApiResult {
    let connectors = params
        .connector_types
        .as_deref()
        .unwrap_or("")
        .split(',')
        .filter(|s| !s.trim().is_empty())
        .map(str::parse::<ConnectorType>)
        .collect::<Result<Vec<_>, _>>()
        .map_err(ApiError::bad_request)?;
    let stations = state.engine.nearby_stations(
        params.max_distance_km.unwrap_or(10.0),
        &connectors,
        params.min_power_kw,
    );
    Ok(Json(json!({
        "success": true,
        "count": stations.len(),
        "stations": stations,
    })))
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/vehicle/status", get(vehicle_status))
        .route("/api/vehicle/lock", post(lock))
        .route("/api/vehicle/unlock", post(unlock))
        .route("/api/vehicle/climate", post(climate).put(set_temperature))
        .route("/api/vehicle/seat-heat", post(seat_heat))
        .route("/api/vehicle/steering-heat", post(steering_heat))
        .route("/api/vehicle/defrost", post(defrost))
        .route("/api/vehicle/trunk/open", post(trunk_open))
        .route("/api/vehicle/frunk/open", post(frunk_open))
        .route("/api/vehicle/honk-flash", post(honk_flash))
        .route(
            "/api/vehicle/commands/{id}",
            get(command_status).delete(cancel_command),
        )
        .route("/api/charging/start", post(start_charging))
        .route("/api/charging/stop", post(stop_charging))
        .route("/api/charging/status", get(charging_status))
        .route("/api/charging/history", get(charging_history))
        .route(
            "/api/charging/limit",
            get(get_charge_limit).put(set_charge_limit),
        )
        .route(
            "/api/charging/schedules",
            get(list_schedules).post(create_schedule),
        )
        .route(
            "/api/charging/schedules/{id}",
            put(update_schedule).delete(delete_schedule),
        )
        .route("/api/charging/stations", get(stations))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

pub async fn serve(engine: Arc<CompanionEngine>, host: &str, port: u16) -> anyhow::Result<()> {
    let router = build_router(AppState { engine });

    let logger = crate::logging::get_logger("web");
    logger.info(&format!(
        "Starting web server; requested host={}, port={}",
        host, port
    ));

    let addr = match host.parse::<IpAddr>() {
        Ok(ip) => SocketAddr::new(ip, port),
        Err(_) => {
            logger.warn(&format!(
                "Invalid host '{}'; falling back to 127.0.0.1",
                host
            ));
            ([127, 0, 0, 1], port).into()
        }
    };

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let local_addr = listener.local_addr()?;
    logger.info(&format!(
        "Web server listening at http://{}:{} (API /api)",
        local_addr.ip(),
        local_addr.port()
    ));

    axum::serve(listener, router).await?;
    Ok(())
}

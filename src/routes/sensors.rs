use axum::{
    extract::{Path, State},
    response::Response,
};

use crate::{
    db::NOW,
    error::{validation, AppResult, FieldErrors, OptionExt},
    middleware::{validation::parse_id, JsonBody},
    models::SensorDetail,
    queries,
    state::AppState,
    types::{created, ok, CreateSensorRequest, UpdateSensorRequest},
};

async fn find(state: &AppState, id: i64) -> AppResult<SensorDetail> {
    queries::sensor(&state.db, id).await?.ok_or_not_found("Sensor")
}

fn check_value(errors: &mut FieldErrors, value: Option<f64>) {
    if let Some(v) = value {
        if !v.is_finite() {
            errors.add("value", "value must be a finite number");
        }
    }
}

pub async fn list_sensors(State(state): State<AppState>) -> AppResult<Response> {
    Ok(ok("Sensors", "Sensor list", queries::all_sensors(&state.db).await?))
}

pub async fn get_sensor(State(state): State<AppState>, Path(id): Path<String>) -> AppResult<Response> {
    let sensor = find(&state, parse_id(&id, "Sensor")?).await?;
    Ok(ok("Sensor", "Sensor found", sensor))
}

pub async fn create_sensor(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<CreateSensorRequest>,
) -> AppResult<Response> {
    let mut errors = FieldErrors::default();
    let device_id = validation::require(&mut errors, "device_id", req.device_id);
    let sensor_type_id = validation::require(&mut errors, "sensor_type_id", req.sensor_type_id);
    let value = validation::require(&mut errors, "value", req.value);
    check_value(&mut errors, value);
    validation::validate_flag(&mut errors, "active", req.active);
    if let Some(id) = device_id {
        if !queries::exists(&state.db, "devices", id).await? {
            errors.add("device_id", format!("device {} does not exist", id));
        }
    }
    if let Some(id) = sensor_type_id {
        if !queries::exists(&state.db, "sensor_types", id).await? {
            errors.add("sensor_type_id", format!("sensor type {} does not exist", id));
        }
    }
    errors.finish()?;

    let id = sqlx::query("INSERT INTO sensors (device_id, sensor_type_id, value, active) VALUES (?1, ?2, ?3, ?4)")
        .bind(device_id)
        .bind(sensor_type_id)
        .bind(value)
        .bind(req.active.unwrap_or(1))
        .execute(&state.db)
        .await?
        .last_insert_rowid();
    Ok(created("Sensor created", "Sensor created successfully", find(&state, id).await?))
}

pub async fn update_sensor(
    State(state): State<AppState>,
    Path(id): Path<String>,
    JsonBody(req): JsonBody<UpdateSensorRequest>,
) -> AppResult<Response> {
    let current = find(&state, parse_id(&id, "Sensor")?).await?;

    let mut errors = FieldErrors::default();
    check_value(&mut errors, req.value);
    validation::validate_flag(&mut errors, "active", req.active);
    errors.finish()?;

    if req.value.is_none() && req.active.is_none() {
        return Ok(ok("Sensor updated", "Nothing to update", current));
    }

    let sql = format!(
        "UPDATE sensors SET value = COALESCE(?1, value), active = COALESCE(?2, active), updated_at = {} WHERE id = ?3",
        NOW
    );
    sqlx::query(&sql).bind(req.value).bind(req.active).bind(current.sensor.id).execute(&state.db).await?;
    Ok(ok("Sensor updated", "Sensor updated successfully", find(&state, current.sensor.id).await?))
}

/// Flips `active` between 0 and 1.
pub async fn toggle_sensor(State(state): State<AppState>, Path(id): Path<String>) -> AppResult<Response> {
    let current = find(&state, parse_id(&id, "Sensor")?).await?;
    let sql = format!("UPDATE sensors SET active = 1 - active, updated_at = {} WHERE id = ?1", NOW);
    sqlx::query(&sql).bind(current.sensor.id).execute(&state.db).await?;

    let sensor = find(&state, current.sensor.id).await?;
    tracing::debug!(sensor_id = sensor.sensor.id, active = sensor.sensor.active, "Sensor toggled");
    let message = if sensor.sensor.active == 1 { "Sensor activated" } else { "Sensor deactivated" };
    Ok(ok("Sensor updated", message, sensor))
}

pub async fn delete_sensor(State(state): State<AppState>, Path(id): Path<String>) -> AppResult<Response> {
    let sensor = find(&state, parse_id(&id, "Sensor")?).await?;
    sqlx::query("DELETE FROM sensors WHERE id = ?1").bind(sensor.sensor.id).execute(&state.db).await?;
    Ok(ok("Sensor deleted", "Sensor deleted successfully", sensor))
}

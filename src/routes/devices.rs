use axum::{
    extract::{Path, State},
    response::Response,
};

use crate::{
    db::NOW,
    error::{validation, AppError, AppResult, FieldErrors, OptionExt},
    middleware::{validation::parse_id, CurrentUser, JsonBody},
    models::Device,
    provisioning::{provision_device, DeviceKind},
    queries,
    state::AppState,
    types::{created, ok, CreateDeviceRequest, ProvisionDeviceRequest, UpdateDeviceRequest},
};

async fn find(state: &AppState, id: i64) -> AppResult<Device> {
    sqlx::query_as::<_, Device>("SELECT * FROM devices WHERE id = ?1")
        .bind(id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_not_found("Device")
}

/// All devices with their sensors.
pub async fn list_devices(State(state): State<AppState>) -> AppResult<Response> {
    let devices = sqlx::query_as::<_, Device>("SELECT * FROM devices ORDER BY id").fetch_all(&state.db).await?;
    let sensors = queries::all_sensors(&state.db).await?;
    Ok(ok("Devices", "Device list", queries::attach_sensors(devices, sensors, None)))
}

pub async fn get_device(State(state): State<AppState>, Path(id): Path<String>) -> AppResult<Response> {
    let detail = queries::device_detail(&state.db, parse_id(&id, "Device")?).await?.ok_or_not_found("Device")?;
    Ok(ok("Device", "Device found", detail))
}

pub async fn create_device(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<CreateDeviceRequest>,
) -> AppResult<Response> {
    let mut errors = FieldErrors::default();
    let user_id = validation::require(&mut errors, "user_id", req.user_id);
    let device_type_id = validation::require(&mut errors, "device_type_id", req.device_type_id);
    let name = validation::require_text(&mut errors, "name", &req.name);
    if let Some(id) = user_id {
        if !queries::exists(&state.db, "users", id).await? {
            errors.add("user_id", format!("user {} does not exist", id));
        }
    }
    if let Some(id) = device_type_id {
        if !queries::exists(&state.db, "device_types", id).await? {
            errors.add("device_type_id", format!("device type {} does not exist", id));
        }
    }
    errors.finish()?;

    let id = sqlx::query("INSERT INTO devices (user_id, device_type_id, name) VALUES (?1, ?2, ?3)")
        .bind(user_id)
        .bind(device_type_id)
        .bind(name)
        .execute(&state.db)
        .await?
        .last_insert_rowid();
    let device = find(&state, id).await?;
    Ok(created("Device created", "Device created successfully", device))
}

pub async fn update_device(
    State(state): State<AppState>,
    Path(id): Path<String>,
    JsonBody(req): JsonBody<UpdateDeviceRequest>,
) -> AppResult<Response> {
    let current = find(&state, parse_id(&id, "Device")?).await?;

    let mut errors = FieldErrors::default();
    validation::optional_text(&mut errors, "name", &req.name);
    errors.finish()?;

    let Some(name) = req.name.as_deref().map(str::trim) else {
        return Ok(ok("Device updated", "Nothing to update", current));
    };

    let sql = format!("UPDATE devices SET name = ?1, updated_at = {} WHERE id = ?2", NOW);
    sqlx::query(&sql).bind(name).bind(current.id).execute(&state.db).await?;
    let device = find(&state, current.id).await?;
    Ok(ok("Device updated", "Device updated successfully", device))
}

pub async fn delete_device(State(state): State<AppState>, Path(id): Path<String>) -> AppResult<Response> {
    let device = find(&state, parse_id(&id, "Device")?).await?;
    sqlx::query("DELETE FROM devices WHERE id = ?1").bind(device.id).execute(&state.db).await?;
    Ok(ok("Device deleted", "Device deleted successfully", device))
}

/// Creates a device of the requested kind for the caller, with its sensors.
pub async fn provision(
    State(state): State<AppState>,
    current: CurrentUser,
    JsonBody(req): JsonBody<ProvisionDeviceRequest>,
) -> AppResult<Response> {
    let kind: DeviceKind = req
        .kind
        .as_deref()
        .ok_or_else(|| AppError::BadRequest("Device kind is required".to_string()))?
        .parse()?;

    let detail = provision_device(
        &state.db,
        current.id(),
        kind,
        req.name.as_deref(),
        state.config.devices.max_per_kind,
    )
    .await?;
    state.metrics.inc_devices_provisioned();
    Ok(created("Device created", "Device and sensors created successfully", detail))
}

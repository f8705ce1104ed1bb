use axum::{
    extract::{Path, State},
    response::Response,
};

use crate::{
    db::NOW,
    error::{validation, AppResult, FieldErrors, OptionExt},
    middleware::{validation::parse_id, JsonBody},
    models::DeviceType,
    provisioning::DeviceKind,
    state::AppState,
    types::{created, ok, DeviceTypePayload},
};

async fn find(state: &AppState, id: i64) -> AppResult<DeviceType> {
    sqlx::query_as::<_, DeviceType>("SELECT * FROM device_types WHERE id = ?1")
        .bind(id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_not_found("Device type")
}

pub async fn list_device_types(State(state): State<AppState>) -> AppResult<Response> {
    let types = sqlx::query_as::<_, DeviceType>("SELECT * FROM device_types ORDER BY id").fetch_all(&state.db).await?;
    Ok(ok("Device types", "Device type list", types))
}

pub async fn get_device_type(State(state): State<AppState>, Path(id): Path<String>) -> AppResult<Response> {
    let device_type = find(&state, parse_id(&id, "Device type")?).await?;
    Ok(ok("Device type", "Device type found", device_type))
}

pub async fn create_device_type(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<DeviceTypePayload>,
) -> AppResult<Response> {
    let mut errors = FieldErrors::default();
    let name = validation::require_text(&mut errors, "name", &req.name);
    errors.finish()?;
    let kind: DeviceKind = name.unwrap_or_default().parse()?;

    let id = sqlx::query("INSERT INTO device_types (name) VALUES (?1)")
        .bind(kind.as_str())
        .execute(&state.db)
        .await?
        .last_insert_rowid();
    let device_type = find(&state, id).await?;
    Ok(created("Device type created", "Device type created successfully", device_type))
}

pub async fn update_device_type(
    State(state): State<AppState>,
    Path(id): Path<String>,
    JsonBody(req): JsonBody<DeviceTypePayload>,
) -> AppResult<Response> {
    let current = find(&state, parse_id(&id, "Device type")?).await?;

    let mut errors = FieldErrors::default();
    validation::optional_text(&mut errors, "name", &req.name);
    errors.finish()?;

    let Some(name) = req.name.as_deref() else {
        return Ok(ok("Device type updated", "Nothing to update", current));
    };
    let kind: DeviceKind = name.parse()?;

    let sql = format!("UPDATE device_types SET name = ?1, updated_at = {} WHERE id = ?2", NOW);
    sqlx::query(&sql).bind(kind.as_str()).bind(current.id).execute(&state.db).await?;
    let device_type = find(&state, current.id).await?;
    Ok(ok("Device type updated", "Device type updated successfully", device_type))
}

pub async fn delete_device_type(State(state): State<AppState>, Path(id): Path<String>) -> AppResult<Response> {
    let device_type = find(&state, parse_id(&id, "Device type")?).await?;
    sqlx::query("DELETE FROM device_types WHERE id = ?1").bind(device_type.id).execute(&state.db).await?;
    Ok(ok("Device type deleted", "Device type deleted successfully", device_type))
}

use axum::{
    extract::{Path, State},
    response::Response,
};

use crate::{
    db::NOW,
    error::{validation, AppResult, FieldErrors, OptionExt},
    middleware::{validation::parse_id, JsonBody},
    models::SensorType,
    state::AppState,
    types::{created, ok, SensorTypePayload},
};

async fn find(state: &AppState, id: i64) -> AppResult<SensorType> {
    sqlx::query_as::<_, SensorType>("SELECT * FROM sensor_types WHERE id = ?1")
        .bind(id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_not_found("Sensor type")
}

/// Looks a sensor type up by name, e.g. to label a reading with its unit.
pub async fn find_by_name(state: &AppState, name: &str) -> AppResult<SensorType> {
    sqlx::query_as::<_, SensorType>("SELECT * FROM sensor_types WHERE name = ?1")
        .bind(name)
        .fetch_optional(&state.db)
        .await?
        .ok_or_not_found(&format!("Sensor type {}", name))
}

pub async fn list_sensor_types(State(state): State<AppState>) -> AppResult<Response> {
    let types = sqlx::query_as::<_, SensorType>("SELECT * FROM sensor_types ORDER BY id").fetch_all(&state.db).await?;
    Ok(ok("Sensor types", "Sensor type list", types))
}

pub async fn get_sensor_type(State(state): State<AppState>, Path(id): Path<String>) -> AppResult<Response> {
    let sensor_type = find(&state, parse_id(&id, "Sensor type")?).await?;
    Ok(ok("Sensor type", "Sensor type found", sensor_type))
}

pub async fn create_sensor_type(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<SensorTypePayload>,
) -> AppResult<Response> {
    let mut errors = FieldErrors::default();
    let name = validation::require_text(&mut errors, "name", &req.name);
    let unit = validation::require_text(&mut errors, "unit", &req.unit);
    errors.finish()?;

    let id = sqlx::query("INSERT INTO sensor_types (name, unit) VALUES (?1, ?2)")
        .bind(name)
        .bind(unit)
        .execute(&state.db)
        .await?
        .last_insert_rowid();
    let sensor_type = find(&state, id).await?;
    Ok(created("Sensor type created", "Sensor type created successfully", sensor_type))
}

pub async fn update_sensor_type(
    State(state): State<AppState>,
    Path(id): Path<String>,
    JsonBody(req): JsonBody<SensorTypePayload>,
) -> AppResult<Response> {
    let current = find(&state, parse_id(&id, "Sensor type")?).await?;

    let mut errors = FieldErrors::default();
    validation::optional_text(&mut errors, "name", &req.name);
    validation::optional_text(&mut errors, "unit", &req.unit);
    errors.finish()?;

    if req.name.is_none() && req.unit.is_none() {
        return Ok(ok("Sensor type updated", "Nothing to update", current));
    }

    let sql = format!(
        "UPDATE sensor_types SET name = COALESCE(?1, name), unit = COALESCE(?2, unit), updated_at = {} \
         WHERE id = ?3",
        NOW
    );
    sqlx::query(&sql)
        .bind(req.name.as_deref().map(str::trim))
        .bind(req.unit.as_deref().map(str::trim))
        .bind(current.id)
        .execute(&state.db)
        .await?;
    let sensor_type = find(&state, current.id).await?;
    Ok(ok("Sensor type updated", "Sensor type updated successfully", sensor_type))
}

pub async fn delete_sensor_type(State(state): State<AppState>, Path(id): Path<String>) -> AppResult<Response> {
    let sensor_type = find(&state, parse_id(&id, "Sensor type")?).await?;
    sqlx::query("DELETE FROM sensor_types WHERE id = ?1").bind(sensor_type.id).execute(&state.db).await?;
    Ok(ok("Sensor type deleted", "Sensor type deleted successfully", sensor_type))
}

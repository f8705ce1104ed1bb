use axum::{
    extract::{Path, State},
    response::Response,
};

use crate::{
    db::NOW,
    error::{validation, AppResult, FieldErrors, OptionExt},
    middleware::{validation::parse_id, JsonBody},
    models::{ConfigurationDetail, ConfigurationType},
    queries,
    state::AppState,
    types::{created, ok, CreateConfigurationRequest, UpdateConfigurationRequest},
};

async fn find(state: &AppState, id: i64) -> AppResult<ConfigurationDetail> {
    queries::configuration(&state.db, id).await?.ok_or_not_found("Configuration")
}

pub async fn list_configurations(State(state): State<AppState>) -> AppResult<Response> {
    Ok(ok("Configurations", "Configuration list", queries::all_configurations(&state.db).await?))
}

pub async fn get_configuration(State(state): State<AppState>, Path(id): Path<String>) -> AppResult<Response> {
    let configuration = find(&state, parse_id(&id, "Configuration")?).await?;
    Ok(ok("Configuration", "Configuration found", configuration))
}

/// Configurations of one user.
pub async fn user_configurations(State(state): State<AppState>, Path(id): Path<String>) -> AppResult<Response> {
    let user = queries::find_user(&state.db, parse_id(&id, "User")?).await?.ok_or_not_found("User")?;
    let configurations = queries::configurations_of_user(&state.db, user.id).await?;
    Ok(ok("Configurations", "User configuration list", configurations))
}

pub async fn create_configuration(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<CreateConfigurationRequest>,
) -> AppResult<Response> {
    let mut errors = FieldErrors::default();
    let type_id = validation::require(&mut errors, "configuration_type_id", req.configuration_type_id);
    let user_id = validation::require(&mut errors, "user_id", req.user_id);
    let data = validation::require_text(&mut errors, "data", &req.data);
    if let Some(id) = type_id {
        if !queries::exists(&state.db, "configuration_types", id).await? {
            errors.add("configuration_type_id", format!("configuration type {} does not exist", id));
        }
    }
    if let Some(id) = user_id {
        if !queries::exists(&state.db, "users", id).await? {
            errors.add("user_id", format!("user {} does not exist", id));
        }
    }
    errors.finish()?;

    let id = sqlx::query("INSERT INTO configurations (user_id, configuration_type_id, data) VALUES (?1, ?2, ?3)")
        .bind(user_id)
        .bind(type_id)
        .bind(data)
        .execute(&state.db)
        .await?
        .last_insert_rowid();
    Ok(created("Configuration created", "Configuration created successfully", find(&state, id).await?))
}

pub async fn update_configuration(
    State(state): State<AppState>,
    Path(id): Path<String>,
    JsonBody(req): JsonBody<UpdateConfigurationRequest>,
) -> AppResult<Response> {
    let current = find(&state, parse_id(&id, "Configuration")?).await?;

    let mut errors = FieldErrors::default();
    validation::optional_text(&mut errors, "data", &req.data);
    errors.finish()?;

    let Some(data) = req.data.as_deref().map(str::trim) else {
        return Ok(ok("Configuration updated", "Nothing to update", current));
    };

    let sql = format!("UPDATE configurations SET data = ?1, updated_at = {} WHERE id = ?2", NOW);
    sqlx::query(&sql).bind(data).bind(current.configuration.id).execute(&state.db).await?;
    let updated = find(&state, current.configuration.id).await?;
    Ok(ok("Configuration updated", "Configuration updated successfully", updated))
}

pub async fn delete_configuration(State(state): State<AppState>, Path(id): Path<String>) -> AppResult<Response> {
    let configuration = find(&state, parse_id(&id, "Configuration")?).await?;
    sqlx::query("DELETE FROM configurations WHERE id = ?1")
        .bind(configuration.configuration.id)
        .execute(&state.db)
        .await?;
    Ok(ok("Configuration deleted", "Configuration deleted successfully", configuration))
}

pub async fn list_configuration_types(State(state): State<AppState>) -> AppResult<Response> {
    let types = sqlx::query_as::<_, ConfigurationType>("SELECT * FROM configuration_types ORDER BY id")
        .fetch_all(&state.db)
        .await?;
    Ok(ok("Configuration types", "Configuration type list", types))
}

use axum::{
    extract::{Path, State},
    response::Response,
};

use crate::{
    db::NOW,
    error::{validation, AppResult, FieldErrors, OptionExt},
    middleware::{validation::parse_id, JsonBody},
    models::Habit,
    state::AppState,
    types::{created, ok, HabitPayload},
};

async fn find(state: &AppState, id: i64) -> AppResult<Habit> {
    sqlx::query_as::<_, Habit>("SELECT * FROM habits WHERE id = ?1")
        .bind(id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_not_found("Habit")
}

pub async fn list_habits(State(state): State<AppState>) -> AppResult<Response> {
    let habits = sqlx::query_as::<_, Habit>("SELECT * FROM habits ORDER BY id").fetch_all(&state.db).await?;
    Ok(ok("Habits", "Habit list", habits))
}

pub async fn get_habit(State(state): State<AppState>, Path(id): Path<String>) -> AppResult<Response> {
    let habit = find(&state, parse_id(&id, "Habit")?).await?;
    Ok(ok("Habit", "Habit found", habit))
}

pub async fn create_habit(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<HabitPayload>,
) -> AppResult<Response> {
    let mut errors = FieldErrors::default();
    let name = validation::require_text(&mut errors, "name", &req.name);
    let description = validation::require_text(&mut errors, "description", &req.description);
    errors.finish()?;

    let id = sqlx::query("INSERT INTO habits (name, description) VALUES (?1, ?2)")
        .bind(name)
        .bind(description)
        .execute(&state.db)
        .await?
        .last_insert_rowid();
    let habit = find(&state, id).await?;
    Ok(created("Habit created", "Habit created successfully", habit))
}

pub async fn update_habit(
    State(state): State<AppState>,
    Path(id): Path<String>,
    JsonBody(req): JsonBody<HabitPayload>,
) -> AppResult<Response> {
    let current = find(&state, parse_id(&id, "Habit")?).await?;

    let mut errors = FieldErrors::default();
    validation::optional_text(&mut errors, "name", &req.name);
    validation::optional_text(&mut errors, "description", &req.description);
    errors.finish()?;

    if req.name.is_none() && req.description.is_none() {
        return Ok(ok("Habit updated", "Nothing to update", current));
    }

    let sql = format!(
        "UPDATE habits SET name = COALESCE(?1, name), description = COALESCE(?2, description), updated_at = {} \
         WHERE id = ?3",
        NOW
    );
    sqlx::query(&sql)
        .bind(req.name.as_deref().map(str::trim))
        .bind(req.description.as_deref().map(str::trim))
        .bind(current.id)
        .execute(&state.db)
        .await?;
    let habit = find(&state, current.id).await?;
    Ok(ok("Habit updated", "Habit updated successfully", habit))
}

pub async fn delete_habit(State(state): State<AppState>, Path(id): Path<String>) -> AppResult<Response> {
    let habit = find(&state, parse_id(&id, "Habit")?).await?;
    sqlx::query("DELETE FROM habits WHERE id = ?1").bind(habit.id).execute(&state.db).await?;
    Ok(ok("Habit deleted", "Habit deleted successfully", habit))
}

//! Compares the latest wristband reading with the caller's stored goal.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::{
    error::{AppResult, OptionExt},
    middleware::CurrentUser,
    queries,
    routes::sensor_types::find_by_name,
    state::AppState,
    types::ok,
    upstream::broker::{reading_text, Reading},
};

#[derive(Debug, Clone, Copy)]
enum Goal {
    Steps,
    Distance,
}

impl Goal {
    fn reading(self) -> Reading {
        match self {
            Goal::Steps => Reading::Steps,
            Goal::Distance => Reading::Distance,
        }
    }

    fn configuration_type(self) -> &'static str {
        match self {
            Goal::Steps => "alarma_pasos",
            Goal::Distance => "alarma_distancia",
        }
    }
}

async fn compare(state: &AppState, current: &CurrentUser, goal: Goal) -> AppResult<Response> {
    let reading = goal.reading();
    let sensor_type = find_by_name(state, reading.sensor_type()).await?;
    let configuration = queries::latest_configuration(&state.db, current.id(), goal.configuration_type())
        .await?
        .ok_or_not_found(&format!("Configuration {}", goal.configuration_type()))?;

    let value = state.broker.retained(reading.topic()).await?;
    let matched = reading_text(&value) == configuration.data;
    state.metrics.record_goal(matched);
    tracing::debug!(user_id = current.id(), ?goal, matched, "Goal compared");

    let data = json!({
        "retained_message": value,
        "unit": sensor_type.unit,
        "goal": configuration.data,
    });
    if matched {
        Ok(ok("Goal reached", "The reading matches the configured goal", data))
    } else {
        let body = json!({
            "type": "error",
            "title": "Goal not reached",
            "message": "The reading does not match the configured goal",
            "data": data,
        });
        Ok((StatusCode::BAD_REQUEST, Json(body)).into_response())
    }
}

pub async fn steps_goal(State(state): State<AppState>, current: CurrentUser) -> AppResult<Response> {
    compare(&state, &current, Goal::Steps).await
}

pub async fn distance_goal(State(state): State<AppState>, current: CurrentUser) -> AppResult<Response> {
    compare(&state, &current, Goal::Distance).await
}

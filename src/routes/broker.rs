use axum::{extract::State, response::Response};
use serde_json::{json, Value};

use crate::{
    error::{validation, AppError, AppResult, FieldErrors},
    middleware::JsonBody,
    routes::sensor_types::find_by_name,
    state::AppState,
    types::{ok, PublishRequest, ScreenRequest, TopicRequest},
    upstream::broker::{reading_text, Reading, SCREEN_TOPIC},
};

pub async fn topic_retained(State(state): State<AppState>, JsonBody(req): JsonBody<TopicRequest>) -> AppResult<Response> {
    let mut errors = FieldErrors::default();
    let topic = validation::require_text(&mut errors, "topic", &req.topic);
    errors.finish()?;
    let topic = topic.unwrap_or_default();

    let value = state.broker.retained(topic).await?;
    Ok(ok("Retained message", "Retained message fetched", json!({ "retained_message": value })))
}

pub async fn publish_topic(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<PublishRequest>,
) -> AppResult<Response> {
    let mut errors = FieldErrors::default();
    let topic = validation::require_text(&mut errors, "topic_name", &req.topic_name);
    if matches!(req.topic_message, None | Some(Value::Null)) {
        errors.add("topic_message", "topic_message is required");
    }
    errors.finish()?;

    let payload = req.topic_message.as_ref().map(reading_text).unwrap_or_default();
    let answer = state.broker.publish(topic.unwrap_or_default(), &payload).await?;
    Ok(ok("Message published", "Message published successfully", answer))
}

/// Screen modes are 1 to 4, given as a number or a numeric string.
fn screen_mode(value: Option<&Value>) -> Option<i64> {
    let mode = match value? {
        Value::Number(n) => n.as_i64()?,
        Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    (1..=4).contains(&mode).then_some(mode)
}

pub async fn send_to_screen(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<ScreenRequest>,
) -> AppResult<Response> {
    let mode = screen_mode(req.topic_message.as_ref())
        .ok_or_else(|| AppError::BadRequest("topic_message must be an integer between 1 and 4".to_string()))?;

    let answer = state.broker.publish(SCREEN_TOPIC, &mode.to_string()).await?;
    Ok(ok("Screen updated", "Screen mode sent", answer))
}

async fn read(state: &AppState, reading: Reading) -> AppResult<Response> {
    let sensor_type = find_by_name(state, reading.sensor_type()).await?;
    let value = state.broker.retained(reading.topic()).await?;
    Ok(ok(
        "Reading",
        &format!("Latest {} reading", sensor_type.name),
        json!({ "retained_message": value, "unit": sensor_type.unit }),
    ))
}

pub async fn read_distance(State(state): State<AppState>) -> AppResult<Response> {
    read(&state, Reading::Distance).await
}

pub async fn read_steps(State(state): State<AppState>) -> AppResult<Response> {
    read(&state, Reading::Steps).await
}

pub async fn read_heart_rate(State(state): State<AppState>) -> AppResult<Response> {
    read(&state, Reading::HeartRate).await
}

pub async fn read_alcohol(State(state): State<AppState>) -> AppResult<Response> {
    read(&state, Reading::Alcohol).await
}

pub async fn read_temperature(State(state): State<AppState>) -> AppResult<Response> {
    read(&state, Reading::Temperature).await
}

pub async fn read_weight(State(state): State<AppState>) -> AppResult<Response> {
    read(&state, Reading::Weight).await
}

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Success body shared by every resource endpoint.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub title: String,
    pub message: String,
    pub data: T,
}

pub fn success<T: Serialize>(status: StatusCode, title: &str, message: &str, data: T) -> Response {
    let body = Envelope { kind: "success", title: title.to_string(), message: message.to_string(), data };
    (status, Json(body)).into_response()
}

pub fn ok<T: Serialize>(title: &str, message: &str, data: T) -> Response {
    success(StatusCode::OK, title, message, data)
}

pub fn created<T: Serialize>(title: &str, message: &str, data: T) -> Response {
    success(StatusCode::CREATED, title, message, data)
}

/// Accepts `"1234"` as well as `1234`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TextOrNumber {
    Text(String),
    Number(serde_json::Number),
}

impl TextOrNumber {
    pub fn as_text(&self) -> String {
        match self {
            TextOrNumber::Text(s) => s.trim().to_string(),
            TextOrNumber::Number(n) => n.to_string(),
        }
    }
}

// Users

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: Option<String>,
    pub lastname: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub lastname: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AuthLoginRequest {
    pub user_email: Option<String>,
    pub password: Option<String>,
    pub verification_code: Option<TextOrNumber>,
}

#[derive(Debug, Deserialize)]
pub struct RecoverPasswordRequest {
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePasswordRequest {
    #[serde(alias = "oldPassword")]
    pub old_password: Option<String>,
    #[serde(alias = "newPassword")]
    pub new_password: Option<String>,
}

// Habits

#[derive(Debug, Deserialize)]
pub struct HabitPayload {
    pub name: Option<String>,
    pub description: Option<String>,
}

// Configurations

#[derive(Debug, Deserialize)]
pub struct CreateConfigurationRequest {
    pub configuration_type_id: Option<i64>,
    pub user_id: Option<i64>,
    pub data: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateConfigurationRequest {
    pub data: Option<String>,
}

// Devices

#[derive(Debug, Deserialize)]
pub struct CreateDeviceRequest {
    pub user_id: Option<i64>,
    pub device_type_id: Option<i64>,
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateDeviceRequest {
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ProvisionDeviceRequest {
    #[serde(alias = "tipoDispositivo")]
    pub kind: Option<String>,
    #[serde(alias = "nombre")]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DeviceTypePayload {
    pub name: Option<String>,
}

// Sensors

#[derive(Debug, Deserialize)]
pub struct CreateSensorRequest {
    pub device_id: Option<i64>,
    pub sensor_type_id: Option<i64>,
    pub value: Option<f64>,
    pub active: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateSensorRequest {
    pub value: Option<f64>,
    pub active: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct SensorTypePayload {
    pub name: Option<String>,
    pub unit: Option<String>,
}

// Broker

#[derive(Debug, Deserialize)]
pub struct TopicRequest {
    pub topic: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PublishRequest {
    pub topic_name: Option<String>,
    pub topic_message: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct ScreenRequest {
    pub topic_message: Option<Value>,
}

// Foods

#[derive(Debug, Deserialize)]
pub struct FoodQuery {
    pub nombrealimento: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct NutritionRequest {
    pub title: Option<String>,
    pub ingr: Option<Vec<String>>,
}

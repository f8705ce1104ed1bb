//! HTTP route handlers for the HealthyApp API.
//!
//! One module per resource plus the broker and nutrition gateways:
//!
//! - `users`: accounts, registration, verification, login and password flows
//! - `habits`, `configurations`, `devices`, `device_types`, `sensors`, `sensor_types`: CRUD
//! - `broker`: retained messages, publishing and reading shortcuts (`/api/emqx`)
//! - `goals`: step and distance goal comparison
//! - `foods`: food search and nutrition analysis
//! - `health`: health, readiness, metrics and version endpoints

pub mod broker;
pub mod configurations;
pub mod device_types;
pub mod devices;
pub mod foods;
pub mod goals;
pub mod habits;
pub mod health;
pub mod sensor_types;
pub mod sensors;
pub mod users;

use axum::{
    extract::DefaultBodyLimit,
    middleware::from_fn_with_state,
    routing::{get, post, put},
    Router,
};

use crate::middleware::{auth::require_auth, security_headers::security_headers_middleware};
use crate::state::AppState;

/// Builds the full API router. Tracing and CORS layers are added by the binary.
pub fn router(state: AppState) -> Router {
    let public = Router::new()
        .route("/healthz", get(health::healthz))
        .route("/readyz", get(health::readyz))
        .route("/metrics", get(health::metrics))
        .route("/metrics/prometheus", get(health::metrics_prometheus))
        .route("/version", get(health::version))
        .route("/api/users", get(users::list_users).post(users::register))
        .route("/api/users/code-verify/{id}", post(users::send_code))
        .route("/api/users/auth-login", post(users::auth_login))
        .route("/api/users/login", post(users::login))
        .route("/api/users/recuperar-contra", post(users::recover_password));

    let protected = Router::new()
        // Users
        .route("/api/users/logout", post(users::logout))
        .route("/api/users/actualizar", put(users::update_self))
        .route("/api/users/update-password", put(users::update_password))
        .route("/api/users/{id}", get(users::get_user).put(users::update_user).delete(users::delete_user))
        // Habits
        .route("/api/habits", get(habits::list_habits).post(habits::create_habit))
        .route(
            "/api/habits/{id}",
            get(habits::get_habit).put(habits::update_habit).delete(habits::delete_habit),
        )
        // Configurations
        .route(
            "/api/configurations",
            get(configurations::list_configurations).post(configurations::create_configuration),
        )
        .route(
            "/api/configurations/{id}",
            get(configurations::get_configuration)
                .put(configurations::update_configuration)
                .delete(configurations::delete_configuration),
        )
        .route("/api/configurations/user-conf/{id}", get(configurations::user_configurations))
        .route("/api/configurations/meta-pasos", post(goals::steps_goal))
        .route("/api/configurations/meta-distancia", post(goals::distance_goal))
        .route("/api/configuration-types", get(configurations::list_configuration_types))
        // Devices
        .route("/api/dispositivos", get(devices::list_devices).post(devices::create_device))
        .route(
            "/api/dispositivos/{id}",
            get(devices::get_device).put(devices::update_device).delete(devices::delete_device),
        )
        .route("/api/dispositivos/crear-dispositivo", post(devices::provision))
        .route("/api/device-types", get(device_types::list_device_types).post(device_types::create_device_type))
        .route(
            "/api/device-types/{id}",
            get(device_types::get_device_type)
                .put(device_types::update_device_type)
                .delete(device_types::delete_device_type),
        )
        // Sensors
        .route("/api/sensor", get(sensors::list_sensors).post(sensors::create_sensor))
        .route(
            "/api/sensor/{id}",
            get(sensors::get_sensor).put(sensors::update_sensor).delete(sensors::delete_sensor),
        )
        .route("/api/sensor/{id}/toggle", post(sensors::toggle_sensor))
        .route("/api/sensor-type", get(sensor_types::list_sensor_types).post(sensor_types::create_sensor_type))
        .route(
            "/api/sensor-type/{id}",
            get(sensor_types::get_sensor_type)
                .put(sensor_types::update_sensor_type)
                .delete(sensor_types::delete_sensor_type),
        )
        // Broker gateway
        .route("/api/emqx/topic-retained", post(broker::topic_retained))
        .route("/api/emqx/publish-emqx-topic", post(broker::publish_topic))
        .route("/api/emqx/obtener-distancia", post(broker::read_distance))
        .route("/api/emqx/obtener-pasos", post(broker::read_steps))
        .route("/api/emqx/obtener-ritmo", post(broker::read_heart_rate))
        .route("/api/emqx/obtener-alcohol", post(broker::read_alcohol))
        .route("/api/emqx/obtener-temperatura", post(broker::read_temperature))
        .route("/api/emqx/obtener-peso", post(broker::read_weight))
        .route("/api/emqx/mandar-a-pantalla", post(broker::send_to_screen))
        .route("/api/emqx/meta-pasos", post(goals::steps_goal))
        .route("/api/emqx/meta-distancia", post(goals::distance_goal))
        // Foods
        .route("/api/foods/obtener-alimento", get(foods::find_food))
        .route("/api/foods/calcular-nutricion", post(foods::calculate_nutrition))
        .route_layer(from_fn_with_state(state.clone(), require_auth));

    let cfg = state.config.clone();
    public
        .merge(protected)
        .with_state(state)
        .layer(DefaultBodyLimit::max(cfg.server.max_body_bytes))
        .layer(from_fn_with_state(cfg, security_headers_middleware))
}

//! Database rows and the relation-enriched views returned by the API.
//!
//! Row structs map one-to-one onto the tables created in [`crate::db`]. The
//! `*Detail` structs flatten a row and attach the related rows a handler loads
//! alongside it.

use serde::Serialize;
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub lastname: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    #[serde(skip_serializing)]
    pub verification_code: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl User {
    pub fn is_verified(&self) -> bool {
        self.verification_code.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct DeviceType {
    pub id: i64,
    pub name: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct Device {
    pub id: i64,
    pub user_id: i64,
    pub device_type_id: i64,
    pub name: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct SensorType {
    pub id: i64,
    pub name: String,
    pub unit: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct Sensor {
    pub id: i64,
    pub device_id: i64,
    pub sensor_type_id: i64,
    pub value: f64,
    /// 1 when the sensor is active, 0 otherwise.
    pub active: i64,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct Habit {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct ConfigurationType {
    pub id: i64,
    pub name: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct Configuration {
    pub id: i64,
    pub user_id: i64,
    pub configuration_type_id: i64,
    /// Free-form goal or threshold, e.g. a daily step target.
    pub data: String,
    pub created_at: String,
    pub updated_at: String,
}

/// A sensor together with its type.
#[derive(Debug, Clone, Serialize)]
pub struct SensorDetail {
    #[serde(flatten)]
    pub sensor: Sensor,
    pub sensor_type: SensorType,
}

/// A device with its sensors and, when loaded, its type.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceDetail {
    #[serde(flatten)]
    pub device: Device,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_type: Option<DeviceType>,
    pub sensors: Vec<SensorDetail>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfigurationDetail {
    #[serde(flatten)]
    pub configuration: Configuration,
    pub configuration_type: ConfigurationType,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserDetail {
    #[serde(flatten)]
    pub user: User,
    pub devices: Vec<DeviceDetail>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub configurations: Option<Vec<ConfigurationDetail>>,
}

/// Flat row produced by joining `sensors` with `sensor_types`.
#[derive(Debug, Clone, FromRow)]
pub(crate) struct SensorJoinRow {
    pub id: i64,
    pub device_id: i64,
    pub sensor_type_id: i64,
    pub value: f64,
    pub active: i64,
    pub created_at: String,
    pub updated_at: String,
    pub type_name: String,
    pub type_unit: String,
    pub type_created_at: String,
    pub type_updated_at: String,
}

impl From<SensorJoinRow> for SensorDetail {
    fn from(row: SensorJoinRow) -> Self {
        SensorDetail {
            sensor_type: SensorType {
                id: row.sensor_type_id,
                name: row.type_name,
                unit: row.type_unit,
                created_at: row.type_created_at,
                updated_at: row.type_updated_at,
            },
            sensor: Sensor {
                id: row.id,
                device_id: row.device_id,
                sensor_type_id: row.sensor_type_id,
                value: row.value,
                active: row.active,
                created_at: row.created_at,
                updated_at: row.updated_at,
            },
        }
    }
}

/// Flat row produced by joining `configurations` with `configuration_types`.
#[derive(Debug, Clone, FromRow)]
pub(crate) struct ConfigurationJoinRow {
    pub id: i64,
    pub user_id: i64,
    pub configuration_type_id: i64,
    pub data: String,
    pub created_at: String,
    pub updated_at: String,
    pub type_name: String,
    pub type_created_at: String,
    pub type_updated_at: String,
}

impl From<ConfigurationJoinRow> for ConfigurationDetail {
    fn from(row: ConfigurationJoinRow) -> Self {
        ConfigurationDetail {
            configuration_type: ConfigurationType {
                id: row.configuration_type_id,
                name: row.type_name,
                created_at: row.type_created_at,
                updated_at: row.type_updated_at,
            },
            configuration: Configuration {
                id: row.id,
                user_id: row.user_id,
                configuration_type_id: row.configuration_type_id,
                data: row.data,
                created_at: row.created_at,
                updated_at: row.updated_at,
            },
        }
    }
}

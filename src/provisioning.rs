//! Creating a device together with the sensors its kind carries.

use std::fmt;
use std::str::FromStr;

use sqlx::SqlitePool;

use crate::error::{AppError, AppResult};
use crate::models::{Device, DeviceDetail, DeviceType, Sensor, SensorDetail, SensorType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    /// Kitchen scale.
    Pesa,
    /// Wristband.
    Brazalete,
}

impl DeviceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DeviceKind::Pesa => "pesa",
            DeviceKind::Brazalete => "brazalete",
        }
    }

    /// Sensor type names created for a new device of this kind.
    pub fn sensor_names(self) -> &'static [&'static str] {
        match self {
            DeviceKind::Pesa => &["Peso"],
            DeviceKind::Brazalete => &["Pantalla", "Ritmo", "Temperatura", "Alcohol", "Distancia", "Pasos"],
        }
    }

    pub fn initial_value(self) -> f64 {
        match self {
            DeviceKind::Pesa => 1.0,
            DeviceKind::Brazalete => 5.0,
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "pesa" => Ok(DeviceKind::Pesa),
            "brazalete" => Ok(DeviceKind::Brazalete),
            other => Err(AppError::BadRequest(format!(
                "Invalid device kind {:?}, expected \"pesa\" or \"brazalete\"",
                other
            ))),
        }
    }
}

/// Creates the device and its sensors in one transaction.
///
/// Fails with 400 when the user already owns `max_per_kind` devices of this
/// kind. A sensor type missing from the catalog rolls everything back.
pub async fn provision_device(
    db: &SqlitePool,
    user_id: i64,
    kind: DeviceKind,
    name: Option<&str>,
    max_per_kind: i64,
) -> AppResult<DeviceDetail> {
    let mut tx = db.begin().await?;
    // Take the write lock up front so concurrent cap checks run one at a time.
    sqlx::query("UPDATE devices SET user_id = user_id WHERE 0").execute(&mut *tx).await?;

    let owned: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM devices d JOIN device_types dt ON dt.id = d.device_type_id
         WHERE d.user_id = ?1 AND dt.name = ?2",
    )
    .bind(user_id)
    .bind(kind.as_str())
    .fetch_one(&mut *tx)
    .await?;
    if owned >= max_per_kind {
        return Err(AppError::BadRequest(format!(
            "User already has {} device(s) of kind {}",
            owned, kind
        )));
    }

    let device_type = match sqlx::query_as::<_, DeviceType>("SELECT * FROM device_types WHERE name = ?1")
        .bind(kind.as_str())
        .fetch_optional(&mut *tx)
        .await?
    {
        Some(dt) => dt,
        None => {
            let id = sqlx::query("INSERT INTO device_types (name) VALUES (?1)")
                .bind(kind.as_str())
                .execute(&mut *tx)
                .await?
                .last_insert_rowid();
            sqlx::query_as::<_, DeviceType>("SELECT * FROM device_types WHERE id = ?1")
                .bind(id)
                .fetch_one(&mut *tx)
                .await?
        }
    };

    let name = name.map(str::trim).filter(|n| !n.is_empty()).unwrap_or(kind.as_str());
    let device_id = sqlx::query("INSERT INTO devices (user_id, device_type_id, name) VALUES (?1, ?2, ?3)")
        .bind(user_id)
        .bind(device_type.id)
        .bind(name)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();
    let device = sqlx::query_as::<_, Device>("SELECT * FROM devices WHERE id = ?1")
        .bind(device_id)
        .fetch_one(&mut *tx)
        .await?;

    let mut sensors = Vec::with_capacity(kind.sensor_names().len());
    for sensor_name in kind.sensor_names() {
        let sensor_type = sqlx::query_as::<_, SensorType>("SELECT * FROM sensor_types WHERE name = ?1")
            .bind(sensor_name)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("sensor type {} is missing from the catalog", sensor_name)))?;

        let sensor_id =
            sqlx::query("INSERT INTO sensors (device_id, sensor_type_id, value, active) VALUES (?1, ?2, ?3, 1)")
                .bind(device.id)
                .bind(sensor_type.id)
                .bind(kind.initial_value())
                .execute(&mut *tx)
                .await?
                .last_insert_rowid();
        let sensor = sqlx::query_as::<_, Sensor>("SELECT * FROM sensors WHERE id = ?1")
            .bind(sensor_id)
            .fetch_one(&mut *tx)
            .await?;
        sensors.push(SensorDetail { sensor, sensor_type });
    }

    tx.commit().await?;
    tracing::info!(user_id, device_id = device.id, %kind, sensors = sensors.len(), "Device provisioned");

    Ok(DeviceDetail { device, device_type: Some(device_type), sensors })
}

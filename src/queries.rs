//! Relation loading shared by several handlers.
//!
//! Lists load each related table once and stitch rows together in memory
//! instead of querying per parent row.

use std::collections::HashMap;

use sqlx::SqlitePool;

use crate::models::{
    Configuration, ConfigurationDetail, ConfigurationJoinRow, Device, DeviceDetail, DeviceType, SensorDetail,
    SensorJoinRow, User, UserDetail,
};

const SENSOR_SELECT: &str = "SELECT s.id, s.device_id, s.sensor_type_id, s.value, s.active, s.created_at, s.updated_at, \
     st.name AS type_name, st.unit AS type_unit, st.created_at AS type_created_at, st.updated_at AS type_updated_at \
     FROM sensors s JOIN sensor_types st ON st.id = s.sensor_type_id";

const CONFIGURATION_SELECT: &str = "SELECT c.id, c.user_id, c.configuration_type_id, c.data, c.created_at, c.updated_at, \
     ct.name AS type_name, ct.created_at AS type_created_at, ct.updated_at AS type_updated_at \
     FROM configurations c JOIN configuration_types ct ON ct.id = c.configuration_type_id";

async fn sensors_where(db: &SqlitePool, clause: &str, bind: Option<i64>) -> sqlx::Result<Vec<SensorDetail>> {
    let sql = format!("{} {} ORDER BY s.id", SENSOR_SELECT, clause);
    let mut query = sqlx::query_as::<_, SensorJoinRow>(&sql);
    if let Some(value) = bind {
        query = query.bind(value);
    }
    Ok(query.fetch_all(db).await?.into_iter().map(SensorDetail::from).collect())
}

pub async fn all_sensors(db: &SqlitePool) -> sqlx::Result<Vec<SensorDetail>> {
    sensors_where(db, "", None).await
}

pub async fn sensor(db: &SqlitePool, id: i64) -> sqlx::Result<Option<SensorDetail>> {
    Ok(sensors_where(db, "WHERE s.id = ?1", Some(id)).await?.pop())
}

pub async fn sensors_of_device(db: &SqlitePool, device_id: i64) -> sqlx::Result<Vec<SensorDetail>> {
    sensors_where(db, "WHERE s.device_id = ?1", Some(device_id)).await
}

pub async fn sensors_of_user(db: &SqlitePool, user_id: i64) -> sqlx::Result<Vec<SensorDetail>> {
    sensors_where(db, "JOIN devices d ON d.id = s.device_id WHERE d.user_id = ?1", Some(user_id)).await
}

fn group_by_device(sensors: Vec<SensorDetail>) -> HashMap<i64, Vec<SensorDetail>> {
    let mut grouped: HashMap<i64, Vec<SensorDetail>> = HashMap::new();
    for sensor in sensors {
        grouped.entry(sensor.sensor.device_id).or_default().push(sensor);
    }
    grouped
}

/// Attaches sensors, and device types when given, to each device.
pub fn attach_sensors(
    devices: Vec<Device>,
    sensors: Vec<SensorDetail>,
    types: Option<&HashMap<i64, DeviceType>>,
) -> Vec<DeviceDetail> {
    let mut grouped = group_by_device(sensors);
    devices
        .into_iter()
        .map(|device| DeviceDetail {
            sensors: grouped.remove(&device.id).unwrap_or_default(),
            device_type: types.and_then(|t| t.get(&device.device_type_id).cloned()),
            device,
        })
        .collect()
}

pub async fn device_types_by_id(db: &SqlitePool) -> sqlx::Result<HashMap<i64, DeviceType>> {
    let types = sqlx::query_as::<_, DeviceType>("SELECT * FROM device_types").fetch_all(db).await?;
    Ok(types.into_iter().map(|t| (t.id, t)).collect())
}

/// A device with its type and sensors.
pub async fn device_detail(db: &SqlitePool, id: i64) -> sqlx::Result<Option<DeviceDetail>> {
    let Some(device) = sqlx::query_as::<_, Device>("SELECT * FROM devices WHERE id = ?1")
        .bind(id)
        .fetch_optional(db)
        .await?
    else {
        return Ok(None);
    };
    let device_type = sqlx::query_as::<_, DeviceType>("SELECT * FROM device_types WHERE id = ?1")
        .bind(device.device_type_id)
        .fetch_optional(db)
        .await?;
    let sensors = sensors_of_device(db, device.id).await?;
    Ok(Some(DeviceDetail { device, device_type, sensors }))
}

async fn configurations_where(
    db: &SqlitePool,
    clause: &str,
    bind: Option<i64>,
) -> sqlx::Result<Vec<ConfigurationDetail>> {
    let sql = format!("{} {} ORDER BY c.id", CONFIGURATION_SELECT, clause);
    let mut query = sqlx::query_as::<_, ConfigurationJoinRow>(&sql);
    if let Some(value) = bind {
        query = query.bind(value);
    }
    Ok(query.fetch_all(db).await?.into_iter().map(ConfigurationDetail::from).collect())
}

pub async fn all_configurations(db: &SqlitePool) -> sqlx::Result<Vec<ConfigurationDetail>> {
    configurations_where(db, "", None).await
}

pub async fn configuration(db: &SqlitePool, id: i64) -> sqlx::Result<Option<ConfigurationDetail>> {
    Ok(configurations_where(db, "WHERE c.id = ?1", Some(id)).await?.pop())
}

pub async fn configurations_of_user(db: &SqlitePool, user_id: i64) -> sqlx::Result<Vec<ConfigurationDetail>> {
    configurations_where(db, "WHERE c.user_id = ?1", Some(user_id)).await
}

/// The caller's most recent configuration of the named type.
pub async fn latest_configuration(
    db: &SqlitePool,
    user_id: i64,
    type_name: &str,
) -> sqlx::Result<Option<Configuration>> {
    sqlx::query_as::<_, Configuration>(
        "SELECT c.* FROM configurations c JOIN configuration_types ct ON ct.id = c.configuration_type_id
         WHERE c.user_id = ?1 AND ct.name = ?2
         ORDER BY c.created_at DESC, c.id DESC LIMIT 1",
    )
    .bind(user_id)
    .bind(type_name)
    .fetch_optional(db)
    .await
}

/// Users with their devices and sensors, without configurations.
pub async fn all_users(db: &SqlitePool) -> sqlx::Result<Vec<UserDetail>> {
    let users = sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY id").fetch_all(db).await?;
    let devices = sqlx::query_as::<_, Device>("SELECT * FROM devices ORDER BY id").fetch_all(db).await?;
    let mut devices_by_user: HashMap<i64, Vec<DeviceDetail>> = HashMap::new();
    for detail in attach_sensors(devices, all_sensors(db).await?, None) {
        devices_by_user.entry(detail.device.user_id).or_default().push(detail);
    }
    Ok(users
        .into_iter()
        .map(|user| UserDetail {
            devices: devices_by_user.remove(&user.id).unwrap_or_default(),
            configurations: None,
            user,
        })
        .collect())
}

/// One user with devices (typed, with sensors) and configurations.
pub async fn user_detail(db: &SqlitePool, user: User) -> sqlx::Result<UserDetail> {
    let devices = sqlx::query_as::<_, Device>("SELECT * FROM devices WHERE user_id = ?1 ORDER BY id")
        .bind(user.id)
        .fetch_all(db)
        .await?;
    let types = device_types_by_id(db).await?;
    let devices = attach_sensors(devices, sensors_of_user(db, user.id).await?, Some(&types));
    let configurations = configurations_of_user(db, user.id).await?;
    Ok(UserDetail { user, devices, configurations: Some(configurations) })
}

pub async fn find_user(db: &SqlitePool, id: i64) -> sqlx::Result<Option<User>> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?1").bind(id).fetch_optional(db).await
}

pub async fn find_user_by_email(db: &SqlitePool, email: &str) -> sqlx::Result<Option<User>> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ?1")
        .bind(email)
        .fetch_optional(db)
        .await
}

/// True when a row with `id` exists in `table`. `table` must be a literal.
pub async fn exists(db: &SqlitePool, table: &'static str, id: i64) -> sqlx::Result<bool> {
    let sql = format!("SELECT EXISTS(SELECT 1 FROM {} WHERE id = ?1)", table);
    sqlx::query_scalar::<_, bool>(&sql).bind(id).fetch_one(db).await
}

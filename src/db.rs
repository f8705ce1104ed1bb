use sqlx::SqlitePool;

/// SQL expression for "now" in the timestamp format stored in every table.
pub const NOW: &str = "strftime('%Y-%m-%dT%H:%M:%SZ','now')";

/// Sensor types the provisioning flow and the broker shortcuts rely on.
pub const SENSOR_TYPE_CATALOG: &[(&str, &str)] = &[
    ("Pantalla", "modo"),
    ("Ritmo", "bpm"),
    ("Temperatura", "°C"),
    ("Alcohol", "mg/L"),
    ("Distancia", "km"),
    ("Pasos", "pasos"),
    ("Peso", "gr"),
];

pub const DEVICE_TYPE_CATALOG: &[&str] = &["pesa", "brazalete"];

pub const CONFIGURATION_TYPE_CATALOG: &[&str] = &["alarma_pasos", "alarma_distancia", "meta_calorica"];

pub async fn init_db(pool: &SqlitePool) -> anyhow::Result<()> {
    // Pragmas for better durability/performance
    if let Err(e) = sqlx::query("PRAGMA journal_mode=WAL;").execute(pool).await {
        tracing::warn!("Failed to set WAL journal mode: {}", e);
    }
    if let Err(e) = sqlx::query("PRAGMA synchronous=NORMAL;").execute(pool).await {
        tracing::warn!("Failed to set synchronous mode: {}", e);
    }
    // Foreign keys are critical - fail if this doesn't work
    sqlx::query("PRAGMA foreign_keys=ON;").execute(pool).await?;
    if let Err(e) = sqlx::query("PRAGMA busy_timeout=10000;").execute(pool).await {
        tracing::warn!("Failed to set busy_timeout: {}", e);
    }

    let tables = [
        r#"CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            lastname TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            verification_code TEXT NULL,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now')),
            updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now'))
        )"#,
        r#"CREATE TABLE IF NOT EXISTS api_tokens (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            token_hash TEXT NOT NULL UNIQUE,
            expires_at TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now')),
            FOREIGN KEY(user_id) REFERENCES users(id) ON DELETE CASCADE
        )"#,
        r#"CREATE TABLE IF NOT EXISTS device_types (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now')),
            updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now'))
        )"#,
        r#"CREATE TABLE IF NOT EXISTS devices (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            device_type_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now')),
            updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now')),
            FOREIGN KEY(user_id) REFERENCES users(id) ON DELETE CASCADE,
            FOREIGN KEY(device_type_id) REFERENCES device_types(id)
        )"#,
        r#"CREATE TABLE IF NOT EXISTS sensor_types (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            unit TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now')),
            updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now'))
        )"#,
        r#"CREATE TABLE IF NOT EXISTS sensors (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            device_id INTEGER NOT NULL,
            sensor_type_id INTEGER NOT NULL,
            value REAL NOT NULL DEFAULT 0,
            active INTEGER NOT NULL DEFAULT 1 CHECK (active IN (0, 1)),
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now')),
            updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now')),
            FOREIGN KEY(device_id) REFERENCES devices(id) ON DELETE CASCADE,
            FOREIGN KEY(sensor_type_id) REFERENCES sensor_types(id)
        )"#,
        r#"CREATE TABLE IF NOT EXISTS habits (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            description TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now')),
            updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now'))
        )"#,
        r#"CREATE TABLE IF NOT EXISTS configuration_types (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now')),
            updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now'))
        )"#,
        r#"CREATE TABLE IF NOT EXISTS configurations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            configuration_type_id INTEGER NOT NULL,
            data TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now')),
            updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now')),
            FOREIGN KEY(user_id) REFERENCES users(id) ON DELETE CASCADE,
            FOREIGN KEY(configuration_type_id) REFERENCES configuration_types(id)
        )"#,
    ];
    for ddl in tables {
        sqlx::query(ddl).execute(pool).await?;
    }

    let indexes = [
        ("idx_api_tokens_user", "CREATE INDEX IF NOT EXISTS idx_api_tokens_user ON api_tokens(user_id)"),
        ("idx_devices_user", "CREATE INDEX IF NOT EXISTS idx_devices_user ON devices(user_id, device_type_id)"),
        ("idx_sensors_device", "CREATE INDEX IF NOT EXISTS idx_sensors_device ON sensors(device_id)"),
        (
            "idx_configurations_user_type",
            "CREATE INDEX IF NOT EXISTS idx_configurations_user_type ON configurations(user_id, configuration_type_id)",
        ),
    ];
    for (name, query) in indexes {
        if let Err(e) = sqlx::query(query).execute(pool).await {
            tracing::warn!("Failed to create index {}: {}", name, e);
        }
    }

    Ok(())
}

/// Inserts the built-in catalog rows that are missing. Existing rows, including
/// units edited through the API, are left alone.
pub async fn seed_catalog(pool: &SqlitePool) -> anyhow::Result<()> {
    let mut tx = pool.begin().await?;
    for (name, unit) in SENSOR_TYPE_CATALOG {
        sqlx::query("INSERT OR IGNORE INTO sensor_types (name, unit) VALUES (?1, ?2)")
            .bind(name)
            .bind(unit)
            .execute(&mut *tx)
            .await?;
    }
    for name in DEVICE_TYPE_CATALOG {
        sqlx::query("INSERT OR IGNORE INTO device_types (name) VALUES (?1)")
            .bind(name)
            .execute(&mut *tx)
            .await?;
    }
    for name in CONFIGURATION_TYPE_CATALOG {
        sqlx::query("INSERT OR IGNORE INTO configuration_types (name) VALUES (?1)")
            .bind(name)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;
    tracing::debug!("Catalog seeded");
    Ok(())
}

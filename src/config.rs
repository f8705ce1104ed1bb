use std::path::Path;

use serde::Deserialize;

const DEFAULTS: &str = include_str!("../config/default.toml");

/// Ten years. Longer lifetimes overflow the expiry timestamp.
pub const MAX_TOKEN_TTL_HOURS: i64 = 24 * 365 * 10;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_body_bytes: usize,
    /// Key rate limits on `X-Forwarded-For`/`X-Real-IP` instead of the socket
    /// address. Only enable behind a proxy that overwrites these headers.
    #[serde(default)]
    pub trust_proxy_headers: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    /// Insert the built-in sensor, device and configuration types on startup.
    pub seed_catalog: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    pub token_ttl_hours: i64,
    pub min_password_len: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DevicesConfig {
    /// How many devices of the same kind a single user may provision.
    pub max_per_kind: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    pub auth_max_requests: usize,
    pub auth_window_seconds: u64,
}

/// Settings for one outbound HTTP client. Each upstream owns its own copy, so
/// relaxing certificate checks for one service never leaks into another.
#[derive(Debug, Clone, Deserialize)]
pub struct HttpClientConfig {
    pub timeout_secs: u64,
    #[serde(default)]
    pub accept_invalid_certs: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BrokerConfig {
    pub base_url: String,
    pub api_key: String,
    pub secret_key: String,
    pub http: HttpClientConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NutritionConfig {
    pub base_url: String,
    pub food_app_id: String,
    pub food_app_key: String,
    pub analysis_app_id: String,
    pub analysis_app_key: String,
    pub http: HttpClientConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MailConfig {
    pub from_address: String,
    pub from_name: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct SecurityConfig {
    pub enable_hsts: Option<bool>,
    pub hsts_max_age: Option<u64>,
    pub hsts_include_subdomains: Option<bool>,
    pub csp: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub devices: DevicesConfig,
    pub rate_limit: RateLimitConfig,
    pub broker: BrokerConfig,
    pub nutrition: NutritionConfig,
    pub mail: MailConfig,
    pub security: Option<SecurityConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        // The embedded file ships with the binary; failing to parse it is a build defect.
        match from_toml_str("") {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("FATAL: Failed to load default config: {}", e);
                panic!("Failed to load default config: {}", e);
            }
        }
    }
}

/// Loads the configuration: embedded defaults -> healthyapp.toml -> $HEALTHYAPP_CONFIG -> env/.env
pub fn load() -> anyhow::Result<AppConfig> {
    // Load .env first (optional)
    let _ = dotenvy::dotenv();

    let mut builder = ::config::Config::builder()
        .add_source(::config::File::from_str(DEFAULTS, ::config::FileFormat::Toml))
        // Optional local file: healthyapp.toml (in CWD)
        .add_source(::config::File::with_name("healthyapp").required(false));

    if let Ok(custom_path) = std::env::var("HEALTHYAPP_CONFIG") {
        builder = builder.add_source(::config::File::with_name(&custom_path).required(false));
    }
    // Environment variables last to have highest precedence
    builder = builder.add_source(
        ::config::Environment::with_prefix("HEALTHYAPP")
            .prefix_separator("__")
            .separator("__"),
    );

    let app_cfg: AppConfig = builder.build()?.try_deserialize()?;
    validate(&app_cfg)?;
    Ok(app_cfg)
}

/// Layers a TOML document over the embedded defaults, without touching the
/// environment. Used for tests and for tooling that wants a fixed config.
pub fn from_toml_str(overrides: &str) -> anyhow::Result<AppConfig> {
    let app_cfg: AppConfig = ::config::Config::builder()
        .add_source(::config::File::from_str(DEFAULTS, ::config::FileFormat::Toml))
        .add_source(::config::File::from_str(overrides, ::config::FileFormat::Toml))
        .build()?
        .try_deserialize()?;
    validate(&app_cfg)?;
    Ok(app_cfg)
}

pub fn validate(cfg: &AppConfig) -> anyhow::Result<()> {
    // Server
    if cfg.server.port == 0 {
        return Err(anyhow::anyhow!("invalid server.port: {}", cfg.server.port));
    }
    #[cfg(unix)]
    if cfg.server.port < 1024 {
        tracing::warn!("Using privileged port {} - may require elevated permissions", cfg.server.port);
    }
    if cfg.server.max_body_bytes < 1024 {
        return Err(anyhow::anyhow!("server.max_body_bytes must be >= 1024"));
    }

    if cfg.database.max_connections == 0 {
        return Err(anyhow::anyhow!("database.max_connections must be > 0"));
    }

    if cfg.auth.token_ttl_hours <= 0 || cfg.auth.token_ttl_hours > MAX_TOKEN_TTL_HOURS {
        return Err(anyhow::anyhow!(
            "auth.token_ttl_hours must be between 1 and {}, got {}",
            MAX_TOKEN_TTL_HOURS,
            cfg.auth.token_ttl_hours
        ));
    }
    if cfg.auth.min_password_len == 0 {
        return Err(anyhow::anyhow!("auth.min_password_len must be > 0"));
    }

    if cfg.devices.max_per_kind <= 0 {
        return Err(anyhow::anyhow!("devices.max_per_kind must be > 0"));
    }

    if cfg.rate_limit.auth_max_requests == 0 || cfg.rate_limit.auth_window_seconds == 0 {
        return Err(anyhow::anyhow!("rate_limit values must be > 0"));
    }

    // Upstreams
    for (name, url, http) in [
        ("broker", &cfg.broker.base_url, &cfg.broker.http),
        ("nutrition", &cfg.nutrition.base_url, &cfg.nutrition.http),
    ] {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(anyhow::anyhow!("{}.base_url must be an http(s) URL, got {:?}", name, url));
        }
        if http.timeout_secs == 0 {
            return Err(anyhow::anyhow!("{}.http.timeout_secs must be > 0", name));
        }
        if http.accept_invalid_certs {
            tracing::warn!("{} client accepts invalid TLS certificates", name);
        }
    }

    Ok(())
}

pub fn ensure_sqlite_parent_dir(url: &str) -> anyhow::Result<()> {
    let path = url.strip_prefix("sqlite://").or_else(|| url.strip_prefix("sqlite:"));
    if let Some(path) = path {
        let path = path.split('?').next().unwrap_or(path);
        if path.is_empty() || path.starts_with(":memory:") {
            return Ok(());
        }
        let p = Path::new(path);
        if let Some(parent) = p.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
    }
    Ok(())
}

use std::sync::Arc;

use crate::config::AppConfig;
use crate::mail::{LogMailer, Mailer};
use crate::metrics::Metrics;
use crate::middleware::EndpointRateLimiter;
use crate::upstream::{BrokerClient, NutritionClient};

/// Rate-limited account endpoints, keyed as the limiter sees them.
pub const RATE_LIMITED_ENDPOINTS: &[&str] = &["login", "auth-login", "recuperar-contra", "code-verify"];

/// The shared application state.
///
/// Cloned into every handler; all fields are cheap handles.
#[derive(Clone)]
pub struct AppState {
    /// The database connection pool.
    pub db: sqlx::SqlitePool,
    pub config: Arc<AppConfig>,
    pub metrics: Metrics,
    /// Sliding-window limits for the account endpoints that accept credentials or codes.
    pub rate_limiter: EndpointRateLimiter,
    pub broker: BrokerClient,
    pub nutrition: NutritionClient,
    pub mailer: Arc<dyn Mailer>,
}

impl AppState {
    /// Builds the state with the log mailer and one HTTP client per upstream.
    pub fn new(db: sqlx::SqlitePool, config: AppConfig) -> anyhow::Result<Self> {
        let metrics = Metrics::new();
        let rl = &config.rate_limit;
        let rate_limiter = EndpointRateLimiter::new().with_limits(
            RATE_LIMITED_ENDPOINTS
                .iter()
                .map(|endpoint| (*endpoint, rl.auth_max_requests, rl.auth_window_seconds))
                .collect(),
        );

        Ok(Self {
            db,
            broker: BrokerClient::new(&config.broker, metrics.clone())?,
            nutrition: NutritionClient::new(&config.nutrition, metrics.clone())?,
            config: Arc::new(config),
            metrics,
            rate_limiter,
            mailer: Arc::new(LogMailer),
        })
    }

    pub fn with_mailer(mut self, mailer: Arc<dyn Mailer>) -> Self {
        self.mailer = mailer;
        self
    }
}

use reqwest::{Client, Url};
use serde_json::{json, Value};

use super::{build_http_client, join_segments, send_json, UpstreamError};
use crate::config::NutritionConfig;
use crate::metrics::Metrics;

pub const SERVICE: &str = "nutrition";

/// Food database and nutrition analysis API. Each endpoint has its own
/// credential pair, passed as `app_id` / `app_key` query parameters.
#[derive(Clone)]
pub struct NutritionClient {
    client: Client,
    base_url: Url,
    food_app_id: String,
    food_app_key: String,
    analysis_app_id: String,
    analysis_app_key: String,
    metrics: Metrics,
}

impl NutritionClient {
    pub fn new(cfg: &NutritionConfig, metrics: Metrics) -> anyhow::Result<Self> {
        Ok(Self {
            client: build_http_client(&cfg.http)?,
            base_url: Url::parse(&cfg.base_url)?,
            food_app_id: cfg.food_app_id.clone(),
            food_app_key: cfg.food_app_key.clone(),
            analysis_app_id: cfg.analysis_app_id.clone(),
            analysis_app_key: cfg.analysis_app_key.clone(),
            metrics,
        })
    }

    /// Runs the food parser for `name` and returns the upstream document.
    pub async fn search_food(&self, name: &str) -> Result<Value, UpstreamError> {
        let url = join_segments(SERVICE, &self.base_url, &["api", "food-database", "v2", "parser"])?;
        let request = self.client.get(url).query(&[
            ("ingr", name),
            ("app_id", self.food_app_id.as_str()),
            ("app_key", self.food_app_key.as_str()),
        ]);
        send_json(SERVICE, &self.metrics, request).await
    }

    pub async fn nutrition_details(&self, title: &str, ingredients: &[String]) -> Result<Value, UpstreamError> {
        let url = join_segments(SERVICE, &self.base_url, &["api", "nutrition-details"])?;
        let request = self
            .client
            .post(url)
            .query(&[("app_id", self.analysis_app_id.as_str()), ("app_key", self.analysis_app_key.as_str())])
            .json(&json!({ "title": title, "ingr": ingredients }));
        send_json(SERVICE, &self.metrics, request).await
    }
}

/// True when the parser found nothing: `hints` absent or empty.
pub fn has_no_hints(document: &Value) -> bool {
    document.get("hints").and_then(Value::as_array).map(|h| h.is_empty()).unwrap_or(true)
}

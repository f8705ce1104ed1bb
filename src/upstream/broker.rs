use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::{Client, Url};
use serde_json::{json, Value};

use super::{build_http_client, join_segments, send_json, UpstreamError};
use crate::config::BrokerConfig;
use crate::metrics::Metrics;

pub const SERVICE: &str = "broker";

/// Topic the wristband listens on for screen mode changes.
pub const SCREEN_TOPIC: &str = "BrazaletePantalla";

/// Sensor readings exposed through the `obtener-*` shortcuts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reading {
    Distance,
    Steps,
    HeartRate,
    Alcohol,
    Temperature,
    Weight,
}

impl Reading {
    /// Topic holding the retained reading.
    pub fn topic(self) -> &'static str {
        match self {
            Reading::Distance => "BrazaleteDistancia",
            Reading::Steps => "BrazaletePasos",
            Reading::HeartRate => "BrazaletePulso",
            Reading::Alcohol => "BrazaleteAlcohol",
            Reading::Temperature => "BrazaleteTemperatura",
            Reading::Weight => "Peso",
        }
    }

    /// Sensor type whose unit labels the reading.
    pub fn sensor_type(self) -> &'static str {
        match self {
            Reading::Distance => "Distancia",
            Reading::Steps => "Pasos",
            Reading::HeartRate => "Ritmo",
            Reading::Alcohol => "Alcohol",
            Reading::Temperature => "Temperatura",
            Reading::Weight => "Peso",
        }
    }
}

/// REST gateway of the MQTT broker: retained messages and publishing.
#[derive(Clone)]
pub struct BrokerClient {
    client: Client,
    base_url: Url,
    api_key: String,
    secret_key: String,
    metrics: Metrics,
}

impl BrokerClient {
    pub fn new(cfg: &BrokerConfig, metrics: Metrics) -> anyhow::Result<Self> {
        Ok(Self {
            client: build_http_client(&cfg.http)?,
            base_url: Url::parse(&cfg.base_url)?,
            api_key: cfg.api_key.clone(),
            secret_key: cfg.secret_key.clone(),
            metrics,
        })
    }

    /// Fetches the retained message of `topic` and decodes its payload.
    pub async fn retained(&self, topic: &str) -> Result<Value, UpstreamError> {
        let url = join_segments(SERVICE, &self.base_url, &["mqtt", "retainer", "message", topic])?;
        tracing::debug!(topic, "Fetching retained message");
        let request = self.client.get(url).basic_auth(&self.api_key, Some(&self.secret_key));
        let message = send_json(SERVICE, &self.metrics, request).await?;

        let encoded = message.get("payload").and_then(Value::as_str).ok_or_else(|| UpstreamError::Decode {
            service: SERVICE,
            reason: format!("retained message on {} has no payload", topic),
        })?;
        decode_payload(encoded).map_err(|e| UpstreamError::Decode {
            service: SERVICE,
            reason: format!("payload on {} is not base64: {}", topic, e),
        })
    }

    /// Publishes `payload` as a retained plain-text message with QoS 0.
    pub async fn publish(&self, topic: &str, payload: &str) -> Result<Value, UpstreamError> {
        let url = join_segments(SERVICE, &self.base_url, &["publish"])?;
        let body = json!({
            "payload_encoding": "plain",
            "topic": topic,
            "qos": 0,
            "payload": payload,
            "retain": true,
        });
        tracing::info!(topic, "Publishing to broker");
        let request = self.client.post(url).basic_auth(&self.api_key, Some(&self.secret_key)).json(&body);
        send_json(SERVICE, &self.metrics, request).await
    }
}

/// base64 -> UTF-8 (lossy) -> JSON, falling back to the decoded string.
pub fn decode_payload(encoded: &str) -> Result<Value, base64::DecodeError> {
    let bytes = STANDARD.decode(encoded.trim())?;
    let text = String::from_utf8_lossy(&bytes).into_owned();
    Ok(serde_json::from_str(&text).unwrap_or(Value::String(text)))
}

/// Text form used for goal comparison: strings by content, anything else by
/// its compact serialization.
pub fn reading_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

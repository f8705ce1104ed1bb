//! Clients for the two HTTP services the API forwards to.
//!
//! Each upstream owns a `reqwest::Client` built from its own
//! [`HttpClientConfig`], and every call is counted in [`Metrics`].

use std::time::Duration;

use reqwest::{RequestBuilder, Url};
use serde_json::Value;

use crate::config::HttpClientConfig;
use crate::metrics::Metrics;

pub mod broker;
pub mod nutrition;

pub use broker::BrokerClient;
pub use nutrition::NutritionClient;

#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("{service} request failed: {source}")]
    Transport {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{service} answered with status {status}: {body}")]
    Status { service: &'static str, status: u16, body: String },

    #[error("{service} sent an unusable response: {reason}")]
    Decode { service: &'static str, reason: String },

    #[error("invalid {service} url: {reason}")]
    Url { service: &'static str, reason: String },
}

impl UpstreamError {
    pub fn service(&self) -> &'static str {
        match self {
            UpstreamError::Transport { service, .. }
            | UpstreamError::Status { service, .. }
            | UpstreamError::Decode { service, .. }
            | UpstreamError::Url { service, .. } => service,
        }
    }

    /// HTTP status the upstream answered with, if it answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            UpstreamError::Status { status, .. } => Some(*status),
            UpstreamError::Transport { source, .. } => source.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

pub fn build_http_client(cfg: &HttpClientConfig) -> anyhow::Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(cfg.timeout_secs))
        .danger_accept_invalid_certs(cfg.accept_invalid_certs)
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()?;
    Ok(client)
}

/// Appends path segments to `base`, percent-encoding each one.
pub(crate) fn join_segments(service: &'static str, base: &Url, segments: &[&str]) -> Result<Url, UpstreamError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| UpstreamError::Url { service, reason: format!("{} cannot be a base", base) })?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Sends the request and reads a JSON document from a 2xx answer.
///
/// An empty body yields `Value::Null`; a body that is not JSON is returned as a
/// string.
pub(crate) async fn send_json(
    service: &'static str,
    metrics: &Metrics,
    request: RequestBuilder,
) -> Result<Value, UpstreamError> {
    metrics.inc_upstream_calls();
    let result = send_inner(service, request).await;
    if result.is_err() {
        metrics.inc_upstream_failures();
    }
    result
}

async fn send_inner(service: &'static str, request: RequestBuilder) -> Result<Value, UpstreamError> {
    let response = request.send().await.map_err(|source| UpstreamError::Transport { service, source })?;
    let status = response.status();
    let text = response.text().await.map_err(|source| UpstreamError::Transport { service, source })?;

    if !status.is_success() {
        tracing::debug!(service, status = status.as_u16(), "Upstream returned an error status");
        return Err(UpstreamError::Status { service, status: status.as_u16(), body: truncate(&text, 512) });
    }
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_str(&text).unwrap_or(Value::String(text)))
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

//! # HealthyApp Backend Library
//!
//! REST backend for a health habit tracker: user accounts, habits and goal
//! configurations, IoT devices with their sensors, and thin gateways to an MQTT
//! broker's REST API and to a nutrition lookup service.
//!
//! ## Architecture
//!
//! - **Axum**: HTTP server and routing
//! - **SQLx**: SQLite persistence
//! - **Tokio**: async runtime
//! - **Reqwest**: outbound calls to the broker and nutrition APIs
//!
//! ## Core Components
//!
//! - [`config`]: layered configuration
//! - [`db`]: schema creation and catalog seeding
//! - [`error`]: the API error type and its JSON envelope
//! - [`auth`]: password hashing, verification codes and bearer tokens
//! - [`provisioning`]: transactional device creation
//! - [`upstream`]: broker and nutrition HTTP clients
//! - [`routes`]: HTTP handlers
//! - [`state`]: shared application state

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod mail;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod provisioning;
pub mod queries;
pub mod routes;
pub mod state;
pub mod types;
pub mod upstream;

#[cfg(test)]
mod tests;

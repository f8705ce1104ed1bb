//! Integration tests for the HealthyApp API.
//!
//! Most modules drive the full router with `tower::ServiceExt::oneshot`
//! against a throwaway SQLite file; the broker and nutrition APIs are replaced
//! by `wiremock` servers.
//!
//! ## Test Modules
//!
//! - **support**: shared fixtures (database, router harness, mail recorder)
//! - **users_api_tests**: registration, verification, login and account flows
//! - **resources_api_tests**: CRUD for habits, configurations, types and sensors
//! - **devices_api_tests**: device CRUD and provisioning
//! - **broker_api_tests**: broker gateway, readings and goals
//! - **foods_api_tests**: food search and nutrition analysis
//! - **error_tests**: error envelopes and conversions
//! - **config_tests**: configuration loading and validation
//! - **db_tests**: schema and catalog seeding
//! - **health_api_tests**: health, readiness, metrics and version endpoints
//!
//! Individual modules can be run with e.g. `cargo test users_api_tests`.

pub mod support;

pub mod broker_api_tests;
pub mod error_tests;
pub mod users_api_tests;

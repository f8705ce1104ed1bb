//! Middleware components for HTTP request processing.
//!
//! Bearer authentication, client identification, per-endpoint rate limiting,
//! security headers and the JSON body extractor used by every handler.

pub mod auth;
pub mod ip;
pub mod rate_limit;
pub mod security_headers;
pub mod validation;

pub use auth::CurrentUser;
pub use rate_limit::EndpointRateLimiter;
pub use validation::JsonBody;

//! HTTP Inbound Adapter
//!
//! Axum-based HTTP server that drives the application layer.

pub(crate) mod handlers;
mod rate_limit;
mod server;

pub use rate_limit::{RateLimitConfig, RateLimiterState, RouteClass};
pub use server::{HttpServer, shutdown_signal};

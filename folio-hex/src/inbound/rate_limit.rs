//! Per-client request budgets.
//!
//! Every client gets a separate token bucket per [`RouteClass`], so a burst
//! of conversions cannot starve catalog reads, and manual refreshes (which
//! hit the external rate feed) stay rare.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json,
    body::Body,
    extract::State,
    http::{HeaderValue, Method, Request, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{
    DefaultKeyedRateLimiter, Quota, RateLimiter,
    clock::{Clock, DefaultClock},
};
use serde_json::json;

/// Requests per minute per client for each route class. `0` disables that
/// class's limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Catalog, route and price history endpoints
    pub general_per_minute: u32,
    /// Single and batch conversion
    pub convert_per_minute: u32,
    /// Manual refresh trigger
    pub refresh_per_minute: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            general_per_minute: 100,
            convert_per_minute: 300,
            refresh_per_minute: 2,
        }
    }
}

impl RateLimitConfig {
    /// The same budget for every class.
    pub fn uniform(per_minute: u32) -> Self {
        Self {
            general_per_minute: per_minute,
            convert_per_minute: per_minute,
            refresh_per_minute: per_minute,
        }
    }
}

/// Which budget a request draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    /// Health and API docs; never limited.
    Exempt,
    General,
    Convert,
    Refresh,
}

impl RouteClass {
    pub fn of(method: &Method, path: &str) -> Self {
        match path {
            "/health" => RouteClass::Exempt,
            p if p.starts_with("/swagger-ui") || p.starts_with("/api-docs") => RouteClass::Exempt,
            "/api/exchangerates/refresh" if method == Method::POST => RouteClass::Refresh,
            p if p.starts_with("/api/currencies/convert") => RouteClass::Convert,
            _ => RouteClass::General,
        }
    }

    fn label(self) -> &'static str {
        match self {
            RouteClass::Exempt => "exempt",
            RouteClass::General => "general",
            RouteClass::Convert => "conversion",
            RouteClass::Refresh => "refresh",
        }
    }
}

type ClientLimiter = DefaultKeyedRateLimiter<String>;

/// Keyed limiters, one per route class.
pub struct RateLimiterState {
    general: Option<ClientLimiter>,
    convert: Option<ClientLimiter>,
    refresh: Option<ClientLimiter>,
    clock: DefaultClock,
}

impl Default for RateLimiterState {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}

impl RateLimiterState {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            general: per_minute(config.general_per_minute),
            convert: per_minute(config.convert_per_minute),
            refresh: per_minute(config.refresh_per_minute),
            clock: DefaultClock::default(),
        }
    }

    /// Takes one token from `client`'s bucket for `class`.
    ///
    /// When the bucket is empty, returns how long until the next token.
    pub fn check(&self, class: RouteClass, client: &str) -> Result<(), Duration> {
        let limiter = match class {
            RouteClass::Exempt => return Ok(()),
            RouteClass::General => &self.general,
            RouteClass::Convert => &self.convert,
            RouteClass::Refresh => &self.refresh,
        };
        let Some(limiter) = limiter else {
            return Ok(());
        };

        limiter
            .check_key(&client.to_string())
            .map_err(|not_until| not_until.wait_time_from(self.clock.now()))
    }
}

fn per_minute(requests: u32) -> Option<ClientLimiter> {
    NonZeroU32::new(requests).map(|n| RateLimiter::keyed(Quota::per_minute(n)))
}

/// Client identity: the first `X-Forwarded-For` address, or "anonymous".
fn client_key(request: &Request<Body>) -> String {
    request
        .headers()
        .get("X-Forwarded-For")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "anonymous".to_string())
}

/// Rejects requests over the client's budget with 429 and `Retry-After`.
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<RateLimiterState>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let class = RouteClass::of(request.method(), request.uri().path());
    let client = client_key(&request);

    let Err(wait) = limiter.check(class, &client) else {
        return next.run(request).await;
    };

    let retry_after = wait.as_millis().div_ceil(1000).max(1) as u64;
    tracing::warn!(client = %client, class = class.label(), retry_after, "Rate limit exceeded");

    let mut response = (
        StatusCode::TOO_MANY_REQUESTS,
        Json(json!({
            "error": format!("Rate limit exceeded for {} requests", class.label()),
            "retry_after_seconds": retry_after
        })),
    )
        .into_response();
    response
        .headers_mut()
        .insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_classes() {
        assert_eq!(RouteClass::of(&Method::GET, "/health"), RouteClass::Exempt);
        assert_eq!(
            RouteClass::of(&Method::GET, "/api-docs/openapi.json"),
            RouteClass::Exempt
        );
        assert_eq!(
            RouteClass::of(&Method::POST, "/api/currencies/convert/batch"),
            RouteClass::Convert
        );
        assert_eq!(
            RouteClass::of(&Method::POST, "/api/exchangerates/refresh"),
            RouteClass::Refresh
        );
        assert_eq!(
            RouteClass::of(&Method::GET, "/api/exchangerates/1/prices"),
            RouteClass::General
        );
    }

    #[test]
    fn test_classes_have_separate_budgets() {
        let limiter = RateLimiterState::new(RateLimitConfig {
            general_per_minute: 5,
            convert_per_minute: 5,
            refresh_per_minute: 1,
        });

        assert!(limiter.check(RouteClass::Refresh, "a").is_ok());
        let wait = limiter.check(RouteClass::Refresh, "a").unwrap_err();
        assert!(wait > Duration::ZERO && wait <= Duration::from_secs(60));

        assert!(limiter.check(RouteClass::General, "a").is_ok());
        assert!(limiter.check(RouteClass::Convert, "a").is_ok());
        assert!(limiter.check(RouteClass::Refresh, "b").is_ok());
    }

    #[test]
    fn test_zero_disables_class() {
        let limiter = RateLimiterState::new(RateLimitConfig {
            general_per_minute: 1,
            convert_per_minute: 0,
            refresh_per_minute: 1,
        });

        for _ in 0..50 {
            assert!(limiter.check(RouteClass::Convert, "a").is_ok());
        }
        assert!(limiter.check(RouteClass::General, "a").is_ok());
        assert!(limiter.check(RouteClass::General, "a").is_err());
    }
}

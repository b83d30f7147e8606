//! HTTP Server configuration and startup.

use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use folio_types::{CurrencyRepository, RateSource};

use super::handlers::{self, AppState};
use super::rate_limit::{RateLimitConfig, RateLimiterState, rate_limit_middleware};
use crate::ConversionService;
use crate::openapi::ApiDoc;

/// HTTP Server for the currency API.
pub struct HttpServer<R: CurrencyRepository, S: RateSource> {
    state: Arc<AppState<R, S>>,
    rate_limiter: Arc<RateLimiterState>,
}

impl<R: CurrencyRepository, S: RateSource> HttpServer<R, S> {
    /// Creates a new HTTP server with the given service.
    pub fn new(service: Arc<ConversionService<R, S>>) -> Self {
        Self {
            state: Arc::new(AppState { service }),
            rate_limiter: Arc::new(RateLimiterState::default()),
        }
    }

    /// Creates a new HTTP server with custom per-route budgets.
    pub fn with_rate_limit(service: Arc<ConversionService<R, S>>, limits: RateLimitConfig) -> Self {
        Self {
            state: Arc::new(AppState { service }),
            rate_limiter: Arc::new(RateLimiterState::new(limits)),
        }
    }

    /// Builds the Axum router with all routes.
    pub fn router(&self) -> Router {
        // Build HTTP metrics layer (uses globally set MeterProvider)
        let metrics = axum_otel_metrics::HttpMetricsLayerBuilder::new().build();

        Router::new()
            .route("/health", get(handlers::health::<R, S>))
            .route(
                "/api/currencies",
                get(handlers::list_currencies::<R, S>).post(handlers::create_currency::<R, S>),
            )
            .route(
                "/api/currencies/route",
                get(handlers::conversion_route::<R, S>),
            )
            .route("/api/currencies/convert", post(handlers::convert::<R, S>))
            .route(
                "/api/currencies/convert/batch",
                post(handlers::convert_batch::<R, S>),
            )
            .route(
                "/api/exchangerates",
                get(handlers::list_exchange_rates::<R, S>)
                    .post(handlers::create_exchange_rate::<R, S>),
            )
            .route(
                "/api/exchangerates/{id}/prices",
                get(handlers::list_prices::<R, S>),
            )
            .route(
                "/api/exchangerates/refresh",
                post(handlers::refresh_rates::<R, S>),
            )
            .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
            .layer(metrics)
            .layer(middleware::from_fn_with_state(
                self.rate_limiter.clone(),
                rate_limit_middleware,
            ))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Runs the server on the given address with graceful shutdown.
    pub async fn run(self, addr: &str) -> anyhow::Result<()> {
        self.run_until(addr, shutdown_signal()).await
    }

    /// Runs the server until `shutdown` resolves.
    pub async fn run_until<F>(self, addr: &str, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!("Server listening on {}", listener.local_addr()?);

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await?;

        Ok(())
    }
}

/// Resolves on Ctrl+C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown...");
}

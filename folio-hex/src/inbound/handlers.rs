//! HTTP request handlers.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};

use folio_types::{
    AppError, BatchConvertItem, BatchConvertRequest, BatchConvertResponse, ConversionError,
    ConvertRequest, CreateCurrencyRequest, CreateExchangeRateRequest, CurrencyRepository,
    ExchangeRateId, HealthResponse, PriceRangeQuery, RateSource, RefreshError, RouteQuery,
    RouteResponse,
};

use crate::ConversionService;

/// Application state shared across handlers.
pub struct AppState<R: CurrencyRepository, S: RateSource> {
    pub service: Arc<ConversionService<R, S>>,
}

/// Wrapper to implement IntoResponse for AppError (orphan rule workaround).
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        ApiError(err)
    }
}

impl From<ConversionError> for ApiError {
    fn from(err: ConversionError) -> Self {
        ApiError(err.into())
    }
}

impl From<RefreshError> for ApiError {
    fn from(err: RefreshError) -> Self {
        ApiError(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self.0 {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::ServiceUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            AppError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg),
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = serde_json::json!({
            "error": message,
            "code": status.as_u16()
        });

        (status, Json(body)).into_response()
    }
}

type AppStateRef<R, S> = State<Arc<AppState<R, S>>>;

/// Health check endpoint.
pub async fn health<R: CurrencyRepository, S: RateSource>(
    State(state): AppStateRef<R, S>,
) -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".into(),
        routing_ready: state.service.is_ready(),
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Currencies & exchange rates
// ─────────────────────────────────────────────────────────────────────────────

/// List all currencies.
#[tracing::instrument(skip(state))]
pub async fn list_currencies<R: CurrencyRepository, S: RateSource>(
    State(state): AppStateRef<R, S>,
) -> Result<impl IntoResponse, ApiError> {
    let currencies = state.service.list_currencies().await?;
    Ok(Json(currencies))
}

/// Register a currency.
#[tracing::instrument(skip(state), fields(code = %req.code))]
pub async fn create_currency<R: CurrencyRepository, S: RateSource>(
    State(state): AppStateRef<R, S>,
    Json(req): Json<CreateCurrencyRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let currency = state.service.create_currency(&req.code).await?;
    Ok((StatusCode::CREATED, Json(currency)))
}

/// List all exchange rates.
#[tracing::instrument(skip(state))]
pub async fn list_exchange_rates<R: CurrencyRepository, S: RateSource>(
    State(state): AppStateRef<R, S>,
) -> Result<impl IntoResponse, ApiError> {
    let rates = state.service.list_exchange_rates().await?;
    Ok(Json(rates))
}

/// Register a directed exchange rate.
#[tracing::instrument(skip(state), fields(base = %req.base_currency_code, quote = %req.quote_currency_code))]
pub async fn create_exchange_rate<R: CurrencyRepository, S: RateSource>(
    State(state): AppStateRef<R, S>,
    Json(req): Json<CreateExchangeRateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let rate = state
        .service
        .create_exchange_rate(&req.base_currency_code, &req.quote_currency_code)
        .await?;
    Ok((StatusCode::CREATED, Json(rate)))
}

/// Price history of one exchange rate.
#[tracing::instrument(skip(state), fields(exchange_rate_id = %id))]
pub async fn list_prices<R: CurrencyRepository, S: RateSource>(
    State(state): AppStateRef<R, S>,
    Path(id): Path<String>,
    Query(range): Query<PriceRangeQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let rate_id: ExchangeRateId = id
        .parse()
        .map_err(|_| AppError::BadRequest("Invalid exchange rate ID".into()))?;

    let prices = state
        .service
        .list_prices(rate_id, range.from, range.to)
        .await?;
    Ok(Json(prices))
}

/// Trigger a rate refresh now.
#[tracing::instrument(skip(state))]
pub async fn refresh_rates<R: CurrencyRepository, S: RateSource>(
    State(state): AppStateRef<R, S>,
) -> Result<impl IntoResponse, ApiError> {
    let summary = state.service.refresh_all_rates().await?;
    Ok(Json(summary))
}

// ─────────────────────────────────────────────────────────────────────────────
// Routing & conversion
// ─────────────────────────────────────────────────────────────────────────────

/// Fewest-hop conversion route between two currencies.
#[tracing::instrument(skip(state), fields(from = %query.from, to = %query.to))]
pub async fn conversion_route<R: CurrencyRepository, S: RateSource>(
    State(state): AppStateRef<R, S>,
    Query(query): Query<RouteQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let route = state.service.conversion_route(&query.from, &query.to)?;

    Ok(Json(RouteResponse {
        source: route.first().cloned().unwrap_or_default(),
        target: route.last().cloned().unwrap_or_default(),
        hops: route.len().saturating_sub(1),
        route,
    }))
}

/// Convert an amount.
#[tracing::instrument(skip(state), fields(source = %req.source, target = %req.target, amount = %req.amount))]
pub async fn convert<R: CurrencyRepository, S: RateSource>(
    State(state): AppStateRef<R, S>,
    Json(req): Json<ConvertRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let converted = state.service.convert(&req).await?;
    Ok(Json(converted))
}

/// Convert many amounts with one shared price loader.
#[tracing::instrument(skip(state, req), fields(count = req.conversions.len()))]
pub async fn convert_batch<R: CurrencyRepository, S: RateSource>(
    State(state): AppStateRef<R, S>,
    Json(req): Json<BatchConvertRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let results = state
        .service
        .convert_many(&req.conversions)
        .await
        .into_iter()
        .map(|outcome| match outcome {
            Ok(result) => BatchConvertItem {
                result: Some(result),
                error: None,
            },
            Err(e) => BatchConvertItem {
                result: None,
                error: Some(e.to_string()),
            },
        })
        .collect();

    Ok(Json(BatchConvertResponse { results }))
}

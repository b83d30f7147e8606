//! OpenAPI specification and documentation.

#![allow(dead_code)] // Path functions are only used by utoipa for documentation generation

use folio_types::domain::{Currency, ExchangeRate, ExchangeRatePrice};
use folio_types::dto::{
    BatchConvertItem, BatchConvertRequest, BatchConvertResponse, ConvertRequest, ConvertResponse,
    CreateCurrencyRequest, CreateExchangeRateRequest, HealthResponse, PriceRangeQuery,
    RefreshSummary, RouteQuery, RouteResponse,
};
use utoipa::OpenApi;

// Dummy functions to generate path documentation
// These are not the actual handlers, just for OpenAPI path generation

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    )
)]
async fn health() {}

/// List all currencies
#[utoipa::path(
    get,
    path = "/api/currencies",
    tag = "currencies",
    responses(
        (status = 200, description = "List of currencies", body = Vec<Currency>)
    )
)]
async fn list_currencies() {}

/// Register a currency
#[utoipa::path(
    post,
    path = "/api/currencies",
    tag = "currencies",
    request_body = CreateCurrencyRequest,
    responses(
        (status = 201, description = "Currency created", body = Currency),
        (status = 400, description = "Invalid or duplicate currency code")
    )
)]
async fn create_currency() {}

/// Fewest-hop conversion route between two currencies
#[utoipa::path(
    get,
    path = "/api/currencies/route",
    tag = "conversion",
    params(RouteQuery),
    responses(
        (status = 200, description = "Conversion route", body = RouteResponse),
        (status = 400, description = "Unknown currency"),
        (status = 404, description = "No route between the currencies"),
        (status = 503, description = "Routing table not built yet")
    )
)]
async fn conversion_route() {}

/// Convert an amount between two currencies
#[utoipa::path(
    post,
    path = "/api/currencies/convert",
    tag = "conversion",
    request_body = ConvertRequest,
    responses(
        (status = 200, description = "Converted amount", body = ConvertResponse),
        (status = 400, description = "Unknown currency"),
        (status = 404, description = "No route or no price on or before the date"),
        (status = 503, description = "Routing table not built yet")
    )
)]
async fn convert() {}

/// Convert many amounts in one request
#[utoipa::path(
    post,
    path = "/api/currencies/convert/batch",
    tag = "conversion",
    request_body = BatchConvertRequest,
    responses(
        (status = 200, description = "Positional results, each with a result or an error", body = BatchConvertResponse)
    )
)]
async fn convert_batch() {}

/// List all exchange rates
#[utoipa::path(
    get,
    path = "/api/exchangerates",
    tag = "exchange-rates",
    responses(
        (status = 200, description = "List of exchange rates", body = Vec<ExchangeRate>)
    )
)]
async fn list_exchange_rates() {}

/// Register a directed exchange rate
#[utoipa::path(
    post,
    path = "/api/exchangerates",
    tag = "exchange-rates",
    request_body = CreateExchangeRateRequest,
    responses(
        (status = 201, description = "Exchange rate created", body = ExchangeRate),
        (status = 400, description = "Unknown currency or duplicate pair")
    )
)]
async fn create_exchange_rate() {}

/// Price history of one exchange rate
#[utoipa::path(
    get,
    path = "/api/exchangerates/{id}/prices",
    tag = "exchange-rates",
    params(
        ("id" = i64, Path, description = "Exchange rate ID"),
        PriceRangeQuery
    ),
    responses(
        (status = 200, description = "Prices, oldest first", body = Vec<ExchangeRatePrice>),
        (status = 404, description = "Exchange rate not found")
    )
)]
async fn list_prices() {}

/// Refresh exchange rate prices from the external source now
#[utoipa::path(
    post,
    path = "/api/exchangerates/refresh",
    tag = "exchange-rates",
    responses(
        (status = 200, description = "Refresh finished", body = RefreshSummary),
        (status = 502, description = "External rate source failed")
    )
)]
async fn refresh_rates() {}

/// OpenAPI documentation for the currency API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Folio Currency Service API",
        version = "1.0.0",
        description = "Multi-hop currency conversion over historical daily exchange rates.",
        license(name = "MIT"),
    ),
    paths(
        health,
        list_currencies,
        create_currency,
        conversion_route,
        convert,
        convert_batch,
        list_exchange_rates,
        create_exchange_rate,
        list_prices,
        refresh_rates,
    ),
    components(
        schemas(
            Currency,
            ExchangeRate,
            ExchangeRatePrice,
            CreateCurrencyRequest,
            CreateExchangeRateRequest,
            ConvertRequest,
            ConvertResponse,
            BatchConvertRequest,
            BatchConvertItem,
            BatchConvertResponse,
            RouteResponse,
            RefreshSummary,
            HealthResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "currencies", description = "Currency catalog"),
        (name = "conversion", description = "Routing and amount conversion"),
        (name = "exchange-rates", description = "Exchange rates and their daily prices"),
    )
)]
pub struct ApiDoc;

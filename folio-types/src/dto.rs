//! Data Transfer Objects (DTOs) for requests and responses.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

// ─────────────────────────────────────────────────────────────────────────────
// Catalog DTOs
// ─────────────────────────────────────────────────────────────────────────────

/// Request to register a currency.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateCurrencyRequest {
    #[schema(example = "AED")]
    pub code: String,
}

/// Request to register the directed exchange rate `base -> quote`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateExchangeRateRequest {
    #[schema(example = "EUR")]
    pub base_currency_code: String,
    #[schema(example = "USD")]
    pub quote_currency_code: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Conversion DTOs
// ─────────────────────────────────────────────────────────────────────────────

/// Request to convert an amount between two currencies.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ConvertRequest {
    /// Amount in the source currency
    #[schema(value_type = String, example = "100")]
    pub amount: Decimal,
    /// Source currency code
    #[schema(example = "EUR")]
    pub source: String,
    /// Target currency code
    #[schema(example = "AED")]
    pub target: String,
    /// Price date; defaults to today (UTC)
    #[serde(default)]
    #[schema(value_type = Option<String>, example = "1999-01-04")]
    pub date: Option<NaiveDate>,
}

/// Result of a single conversion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ConvertResponse {
    #[schema(value_type = String)]
    pub amount: Decimal,
    pub source: String,
    pub target: String,
    #[schema(value_type = String)]
    pub date: NaiveDate,
}

/// Many conversions resolved in one request.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BatchConvertRequest {
    pub conversions: Vec<ConvertRequest>,
}

/// Positional outcome of one conversion in a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct BatchConvertItem {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ConvertResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct BatchConvertResponse {
    pub results: Vec<BatchConvertItem>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Routing DTOs
// ─────────────────────────────────────────────────────────────────────────────

/// Query for a conversion route.
#[derive(Debug, Clone, Serialize, Deserialize, IntoParams)]
pub struct RouteQuery {
    /// Source currency code
    pub from: String,
    /// Target currency code
    pub to: String,
}

/// Conversion route between two currencies, both ends inclusive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RouteResponse {
    pub source: String,
    pub target: String,
    pub hops: usize,
    #[schema(example = json!(["EUR", "USD", "AED"]))]
    pub route: Vec<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Price history DTOs
// ─────────────────────────────────────────────────────────────────────────────

/// Optional inclusive date range for price history.
#[derive(Debug, Clone, Default, Serialize, Deserialize, IntoParams)]
pub struct PriceRangeQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Refresh & health DTOs
// ─────────────────────────────────────────────────────────────────────────────

/// What one refresh run did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RefreshSummary {
    /// Exchange rates examined
    pub rates_checked: usize,
    /// Rates whose latest price is already today's
    pub rates_skipped_current: usize,
    /// Rates whose base currency has no automatic source
    pub rates_without_source: usize,
    /// New price rows appended
    pub prices_inserted: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    #[schema(example = "healthy")]
    pub status: String,
    /// Whether the routing table has been built
    pub routing_ready: bool,
}

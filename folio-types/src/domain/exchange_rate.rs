//! Exchange rate and daily price domain models.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Fractional digits kept for stored prices.
pub const PRICE_SCALE: u32 = 8;

/// Rounds a price to the stored scale.
pub fn normalize_price(value: Decimal) -> Decimal {
    let mut value = value.round_dp(PRICE_SCALE);
    value.rescale(PRICE_SCALE);
    value
}

/// Unique identifier for an ExchangeRate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct ExchangeRateId(i64);

impl ExchangeRateId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for ExchangeRateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ExchangeRateId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

/// A directed conversion relationship: 1 `base` = price `quote`.
///
/// (A, B) and (B, A) are distinct records; neither implies the other exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ExchangeRate {
    #[schema(value_type = i64, example = 1)]
    pub id: ExchangeRateId,
    #[schema(example = "EUR")]
    pub base_currency_code: String,
    #[schema(example = "USD")]
    pub quote_currency_code: String,
}

impl ExchangeRate {
    /// Returns the pair as `(base, quote)`.
    pub fn pair(&self) -> (&str, &str) {
        (&self.base_currency_code, &self.quote_currency_code)
    }
}

/// One day's value of an exchange rate series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ExchangeRatePrice {
    #[schema(value_type = i64, example = 1)]
    pub exchange_rate_id: ExchangeRateId,
    #[schema(value_type = String, example = "1999-01-04")]
    pub date: NaiveDate,
    #[schema(value_type = String, example = "1.17900000")]
    pub value: Decimal,
}

/// A (date, value) point as delivered by an external rate source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyRate {
    pub date: NaiveDate,
    pub value: Decimal,
}

impl DailyRate {
    /// Attaches the point to a stored exchange rate series.
    pub fn into_price(self, exchange_rate_id: ExchangeRateId) -> ExchangeRatePrice {
        ExchangeRatePrice {
            exchange_rate_id,
            date: self.date,
            value: normalize_price(self.value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_normalize_price_scale() {
        let v = normalize_price(dec!(1.179));
        assert_eq!(v.scale(), PRICE_SCALE);
        assert_eq!(v.to_string(), "1.17900000");
    }

    #[test]
    fn test_normalize_price_rounds() {
        assert_eq!(
            normalize_price(dec!(0.123456789)).to_string(),
            "0.12345679"
        );
    }

    #[test]
    fn test_exchange_rate_id_parse() {
        let id: ExchangeRateId = "42".parse().unwrap();
        assert_eq!(id.value(), 42);
        assert!("abc".parse::<ExchangeRateId>().is_err());
    }

    #[test]
    fn test_price_serializes_value_as_string() {
        let price = ExchangeRatePrice {
            exchange_rate_id: ExchangeRateId::new(1),
            date: NaiveDate::from_ymd_opt(1999, 1, 4).unwrap(),
            value: normalize_price(dec!(1.179)),
        };
        let json = serde_json::to_value(&price).unwrap();
        assert_eq!(json["value"], "1.17900000");
        assert_eq!(json["date"], "1999-01-04");
        assert_eq!(json["exchange_rate_id"], 1);
    }
}

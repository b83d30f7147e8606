//! Domain models for the currency conversion service.

pub mod currency;
pub mod exchange_rate;

pub use currency::Currency;
pub use exchange_rate::{
    DailyRate, ExchangeRate, ExchangeRateId, ExchangeRatePrice, PRICE_SCALE, normalize_price,
};

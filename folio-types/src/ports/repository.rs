//! Repository port trait.
//!
//! This is the primary port in our hexagonal architecture.
//! Adapters (Postgres, SQLite, in-memory) implement this trait.

use chrono::NaiveDate;

use crate::domain::{Currency, ExchangeRate, ExchangeRateId, ExchangeRatePrice};
use crate::error::RepoError;

/// Store of currencies, exchange rates and their daily prices.
///
/// Reads are consistent snapshots at call time; no cross-call transaction is
/// assumed. Prices are append-only.
#[async_trait::async_trait]
pub trait CurrencyRepository: Send + Sync + 'static {
    // ─────────────────────────────────────────────────────────────────────────────
    // Currencies & exchange rates
    // ─────────────────────────────────────────────────────────────────────────────

    /// Lists all currencies.
    async fn list_currencies(&self) -> Result<Vec<Currency>, RepoError>;

    /// Creates a currency; fails with `Conflict` if the code exists.
    async fn create_currency(&self, code: &str) -> Result<Currency, RepoError>;

    /// Lists all exchange rates.
    async fn list_exchange_rates(&self) -> Result<Vec<ExchangeRate>, RepoError>;

    /// Gets an exchange rate by ID.
    async fn get_exchange_rate(&self, id: ExchangeRateId)
    -> Result<Option<ExchangeRate>, RepoError>;

    /// Creates the directed exchange rate `base -> quote`.
    async fn create_exchange_rate(
        &self,
        base: &str,
        quote: &str,
    ) -> Result<ExchangeRate, RepoError>;

    // ─────────────────────────────────────────────────────────────────────────────
    // Prices
    // ─────────────────────────────────────────────────────────────────────────────

    /// Date of the newest stored price for a rate.
    async fn latest_price_date(&self, id: ExchangeRateId) -> Result<Option<NaiveDate>, RepoError>;

    /// Most recent price with `date <= on`.
    async fn price_at_or_before(
        &self,
        id: ExchangeRateId,
        on: NaiveDate,
    ) -> Result<Option<ExchangeRatePrice>, RepoError>;

    /// Batched form of [`price_at_or_before`](Self::price_at_or_before);
    /// results are positional.
    async fn prices_at_or_before(
        &self,
        lookups: &[(ExchangeRateId, NaiveDate)],
    ) -> Result<Vec<Option<ExchangeRatePrice>>, RepoError> {
        let mut out = Vec::with_capacity(lookups.len());
        for &(id, on) in lookups {
            out.push(self.price_at_or_before(id, on).await?);
        }
        Ok(out)
    }

    /// Price history for a rate, oldest first, optionally bounded (inclusive).
    async fn list_prices(
        &self,
        id: ExchangeRateId,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Vec<ExchangeRatePrice>, RepoError>;

    /// Appends prices in one bulk insert, skipping `(rate, date)` rows that
    /// already exist. Returns the number of rows inserted.
    async fn insert_prices(&self, prices: &[ExchangeRatePrice]) -> Result<u64, RepoError>;
}

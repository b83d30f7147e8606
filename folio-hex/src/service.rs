//! Currency Conversion Application Service
//!
//! Orchestrates routing, price lookups and rate refreshes through the
//! repository and rate source ports. Holds the only shared mutable state of
//! the service: the published routing snapshot.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{NaiveDate, Utc};
use futures::future::join_all;
use rust_decimal::Decimal;
use tracing::{debug, info, instrument, warn};

use currency_graph::{ConversionGraph, RoutingTable};
use folio_types::{
    AppError, ConversionError, ConvertRequest, ConvertResponse, Currency, CurrencyRepository,
    ExchangeRate, ExchangeRateId, ExchangeRatePrice, RateSource, RefreshError, RefreshSummary,
    RepoError,
};

use crate::price_loader::{PriceLoader, PriceLookup};

/// Reference currency of the default rate source.
pub const DEFAULT_REFERENCE_CURRENCY: &str = "EUR";

// ─────────────────────────────────────────────────────────────────────────────
// Routing snapshot
// ─────────────────────────────────────────────────────────────────────────────

/// Everything a conversion needs from the currency graph, built together and
/// published as one unit.
#[derive(Debug)]
pub struct ConversionSnapshot {
    table: RoutingTable,
    rates: HashMap<(String, String), ExchangeRateId>,
}

impl ConversionSnapshot {
    pub fn build(currencies: &[Currency], rates: &[ExchangeRate]) -> Self {
        let graph = ConversionGraph::from_exchange_rates(
            currencies.iter().map(|c| c.code.as_str()),
            rates.iter().map(ExchangeRate::pair),
        );
        let rates = rates
            .iter()
            .map(|r| {
                (
                    (r.base_currency_code.clone(), r.quote_currency_code.clone()),
                    r.id,
                )
            })
            .collect();

        Self {
            table: graph.routing_table(),
            rates,
        }
    }

    pub fn table(&self) -> &RoutingTable {
        &self.table
    }

    /// Stored exchange rate for the directed pair `base -> quote`.
    pub fn rate_id(&self, base: &str, quote: &str) -> Option<ExchangeRateId> {
        self.rates
            .get(&(base.to_string(), quote.to_string()))
            .copied()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Service
// ─────────────────────────────────────────────────────────────────────────────

/// Application service for currency routing, conversion and rate refresh.
///
/// Generic over `R: CurrencyRepository` and `S: RateSource` - the adapters
/// are injected at compile time.
pub struct ConversionService<R: CurrencyRepository, S: RateSource> {
    repo: Arc<R>,
    source: S,
    reference_currency: String,
    snapshot: RwLock<Option<Arc<ConversionSnapshot>>>,
    rebuild_lock: tokio::sync::Mutex<()>,
    refresh_lock: tokio::sync::Mutex<()>,
}

impl<R: CurrencyRepository, S: RateSource> ConversionService<R, S> {
    /// Creates a service. Conversions fail with `NotReady` until the first
    /// [`rebuild_routing_table`](Self::rebuild_routing_table) succeeds.
    pub fn new(repo: R, source: S) -> Self {
        Self {
            repo: Arc::new(repo),
            source,
            reference_currency: DEFAULT_REFERENCE_CURRENCY.to_string(),
            snapshot: RwLock::new(None),
            rebuild_lock: tokio::sync::Mutex::new(()),
            refresh_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Sets the base currency the rate source can deliver series for.
    pub fn with_reference_currency(mut self, code: &str) -> Self {
        self.reference_currency = code.trim().to_ascii_uppercase();
        self
    }

    /// Returns a reference to the underlying repository.
    pub fn repo(&self) -> &R {
        &self.repo
    }

    /// Returns a reference to the rate source.
    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn reference_currency(&self) -> &str {
        &self.reference_currency
    }

    /// Whether a routing table has been published.
    pub fn is_ready(&self) -> bool {
        self.current_snapshot().is_some()
    }

    /// The currently published snapshot, if any.
    pub fn current_snapshot(&self) -> Option<Arc<ConversionSnapshot>> {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn ready_snapshot(&self) -> Result<Arc<ConversionSnapshot>, ConversionError> {
        self.current_snapshot().ok_or(ConversionError::NotReady)
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Catalog
    // ─────────────────────────────────────────────────────────────────────────────

    /// Lists all currencies.
    pub async fn list_currencies(&self) -> Result<Vec<Currency>, AppError> {
        self.repo.list_currencies().await.map_err(Into::into)
    }

    /// Registers a currency and republishes routing.
    pub async fn create_currency(&self, code: &str) -> Result<Currency, AppError> {
        let currency = self.repo.create_currency(code).await?;
        self.republish().await;
        Ok(currency)
    }

    /// Lists all exchange rates.
    pub async fn list_exchange_rates(&self) -> Result<Vec<ExchangeRate>, AppError> {
        self.repo.list_exchange_rates().await.map_err(Into::into)
    }

    /// Registers the directed exchange rate `base -> quote` and republishes
    /// routing.
    pub async fn create_exchange_rate(
        &self,
        base: &str,
        quote: &str,
    ) -> Result<ExchangeRate, AppError> {
        let rate = self.repo.create_exchange_rate(base, quote).await?;
        self.republish().await;
        Ok(rate)
    }

    /// Price history of one exchange rate, oldest first.
    pub async fn list_prices(
        &self,
        id: ExchangeRateId,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Vec<ExchangeRatePrice>, AppError> {
        if self.repo.get_exchange_rate(id).await?.is_none() {
            return Err(AppError::NotFound(format!("Exchange rate {}", id)));
        }
        self.repo.list_prices(id, from, to).await.map_err(Into::into)
    }

    async fn republish(&self) {
        if let Err(e) = self.rebuild_routing_table().await {
            warn!(error = %e, "Routing rebuild failed, keeping previous table");
        }
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Routing
    // ─────────────────────────────────────────────────────────────────────────────

    /// Rebuilds the routing table from the repository and publishes it.
    ///
    /// Rebuilds never overlap: each one reads the repository only after the
    /// previous one has published, so an older read cannot replace a newer
    /// table. On failure the previously published snapshot stays in place.
    #[instrument(skip(self))]
    pub async fn rebuild_routing_table(&self) -> Result<(), RepoError> {
        let _rebuilding = self.rebuild_lock.lock().await;
        let currencies = self.repo.list_currencies().await?;
        let rates = self.repo.list_exchange_rates().await?;

        let snapshot = ConversionSnapshot::build(&currencies, &rates);
        *self
            .snapshot
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(snapshot));

        info!(
            currencies = currencies.len(),
            exchange_rates = rates.len(),
            "Published routing table"
        );
        Ok(())
    }

    /// Fewest-hop conversion route, both ends inclusive.
    pub fn conversion_route(
        &self,
        source: &str,
        target: &str,
    ) -> Result<Vec<String>, ConversionError> {
        let snapshot = self.ready_snapshot()?;
        let route = snapshot
            .table()
            .route(&normalize_code(source), &normalize_code(target))?;
        Ok(route)
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Conversion
    // ─────────────────────────────────────────────────────────────────────────────

    /// Converts `amount` from `source` to `target` with the prices valid on
    /// `as_of`, looking prices up directly in the repository.
    #[instrument(skip(self), err(Display))]
    pub async fn convert_amount(
        &self,
        amount: Decimal,
        source: &str,
        target: &str,
        as_of: NaiveDate,
    ) -> Result<Decimal, ConversionError> {
        let prices = RepoPrices(self.repo.as_ref());
        self.convert_with(&prices, amount, source, target, as_of)
            .await
    }

    /// Converts one request; a missing date means today (UTC).
    pub async fn convert(&self, req: &ConvertRequest) -> Result<ConvertResponse, ConversionError> {
        let date = req.date.unwrap_or_else(|| Utc::now().date_naive());
        let amount = self
            .convert_amount(req.amount, &req.source, &req.target, date)
            .await?;
        Ok(ConvertResponse {
            amount,
            source: normalize_code(&req.source),
            target: normalize_code(&req.target),
            date,
        })
    }

    /// Converts through an arbitrary price lookup.
    ///
    /// Each hop uses the newest price at or before `as_of`: the forward pair
    /// multiplies, otherwise the reverse pair divides.
    pub async fn convert_with<L>(
        &self,
        prices: &L,
        amount: Decimal,
        source: &str,
        target: &str,
        as_of: NaiveDate,
    ) -> Result<Decimal, ConversionError>
    where
        L: PriceLookup + ?Sized,
    {
        let snapshot = self.ready_snapshot()?;
        let route = snapshot
            .table()
            .route(&normalize_code(source), &normalize_code(target))?;

        let mut value = amount;
        for hop in route.windows(2) {
            let (cur, next) = (hop[0].as_str(), hop[1].as_str());

            if let Some(price) = lookup(prices, &snapshot, cur, next, as_of).await? {
                value = value
                    .checked_mul(price.value)
                    .ok_or_else(|| arithmetic(cur, next))?;
                continue;
            }
            if let Some(price) = lookup(prices, &snapshot, next, cur, as_of).await? {
                value = value
                    .checked_div(price.value)
                    .ok_or_else(|| arithmetic(next, cur))?;
                continue;
            }

            return Err(ConversionError::NoPriceAvailable {
                base: cur.to_string(),
                quote: next.to_string(),
                date: as_of,
            });
        }

        Ok(value)
    }

    /// Converts many amounts in one go, sharing one [`PriceLoader`] so
    /// repeated `(rate, date)` lookups hit the store once.
    ///
    /// Results are positional; one failing conversion does not affect others.
    #[instrument(skip(self, requests), fields(count = requests.len()))]
    pub async fn convert_many(
        &self,
        requests: &[ConvertRequest],
    ) -> Vec<Result<ConvertResponse, ConversionError>> {
        let loader = PriceLoader::new(Arc::clone(&self.repo));
        let today = Utc::now().date_naive();

        let conversions = requests.iter().map(|req| {
            let loader = &loader;
            async move {
                let date = req.date.unwrap_or(today);
                let amount = self
                    .convert_with(loader, req.amount, &req.source, &req.target, date)
                    .await?;
                Ok(ConvertResponse {
                    amount,
                    source: normalize_code(&req.source),
                    target: normalize_code(&req.target),
                    date,
                })
            }
        });

        join_all(conversions).await
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Rate refresh
    // ─────────────────────────────────────────────────────────────────────────────

    /// Refreshes every exchange rate up to today (UTC) and rebuilds routing.
    pub async fn refresh_all_rates(&self) -> Result<RefreshSummary, RefreshError> {
        self.refresh_all_rates_on(Utc::now().date_naive()).await
    }

    /// Refreshes every exchange rate, treating `today` as the current date.
    ///
    /// Runs never overlap. A fetch failure aborts the run without touching
    /// the remaining rates or the routing table.
    #[instrument(skip(self), err(Display))]
    pub async fn refresh_all_rates_on(
        &self,
        today: NaiveDate,
    ) -> Result<RefreshSummary, RefreshError> {
        let _running = self.refresh_lock.lock().await;
        let mut summary = RefreshSummary::default();

        for rate in self.repo.list_exchange_rates().await? {
            summary.rates_checked += 1;

            let latest = self.repo.latest_price_date(rate.id).await?;
            if latest.is_some_and(|d| d >= today) {
                summary.rates_skipped_current += 1;
                debug!(rate_id = %rate.id, "Rate already current");
                continue;
            }

            if rate.base_currency_code != self.reference_currency {
                summary.rates_without_source += 1;
                info!(
                    rate_id = %rate.id,
                    base = %rate.base_currency_code,
                    quote = %rate.quote_currency_code,
                    "No automatic source for base currency, skipping"
                );
                continue;
            }

            let series = self
                .source
                .fetch_daily_series(&rate.base_currency_code, &rate.quote_currency_code)
                .await
                .inspect_err(|e| {
                    warn!(rate_id = %rate.id, error = %e, "Rate fetch failed, aborting refresh")
                })?;

            let fresh: Vec<ExchangeRatePrice> = series
                .into_iter()
                .filter(|point| latest.is_none_or(|d| point.date > d))
                .map(|point| point.into_price(rate.id))
                .collect();

            let inserted = self.repo.insert_prices(&fresh).await?;
            summary.prices_inserted += inserted;
            info!(
                rate_id = %rate.id,
                base = %rate.base_currency_code,
                quote = %rate.quote_currency_code,
                inserted,
                "Stored new prices"
            );
        }

        self.rebuild_routing_table().await?;
        info!(?summary, "Refresh complete");
        Ok(summary)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Direct repository price lookup.
struct RepoPrices<'a, R>(&'a R);

#[async_trait::async_trait]
impl<'a, R: CurrencyRepository> PriceLookup for RepoPrices<'a, R> {
    async fn price_at_or_before(
        &self,
        id: ExchangeRateId,
        on: NaiveDate,
    ) -> Result<Option<ExchangeRatePrice>, RepoError> {
        self.0.price_at_or_before(id, on).await
    }
}

async fn lookup<L: PriceLookup + ?Sized>(
    prices: &L,
    snapshot: &ConversionSnapshot,
    base: &str,
    quote: &str,
    on: NaiveDate,
) -> Result<Option<ExchangeRatePrice>, ConversionError> {
    match snapshot.rate_id(base, quote) {
        Some(id) => Ok(prices.price_at_or_before(id, on).await?),
        None => Ok(None),
    }
}

fn arithmetic(base: &str, quote: &str) -> ConversionError {
    ConversionError::Arithmetic {
        base: base.to_string(),
        quote: quote.to_string(),
    }
}

fn normalize_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

//! Request-scoped batched price lookups.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use folio_loader::{LoadError, Loader, LoaderConfig};
use folio_types::{CurrencyRepository, ExchangeRateId, ExchangeRatePrice, RepoError};

/// Source of "newest price at or before a date" answers.
#[async_trait::async_trait]
pub trait PriceLookup: Send + Sync {
    async fn price_at_or_before(
        &self,
        id: ExchangeRateId,
        on: NaiveDate,
    ) -> Result<Option<ExchangeRatePrice>, RepoError>;
}

/// Lookup key: exchange rate and the date the price must not be newer than.
pub type PriceKey = (ExchangeRateId, NaiveDate);

/// Coalesces the price lookups of one request into batched repository reads.
///
/// Every distinct `(rate, date)` is read at most once per loader. Create one
/// per request.
#[derive(Clone)]
pub struct PriceLoader {
    loader: Loader<PriceKey, Option<ExchangeRatePrice>, RepoError>,
}

impl PriceLoader {
    /// Batch window for price lookups.
    pub const MAX_WAIT: Duration = Duration::from_millis(2);
    /// Most lookups sent to the repository in one batch.
    pub const MAX_BATCH: usize = 500;

    pub fn new<R: CurrencyRepository>(repo: Arc<R>) -> Self {
        let config = LoaderConfig::default()
            .max_wait(Self::MAX_WAIT)
            .max_size(Self::MAX_BATCH);

        let loader = Loader::with_config(config, move |keys: Vec<PriceKey>| {
            let repo = Arc::clone(&repo);
            async move {
                tracing::debug!(keys = keys.len(), "Loading price batch");
                let rows = repo.prices_at_or_before(&keys).await?;
                let results: Vec<Result<Option<ExchangeRatePrice>, RepoError>> =
                    rows.into_iter().map(Ok).collect();
                Ok::<_, RepoError>(results)
            }
        });

        Self { loader }
    }
}

#[async_trait::async_trait]
impl PriceLookup for PriceLoader {
    async fn price_at_or_before(
        &self,
        id: ExchangeRateId,
        on: NaiveDate,
    ) -> Result<Option<ExchangeRatePrice>, RepoError> {
        self.loader
            .load((id, on))
            .await
            .map_err(into_repo_error)
    }
}

/// Unwraps the repository's own error so callers see the same kind as on
/// the direct path.
fn into_repo_error(err: LoadError<RepoError>) -> RepoError {
    match err {
        LoadError::Fetch(inner) => RepoError::clone(&inner),
        other => RepoError::Database(other.to_string()),
    }
}
